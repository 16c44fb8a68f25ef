// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for viewer-chat
//!
//! Provider discovery, the streaming adapter abstraction and the three
//! backend implementations.

pub mod framing;
pub mod message;
pub mod mock_provider;
pub mod provider;
pub mod providers;
pub mod registry;

pub use message::*;
pub use provider::*;
