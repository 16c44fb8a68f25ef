// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for viewer-chat
//!
//! Handles loading, saving, and resolving provider credentials.

pub mod settings;

pub use settings::*;
