// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! Conversation state and the controller that drives it.

pub mod controller;
pub mod state;

pub use controller::{
    ChatController, ChatSnapshot, IgnoreReason, ModelSelection, StateListener, SubmitOutcome,
};
pub use state::{ConversationState, SessionStatus};
