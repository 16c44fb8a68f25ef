// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation state
//!
//! Pure state transitions for one chat session, kept apart from the I/O in
//! the controller so they can be tested without a runtime.

use serde::Serialize;

use crate::llm::message::{Attachment, Message, Role};
use crate::llm::provider::TokenEvent;

/// Prefix shown in front of request-level failures
pub const FAILURE_PREFIX: &str = "Failed to get response";

/// Where the session is in its request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Error,
}

/// The conversation as presented to the user
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to an empty, idle conversation
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_streaming(&self) -> bool {
        self.status == SessionStatus::Streaming
    }

    /// Append the user's message and enter `Streaming`
    pub fn begin_turn(&mut self, text: impl Into<String>, attachment: Option<Attachment>) {
        self.messages.push(Message::user_with_attachment(text, attachment));
        self.status = SessionStatus::Streaming;
        self.last_error = None;
    }

    /// Fold one token event into the conversation
    pub fn apply(&mut self, event: TokenEvent) {
        match event {
            TokenEvent::Start => {
                self.messages.push(Message::assistant(""));
            }
            TokenEvent::Token(text) => match self.messages.last_mut() {
                Some(last) if last.role == Role::Assistant => last.content.push_str(&text),
                _ => {
                    tracing::trace!("token before start; opening assistant message");
                    self.messages.push(Message::assistant(text));
                }
            },
            TokenEvent::End => {
                self.status = SessionStatus::Idle;
            }
            TokenEvent::Fail(error) => {
                self.fail(format!("{FAILURE_PREFIX}: {error}"));
            }
        }
    }

    /// Enter `Error` with `message`; messages are left exactly as they are
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.last_error = Some(message.into());
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    pub fn assistant_count(&self) -> usize {
        self.messages.iter().filter(|m| m.role == Role::Assistant).count()
    }
}
