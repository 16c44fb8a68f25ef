// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for chat conversations
//!
//! A conversation is an ordered list of user and assistant messages. User
//! messages may carry one image attachment; assistant messages only ever
//! grow by appending streamed text.

use serde::{Deserialize, Serialize};

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    /// Role name in the OpenAI/Ollama vocabulary
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// An image carried by a user message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Base64 payload without any `data:` prefix
    pub data: String,
    /// e.g. "image/jpeg"
    pub mime_type: String,
}

impl Attachment {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Render back into a `data:` URI for display.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,

    /// Text content
    pub content: String,

    /// Optional image attachment (user messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment: None,
        }
    }

    /// Create a user message with an attachment
    pub fn user_with_attachment(content: impl Into<String>, attachment: Option<Attachment>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            attachment,
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            attachment: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Index of the message that should carry the attachment: the final message,
/// and only when it is a user turn.
pub fn last_user_turn(messages: &[Message]) -> Option<usize> {
    match messages.last() {
        Some(last) if last.is_user() => Some(messages.len() - 1),
        _ => None,
    }
}
