// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider trait and related types
//!
//! Every backend is reduced to one contract: turn a conversation into a
//! stream of [`TokenEvent`]s. Request-level failures arrive in-band as
//! [`TokenEvent::Fail`], so callers consume a single stream type.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use crate::error::{ChatError, ProviderError};
use crate::llm::message::{Attachment, Message};

/// One incremental event from a streaming backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// The request succeeded and the body is about to be read
    Start,
    /// A piece of generated text
    Token(String),
    /// The body is exhausted (or the sentinel was seen)
    End,
    /// Request-level or transport failure; nothing follows
    Fail(ProviderError),
}

/// Boxed token stream returned by every adapter
pub type TokenStream = Pin<Box<dyn Stream<Item = TokenEvent> + Send>>;

/// Identity of a backend. Adapter dispatch is keyed on this, never on the
/// shape of a model name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Locally reachable Ollama server
    Local,
    /// Google Gemini
    Gemini,
    /// DeepSeek
    DeepSeek,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Local => "local",
            ProviderId::Gemini => "gemini",
            ProviderId::DeepSeek => "deepseek",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Local => "Local (Ollama)",
            ProviderId::Gemini => "Gemini",
            ProviderId::DeepSeek => "DeepSeek",
        }
    }

    /// Whether the backend accepts an inline image on the last user turn
    pub fn supports_images(&self) -> bool {
        match self {
            ProviderId::Local | ProviderId::Gemini => true,
            ProviderId::DeepSeek => false,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "ollama" => Ok(ProviderId::Local),
            "gemini" => Ok(ProviderId::Gemini),
            "deepseek" => Ok(ProviderId::DeepSeek),
            other => Err(ChatError::Config(format!("Unknown provider: {other}"))),
        }
    }
}

/// The registry's record of one usable backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub display_name: String,
    pub supports_image_attachment: bool,
    /// Model identifiers in menu order
    pub model_ids: Vec<String>,
}

impl ProviderDescriptor {
    pub fn new(id: ProviderId, model_ids: Vec<String>) -> Self {
        Self {
            id,
            display_name: id.display_name().to_string(),
            supports_image_attachment: id.supports_images(),
            model_ids,
        }
    }

    pub fn has_model(&self, model_id: &str) -> bool {
        self.model_ids.iter().any(|m| m == model_id)
    }
}

/// Everything an adapter needs for one submit
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub system_prompt: String,
    /// Embedded into the last user turn when the provider supports images
    pub attachment: Option<Attachment>,
}

impl StreamRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system_prompt: String::new(),
            attachment: None,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// A protocol adapter for one backend
pub trait StreamProvider: Send + Sync {
    /// Which backend this adapter speaks to
    fn id(&self) -> ProviderId;

    /// Issue one request and decode its body into token events.
    ///
    /// The returned stream always ends with exactly one `End` or `Fail`.
    fn stream(&self, request: StreamRequest) -> TokenStream;
}

/// Lifecycle of one response stream.
///
/// Frame decode errors never move the machine; only connection or status
/// failures reach `Failed`, and only from `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    Connecting,
    Open,
    Draining,
    Closed,
    Failed,
}

impl StreamPhase {
    pub fn can_transition_to(self, next: StreamPhase) -> bool {
        use StreamPhase::*;
        matches!(
            (self, next),
            (Connecting, Open)
                | (Connecting, Failed)
                | (Open, Draining)
                | (Draining, Closed)
                | (Draining, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StreamPhase::Closed | StreamPhase::Failed)
    }
}
