// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! viewer-chat - multi-provider streaming chat for an imaging viewer.
//!
//! This crate exposes the chat runtime used by:
//! - the `viewer-chat` CLI (`src/main.rs`)
//! - any host that embeds [`chat::ChatController`] and renders its snapshots
//!
//! Architecture highlights:
//! - `llm`: one streaming adapter per backend (Ollama, Gemini, DeepSeek) behind
//!   a single token-event contract, plus the provider registry
//! - `attachment`: drag capture, drop payloads, viewport snapshots and the
//!   resolver that picks the image for the next message
//! - `chat`: conversation state and the session controller
//! - `config`: settings file and credential lookup

pub mod attachment;
pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;

pub use error::{ChatError, Result};
