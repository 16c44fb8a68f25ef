// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! The terminal stands in for the imaging viewer: it renders conversation
//! snapshots and feeds drops and viewport images into the controller.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::llm::provider::ProviderId;

/// viewer-chat - streaming chat with local and cloud models about medical images
#[derive(Parser, Debug)]
#[command(name = "viewer-chat")]
#[command(version, about = "Streaming chat with local and cloud models about medical images")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List discovered providers and models
    Models,

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Start interactive chat session (default when no command given)
    Chat(ChatArgs),
}

/// Model selection shared by `ask` and `chat`
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ModelArgs {
    /// Provider to use (local, gemini, deepseek)
    #[arg(short, long, value_parser = parse_provider)]
    pub provider: Option<ProviderId>,

    /// Model to use (defaults to the provider's first model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Image file registered as the viewer's rendering surface
    #[arg(long)]
    pub viewport: Option<PathBuf>,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question to ask
    pub prompt: String,

    #[command(flatten)]
    pub model: ModelArgs,

    /// Image file dropped onto the chat before asking
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Attach a snapshot of the viewport
    #[arg(long)]
    pub attach: bool,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Start with attachment mode on
    #[arg(long)]
    pub attach: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}

fn parse_provider(s: &str) -> Result<ProviderId, String> {
    s.parse().map_err(|e: crate::error::ChatError| e.to_string())
}
