// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input parsing for the chat REPL
//!
//! Pure functions that classify one line of user input. No side effects.

use std::path::PathBuf;

use crate::llm::provider::ProviderId;

/// One classified line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// Text to submit
    Prompt(String),
    /// `/model <provider> <model>`
    SelectModel { provider: ProviderId, model: String },
    /// `/attach on|off`
    Attach(bool),
    /// `/drop <file>`
    Drop(PathBuf),
    /// `/detach`
    Detach,
    /// `/models`
    ListModels,
    /// `/help`
    Help,
    /// `/quit`, `/exit`, `exit`, `quit`
    Quit,
    /// Blank line
    Empty,
    /// A slash command that could not be parsed
    Invalid(String),
}

/// Classify a line of input
pub fn parse_input(line: &str) -> ReplInput {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ReplInput::Empty;
    }
    if matches!(trimmed.to_lowercase().as_str(), "exit" | "quit") {
        return ReplInput::Quit;
    }
    if !trimmed.starts_with('/') {
        return ReplInput::Prompt(trimmed.to_string());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default().to_lowercase();
    let rest = parts.next().map(str::trim).unwrap_or_default();

    match command.as_str() {
        "/quit" | "/exit" => ReplInput::Quit,
        "/help" => ReplInput::Help,
        "/models" => ReplInput::ListModels,
        "/detach" => ReplInput::Detach,
        "/attach" => match rest.to_lowercase().as_str() {
            "" | "on" => ReplInput::Attach(true),
            "off" => ReplInput::Attach(false),
            other => ReplInput::Invalid(format!("Usage: /attach on|off (got '{other}')")),
        },
        "/drop" if !rest.is_empty() => ReplInput::Drop(PathBuf::from(rest)),
        "/drop" => ReplInput::Invalid("Usage: /drop <file>".to_string()),
        "/model" => parse_model(rest),
        other => ReplInput::Invalid(format!("Unknown command: {other}")),
    }
}

fn parse_model(rest: &str) -> ReplInput {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(provider), Some(model), None) => match provider.parse::<ProviderId>() {
            Ok(provider) => ReplInput::SelectModel {
                provider,
                model: model.to_string(),
            },
            Err(e) => ReplInput::Invalid(e.to_string()),
        },
        _ => ReplInput::Invalid("Usage: /model <provider> <model>".to_string()),
    }
}

/// Help text for the REPL
pub fn help_text() -> &'static str {
    "Commands:\n  \
     /model <provider> <model>  switch model (clears the conversation)\n  \
     /models                    list available models\n  \
     /attach on|off             toggle attaching the viewport image\n  \
     /drop <file>               stage an image file\n  \
     /detach                    remove the staged image\n  \
     /quit                      leave"
}
