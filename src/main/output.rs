// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Mutex;

use viewer_chat::chat::{ChatSnapshot, StateListener};
use viewer_chat::llm::message::Role;
use viewer_chat::llm::provider::{ProviderDescriptor, ProviderId};

/// Prints assistant text as it grows
#[derive(Default)]
pub(super) struct TokenPrinter {
    // (generation, assistant message index, bytes already printed)
    cursor: Mutex<(u64, usize, usize)>,
}

impl TokenPrinter {
    /// Assistant text not yet printed for this snapshot; advances the cursor
    fn take_fresh(&self, snapshot: &ChatSnapshot) -> Option<String> {
        let messages = &snapshot.conversation.messages;
        let last = messages.last()?;
        if last.role != Role::Assistant {
            return None;
        }

        let index = messages.len() - 1;
        let mut cursor = match self.cursor.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if cursor.0 != snapshot.generation || cursor.1 != index {
            *cursor = (snapshot.generation, index, 0);
        }

        // Content only ever grows, so the old length is a char boundary.
        let fresh = last.content.get(cursor.2..).filter(|f| !f.is_empty())?.to_string();
        cursor.2 = last.content.len();
        Some(fresh)
    }
}

impl StateListener for TokenPrinter {
    fn on_state_change(&self, snapshot: &ChatSnapshot) {
        if let Some(fresh) = self.take_fresh(snapshot) {
            print!("{fresh}");
            let _ = io::stdout().flush();
        }
    }
}

/// Print the provider/model table, marking the active model
pub(super) fn print_models(providers: &[ProviderDescriptor], active: Option<(ProviderId, &str)>) {
    print!("{}", render_models(providers, active));
}

fn render_models(providers: &[ProviderDescriptor], active: Option<(ProviderId, &str)>) -> String {
    let mut out = String::new();
    if providers.is_empty() {
        out.push_str("No models available.\n");
        out.push_str("Start an Ollama server or set GEMINI_API_KEY / DEEPSEEK_API_KEY.\n");
        return out;
    }

    for descriptor in providers {
        let images = if descriptor.supports_image_attachment {
            "images"
        } else {
            "text only"
        };
        let _ = writeln!(out, "{} [{}] ({})", descriptor.display_name, descriptor.id, images);
        for model in &descriptor.model_ids {
            let marker = if active == Some((descriptor.id, model.as_str())) {
                "*"
            } else {
                " "
            };
            let _ = writeln!(out, "  {marker} {model}");
        }
    }
    out
}

/// JSON form of the provider list
pub(super) fn models_json(
    providers: &[ProviderDescriptor],
    active: Option<(ProviderId, &str)>,
) -> serde_json::Value {
    let providers: Vec<serde_json::Value> = providers
        .iter()
        .map(|d| {
            serde_json::json!({
                "id": d.id,
                "display_name": d.display_name,
                "supports_image_attachment": d.supports_image_attachment,
                "models": d.model_ids,
            })
        })
        .collect();

    serde_json::json!({
        "providers": providers,
        "default": active.map(|(provider, model)| serde_json::json!({"provider": provider, "model": model})),
    })
}
