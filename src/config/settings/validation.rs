// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use super::Settings;

/// Read a credential from `env_name`, falling back to the stored value.
/// Empty strings count as absent.
fn resolve_key(env_name: &str, stored: Option<&String>) -> Option<String> {
    pick_key(std::env::var(env_name).ok(), stored)
}

fn pick_key(from_env: Option<String>, stored: Option<&String>) -> Option<String> {
    let present = |key: &String| !key.trim().is_empty();
    from_env
        .filter(present)
        .or_else(|| stored.filter(|key| present(key)).cloned())
}

impl Settings {
    /// Get the API key for Gemini, checking env var first.
    pub fn get_gemini_api_key(&self) -> Option<String> {
        let gemini = &self.providers.gemini;
        resolve_key(&gemini.api_key_env, gemini.api_key.as_ref())
    }

    /// Get the API key for DeepSeek, checking env var first.
    pub fn get_deepseek_api_key(&self) -> Option<String> {
        let deepseek = &self.providers.deepseek;
        resolve_key(&deepseek.api_key_env, deepseek.api_key.as_ref())
    }

    /// Get the local server base URL, checking `OLLAMA_BASE_URL` first.
    pub fn get_local_base_url(&self) -> String {
        std::env::var("OLLAMA_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.providers.local.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }
}
