// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for viewer-chat
//!
//! Handles loading and saving settings from ~/.viewer-chat/settings.json

use serde::{Deserialize, Serialize};

mod io;
mod validation;

/// Main settings structure, stored in ~/.viewer-chat/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Backend configurations
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Chat session defaults
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Configuration for the three chat backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// Locally reachable Ollama server
    #[serde(default)]
    pub local: LocalConfig,

    /// Google Gemini
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// DeepSeek (OpenAI-compatible)
    #[serde(default)]
    pub deepseek: DeepSeekConfig,
}

/// Local model server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Base URL of the Ollama server
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    /// Maximum tokens to generate (`options.num_predict`)
    #[serde(default = "default_num_predict")]
    pub num_predict: i64,

    /// Context window (`options.num_ctx`)
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
}

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the models endpoint
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// The single model offered for Gemini
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// `generationConfig.maxOutputTokens`
    #[serde(default = "default_gemini_max_output_tokens")]
    pub max_output_tokens: u32,
}

/// DeepSeek configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepSeekConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_deepseek_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API
    #[serde(default = "default_deepseek_base_url")]
    pub base_url: String,

    /// Models offered, in menu order
    #[serde(default = "default_deepseek_models")]
    pub models: Vec<String>,

    /// `max_tokens` request field
    #[serde(default = "default_deepseek_max_tokens")]
    pub max_tokens: u32,
}

/// Chat session defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// System prompt sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Start sessions with attachment mode enabled
    #[serde(default)]
    pub attach_by_default: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            num_predict: default_num_predict(),
            num_ctx: default_num_ctx(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_gemini_api_key_env(),
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            max_output_tokens: default_gemini_max_output_tokens(),
        }
    }
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_deepseek_api_key_env(),
            base_url: default_deepseek_base_url(),
            models: default_deepseek_models(),
            max_tokens: default_deepseek_max_tokens(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            attach_by_default: false,
        }
    }
}

// Default value functions
fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_num_predict() -> i64 {
    2048
}

fn default_num_ctx() -> u32 {
    4096
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_gemini_max_output_tokens() -> u32 {
    8192
}

fn default_deepseek_api_key_env() -> String {
    "DEEPSEEK_API_KEY".to_string()
}

fn default_deepseek_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_deepseek_models() -> Vec<String> {
    vec!["deepseek-v3".to_string(), "deepseek-reasoner".to_string()]
}

fn default_deepseek_max_tokens() -> u32 {
    4096
}

fn default_system_prompt() -> String {
    concat!(
        "You are a clinical assistant embedded in a spine imaging viewer. ",
        "Answer questions about radiology findings, spinal anatomy, pathology, and patient imaging clearly and concisely. ",
        "If asked something unrelated to medicine or imaging, politely redirect the conversation back to clinical topics."
    )
    .to_string()
}
