// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Protocol adapters, one per backend

pub(crate) mod common;
pub mod deepseek;
pub mod gemini;
pub mod ollama;

pub use deepseek::DeepSeekProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
