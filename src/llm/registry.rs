// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Provider registry
//!
//! Discovers which backends are usable right now: the local server is probed
//! for pulled models (failures mean "no local models"), cloud backends are
//! listed only when their credential is configured.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Settings;
use crate::error::{ChatError, Result};
use crate::llm::provider::{ProviderDescriptor, ProviderId, StreamProvider};
use crate::llm::providers::{DeepSeekProvider, GeminiProvider, OllamaProvider};

/// Source of locally available model identifiers
#[async_trait]
pub trait ModelProbe: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>>;
}

/// Adapters keyed by provider identity
#[derive(Clone, Default)]
pub struct AdapterSet {
    adapters: HashMap<ProviderId, Arc<dyn StreamProvider>>,
}

impl AdapterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own id, replacing any previous one
    pub fn insert(&mut self, adapter: Arc<dyn StreamProvider>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn StreamProvider>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn StreamProvider>> {
        self.adapters.get(&id).cloned()
    }

    pub fn contains(&self, id: ProviderId) -> bool {
        self.adapters.contains_key(&id)
    }
}

/// Discovers usable backends from settings
pub struct ProviderRegistry {
    settings: Settings,
    probe: Arc<dyn ModelProbe>,
}

impl ProviderRegistry {
    /// Registry that probes the configured local server
    pub fn new(settings: Settings) -> Self {
        let probe = Arc::new(OllamaProvider::from_settings(&settings));
        Self { settings, probe }
    }

    /// Registry with a custom local probe
    pub fn with_probe(settings: Settings, probe: Arc<dyn ModelProbe>) -> Self {
        Self { settings, probe }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the current descriptor list: local, then DeepSeek, then Gemini.
    ///
    /// Never fails; an unreachable local server just contributes nothing.
    pub async fn discover(&self) -> Vec<ProviderDescriptor> {
        let mut descriptors = Vec::new();

        let local_models = match self.probe.list_models().await {
            Ok(models) => models,
            Err(e) => {
                tracing::debug!(error = %e, "local model probe failed; treating as no local models");
                Vec::new()
            }
        };
        if !local_models.is_empty() {
            descriptors.push(ProviderDescriptor::new(ProviderId::Local, local_models));
        }

        if self.settings.get_deepseek_api_key().is_some() {
            let models = self.settings.providers.deepseek.models.clone();
            if !models.is_empty() {
                descriptors.push(ProviderDescriptor::new(ProviderId::DeepSeek, models));
            }
        }

        if self.settings.get_gemini_api_key().is_some() {
            descriptors.push(ProviderDescriptor::new(
                ProviderId::Gemini,
                vec![self.settings.providers.gemini.model.clone()],
            ));
        }

        tracing::debug!(
            providers = ?descriptors.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            "provider discovery complete"
        );
        descriptors
    }

    /// Construct the real adapter for `id`.
    pub fn adapter(&self, id: ProviderId) -> Result<Arc<dyn StreamProvider>> {
        match id {
            ProviderId::Local => Ok(Arc::new(OllamaProvider::from_settings(&self.settings))),
            ProviderId::Gemini => GeminiProvider::from_settings(&self.settings)
                .map(|p| Arc::new(p) as Arc<dyn StreamProvider>)
                .ok_or_else(|| {
                    ChatError::Config(format!(
                        "No Gemini API key found. Set {} or add it to settings.",
                        self.settings.providers.gemini.api_key_env
                    ))
                }),
            ProviderId::DeepSeek => DeepSeekProvider::from_settings(&self.settings)
                .map(|p| Arc::new(p) as Arc<dyn StreamProvider>)
                .ok_or_else(|| {
                    ChatError::Config(format!(
                        "No DeepSeek API key found. Set {} or add it to settings.",
                        self.settings.providers.deepseek.api_key_env
                    ))
                }),
        }
    }

    /// Adapters for every discovered provider
    pub fn adapters_for(&self, descriptors: &[ProviderDescriptor]) -> AdapterSet {
        let mut set = AdapterSet::new();
        for descriptor in descriptors {
            match self.adapter(descriptor.id) {
                Ok(adapter) => set.insert(adapter),
                Err(e) => tracing::warn!(provider = %descriptor.id, error = %e, "adapter unavailable"),
            }
        }
        set
    }
}

/// Pick the model a fresh session starts on.
///
/// First non-empty wins: local models, then DeepSeek's first model, then
/// Gemini's model. Local and open models come before paid APIs.
pub fn default_model(descriptors: &[ProviderDescriptor]) -> Option<(ProviderId, String)> {
    [ProviderId::Local, ProviderId::DeepSeek, ProviderId::Gemini]
        .into_iter()
        .find_map(|id| {
            descriptors
                .iter()
                .find(|d| d.id == id)
                .and_then(|d| d.model_ids.first())
                .map(|model| (id, model.clone()))
        })
}
