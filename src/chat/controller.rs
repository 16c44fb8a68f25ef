// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session controller
//!
//! Owns the conversation, drives the selected adapter and notifies the host
//! after every mutation. Each submit runs its stream on its own tokio task;
//! the controller never waits for an earlier stream. Every submit and every
//! model switch bumps a generation counter, and events from a superseded
//! generation are dropped before they reach the conversation.

use std::sync::{Arc, Mutex, MutexGuard};

use futures::StreamExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::attachment::{
    AttachmentResolver, AttachmentSource, CaptureContext, DropPayload, Resolved, StagedAttachment,
    SurfaceSet,
};
use crate::chat::state::ConversationState;
use crate::config::Settings;
use crate::error::{ChatError, Result};
use crate::llm::provider::{ProviderDescriptor, ProviderId, StreamRequest, TokenEvent};
use crate::llm::registry::{default_model, AdapterSet, ProviderRegistry};

/// The provider/model pair a session talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub provider: ProviderId,
    pub model: String,
}

/// Everything the host needs to render the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub conversation: ConversationState,
    pub selection: Option<ModelSelection>,
    pub attachment_mode: bool,
    pub staged_attachment: Option<StagedAttachment>,
    /// Generation the conversation currently belongs to
    pub generation: u64,
}

/// Receives a snapshot after every state change
pub trait StateListener: Send + Sync {
    fn on_state_change(&self, snapshot: &ChatSnapshot);
}

impl<F> StateListener for F
where
    F: Fn(&ChatSnapshot) + Send + Sync,
{
    fn on_state_change(&self, snapshot: &ChatSnapshot) {
        self(snapshot)
    }
}

/// Why a submit did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Blank after trimming
    EmptyInput,
    /// A response is still streaming
    Busy,
    /// No model selected; the session is now in `Error`
    NoModelSelected,
}

/// Result of [`ChatController::submit`]
#[derive(Debug)]
pub enum SubmitOutcome {
    /// A stream was started; the handle completes when it is drained
    Accepted {
        generation: u64,
        handle: JoinHandle<()>,
    },
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted { .. })
    }

    /// Wait for the stream started by this submit, if any
    pub async fn finished(self) {
        if let SubmitOutcome::Accepted { handle, .. } = self {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "stream task ended abnormally");
            }
        }
    }
}

struct Session {
    conversation: ConversationState,
    generation: u64,
    selection: Option<ModelSelection>,
    providers: Vec<ProviderDescriptor>,
    adapters: AdapterSet,
    attachment_mode: bool,
    /// A viewport-sourced entry is only a preview and is re-resolved at submit
    staged: Option<Resolved>,
}

impl Session {
    fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            conversation: self.conversation.clone(),
            selection: self.selection.clone(),
            attachment_mode: self.attachment_mode,
            staged_attachment: self.staged.as_ref().map(|r| r.attachment.clone()),
            generation: self.generation,
        }
    }
}

struct Inner {
    /// Correlates log lines from one chat session
    id: Uuid,
    session: Mutex<Session>,
    listeners: Mutex<Vec<Arc<dyn StateListener>>>,
    resolver: AttachmentResolver,
    system_prompt: String,
}

/// Chat session controller; clones share one session
#[derive(Clone)]
pub struct ChatController {
    inner: Arc<Inner>,
}

impl ChatController {
    /// Controller over a fixed provider snapshot with no model selected
    pub fn new(
        providers: Vec<ProviderDescriptor>,
        adapters: AdapterSet,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                session: Mutex::new(Session {
                    conversation: ConversationState::new(),
                    generation: 0,
                    selection: None,
                    providers,
                    adapters,
                    attachment_mode: false,
                    staged: None,
                }),
                listeners: Mutex::new(Vec::new()),
                resolver: AttachmentResolver::default(),
                system_prompt: system_prompt.into(),
            }),
        }
    }

    /// Replace the attachment resolver. Only valid before the controller is
    /// cloned or shared.
    pub fn with_resolver(self, resolver: AttachmentResolver) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(inner) => Self {
                inner: Arc::new(Inner { resolver, ..inner }),
            },
            Err(inner) => {
                tracing::warn!("controller already shared; resolver not replaced");
                Self { inner }
            }
        }
    }

    /// Discover providers and start on the default model
    pub async fn from_registry(registry: &ProviderRegistry) -> Self {
        let settings: &Settings = registry.settings();
        let providers = registry.discover().await;
        let adapters = registry.adapters_for(&providers);
        let controller = Self::new(providers.clone(), adapters, settings.chat.system_prompt.clone());

        if let Some((provider, model)) = default_model(&providers) {
            if let Err(e) = controller.select_model(provider, &model) {
                tracing::warn!(error = %e, "default model could not be selected");
            }
        }
        if settings.chat.attach_by_default {
            controller.set_attachment_mode(true);
        }
        controller
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.id
    }

    /// Register a listener for state changes
    pub fn subscribe(&self, listener: impl StateListener + 'static) {
        lock(&self.inner.listeners).push(Arc::new(listener));
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.session().snapshot()
    }

    pub fn conversation(&self) -> ConversationState {
        self.session().conversation.clone()
    }

    pub fn providers(&self) -> Vec<ProviderDescriptor> {
        self.session().providers.clone()
    }

    pub fn selection(&self) -> Option<ModelSelection> {
        self.session().selection.clone()
    }

    /// Drag observer handle; the host feeds drag-start events into it
    pub fn capture_context(&self) -> CaptureContext {
        self.inner.resolver.capture().clone()
    }

    /// Surfaces the viewport snapshot is taken from
    pub fn surfaces(&self) -> SurfaceSet {
        self.inner.resolver.surfaces().clone()
    }

    /// Replace the provider snapshot. A selection that is no longer offered
    /// is dropped; the conversation itself is untouched.
    pub fn set_providers(&self, providers: Vec<ProviderDescriptor>, adapters: AdapterSet) {
        let snapshot = {
            let mut session = self.session();
            let still_offered = session.selection.as_ref().is_some_and(|sel| {
                providers
                    .iter()
                    .any(|d| d.id == sel.provider && d.has_model(&sel.model))
                    && adapters.contains(sel.provider)
            });
            if !still_offered {
                session.selection = None;
            }
            session.providers = providers;
            session.adapters = adapters;
            session.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Re-run discovery against `registry`
    pub async fn refresh_providers(&self, registry: &ProviderRegistry) {
        let providers = registry.discover().await;
        let adapters = registry.adapters_for(&providers);
        self.set_providers(providers, adapters);
    }

    /// Switch provider/model. Always yields an empty, idle conversation and
    /// drops any staged attachment; an in-flight stream keeps running but its
    /// events are discarded.
    pub fn select_model(&self, provider: ProviderId, model: &str) -> Result<()> {
        let snapshot = {
            let mut session = self.session();
            let offered = session
                .providers
                .iter()
                .any(|d| d.id == provider && d.has_model(model));
            if !offered || !session.adapters.contains(provider) {
                return Err(ChatError::Config(format!(
                    "Unknown model {model} for provider {provider}"
                )));
            }

            session.generation += 1;
            session.conversation.reset();
            session.staged = None;
            session.selection = Some(ModelSelection {
                provider,
                model: model.to_string(),
            });
            tracing::debug!(
                session = %self.inner.id,
                %provider,
                model,
                generation = session.generation,
                "model selected"
            );
            session.snapshot()
        };
        self.notify(&snapshot);
        Ok(())
    }

    /// Turn attachment mode on or off. Turning it on stages a viewport
    /// snapshot as a preview when nothing is staged yet; turning it off
    /// drops whatever was staged.
    pub fn set_attachment_mode(&self, enabled: bool) {
        let snapshot = {
            let mut session = self.session();
            session.attachment_mode = enabled;
            if !enabled {
                session.staged = None;
            } else if session.staged.is_none() {
                session.staged = self.inner.resolver.snapshot();
            }
            session.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Drop the staged image and leave attachment mode
    pub fn remove_staged_attachment(&self) {
        let snapshot = {
            let mut session = self.session();
            session.staged = None;
            session.attachment_mode = false;
            session.snapshot()
        };
        self.notify(&snapshot);
    }

    /// Handle a drop gesture over the chat. A resolved image is staged and
    /// attachment mode switched on.
    pub fn handle_drop(&self, payload: &DropPayload) -> Option<AttachmentSource> {
        let resolved = self.inner.resolver.resolve_drop(Some(payload))?;
        let source = resolved.source;
        tracing::debug!(%source, "drop staged an attachment");

        let snapshot = {
            let mut session = self.session();
            session.staged = Some(resolved);
            session.attachment_mode = true;
            session.snapshot()
        };
        self.notify(&snapshot);
        Some(source)
    }

    /// Send `text` as the next user turn.
    ///
    /// Must be called from within a tokio runtime; the response is consumed
    /// on a spawned task and this call returns immediately.
    pub fn submit(&self, text: &str) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let (adapter, request, generation, snapshot) = {
            let mut session = self.session();
            if session.conversation.is_streaming() {
                tracing::debug!("submit ignored while streaming");
                return SubmitOutcome::Ignored(IgnoreReason::Busy);
            }

            let Some(selection) = session.selection.clone() else {
                session.conversation.fail("No model selected");
                let snapshot = session.snapshot();
                drop(session);
                self.notify(&snapshot);
                return SubmitOutcome::Ignored(IgnoreReason::NoModelSelected);
            };

            let Some(adapter) = session.adapters.get(selection.provider) else {
                session
                    .conversation
                    .fail(format!("No adapter configured for {}", selection.provider));
                let snapshot = session.snapshot();
                drop(session);
                self.notify(&snapshot);
                return SubmitOutcome::Ignored(IgnoreReason::NoModelSelected);
            };

            let attachment = if session.attachment_mode && selection.provider.supports_images() {
                // A toggle-time preview yields to a drag captured since, and
                // is otherwise replaced by a fresh snapshot.
                session
                    .staged
                    .take()
                    .filter(|r| r.source != AttachmentSource::Viewport)
                    .or_else(|| self.inner.resolver.resolve(None))
                    .map(|r| r.attachment.to_attachment())
            } else {
                None
            };

            session.conversation.begin_turn(text, attachment.clone());
            session.generation += 1;

            let request = StreamRequest::new(selection.model, session.conversation.messages.clone())
                .with_system(self.inner.system_prompt.clone())
                .with_attachment(attachment);
            (adapter, request, session.generation, session.snapshot())
        };
        self.notify(&snapshot);

        tracing::debug!(
            session = %self.inner.id,
            provider = %adapter.id(),
            model = %request.model,
            generation,
            image = request.attachment.is_some(),
            "submitting"
        );

        let mut stream = adapter.stream(request);
        let controller = self.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                controller.apply_event(generation, event);
            }
            controller.settle(generation);
        });

        SubmitOutcome::Accepted { generation, handle }
    }

    /// Apply one event from the stream started at `generation`. Returns
    /// `false` when the event was stale and discarded.
    pub fn apply_event(&self, generation: u64, event: TokenEvent) -> bool {
        let snapshot = {
            let mut session = self.session();
            if session.generation != generation {
                tracing::debug!(
                    stale = generation,
                    current = session.generation,
                    "discarding event from superseded stream"
                );
                return false;
            }
            if let TokenEvent::Fail(ref error) = event {
                tracing::debug!(%error, "stream failed");
            }
            session.conversation.apply(event);
            session.snapshot()
        };
        self.notify(&snapshot);
        true
    }

    /// A stream that ended without `End` or `Fail` still leaves `Streaming`
    fn settle(&self, generation: u64) {
        let needs_close = {
            let session = self.session();
            session.generation == generation && session.conversation.is_streaming()
        };
        if needs_close {
            tracing::debug!(generation, "stream ended without a terminal event");
            self.apply_event(generation, TokenEvent::End);
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.inner.session)
    }

    fn notify(&self, snapshot: &ChatSnapshot) {
        let listeners = lock(&self.inner.listeners).clone();
        for listener in listeners {
            listener.on_state_change(snapshot);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Chat session lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
