// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock streaming provider for testing
//!
//! Replays scripted token events without touching the network. A script can
//! be gated so the test decides when the events after `Start` are released.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::error::ProviderError;
use crate::llm::provider::{ProviderId, StreamProvider, StreamRequest, TokenEvent, TokenStream};

/// One scripted response
#[derive(Clone, Debug)]
pub struct MockScript {
    /// Events replayed in order
    pub events: Vec<TokenEvent>,
    /// When set, events after the first are held until the gate is notified
    pub gate: Option<Arc<Notify>>,
}

impl MockScript {
    /// `Start`, one `Token` per entry, `End`
    pub fn tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut events = vec![TokenEvent::Start];
        events.extend(tokens.iter().map(|t| TokenEvent::Token(t.as_ref().to_string())));
        events.push(TokenEvent::End);
        Self { events, gate: None }
    }

    /// A single request-level failure
    pub fn http_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            events: vec![TokenEvent::Fail(ProviderError::Http {
                status,
                message: message.into(),
            })],
            gate: None,
        }
    }

    /// `Start`, one `Token` per entry, then a transport failure
    pub fn interrupted<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut events = vec![TokenEvent::Start];
        events.extend(tokens.iter().map(|t| TokenEvent::Token(t.as_ref().to_string())));
        events.push(TokenEvent::Fail(ProviderError::Interrupted {
            provider: "mock".to_string(),
            message: "response body ended early".to_string(),
        }));
        Self { events, gate: None }
    }

    /// Hold everything after the first event until `gate` is notified
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// A mock provider for testing
#[derive(Clone)]
pub struct MockProvider {
    id: ProviderId,
    scripts: Arc<Mutex<VecDeque<MockScript>>>,
    call_count: Arc<AtomicUsize>,
    recorded_requests: Arc<Mutex<Vec<StreamRequest>>>,
}

impl MockProvider {
    /// Create a mock that answers as `id`
    pub fn new(id: ProviderId) -> Self {
        Self {
            id,
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a script (consumed in order, one per `stream` call)
    pub fn with_script(self, script: MockScript) -> Self {
        self.push_script(script);
        self
    }

    pub fn push_script(&self, script: MockScript) {
        lock(&self.scripts).push_back(script);
    }

    /// Number of `stream` calls so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests seen so far, oldest first
    pub fn recorded_requests(&self) -> Vec<StreamRequest> {
        lock(&self.recorded_requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock provider lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl StreamProvider for MockProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn stream(&self, request: StreamRequest) -> TokenStream {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_requests).push(request);

        // An exhausted script queue answers with an empty successful stream.
        let script = lock(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| MockScript::tokens::<&str>(&[]));

        Box::pin(async_stream::stream! {
            let mut events = script.events.into_iter();
            if let Some(first) = events.next() {
                yield first;
            }
            if let Some(gate) = script.gate {
                gate.notified().await;
            }
            for event in events {
                tokio::task::yield_now().await;
                yield event;
            }
        })
    }
}
