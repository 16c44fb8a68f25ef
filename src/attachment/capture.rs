// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Passive drag capture
//!
//! The host reports every drag that starts over an image element; the most
//! recent self-contained image payload is remembered until a drop or submit
//! consumes it. One context lives per chat session, so nothing leaks between
//! sessions.

use std::sync::{Arc, Mutex, MutexGuard};

use super::data_uri::is_image_data_uri;

/// Last-dragged-image slot shared between the drag observer and the resolver
#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    slot: Arc<Mutex<Option<String>>>,
}

impl CaptureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a drag start. Anything that is not an image data URI clears
    /// the slot, so a later drag of a remote image cannot resurrect an
    /// older one.
    pub fn record_drag_start(&self, src: Option<&str>) {
        let captured = src.filter(|s| is_image_data_uri(s)).map(str::to_string);
        tracing::trace!(captured = captured.is_some(), "drag start observed");
        *self.lock() = captured;
    }

    /// Take the captured payload, leaving the slot empty
    pub fn take(&self) -> Option<String> {
        self.lock().take()
    }

    pub fn peek(&self) -> Option<String> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Capture slot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
