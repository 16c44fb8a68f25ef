// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Image attachments
//!
//! Capture context, drop payloads, host render surfaces and the resolver
//! that decides which image rides along with the next message.

pub mod capture;
pub mod data_uri;
pub mod resolver;
pub mod surface;

pub use capture::CaptureContext;
pub use data_uri::StagedAttachment;
pub use resolver::{AttachmentResolver, AttachmentSource, DropPayload, DroppedFile, Resolved};
pub use surface::{ImageSurface, RenderSurface, SurfaceSet};
