// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Attachment resolution
//!
//! Picks the one image that accompanies the next user message. Sources are
//! tried in a fixed order and the first hit wins:
//!
//! 1. an image file in the current drop
//! 2. the first `<img>` in dropped markup, if its source is a data URI
//! 3. the last drag-started image captured by [`CaptureContext`]
//! 4. a JPEG snapshot of the largest active [`RenderSurface`]
//!
//! [`RenderSurface`]: super::surface::RenderSurface

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::capture::CaptureContext;
use super::data_uri::{is_image_data_uri, mime_type_for_path, StagedAttachment};
use super::surface::{encode_jpeg, SurfaceSet, SNAPSHOT_JPEG_QUALITY};
use crate::error::Result;

/// A file handed over by a drop gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, typing it by extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = mime_type_for_path(path).unwrap_or("application/octet-stream");
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Everything delivered by one drop gesture
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropPayload {
    pub files: Vec<DroppedFile>,
    /// The `text/html` flavour of the drop, if any
    pub html: Option<String>,
}

impl DropPayload {
    pub fn with_file(mut self, file: DroppedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }
}

/// Where a resolved attachment came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentSource {
    DroppedFile,
    DroppedMarkup,
    CapturedDrag,
    Viewport,
}

impl fmt::Display for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachmentSource::DroppedFile => "dropped file",
            AttachmentSource::DroppedMarkup => "dropped markup",
            AttachmentSource::CapturedDrag => "captured drag",
            AttachmentSource::Viewport => "viewport snapshot",
        };
        f.write_str(name)
    }
}

/// A staged attachment together with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub source: AttachmentSource,
    pub attachment: StagedAttachment,
}

/// Resolves the attachment for the next submit
#[derive(Clone, Default)]
pub struct AttachmentResolver {
    capture: CaptureContext,
    surfaces: SurfaceSet,
}

impl AttachmentResolver {
    pub fn new(capture: CaptureContext, surfaces: SurfaceSet) -> Self {
        Self { capture, surfaces }
    }

    pub fn capture(&self) -> &CaptureContext {
        &self.capture
    }

    pub fn surfaces(&self) -> &SurfaceSet {
        &self.surfaces
    }

    /// Run the full priority chain
    pub fn resolve(&self, drop: Option<&DropPayload>) -> Option<Resolved> {
        let resolved = self.resolve_drop(drop).or_else(|| self.snapshot());
        match &resolved {
            Some(r) => tracing::debug!(source = %r.source, mime = %r.attachment.mime_type, "attachment resolved"),
            None => tracing::debug!("no attachment available"),
        }
        resolved
    }

    /// Steps 1-3 only: what a drop gesture itself can stage
    pub fn resolve_drop(&self, drop: Option<&DropPayload>) -> Option<Resolved> {
        if let Some(drop) = drop {
            if let Some(file) = drop.files.iter().find(|f| f.is_image()) {
                return Some(Resolved {
                    source: AttachmentSource::DroppedFile,
                    attachment: StagedAttachment::from_bytes(&file.mime_type, &file.bytes),
                });
            }

            if let Some(src) = drop.html.as_deref().and_then(first_img_src) {
                if is_image_data_uri(src) {
                    return Some(Resolved {
                        source: AttachmentSource::DroppedMarkup,
                        attachment: StagedAttachment::from_data_uri(src),
                    });
                }
            }
        }

        self.capture.take().map(|uri| Resolved {
            source: AttachmentSource::CapturedDrag,
            attachment: StagedAttachment::from_data_uri(uri),
        })
    }

    /// Step 4: JPEG snapshot of the largest surface. Capture or encode
    /// failures are logged and yield nothing.
    pub fn snapshot(&self) -> Option<Resolved> {
        let surface = self.surfaces.largest()?;
        match capture_jpeg(surface.as_ref()) {
            Ok(bytes) => Some(Resolved {
                source: AttachmentSource::Viewport,
                attachment: StagedAttachment::from_bytes("image/jpeg", &bytes),
            }),
            Err(e) => {
                tracing::warn!(surface = surface.label(), error = %e, "viewport snapshot failed");
                None
            }
        }
    }
}

fn capture_jpeg(surface: &dyn super::surface::RenderSurface) -> Result<Vec<u8>> {
    let image = surface.capture()?;
    encode_jpeg(&image, SNAPSHOT_JPEG_QUALITY)
}

/// `src` of the first `<img>` element in a markup fragment
fn first_img_src(html: &str) -> Option<&str> {
    static IMG_SRC: OnceLock<Regex> = OnceLock::new();
    let img = IMG_SRC.get_or_init(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
    });

    let caps = img.captures(html)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::surface::ImageSurface;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::Arc;

    const PNG_URI: &str = "data:image/png;base64,iVBORw0KGgo=";
    const THUMB_URI: &str = "data:image/jpeg;base64,/9j/4AAQ";

    fn resolver_with_viewport() -> AttachmentResolver {
        let resolver = AttachmentResolver::default();
        resolver.surfaces().add(Arc::new(ImageSurface::new(
            "viewport",
            DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]))),
        )));
        resolver
    }

    fn image_file() -> DroppedFile {
        DroppedFile::new("slice.png", "image/png", b"ABC".to_vec())
    }

    #[test]
    fn test_file_drop_beats_captured_drag() {
        let resolver = resolver_with_viewport();
        resolver.capture().record_drag_start(Some(THUMB_URI));

        let drop = DropPayload::default().with_file(image_file());
        let resolved = resolver.resolve(Some(&drop)).unwrap();

        assert_eq!(resolved.source, AttachmentSource::DroppedFile);
        assert_eq!(resolved.attachment.data_uri, "data:image/png;base64,QUJD");
        // The captured drag is only consumed by step 3
        assert_eq!(resolver.capture().peek().as_deref(), Some(THUMB_URI));
    }

    #[test]
    fn test_non_image_files_are_skipped() {
        let resolver = AttachmentResolver::default();
        let drop = DropPayload::default()
            .with_file(DroppedFile::new("notes.txt", "text/plain", b"hi".to_vec()))
            .with_html(format!(r#"<div><img alt="t" src="{PNG_URI}"></div>"#));

        let resolved = resolver.resolve(Some(&drop)).unwrap();
        assert_eq!(resolved.source, AttachmentSource::DroppedMarkup);
        assert_eq!(resolved.attachment.mime_type, "image/png");
    }

    #[test]
    fn test_markup_with_remote_image_falls_through_to_capture() {
        let resolver = AttachmentResolver::default();
        resolver.capture().record_drag_start(Some(THUMB_URI));
        let drop = DropPayload::default()
            .with_html(format!(r#"<img src="https://pacs/1.png"><img src="{PNG_URI}">"#));

        let resolved = resolver.resolve(Some(&drop)).unwrap();
        assert_eq!(resolved.source, AttachmentSource::CapturedDrag);
        assert_eq!(resolved.attachment.data_uri, THUMB_URI);
        assert!(resolver.capture().peek().is_none());
    }

    #[test]
    fn test_capture_consumed_once() {
        let resolver = AttachmentResolver::default();
        resolver.capture().record_drag_start(Some(THUMB_URI));

        assert!(resolver.resolve(None).is_some());
        assert!(resolver.resolve(None).is_none());
    }

    #[test]
    fn test_viewport_snapshot_is_last_resort() {
        let resolver = resolver_with_viewport();
        let resolved = resolver.resolve(None).unwrap();

        assert_eq!(resolved.source, AttachmentSource::Viewport);
        assert_eq!(resolved.attachment.mime_type, "image/jpeg");
        assert!(resolved.attachment.data_uri.starts_with("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn test_resolve_drop_never_snapshots() {
        let resolver = resolver_with_viewport();
        assert!(resolver.resolve_drop(Some(&DropPayload::default())).is_none());
    }

    #[test]
    fn test_nothing_available() {
        assert!(AttachmentResolver::default().resolve(None).is_none());
    }

    #[test]
    fn test_first_img_src_quoting() {
        assert_eq!(first_img_src(r#"<IMG class="x" SRC='a.png'>"#), Some("a.png"));
        assert_eq!(first_img_src(r#"<img src=b.png alt=x>"#), Some("b.png"));
        assert_eq!(first_img_src("<p>no image</p>"), None);
        assert_eq!(first_img_src(r#"<imgx src="c.png">"#), None);
    }

    #[test]
    fn test_dropped_file_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("axial.jpg");
        std::fs::write(&path, b"jpeg-bytes").unwrap();

        let file = DroppedFile::from_path(&path).unwrap();
        assert_eq!(file.name, "axial.jpg");
        assert_eq!(file.mime_type, "image/jpeg");
        assert!(file.is_image());

        let other = dir.path().join("report.pdf");
        std::fs::write(&other, b"%PDF").unwrap();
        assert!(!DroppedFile::from_path(&other).unwrap().is_image());
    }
}
