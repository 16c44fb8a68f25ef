// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Rendering surfaces supplied by the host
//!
//! The host registers whatever it is currently drawing (viewports, canvases);
//! the resolver snapshots the largest one when nothing else is available.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::Result;

/// JPEG quality used for viewport snapshots
pub const SNAPSHOT_JPEG_QUALITY: u8 = 85;

/// Something the host renders that can be captured as a still image
pub trait RenderSurface: Send + Sync {
    /// Human-readable label for logs
    fn label(&self) -> &str;

    /// Current pixel size as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Capture the current contents
    fn capture(&self) -> Result<DynamicImage>;

    fn area(&self) -> u64 {
        let (w, h) = self.dimensions();
        u64::from(w) * u64::from(h)
    }
}

/// A surface backed by a fixed image, e.g. a viewport exported to disk
#[derive(Debug, Clone)]
pub struct ImageSurface {
    label: String,
    image: DynamicImage,
}

impl ImageSurface {
    pub fn new(label: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            label: label.into(),
            image,
        }
    }

    /// Load a surface from an image file
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)?;
        Ok(Self::new(path.display().to_string(), image))
    }
}

impl RenderSurface for ImageSurface {
    fn label(&self) -> &str {
        &self.label
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    fn capture(&self) -> Result<DynamicImage> {
        Ok(self.image.clone())
    }
}

/// The set of surfaces currently active in the host
#[derive(Clone, Default)]
pub struct SurfaceSet {
    surfaces: Arc<Mutex<Vec<Arc<dyn RenderSurface>>>>,
}

impl SurfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, surface: Arc<dyn RenderSurface>) {
        self.lock().push(surface);
    }

    /// Remove every surface with the given label
    pub fn remove(&self, label: &str) {
        self.lock().retain(|s| s.label() != label);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Largest surface by pixel area; zero-area surfaces never qualify and
    /// the earliest registered wins a tie.
    pub fn largest(&self) -> Option<Arc<dyn RenderSurface>> {
        self.lock()
            .iter()
            .filter(|s| s.area() > 0)
            .fold(None::<&Arc<dyn RenderSurface>>, |best, s| match best {
                Some(b) if b.area() >= s.area() => Some(b),
                _ => Some(s),
            })
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn RenderSurface>>> {
        match self.surfaces.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Surface set lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Encode an image as JPEG. Alpha is dropped since JPEG has none.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
        encoder.encode_image(&rgb)?;
    }
    Ok(bytes.into_inner())
}
