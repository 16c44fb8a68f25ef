// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! `data:` URI helpers

use std::path::Path;
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;

use crate::llm::message::Attachment;

/// Mime type assumed when a data URI carries no recognisable image header
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Encode raw bytes as a base64 `data:` URI
pub fn encode(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Whether `src` is a self-contained image payload
pub fn is_image_data_uri(src: &str) -> bool {
    src.starts_with("data:image")
}

/// Image mime type from a `data:image/<subtype>;base64,` header
pub fn mime_type_of(data_uri: &str) -> String {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    let header = HEADER.get_or_init(|| Regex::new(r"^data:(image/\w+);base64,").unwrap());

    header
        .captures(data_uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_IMAGE_MIME.to_string())
}

/// The base64 payload after the first comma, or the whole string if there is none
pub fn payload_of(data_uri: &str) -> &str {
    data_uri
        .split_once(',')
        .map(|(_, payload)| payload)
        .unwrap_or(data_uri)
}

/// Guess an image mime type from a file extension
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

/// The image staged for the next outgoing user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAttachment {
    pub data_uri: String,
    pub mime_type: String,
}

impl StagedAttachment {
    /// Stage a data URI, reading the mime type from its header
    pub fn from_data_uri(data_uri: impl Into<String>) -> Self {
        let data_uri = data_uri.into();
        let mime_type = mime_type_of(&data_uri);
        Self { data_uri, mime_type }
    }

    /// Stage raw image bytes
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            data_uri: encode(mime_type, bytes),
            mime_type: mime_type.to_string(),
        }
    }

    /// The message attachment carrying only the base64 payload
    pub fn to_attachment(&self) -> Attachment {
        Attachment::new(payload_of(&self.data_uri), self.mime_type.clone())
    }
}
