// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for viewer-chat
//!
//! Request-level provider failures live in [`ProviderError`] so they can travel
//! inside a token stream; everything else is a [`ChatError`].

use thiserror::Error;

/// Main error type for viewer-chat operations
#[derive(Error, Debug)]
pub enum ChatError {
    /// Provider request failures
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Configuration errors (unknown provider/model, no model selected)
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Image decoding/encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Fatal, request-level failures reported by a protocol adapter.
///
/// Frame-level decode problems never become a `ProviderError`; they are
/// skipped inside the adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network failure before any response arrived
    #[error("Could not reach {provider}: {message}")]
    Unreachable { provider: String, message: String },

    /// Transport failure while the body was being read
    #[error("Connection to {provider} lost: {message}")]
    Interrupted { provider: String, message: String },

    /// Non-success HTTP status
    #[error("{message}")]
    Http { status: u16, message: String },
}

impl ProviderError {
    /// HTTP status, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Http { status, .. } => Some(*status),
            ProviderError::Unreachable { .. } | ProviderError::Interrupted { .. } => None,
        }
    }
}

/// Result type alias for viewer-chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ChatError::Config("no model selected".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("no model selected"));
    }

    #[test]
    fn test_http_provider_error_displays_message_only() {
        let err = ProviderError::Http {
            status: 401,
            message: "API key not valid".to_string(),
        };
        assert_eq!(err.to_string(), "API key not valid");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_unreachable_error() {
        let err = ProviderError::Unreachable {
            provider: "ollama".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("ollama"));
        assert!(err.status().is_none());
    }

    #[test]
    fn test_provider_error_converts() {
        let err: ChatError = ProviderError::Http {
            status: 500,
            message: "HTTP 500".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::Provider(_)));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ChatError = io.into();
        assert!(err.to_string().contains("IO error"));
    }
}
