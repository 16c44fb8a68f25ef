// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request/response plumbing shared by every adapter
//!
//! Adapters only decide the request body, the framing discipline and the JSON
//! path of the token text; [`drive`] owns the connect, status check, frame
//! loop and phase bookkeeping.

use futures::StreamExt;
use reqwest::RequestBuilder;

use crate::error::ProviderError;
use crate::llm::framing::{extract_token, Frame, FrameDecoder, Framing};
use crate::llm::provider::{ProviderId, StreamPhase, TokenEvent, TokenStream};

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": "..."}` (Ollama) and `{"error": {"message": "..."}}`
/// (Gemini, DeepSeek); anything else becomes `HTTP <status>`.
pub(crate) fn parse_error_message(status: u16, body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .as_str()
                .or_else(|| error.get("message").and_then(|m| m.as_str()))
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty());

    parsed.unwrap_or_else(|| format!("HTTP {status}"))
}

/// Short, generic description of a transport failure.
pub(crate) fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_body() || err.is_decode() {
        "response body ended early".to_string()
    } else {
        "request failed".to_string()
    }
}

/// Transport error text for logs. Request URLs can carry a credential
/// (Gemini's `key=`), so the URL is dropped.
pub(crate) fn redact(err: reqwest::Error) -> String {
    err.without_url().to_string()
}

fn advance(phase: &mut StreamPhase, next: StreamPhase, provider: ProviderId) {
    debug_assert!(
        phase.can_transition_to(next),
        "illegal stream transition {phase:?} -> {next:?}"
    );
    let from = *phase;
    tracing::trace!(%provider, ?from, to = ?next, "stream phase");
    *phase = next;
}

/// Send `request` and decode its body with `framing`, reading token text at
/// the JSON pointer `token_path` of every frame.
pub(crate) fn drive(
    provider: ProviderId,
    request: RequestBuilder,
    framing: Framing,
    token_path: &'static str,
) -> TokenStream {
    Box::pin(async_stream::stream! {
        let mut phase = StreamPhase::Connecting;

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = describe_transport_error(&e);
                tracing::debug!(%provider, error = %redact(e), "request failed before response");
                advance(&mut phase, StreamPhase::Failed, provider);
                yield TokenEvent::Fail(ProviderError::Unreachable {
                    provider: provider.display_name().to_string(),
                    message,
                });
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = parse_error_message(status.as_u16(), &body);
            tracing::debug!(%provider, status = status.as_u16(), %message, "provider rejected request");
            advance(&mut phase, StreamPhase::Failed, provider);
            yield TokenEvent::Fail(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
            return;
        }

        advance(&mut phase, StreamPhase::Open, provider);
        yield TokenEvent::Start;
        advance(&mut phase, StreamPhase::Draining, provider);

        let mut decoder = FrameDecoder::new(framing);
        let mut body = response.bytes_stream();

        'read: while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let message = describe_transport_error(&e);
                    tracing::warn!(%provider, error = %redact(e), "response body interrupted");
                    advance(&mut phase, StreamPhase::Failed, provider);
                    yield TokenEvent::Fail(ProviderError::Interrupted {
                        provider: provider.display_name().to_string(),
                        message,
                    });
                    return;
                }
            };
            for frame in decoder.push(&bytes) {
                match frame {
                    Frame::Payload(payload) => {
                        if let Some(token) = extract_token(&payload, token_path) {
                            yield TokenEvent::Token(token);
                        }
                    }
                    Frame::EndOfStream => break 'read,
                }
            }
        }

        for frame in decoder.finish() {
            if let Frame::Payload(payload) = frame {
                if let Some(token) = extract_token(&payload, token_path) {
                    yield TokenEvent::Token(token);
                }
            }
        }

        advance(&mut phase, StreamPhase::Closed, provider);
        yield TokenEvent::End;
    })
}
