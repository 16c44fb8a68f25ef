// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! DeepSeek API provider implementation
//!
//! OpenAI-compatible `/chat/completions` with SSE streaming. DeepSeek takes
//! no images, so any attachment on the request is ignored.

use reqwest::Client;
use serde::Serialize;

use crate::config::Settings;
use crate::llm::framing::Framing;
use crate::llm::provider::{ProviderId, StreamProvider, StreamRequest, TokenStream};
use crate::llm::providers::common::drive;

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com";
const TOKEN_PATH: &str = "/choices/0/delta/content";

/// DeepSeek streaming provider
#[derive(Clone)]
pub struct DeepSeekProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
}

impl DeepSeekProvider {
    /// Create a new DeepSeek provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEEPSEEK_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_tokens: 4096,
        }
    }

    /// Create from settings; `None` when no key is configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let api_key = settings.get_deepseek_api_key()?;
        let deepseek = &settings.providers.deepseek;
        Some(Self {
            max_tokens: deepseek.max_tokens,
            ..Self::with_base_url(api_key, &deepseek.base_url)
        })
    }

    fn build_request(&self, request: &StreamRequest) -> DeepSeekRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(DeepSeekMessage {
                role: "system",
                content: request.system_prompt.clone(),
            });
        }
        messages.extend(request.messages.iter().map(|m| DeepSeekMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        }));

        DeepSeekRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            max_tokens: self.max_tokens,
        }
    }
}

impl StreamProvider for DeepSeekProvider {
    fn id(&self) -> ProviderId {
        ProviderId::DeepSeek
    }

    fn stream(&self, request: StreamRequest) -> TokenStream {
        if request.attachment.is_some() {
            tracing::debug!("deepseek does not accept images; attachment dropped");
        }
        let body = self.build_request(&request);
        tracing::debug!(model = %body.model, turns = body.messages.len(), "dispatching deepseek stream");

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);
        drive(ProviderId::DeepSeek, builder, Framing::EventStream, TOKEN_PATH)
    }
}

// DeepSeek API types (OpenAI-compatible format)

#[derive(Debug, Serialize)]
struct DeepSeekRequest {
    model: String,
    messages: Vec<DeepSeekMessage>,
    stream: bool,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct DeepSeekMessage {
    role: &'static str,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llm::message::{Attachment, Message};
    use crate::llm::provider::TokenEvent;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"id": "c1", "choices": [{"index": 0, "delta": {"content": text}}]})
        )
    }

    #[test]
    fn test_build_request_shape() {
        let provider = DeepSeekProvider::new("sk");
        let request = StreamRequest::new(
            "deepseek-v3",
            vec![Message::user("hi"), Message::assistant("hello"), Message::user("and?")],
        )
        .with_system("be clinical")
        .with_attachment(Some(Attachment::new("QUJD", "image/png")));

        let json = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(json["model"], "deepseek-v3");
        assert_eq!(json["stream"], true);
        assert_eq!(json["max_tokens"], 4096);

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], serde_json::json!({"role": "system", "content": "be clinical"}));
        assert_eq!(messages[2]["role"], "assistant");
        assert!(!json.to_string().contains("QUJD"));
    }

    #[tokio::test]
    async fn test_stream_sse_tokens() {
        let server = MockServer::start().await;
        let body = format!(
            "{}: keep-alive\n\n{}{}data: [DONE]\n\n",
            delta("Mild"),
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            delta(" stenosis"),
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"stream": true, "model": "deepseek-v3"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = DeepSeekProvider::with_base_url("sk-test", server.uri());
        let request = StreamRequest::new("deepseek-v3", vec![Message::user("summarise")]);
        let events: Vec<TokenEvent> = provider.stream(request).collect().await;

        assert_eq!(
            events,
            vec![
                TokenEvent::Start,
                TokenEvent::Token("Mild".to_string()),
                TokenEvent::Token(" stenosis".to_string()),
                TokenEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_ends_at_body_end_without_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string(delta("only")))
            .mount(&server)
            .await;

        let provider = DeepSeekProvider::with_base_url("sk", server.uri());
        let request = StreamRequest::new("deepseek-v3", vec![Message::user("x")]);
        let events: Vec<TokenEvent> = provider.stream(request).collect().await;

        assert_eq!(events.last(), Some(&TokenEvent::End));
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_stream_error_with_unparseable_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let provider = DeepSeekProvider::with_base_url("sk", server.uri());
        let request = StreamRequest::new("deepseek-v3", vec![Message::user("x")]);
        let events: Vec<TokenEvent> = provider.stream(request).collect().await;

        assert_eq!(
            events,
            vec![TokenEvent::Fail(ProviderError::Http {
                status: 401,
                message: "HTTP 401".to_string(),
            })]
        );
    }
}
