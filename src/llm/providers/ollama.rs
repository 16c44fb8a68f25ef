// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Ollama local model provider implementation
//!
//! Streams from `/api/chat` as newline-delimited JSON and enumerates pulled
//! models through `/api/tags`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ProviderError, Result};
use crate::llm::framing::Framing;
use crate::llm::message::last_user_turn;
use crate::llm::provider::{ProviderId, StreamProvider, StreamRequest, TokenStream};
use crate::llm::providers::common::{drive, parse_error_message};
use crate::llm::registry::ModelProbe;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const TOKEN_PATH: &str = "/message/content";

/// Ollama local model provider
#[derive(Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    num_predict: i64,
    num_ctx: u32,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default base URL (http://localhost:11434)
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_OLLAMA_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            num_predict: 2048,
            num_ctx: 4096,
        }
    }

    /// Create from the `providers.local` settings section
    pub fn from_settings(settings: &Settings) -> Self {
        let local = &settings.providers.local;
        Self {
            num_predict: local.num_predict,
            num_ctx: local.num_ctx,
            ..Self::with_base_url(settings.get_local_base_url())
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List models pulled into the local server
    pub async fn list_local_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: parse_error_message(status.as_u16(), &body),
            }
            .into());
        }

        let body: OllamaTagsResponse = response.json().await?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    /// Build the request body; the system prompt leads as a `system` message
    /// and the attachment rides on the last user turn as `images`.
    fn build_request(&self, request: &StreamRequest) -> OllamaRequest {
        let image_turn = request
            .attachment
            .as_ref()
            .and_then(|_| last_user_turn(&request.messages));

        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: request.system_prompt.clone(),
                images: None,
            });
        }

        for (idx, message) in request.messages.iter().enumerate() {
            let images = match (&request.attachment, image_turn) {
                (Some(attachment), Some(turn)) if turn == idx => Some(vec![attachment.data.clone()]),
                _ => None,
            };
            messages.push(OllamaMessage {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
                images,
            });
        }

        OllamaRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            options: OllamaOptions {
                num_predict: self.num_predict,
                num_ctx: self.num_ctx,
            },
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamProvider for OllamaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Local
    }

    fn stream(&self, request: StreamRequest) -> TokenStream {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(&request);
        tracing::debug!(model = %body.model, turns = body.messages.len(), "dispatching ollama chat");

        let builder = self.client.post(url).json(&body);
        drive(ProviderId::Local, builder, Framing::NewlineDelimited, TOKEN_PATH)
    }
}

#[async_trait]
impl ModelProbe for OllamaProvider {
    async fn list_models(&self) -> Result<Vec<String>> {
        self.list_local_models().await
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: i64,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChatError;
    use crate::llm::message::{Attachment, Message};
    use crate::llm::provider::TokenEvent;
    use futures::StreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with_image() -> StreamRequest {
        StreamRequest::new(
            "llava",
            vec![
                Message::user("first"),
                Message::assistant("ok"),
                Message::user("Describe the scan"),
            ],
        )
        .with_system("be clinical")
        .with_attachment(Some(Attachment::new("QUJD", "image/jpeg")))
    }

    #[test]
    fn test_provider_new() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.base_url(), DEFAULT_OLLAMA_URL);
        assert_eq!(provider.id(), ProviderId::Local);
    }

    #[test]
    fn test_with_base_url_trims_slash() {
        let provider = OllamaProvider::with_base_url("http://scanner:11434/");
        assert_eq!(provider.base_url(), "http://scanner:11434");
    }

    #[test]
    fn test_build_request_shape() {
        let provider = OllamaProvider::new();
        let built = provider.build_request(&request_with_image());
        let json = serde_json::to_value(&built).unwrap();

        assert_eq!(json["model"], "llava");
        assert_eq!(json["stream"], true);
        assert_eq!(json["options"]["num_predict"], 2048);
        assert_eq!(json["options"]["num_ctx"], 4096);

        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be clinical");
        assert_eq!(messages[2]["role"], "assistant");
        assert!(messages[1].get("images").is_none());
        assert_eq!(messages[3]["images"], serde_json::json!(["QUJD"]));
    }

    #[test]
    fn test_build_request_without_attachment_has_no_images() {
        let provider = OllamaProvider::new();
        let request = request_with_image().with_attachment(None);
        let json = serde_json::to_value(provider.build_request(&request)).unwrap();

        for message in json["messages"].as_array().unwrap() {
            assert!(message.get("images").is_none());
        }
    }

    #[test]
    fn test_build_request_attachment_ignored_when_last_turn_is_assistant() {
        let provider = OllamaProvider::new();
        let request = StreamRequest::new("llava", vec![Message::user("a"), Message::assistant("b")])
            .with_attachment(Some(Attachment::new("QUJD", "image/png")));
        let json = serde_json::to_value(provider.build_request(&request)).unwrap();

        for message in json["messages"].as_array().unwrap() {
            assert!(message.get("images").is_none());
        }
    }

    #[test]
    fn test_build_request_empty_system_prompt_omitted() {
        let provider = OllamaProvider::new();
        let request = StreamRequest::new("llava", vec![Message::user("a")]);
        let built = provider.build_request(&request);
        assert_eq!(built.messages.len(), 1);
        assert_eq!(built.messages[0].role, "user");
    }

    #[tokio::test]
    async fn test_list_local_models() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llava:latest"}, {"name": "llama3"}]
            })))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let models = provider.list_local_models().await.unwrap();
        assert_eq!(models, vec!["llava:latest", "llama3"]);
    }

    #[tokio::test]
    async fn test_list_local_models_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let err = provider.list_local_models().await.unwrap_err();
        assert!(matches!(
            err,
            ChatError::Provider(ProviderError::Http { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_ndjson_tokens() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"The \"},\"done\":false}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"disc\"},\"done\":false}\n",
            "\n",
            "{garbage}\n",
            "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(serde_json::json!({"model": "llava", "stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let events: Vec<TokenEvent> = provider.stream(request_with_image()).collect().await;

        assert_eq!(
            events,
            vec![
                TokenEvent::Start,
                TokenEvent::Token("The ".to_string()),
                TokenEvent::Token("disc".to_string()),
                TokenEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_error_body_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error": "model 'llava' not found"}"#),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::with_base_url(server.uri());
        let events: Vec<TokenEvent> = provider.stream(request_with_image()).collect().await;

        assert_eq!(
            events,
            vec![TokenEvent::Fail(ProviderError::Http {
                status: 404,
                message: "model 'llava' not found".to_string(),
            })]
        );
    }

    /// Serve one request whose response promises more body than it sends.
    async fn serve_truncated(body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let head = "HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\nContent-Length: 10000\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_stream_truncated_body_fails_after_partial_tokens() {
        let base = serve_truncated("{\"message\":{\"content\":\"partial\"},\"done\":false}\n").await;
        let provider = OllamaProvider::with_base_url(base);
        let events: Vec<TokenEvent> = provider.stream(request_with_image()).collect().await;

        assert_eq!(events.len(), 3, "{events:?}");
        assert_eq!(events[0], TokenEvent::Start);
        assert_eq!(events[1], TokenEvent::Token("partial".to_string()));
        assert!(matches!(
            &events[2],
            TokenEvent::Fail(ProviderError::Interrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_unreachable() {
        // Port 9 (discard) on localhost is never an Ollama server.
        let provider = OllamaProvider::with_base_url("http://127.0.0.1:9");
        let events: Vec<TokenEvent> = provider.stream(request_with_image()).collect().await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TokenEvent::Fail(ProviderError::Unreachable { .. })
        ));
    }
}
