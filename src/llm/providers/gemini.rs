// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Google Gemini provider implementation
//!
//! Uses `:streamGenerateContent?alt=sse`. Gemini names the assistant role
//! `model` and carries images as `inline_data` parts.

use reqwest::Client;
use serde::Serialize;

use crate::config::Settings;
use crate::llm::framing::Framing;
use crate::llm::message::{last_user_turn, Role};
use crate::llm::provider::{ProviderId, StreamProvider, StreamRequest, TokenStream};
use crate::llm::providers::common::drive;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TOKEN_PATH: &str = "/candidates/0/content/parts/0/text";

/// Gemini streaming provider
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    max_output_tokens: u32,
}

impl GeminiProvider {
    /// Create a new Gemini provider
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GEMINI_API_URL)
    }

    /// Create with a custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens: 8192,
        }
    }

    /// Create from settings; `None` when no key is configured.
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        let api_key = settings.get_gemini_api_key()?;
        let gemini = &settings.providers.gemini;
        Some(Self {
            max_output_tokens: gemini.max_output_tokens,
            ..Self::with_base_url(api_key, &gemini.base_url)
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:streamGenerateContent", self.base_url, model)
    }

    fn build_request(&self, request: &StreamRequest) -> GeminiRequest {
        let image_turn = request
            .attachment
            .as_ref()
            .and_then(|_| last_user_turn(&request.messages));

        let contents = request
            .messages
            .iter()
            .enumerate()
            .map(|(idx, message)| {
                let mut parts = vec![GeminiPart::Text {
                    text: message.content.clone(),
                }];
                if let (Some(attachment), Some(turn)) = (&request.attachment, image_turn) {
                    if turn == idx {
                        parts.push(GeminiPart::InlineData {
                            inline_data: GeminiInlineData {
                                mime_type: attachment.mime_type.clone(),
                                data: attachment.data.clone(),
                            },
                        });
                    }
                }
                GeminiContent {
                    role: match message.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    parts,
                }
            })
            .collect();

        let system_instruction = (!request.system_prompt.is_empty()).then(|| GeminiInstruction {
            parts: vec![GeminiPart::Text {
                text: request.system_prompt.clone(),
            }],
        });

        GeminiRequest {
            contents,
            system_instruction,
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

impl StreamProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn stream(&self, request: StreamRequest) -> TokenStream {
        let body = self.build_request(&request);
        tracing::debug!(model = %request.model, turns = body.contents.len(), "dispatching gemini stream");

        let builder = self
            .client
            .post(self.endpoint(&request.model))
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body);
        drive(ProviderId::Gemini, builder, Framing::EventStream, TOKEN_PATH)
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiInstruction>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llm::message::{Attachment, Message};
    use crate::llm::provider::TokenEvent;
    use futures::StreamExt;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_frame(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]})
        )
    }

    #[test]
    fn test_endpoint() {
        let provider = GeminiProvider::with_base_url("k", "http://host/v1beta/models/");
        assert_eq!(
            provider.endpoint("gemini-2.5-flash"),
            "http://host/v1beta/models/gemini-2.5-flash:streamGenerateContent"
        );
    }

    #[test]
    fn test_build_request_roles_and_image() {
        let provider = GeminiProvider::new("k");
        let request = StreamRequest::new(
            "gemini-2.5-flash",
            vec![
                Message::user("hello"),
                Message::assistant("hi"),
                Message::user("what level is this?"),
            ],
        )
        .with_system("be clinical")
        .with_attachment(Some(Attachment::new("QUJD", "image/png")));

        let json = serde_json::to_value(provider.build_request(&request)).unwrap();

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[0]["parts"].as_array().unwrap().len(), 1);

        let last_parts = contents[2]["parts"].as_array().unwrap();
        assert_eq!(last_parts[0]["text"], "what level is this?");
        assert_eq!(last_parts[1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(last_parts[1]["inline_data"]["data"], "QUJD");

        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be clinical");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_build_request_without_system_prompt() {
        let provider = GeminiProvider::new("k");
        let request = StreamRequest::new("gemini-2.5-flash", vec![Message::user("hi")]);
        let json = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_from_settings_requires_key() {
        let mut settings = Settings::default();
        settings.providers.gemini.api_key_env = "VIEWER_CHAT_TEST_UNSET_GEMINI".to_string();
        assert!(GeminiProvider::from_settings(&settings).is_none());

        settings.providers.gemini.api_key = Some("abc".to_string());
        settings.providers.gemini.max_output_tokens = 512;
        let provider = GeminiProvider::from_settings(&settings).unwrap();
        assert_eq!(provider.max_output_tokens, 512);
    }

    #[tokio::test]
    async fn test_stream_sse_tokens_until_sentinel() {
        let server = MockServer::start().await;
        let body = format!(
            "{}{}data: {{broken\r\n\r\n{}data: [DONE]\r\n\r\n{}",
            sse_frame("L4"),
            sse_frame("-L5"),
            sse_frame(" disc"),
            sse_frame(" never seen"),
        );
        Mock::given(method("POST"))
            .and(path("/gemini-2.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("test-key", server.uri());
        let request = StreamRequest::new("gemini-2.5-flash", vec![Message::user("level?")]);
        let events: Vec<TokenEvent> = provider.stream(request).collect().await;

        assert_eq!(
            events,
            vec![
                TokenEvent::Start,
                TokenEvent::Token("L4".to_string()),
                TokenEvent::Token("-L5".to_string()),
                TokenEvent::Token(" disc".to_string()),
                TokenEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"code": 401, "message": "API key not valid. Please pass a valid API key.", "status": "UNAUTHENTICATED"}
            })))
            .mount(&server)
            .await;

        let provider = GeminiProvider::with_base_url("bad", server.uri());
        let request = StreamRequest::new("gemini-2.5-flash", vec![Message::user("hi")]);
        let events: Vec<TokenEvent> = provider.stream(request).collect().await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            TokenEvent::Fail(ProviderError::Http { status, message }) => {
                assert_eq!(*status, 401);
                assert!(message.starts_with("API key not valid"));
            }
            other => panic!("Expected Fail(Http), got {other:?}"),
        }
    }
}
