//! Gemini REST client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::GeminiConfig;
use crate::error::GatewayError;
use crate::llm::AiGateway;

/// Calls `models/{model}:generateContent` on the Gemini API.
///
/// No timeout or retry is configured; a request is held open until the API
/// answers or the connection fails.
pub struct GeminiGateway {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: Url,
}

impl GeminiGateway {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key,
            model: config.model,
            base_url: config.base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            self.model
        )
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String, GatewayError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: error_message(&body_text),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        extract_text(parsed)
    }
}

impl std::fmt::Debug for GeminiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGateway")
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, GatewayError> {
        self.generate(vec![Part::Text {
            text: prompt.to_string(),
        }])
        .await
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, GatewayError> {
        self.generate(vec![
            Part::Text {
                text: prompt.to_string(),
            },
            Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: mime_type.to_string(),
                    data: BASE64_STANDARD.encode(image),
                },
            },
        ])
        .await
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, GatewayError> {
    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GatewayError::EmptyResponse);
    }
    Ok(text)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> GeminiGateway {
        GeminiGateway::new(GeminiConfig {
            api_key: SecretString::from("test-key".to_string()),
            model: "gemini-test".to_string(),
            base_url: Url::parse("http://127.0.0.1:9/v1beta/models/").unwrap(),
        })
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        assert_eq!(
            gateway().endpoint(),
            "http://127.0.0.1:9/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn debug_does_not_expose_key() {
        assert!(!format!("{:?}", gateway()).contains("test-key"));
    }

    #[test]
    fn image_part_serializes_as_inline_data() {
        let part = Part::InlineData {
            inline_data: InlineDataPayload {
                mime_type: "image/png".to_string(),
                data: BASE64_STANDARD.encode([1u8, 2, 3]),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["inlineData"]["data"], "AQID");
    }

    #[test]
    fn extract_text_joins_parts_of_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"World!"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hello, World!");
    }

    #[test]
    fn extract_text_rejects_empty_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(matches!(
            extract_text(response),
            Err(GatewayError::EmptyResponse)
        ));

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert!(matches!(
            extract_text(blocked),
            Err(GatewayError::EmptyResponse)
        ));
    }

    #[test]
    fn error_message_prefers_structured_body() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body), "INVALID_ARGUMENT: API key not valid.");
        assert_eq!(error_message("upstream exploded"), "upstream exploded");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let err = gateway().complete("hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Request(_)));
    }
}
