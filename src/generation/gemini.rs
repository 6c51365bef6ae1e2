//! Google Generative Language API generator
//!
//! Calls `models/{model}:streamGenerateContent?alt=sse` and turns each
//! server-sent event into the text of its candidate parts.

use crate::config::GeminiConfig;
use crate::error::{DbCoachError, Result};
use crate::generation::sse::parse_sse_stream;
use crate::generation::{ChunkStream, GenerationRequest, TextGenerator};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Capacity of the raw event channel between the SSE parser and consumer
const EVENT_BUFFER: usize = 32;

/// Streaming generator backed by Gemini
///
/// # Examples
///
/// ```
/// use dbcoach::config::GeminiConfig;
/// use dbcoach::generation::GeminiGenerator;
///
/// let config = GeminiConfig {
///     api_key: Some("test-key".to_string()),
///     ..Default::default()
/// };
/// let generator = GeminiGenerator::new(config);
/// assert!(generator.is_ok());
/// ```
pub struct GeminiGenerator {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

/// Request body for `streamGenerateContent`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
}

/// One streamed response event
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl GeminiGenerator {
    /// Create a Gemini generator
    ///
    /// # Errors
    ///
    /// Returns `DbCoachError::Config` if no API key is configured and
    /// `DbCoachError::Generation` if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DbCoachError::Config(
                    "Gemini API key missing; set GEMINI_API_KEY or generator.gemini.api_key"
                        .to_string(),
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("dbcoach/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DbCoachError::Generation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Model in use
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        let system_instruction = if request.system_prompt.trim().is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(request.system_prompt.clone()),
                }],
            })
        };

        GeminiRequest {
            system_instruction,
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GeminiGenerationConfig { temperature: 0.7 },
        }
    }
}

/// Decode one SSE payload into the text it carries
///
/// Returns `None` for events without text (e.g. final usage metadata).
fn decode_event(data: &str) -> Option<Result<String>> {
    let chunk: GeminiStreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(DbCoachError::Generation(format!(
                "Failed to parse Gemini stream event: {}",
                e
            ))
            .into()))
        }
    };

    if let Some(error) = chunk.error {
        return Some(Err(DbCoachError::Generation(format!(
            "Gemini error {}: {}",
            error.code, error.message
        ))
        .into()));
    }

    if chunk.candidates.is_empty() {
        if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
            return Some(Err(DbCoachError::Generation(format!(
                "Prompt blocked by Gemini: {}",
                reason
            ))
            .into()));
        }
    }

    let text: String = chunk
        .candidates
        .into_iter()
        .take(1)
        .flat_map(|c| c.content.parts)
        .filter_map(|p| p.text)
        .collect();

    if text.is_empty() {
        None
    } else {
        Some(Ok(text))
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<ChunkStream> {
        tracing::debug!(
            "Requesting Gemini stream for task {} with model {}",
            request.task_id,
            self.config.model
        );

        let body = Self::build_request(&request);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(DbCoachError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Gemini returned error {}: {}", status, error_text);
            return Err(DbCoachError::Generation(format!(
                "Gemini returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(parse_sse_stream(response.bytes_stream(), event_tx));

        let chunks = ReceiverStream::new(event_rx).filter_map(|event| {
            futures::future::ready(match event {
                Ok(data) => decode_event(&data),
                Err(message) => Some(Err(DbCoachError::Generation(format!(
                    "Gemini stream interrupted: {}",
                    message
                ))
                .into())),
            })
        });

        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> GeminiGenerator {
        GeminiGenerator::new(GeminiConfig {
            api_base: "http://localhost:9999/".to_string(),
            api_key: Some("key".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = GeminiGenerator::new(GeminiConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            generator().endpoint(),
            "http://localhost:9999/v1beta/models/gemini-1.5-flash:streamGenerateContent"
        );
    }

    #[test]
    fn test_build_request_shape() {
        let request = GenerationRequest {
            task_id: "schema".to_string(),
            task_label: "Schema Design".to_string(),
            system_prompt: "You are a database architect".to_string(),
            prompt: "a shop".to_string(),
        };
        let json = serde_json::to_value(GeminiGenerator::build_request(&request)).unwrap();
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are a database architect"
        );
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "a shop");
        assert!(json["generationConfig"]["temperature"].is_number());
    }

    #[test]
    fn test_build_request_omits_empty_system_prompt() {
        let request = GenerationRequest {
            task_id: "t".to_string(),
            task_label: "T".to_string(),
            system_prompt: " ".to_string(),
            prompt: "p".to_string(),
        };
        let json = serde_json::to_value(GeminiGenerator::build_request(&request)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_decode_event_text() {
        let data = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"CREATE "},{"text":"TABLE"}]}}]}"#;
        assert_eq!(decode_event(data).unwrap().unwrap(), "CREATE TABLE");
    }

    #[test]
    fn test_decode_event_without_text_is_skipped() {
        let data = r#"{"candidates":[{"content":{"parts":[]},"finishReason":"STOP"}],"usageMetadata":{"totalTokenCount":10}}"#;
        assert!(decode_event(data).is_none());
    }

    #[test]
    fn test_decode_event_error_payload() {
        let data = r#"{"error":{"code":429,"message":"Resource exhausted"}}"#;
        let err = decode_event(data).unwrap().unwrap_err();
        assert!(err.to_string().contains("Resource exhausted"));
    }

    #[test]
    fn test_decode_event_blocked_prompt() {
        let data = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = decode_event(data).unwrap().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_decode_event_invalid_json() {
        assert!(decode_event("not json").unwrap().is_err());
    }
}
