//! Gemini `streamGenerateContent` client with Google Search grounding.
//!
//! Behaviour:
//! - The user's text gets ` site:<domain>` appended, once, on the outgoing
//!   turn only. History keeps the raw text.
//! - Every request carries the fixed system directive and the `googleSearch`
//!   tool, which makes the service retrieve, ground and report citations.
//! - The response is consumed as server-sent events (`alt=sse`); each event is
//!   one `GenerateContentResponse` and becomes one [`PartialResult`].

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::types::{Content, ContentPart};
use crate::config::ChatConfig;

use super::error::{GenerationError, GenerationResult};
use super::sse::SseDecoder;
use super::{CitationFragment, GenerationAdapter, PartialResult, PartialResultStream};

/// Header carrying the credential.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate's non-thought parts, plus its web citations.
    fn into_partial_result(self) -> PartialResult {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return PartialResult::default();
        };

        let text: String = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        let citation_fragments = candidate
            .grounding_metadata
            .map(|m| m.grounding_chunks)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|chunk| chunk.web)
            .map(|web| CitationFragment {
                uri: web.uri,
                title: web.title,
            })
            .collect();

        PartialResult {
            text_fragment: (!text.is_empty()).then_some(text),
            citation_fragments,
        }
    }
}

/// Decode one SSE payload into a partial result.
fn parse_payload(payload: &str) -> GenerationResult<PartialResult> {
    let response: GenerateContentResponse = serde_json::from_str(payload)?;
    if let Some(error) = response.error {
        return Err(GenerationError::Api {
            status: error.code.unwrap_or(0),
            message: error.message,
        });
    }
    Ok(response.into_partial_result())
}

/// Pull the service's message out of an error body, falling back to the raw text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .map(|error| error.message)
        .filter(|message| !message.is_empty())
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        })
}

/// Streaming Gemini client. Holds configuration only; no conversation state.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    stream_url: Url,
    domain_directive: String,
    system_instruction: String,
}

impl GeminiClient {
    /// Build a client from the injected configuration.
    ///
    /// # Errors
    /// Returns an error if the credential is missing, the endpoint URL is
    /// invalid, or the HTTP client cannot be built.
    pub fn new(config: &ChatConfig) -> GenerationResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(GenerationError::MissingApiKey)?
            .to_string();

        let stream_url = Url::parse(&format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            config.base_url.trim_end_matches('/'),
            config.model
        ))?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| GenerationError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            stream_url,
            domain_directive: config.domain_directive(),
            system_instruction: config.system_instruction(),
        })
    }

    /// Endpoint every turn is posted to.
    #[must_use]
    pub const fn stream_url(&self) -> &Url {
        &self.stream_url
    }

    /// Outgoing query text: the user's text with the domain restriction appended.
    #[must_use]
    pub fn grounded_query(&self, new_message: &str) -> String {
        format!("{new_message}{}", self.domain_directive)
    }

    fn build_request(&self, history: &[Content], new_message: &str) -> GenerateContentRequest {
        let mut contents = Vec::with_capacity(history.len() + 1);
        contents.extend_from_slice(history);
        contents.push(Content::user(self.grounded_query(new_message)));

        GenerateContentRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: vec![ContentPart {
                    text: self.system_instruction.clone(),
                }],
            },
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        }
    }
}

#[async_trait]
impl GenerationAdapter for GeminiClient {
    async fn stream_response(
        &self,
        history: &[Content],
        new_message: &str,
    ) -> GenerationResult<PartialResultStream> {
        let request = self.build_request(history, new_message);
        tracing::debug!(
            history_len = history.len(),
            "posting grounded request to {}",
            self.stream_url.path()
        );

        let response = self
            .client
            .post(self.stream_url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let mut body = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                let payloads = match chunk
                    .map_err(GenerationError::from)
                    .and_then(|bytes| decoder.push(&bytes))
                {
                    Ok(payloads) => payloads,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };
                for payload in payloads {
                    let partial = parse_payload(&payload);
                    let failed = partial.is_err();
                    yield partial;
                    if failed {
                        return;
                    }
                }
            }
            match decoder.finish() {
                Ok(Some(payload)) => {
                    yield parse_payload(&payload);
                }
                Ok(None) => {}
                Err(err) => {
                    yield Err(err);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
