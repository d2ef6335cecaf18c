//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the adapter for the Gemini generative-text REST API.
//! It implements the `TextGenerationService` port from the `core` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use study_assistant_core::ports::{
    GenerationParams, PortError, PortResult, TextGenerationService,
};

//=========================================================================================
// Wire Types (request)
//=========================================================================================

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: i32,
    top_p: f32,
    max_output_tokens: u32,
}

//=========================================================================================
// Wire Types (response)
//=========================================================================================

/// The candidate-content envelope the API answers with. Every field is
/// optional on the wire; absence of the ones we need is what
/// `UpstreamMalformed` reports.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` against the Gemini
/// `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiTextAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiTextAdapter {
    /// Creates a new `GeminiTextAdapter`.
    pub fn new(client: reqwest::Client, api_key: String, base_url: String, model: String) -> Self {
        Self {
            client,
            api_key,
            base_url,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

/// Pulls the first candidate's text out of a response envelope.
///
/// Block signals take priority: an explicit `promptFeedback.blockReason`
/// or a `SAFETY` finish reason is reported as `UpstreamBlocked` even when
/// some text came back alongside it. A structurally intact envelope with
/// no usable text is `UpstreamMalformed`.
fn extract_candidate_text(response: GenerateContentResponse) -> PortResult<String> {
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            return Err(PortError::UpstreamBlocked(reason));
        }
    }

    let candidate = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| PortError::UpstreamMalformed("no candidates returned".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason.eq_ignore_ascii_case("SAFETY") {
            return Err(PortError::UpstreamBlocked(reason.to_string()));
        }
    }

    let text: String = candidate
        .content
        .and_then(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| p.text)
        .collect();

    if text.trim().is_empty() {
        return Err(PortError::UpstreamMalformed(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text)
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for GeminiTextAdapter {
    async fn generate_text(&self, prompt: &str, params: GenerationParams) -> PortResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_k: params.top_k,
                top_p: params.top_p,
                max_output_tokens: params.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| PortError::UpstreamUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::UpstreamUnavailable(format!(
                "Gemini API error: {}",
                response.status().as_u16()
            )));
        }

        let envelope: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::UpstreamMalformed(e.to_string()))?;

        extract_candidate_text(envelope)
    }
}

//=========================================================================================
// Tests
//=========================================================================================
