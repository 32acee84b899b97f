use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::build_prompt::{build_prompt_with_context, Message, Role};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::post_json;
use crate::vector_index::Hit;

/// A hosted chat model that turns a prompt into text.
pub trait AnswerModel: Send + Sync {
    fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Model identifier, for logging
    fn model(&self) -> &str;
}

/// Google Gemini `generateContent` client.
#[derive(Clone, Debug)]
pub struct GeminiModel {
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
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

impl GeminiModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.gemini_url, &cfg.chat_model, &cfg.api_key, cfg.http_timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

impl AnswerModel for GeminiModel {
    fn generate(&self, messages: &[Message]) -> Result<String> {
        let request = to_request(messages);
        let headers = [("x-goog-api-key", self.api_key.as_str())];
        let response: GenerateResponse =
            post_json(&self.endpoint(), &headers, &request, self.timeout)
                .map_err(|e| Error::llm(e.to_string()))?;
        response_text(response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn to_request(messages: &[Message]) -> GenerateRequest<'_> {
    let system: Vec<Part<'_>> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| Part { text: &m.content })
        .collect();
    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| Content {
            role: Some(if m.role == Role::Assistant { "model" } else { "user" }),
            parts: vec![Part { text: &m.content }],
        })
        .collect();

    GenerateRequest {
        system_instruction: (!system.is_empty()).then_some(Content {
            role: None,
            parts: system,
        }),
        contents,
        generation_config: GenerationConfig {
            temperature: 0.1,
            max_output_tokens: 1024,
        },
    }
}

fn response_text(response: GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if !text.trim().is_empty() {
        return Ok(text.trim().to_string());
    }
    match response.prompt_feedback.and_then(|f| f.block_reason) {
        Some(reason) => Err(Error::llm(format!("request blocked: {}", reason))),
        None => Err(Error::llm("model returned no text")),
    }
}

/// Builds the grounded prompt for `question` and asks the model.
pub fn synthesize_answer(model: &dyn AnswerModel, question: &str, hits: &[Hit]) -> Result<String> {
    let (messages, _context) = build_prompt_with_context(question, hits);
    tracing::debug!(model = model.model(), passages = hits.len(), "generating answer");
    model.generate(&messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_moves_system_prompt_into_instruction() {
        let messages = vec![
            Message::new(Role::System, "be brief"),
            Message::new(Role::User, "hi"),
        ];
        let value = serde_json::to_value(to_request(&messages)).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["contents"].as_array().unwrap().len(), 1);
        assert!(value["generationConfig"]["maxOutputTokens"].is_number());
    }

    #[test]
    fn response_text_joins_parts_and_reports_blocks() {
        let ok: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "The widget "}, {"text": "uses 5V."}]}}]
        }))
        .unwrap();
        assert_eq!(response_text(ok).unwrap(), "The widget uses 5V.");

        let blocked: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = response_text(blocked).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
