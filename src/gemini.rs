//! Gemini REST client used both for intent extraction and follow-up questions.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::adapters::{
    AdapterError, FollowupAdvisor, FollowupRequest, FollowupSubject, IntentExtractor,
};
use crate::intent::{DEFAULT_NAMESPACE, IntentAction};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    request_timeout: Duration,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to initialize HTTP client for Gemini")?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            request_timeout,
        })
    }

    async fn generate(&self, text: String) -> Result<String, AdapterError> {
        let url = format!("{BASE_URL}/{}:generateContent", self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text }],
            }],
        };

        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read Gemini error body".to_string());
            return Err(map_http_error(status, &body_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| self.transport_error(err))?;
        let text = extract_text_response(parsed)?;
        debug!("gemini ({}) replied with {} bytes", self.model, text.len());
        Ok(text)
    }

    fn transport_error(&self, err: reqwest::Error) -> AdapterError {
        if err.is_timeout() {
            AdapterError::Timeout(self.request_timeout.as_secs())
        } else if err.is_decode() {
            AdapterError::Unavailable(format!("failed to parse Gemini response: {err}"))
        } else {
            AdapterError::Unavailable(format!("Gemini API request failed: {err}"))
        }
    }
}

#[async_trait]
impl IntentExtractor for GeminiClient {
    async fn extract(
        &self,
        prompt: &str,
        known_services: &[String],
    ) -> Result<String, AdapterError> {
        self.generate(build_extraction_prompt(prompt, known_services))
            .await
    }
}

#[async_trait]
impl FollowupAdvisor for GeminiClient {
    async fn ask(&self, request: &FollowupRequest) -> Result<String, AdapterError> {
        self.generate(build_followup_prompt(request)).await
    }
}

pub fn build_extraction_prompt(prompt: &str, known_services: &[String]) -> String {
    let actions = IntentAction::ALL
        .iter()
        .map(|action| format!("    - {}: {}", action.as_str(), action.summary()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Convert this user request into JSON with fields:\n\
         - action: one of [{tags}]\n\
         {actions}\n\
         - service: the pod/deployment name, one of {services:?}, or null when none is named\n\
         - namespace: {DEFAULT_NAMESPACE} unless specified\n\
         - replicas: integer if scaling, else null\n\
         \n\
         Request: {prompt}\n\
         Respond with only valid JSON and nothing else. \
         Do not use markdown syntax or any markdown backticks.",
        tags = IntentAction::ALL
            .iter()
            .map(|action| action.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        services = known_services,
    )
}

pub fn build_followup_prompt(request: &FollowupRequest) -> String {
    let heading = match request.subject {
        FollowupSubject::Logs => "Logs",
        FollowupSubject::Description => "Pod description",
    };
    let mut sections = vec![format!(
        "{heading} for {}:\n\n{}",
        request.service, request.context_text
    )];

    if let Some(original) = request
        .original_prompt
        .as_deref()
        .filter(|prompt| !prompt.trim().is_empty())
    {
        sections.push(format!("Original request: {original}"));
    }

    let others = request
        .known_services
        .iter()
        .filter(|service| **service != request.service)
        .map(String::as_str)
        .collect::<Vec<_>>();
    if !others.is_empty() {
        sections.push(format!(
            "Other services in this application: {}",
            others.join(", ")
        ));
    }

    sections.push(format!("User prompt: {}", request.question));
    sections.join("\n\n")
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
struct Part {
    text: String,
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

fn extract_text_response(response: GenerateContentResponse) -> Result<String, AdapterError> {
    let text = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .find_map(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(AdapterError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn map_http_error(status: StatusCode, body: &str) -> AdapterError {
    let (status_text, message) = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            (
                wrapper.error.status.unwrap_or_default(),
                wrapper.error.message.unwrap_or_else(|| body.to_string()),
            )
        })
        .unwrap_or_else(|_| (String::new(), body.trim().to_string()));
    let detail = if status_text.is_empty() {
        format!("HTTP {}: {message}", status.as_u16())
    } else {
        format!("{status_text}: {message}")
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AdapterError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => AdapterError::Quota(detail),
        // Gemini reports a rejected key as 400 INVALID_ARGUMENT.
        StatusCode::BAD_REQUEST if message.contains("API key") => AdapterError::Auth(detail),
        _ => AdapterError::Unavailable(detail),
    }
}
