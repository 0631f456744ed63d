//! Gemini `generateContent` client for command interpretation.
//!
//! # Responsibility
//! - Send the rendered prompt plus function declarations to the hosted model.
//! - Map the first candidate into a `ServiceReply`.
//!
//! # Invariants
//! - A missing API key short-circuits before any network call.
//! - The key travels in a request header and is never logged.
//! - Only the first function call of the first candidate is used.

use super::prompt::{function_declarations, render_prompt};
use super::{CommandRequest, LanguageService, ServiceReply, UpstreamError};
use crate::config::LanguageServiceConfig;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    function_declarations: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Blocking client for the Gemini REST API.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: Option<String>,
    url: String,
}

impl GeminiClient {
    pub fn new(config: &LanguageServiceConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|err| {
                warn!(
                    "event=client_build module=interpreter status=fallback timeout_ms={} error={}",
                    config.timeout.as_millis(),
                    err
                );
                reqwest::blocking::Client::new()
            });
        Self {
            client,
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            url: format!(
                "{}/models/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
        }
    }
}

impl LanguageService for GeminiClient {
    fn generate(&self, request: &CommandRequest) -> Result<ServiceReply, UpstreamError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(UpstreamError::MissingCredential)?;

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(render_prompt(request)),
                    function_call: None,
                }],
            }],
            tools: vec![Tool {
                function_declarations: function_declarations(),
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .map_err(|err| {
                warn!("event=upstream_call module=interpreter status=error reason=transport");
                UpstreamError::Unavailable(transport_reason(&err))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "event=upstream_call module=interpreter status=error http_status={}",
                status.as_u16()
            );
            return Err(UpstreamError::Unavailable(format!("http status {}", status.as_u16())));
        }

        let payload: GenerateResponse = response
            .json()
            .map_err(|err| UpstreamError::Malformed(format!("undecodable body: {err}")))?;
        debug!(
            "event=upstream_call module=interpreter status=ok candidates={}",
            payload.candidates.len()
        );
        reply_from_response(payload)
    }
}

fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}

fn reply_from_response(payload: GenerateResponse) -> Result<ServiceReply, UpstreamError> {
    let candidate = payload
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::Malformed("no candidates".to_string()))?;

    let mut text = String::new();
    for part in candidate.content.parts {
        if let Some(call) = part.function_call {
            return Ok(ServiceReply::FunctionCall {
                name: call.name,
                args: call.args,
            });
        }
        if let Some(chunk) = part.text {
            text.push_str(&chunk);
        }
    }

    if text.trim().is_empty() {
        return Err(UpstreamError::Malformed(
            "candidate has neither text nor function call".to_string(),
        ));
    }
    Ok(ServiceReply::Text(text))
}
