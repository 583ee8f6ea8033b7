//! Reasoning service: multimodal chat completion over HTTP.
//!
//! The [`ReasoningService`] trait hides the backend. [`OpenAiReasoning`] talks
//! to any OpenAI-compatible `/chat/completions` endpoint and sends images as
//! base64 data URLs. Tests use `test_support::ScriptedReasoning`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::core::session::TokenUsage;
use crate::error::ReasoningError;
use crate::io::config::ReasoningConfig;

/// One completed exchange with the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningReply {
    /// Text content of the first choice.
    pub content: String,
    pub usage: TokenUsage,
    /// Full response payload, kept for the round logs.
    pub raw: Value,
}

pub trait ReasoningService {
    /// Send `prompt` with `images` attached, in order.
    fn invoke(&self, prompt: &str, images: &[&Path]) -> Result<ReasoningReply, ReasoningError>;
}

/// Blocking client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiReasoning {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    prompt_cost_per_1k: f64,
    completion_cost_per_1k: f64,
}

impl OpenAiReasoning {
    /// Build a client from config, reading the API key from `cfg.api_key_env`.
    pub fn from_config(cfg: &ReasoningConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env)
            .map_err(|_| anyhow!("environment variable {} is not set", cfg.api_key_env))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_key,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            prompt_cost_per_1k: cfg.prompt_cost_per_1k,
            completion_cost_per_1k: cfg.completion_cost_per_1k,
        })
    }

    fn request_body(&self, prompt: &str, images: &[&Path]) -> Result<Value, ReasoningError> {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        for path in images {
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": image_data_url(path)? },
            }));
        }
        Ok(json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        }))
    }
}

impl ReasoningService for OpenAiReasoning {
    #[instrument(skip_all, fields(model = %self.model, images = images.len()))]
    fn invoke(&self, prompt: &str, images: &[&Path]) -> Result<ReasoningReply, ReasoningError> {
        let body = self.request_body(prompt, images)?;
        debug!("sending chat completion request");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|err| ReasoningError::new(format!("request failed: {err}")))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|err| ReasoningError::new(format!("read response body: {err}")))?;
        let raw: Value = serde_json::from_str(&text).map_err(|err| {
            ReasoningError::new(format!("http {status}: response is not JSON ({err})"))
        })?;

        let reply = parse_completion(raw)?;
        if !status.is_success() {
            return Err(ReasoningError::new(format!("http {status}")));
        }
        info!(
            prompt_tokens = reply.usage.prompt_tokens,
            completion_tokens = reply.usage.completion_tokens,
            cost_usd = request_cost(reply.usage, self.prompt_cost_per_1k, self.completion_cost_per_1k),
            "reasoning request completed"
        );
        Ok(reply)
    }
}

/// Interpret a chat completion payload.
///
/// An `{"error": {"message": ...}}` payload is a [`ReasoningError`] carrying that message.
pub fn parse_completion(raw: Value) -> Result<ReasoningReply, ReasoningError> {
    if let Some(error) = raw.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_string);
        return Err(ReasoningError::new(message));
    }
    let content = raw
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| ReasoningError::new("response has no choices[0].message.content"))?
        .to_string();
    let usage = raw
        .get("usage")
        .map(|usage| TokenUsage {
            prompt_tokens: count(usage, "prompt_tokens"),
            completion_tokens: count(usage, "completion_tokens"),
            total_tokens: count(usage, "total_tokens"),
        })
        .unwrap_or_default();
    Ok(ReasoningReply {
        content,
        usage,
        raw,
    })
}

fn count(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// USD cost of one request at the given per-1k token prices.
pub fn request_cost(usage: TokenUsage, prompt_per_1k: f64, completion_per_1k: f64) -> f64 {
    let (prompt, completion) = (usage.prompt_tokens as f64, usage.completion_tokens as f64);
    prompt / 1000.0 * prompt_per_1k + completion / 1000.0 * completion_per_1k
}

fn image_data_url(path: &Path) -> Result<String, ReasoningError> {
    let bytes = fs::read(path)
        .map_err(|err| ReasoningError::new(format!("read image {}: {err}", path.display())))?;
    let mime = match path.extension().and_then(|ext| ext.to_str()) {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_content_and_usage() {
        let raw = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Decision: SUCCESS" } }],
            "usage": { "prompt_tokens": 900, "completion_tokens": 100, "total_tokens": 1000 }
        });
        let reply = parse_completion(raw).expect("parse");
        assert_eq!(reply.content, "Decision: SUCCESS");
        assert_eq!(reply.usage.total_tokens, 1000);
    }

    #[test]
    fn error_payload_maps_to_reasoning_error() {
        let raw = json!({ "error": { "message": "rate limit exceeded", "type": "requests" } });
        assert_eq!(
            parse_completion(raw).unwrap_err(),
            ReasoningError::new("rate limit exceeded")
        );
    }

    #[test]
    fn missing_choices_is_error() {
        let err = parse_completion(json!({ "id": "x" })).unwrap_err();
        assert!(err.message.contains("choices"));
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let raw = json!({ "choices": [{ "message": { "content": "ok" } }] });
        assert_eq!(parse_completion(raw).expect("parse").usage, TokenUsage::default());
    }

    #[test]
    fn cost_uses_per_thousand_prices() {
        let usage = TokenUsage {
            prompt_tokens: 2000,
            completion_tokens: 500,
            total_tokens: 2500,
        };
        let cost = request_cost(usage, 0.01, 0.03);
        assert!((cost - 0.035).abs() < 1e-9);
    }

    #[test]
    fn png_images_become_png_data_urls() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("1_before_labeled.png");
        fs::write(&path, b"abc").expect("write");
        assert_eq!(image_data_url(&path).expect("url"), "data:image/png;base64,YWJj");
    }
}
