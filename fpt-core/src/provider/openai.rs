// OpenAI-compatible chat completions provider

use std::time::Instant;

use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ChatProvider;
use crate::config::Config;
use crate::types::{Completion, Message, ModelTier, TokenUsage};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Provider for `/chat/completions` endpoints
#[derive(Clone)]
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    standard_model: String,
    advanced_model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("standard_model", &self.standard_model)
            .field("advanced_model", &self.advanced_model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(OpenAiProvider {
            client,
            api_key: config.api_key()?.to_string(),
            base_url: config.openai.api_base.trim_end_matches('/').to_string(),
            standard_model: config.model_name(ModelTier::Standard).to_string(),
            advanced_model: config.model_name(ModelTier::Advanced).to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn parse_response(body: &str) -> Result<(String, TokenUsage)> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Unexpected chat completion response")?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| eyre!("Chat completion response has no message content"))?;
    Ok((text, response.usage))
}

impl ChatProvider for OpenAiProvider {
    async fn complete(&self, messages: &[Message], tier: ModelTier) -> Result<Completion> {
        let model = self.model_name(tier).to_string();
        debug!(%model, ?messages, "sending chat completion request");

        let started = Instant::now();
        let response = self
            .client
            .post(self.endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&ChatRequest {
                model: &model,
                messages,
            })
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read chat completion response")?;
        if !status.is_success() {
            return Err(eyre!("Model request failed with {}: {}", status, body.trim()));
        }

        let (text, usage) = parse_response(&body)?;
        let elapsed = started.elapsed();
        debug!(%model, ?usage, ?elapsed, "chat completion finished");

        Ok(Completion {
            text,
            model,
            usage,
            elapsed,
        })
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.standard_model,
            ModelTier::Advanced => &self.advanced_model,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() -> Result<()> {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;

        let (text, usage) = parse_response(body)?;
        assert_eq!(text, "Hi there");
        assert_eq!(
            usage,
            TokenUsage {
                prompt: 12,
                completion: 3,
                total: 15
            }
        );
        Ok(())
    }

    #[test]
    fn test_parse_response_without_choices() {
        assert!(parse_response(r#"{"choices": []}"#).is_err());
        assert!(parse_response("not json").is_err());
    }

    #[test]
    fn test_request_body_shape() -> Result<()> {
        let messages = vec![Message::new(crate::types::Role::User, "Q1")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4",
            messages: &messages,
        })?;
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-4",
                "messages": [{"role": "user", "content": "Q1"}]
            })
        );
        Ok(())
    }

    #[test]
    fn test_from_config() -> Result<()> {
        let config = Config::from_toml(
            "[openai]\napi_key = \"sk-test\"\napi_base = \"http://localhost:1234/v1/\"\n",
        )?;
        let provider = OpenAiProvider::from_config(&config)?;
        assert_eq!(provider.endpoint(), "http://localhost:1234/v1/chat/completions");
        assert_eq!(provider.model_name(ModelTier::Advanced), "gpt-4");
        assert!(!format!("{:?}", provider).contains("sk-test"));
        Ok(())
    }
}
