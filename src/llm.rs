use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// LLM provider: decides request format and default endpoint.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[default]
    OpenRouter,
    /// Any OpenAI-compatible API (local ollama, vLLM, etc.)
    #[serde(rename = "openai")]
    OpenAi,
}

impl Provider {
    fn endpoint(&self, base_url: Option<&str>) -> String {
        let base = base_url.unwrap_or(match self {
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "http://localhost:11434/v1",
        });
        let base = base.trim_end_matches('/');
        match self {
            Self::Anthropic => format!("{base}/messages"),
            Self::OpenRouter | Self::OpenAi => format!("{base}/chat/completions"),
        }
    }

    fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openrouter" => Ok(Self::OpenRouter),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::config(format!("unknown LLM provider: {other}"))),
        }
    }
}

/// Chat client used for short, deterministic JSON answers.
pub struct LlmClient {
    provider: Provider,
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    http: HttpClient,
}

impl LlmClient {
    /// Build from the `[llm]` section, reading the API key from its env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let env_var = config
            .api_key_env
            .as_deref()
            .unwrap_or_else(|| config.provider.api_key_env());
        let api_key = std::env::var(env_var).unwrap_or_default();
        if api_key.is_empty() {
            warn!(env_var, "LLM API key not set; requests will likely be rejected");
        }
        Ok(Self {
            endpoint: config.provider.endpoint(config.base_url.as_deref()),
            provider: config.provider.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            http: HttpClient::new("vambe-metrics/0.1.0", Duration::from_secs(60))?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask `instructions` about `input` and decode the reply as JSON.
    pub async fn ask_json<T: DeserializeOwned>(&self, instructions: &str, input: &str) -> Result<T> {
        let body = self.request_body(instructions, input);
        debug!(provider = ?self.provider, model = %self.model, "sending LLM request");

        let auth = format!("Bearer {}", self.api_key);
        let headers: Vec<(&str, &str)> = match self.provider {
            Provider::Anthropic => vec![
                ("x-api-key", self.api_key.as_str()),
                ("anthropic-version", "2023-06-01"),
            ],
            Provider::OpenRouter | Provider::OpenAi => vec![("Authorization", auth.as_str())],
        };
        let raw = self
            .http
            .post_json_raw(&self.endpoint, &body.to_string(), &headers)
            .await
            .inspect_err(|e| warn!(endpoint = %self.endpoint, "LLM request failed: {e}"))?;

        let reply: Value = serde_json::from_str(&raw)
            .map_err(|e| Error::parse(format!("LLM response is not JSON: {e}")))?;
        let text = reply_text(&self.provider, &reply)?;
        serde_json::from_str(json_slice(&text))
            .map_err(|e| Error::parse(format!("LLM answer is not the expected JSON: {e}\nraw: {text}")))
    }

    fn request_body(&self, instructions: &str, input: &str) -> Value {
        match self.provider {
            Provider::Anthropic => json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "temperature": 0,
                "system": instructions,
                "messages": [{ "role": "user", "content": input }],
            }),
            Provider::OpenRouter | Provider::OpenAi => json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "temperature": 0,
                "messages": [
                    { "role": "system", "content": instructions },
                    { "role": "user", "content": input },
                ],
            }),
        }
    }
}

/// Text of a completion reply in the provider's response shape.
fn reply_text(provider: &Provider, reply: &Value) -> Result<String> {
    let text = match provider {
        Provider::Anthropic => reply["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default(),
        Provider::OpenRouter | Provider::OpenAi => reply
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };
    if text.trim().is_empty() {
        return Err(Error::parse("empty response from LLM"));
    }
    Ok(text)
}

/// The JSON part of a reply: fenced block contents if present, else the
/// outermost `{...}`, else the whole text.
fn json_slice(text: &str) -> &str {
    let unfenced = text
        .split_once("```")
        .and_then(|(_, rest)| rest.split_once("```"))
        .map(|(inner, _)| inner.trim_start_matches("json").trim())
        .unwrap_or(text);
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => unfenced.trim(),
    }
}
