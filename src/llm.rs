use std::time::Duration;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde_json::json;

pub const BASE_URL_ENV: &str = "TAPSENSE_LLM_BASE_URL";
pub const MODEL_ENV: &str = "TAPSENSE_LLM_MODEL";

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llava";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let read = |key: &str, fallback: &str| {
            std::env::var(key)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            base_url: read(BASE_URL_ENV, DEFAULT_BASE_URL),
            model: read(MODEL_ENV, DEFAULT_MODEL),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Text and vision generation against an Ollama-compatible server.
#[derive(Clone)]
pub struct VisionClient {
    client: Client,
    config: LlmConfig,
}

impl VisionClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build LLM HTTP client")?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// True when the server answers its model listing endpoint.
    pub async fn is_available(&self) -> bool {
        let probe = self
            .client
            .get(self.config.endpoint("api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        match probe {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                log::debug!("LLM probe at {} failed: {err}", self.config.base_url);
                false
            }
        }
    }

    /// Single non-streamed completion, optionally grounded on a PNG image.
    pub async fn generate(&self, prompt: &str, png: Option<&[u8]>) -> Result<String> {
        let mut body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(bytes) = png {
            body["images"] = json!([STANDARD.encode(bytes)]);
        }

        let response = self
            .client
            .post(self.config.endpoint("api/generate"))
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?
            .error_for_status()
            .context("LLM returned an error status")?;

        let value: serde_json::Value = response
            .json()
            .await
            .context("LLM response was not JSON")?;
        let text = value["response"]
            .as_str()
            .context("LLM response has no 'response' field")?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = LlmConfig {
            base_url: "http://host:1234/".into(),
            model: "m".into(),
        };
        assert_eq!(config.endpoint("api/tags"), "http://host:1234/api/tags");
    }

    #[tokio::test]
    async fn unreachable_server_is_unavailable() {
        let client = VisionClient::new(LlmConfig {
            base_url: "http://127.0.0.1:9".into(),
            model: "llava".into(),
        })
        .unwrap();
        assert!(!client.is_available().await);
        assert!(client.generate("hello", None).await.is_err());
    }
}
