use crate::core::ai::{AiConfig, AiMessage, AiProvider, AiProviderResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::error::Error;
use std::time::Duration;

pub struct PerplexityClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl PerplexityClient {
    pub fn new(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AiProvider for PerplexityClient {
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut payload = json!({
            "model": config.model,
            "messages": messages,
        });
        if let Some(temperature) = config.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(format!("Perplexity API error: {} - {}", status, text).into());
        }

        let response_json: Value = response.json().await?;
        parse_completion(&response_json)
    }
}

fn parse_completion(body: &Value) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
    let content = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or("Failed to parse response content")?
        .to_string();

    let citations = body["citations"]
        .as_array()
        .map(|urls| {
            urls.iter()
                .filter_map(|u| u.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(AiProviderResponse { content, citations })
}
