mod schema;
pub(crate) mod types;

pub use schema::StructuredOutput;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use tracing::debug;

use types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Minimal Anthropic Messages API client. One model per instance; structured
/// output is obtained by forcing a single-tool call whose input schema is
/// derived from the target type.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Extract a structured value: the request carries one tool whose input
    /// schema is `T`'s, and `tool_choice` forces the model to call it.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let tool_name = "structured_response";
        let mut request = ChatRequest::new(&self.model)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .temperature(0.0)
            .tool(ToolDefinitionWire {
                name: tool_name.to_string(),
                description: "Extract structured data from the input.".to_string(),
                input_schema: T::tool_schema(),
            });
        request.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool_name,
        }));

        let response = self.chat(&request).await?;

        for block in &response.content {
            if let ContentBlock::ToolUse { input, .. } = block {
                return serde_json::from_value(input.clone())
                    .map_err(|e| anyhow!("Failed to deserialize response: {}", e));
            }
        }

        Err(anyhow!("No structured output in Claude response"))
    }

    /// Plain text completion.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(0.0);

        let response = self.chat(&request).await?;

        response
            .text()
            .ok_or_else(|| anyhow!("No response from Claude"))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let base = self.base_url.as_deref().unwrap_or(ANTHROPIC_API_URL);
        let url = format!("{base}/messages");

        debug!(model = %request.model, "Claude chat request");

        let response = reqwest::Client::new()
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("Claude API error ({}): {}", status, error_text));
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_stored() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001");
        assert_eq!(ai.model(), "claude-haiku-4-5-20251001");
    }

    #[test]
    fn base_url_override() {
        let ai = Claude::new("sk-ant-test", "claude-haiku-4-5-20251001")
            .with_base_url("https://custom.api.example");
        assert_eq!(ai.base_url.as_deref(), Some("https://custom.api.example"));
    }
}
