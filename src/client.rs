use crate::constants::WEB_SEARCH_CONTEXT_SIZE;
use crate::hardening::RetryPolicy;
use crate::logging::{log_request_summary, log_response_summary};
use crate::prompt::build_messages;
use crate::streaming::{body_event_stream, sse_event_stream, EventStream};
use crate::tool_schema::betting_analysis_tool;
use crate::types::{BetwiseError, ChatRequest, ProviderPulse, Result, WireMessage};
use futures_util::StreamExt;
use serde_json::json;
use std::time::Duration;

/// Seam between the turn driver and the model service.
#[allow(async_fn_in_trait)]
pub trait ChatTransport {
    fn build_request(&self, history: Vec<WireMessage>) -> ChatRequest;

    /// Opens a response for `request`. Failures here happen before any
    /// assistant output exists.
    async fn open(&self, request: &ChatRequest) -> Result<EventStream>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub stream: bool,
    pub web_search: bool,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_retries: u32,
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ModelClient {
    http: reqwest::Client,
    config: ClientConfig,
    retry: RetryPolicy,
}

impl ModelClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .build()?;
        Ok(Self {
            http,
            retry: RetryPolicy::new(config.max_retries, 500),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                "[CLIENT] Upstream returned {}: {}",
                status,
                crate::str_utils::first_n_chars_lossy(&body, 500)
            );
            return Err(BetwiseError::Upstream(status, body).into());
        }
        Ok(response)
    }
}

pub fn build_chat_request(config: &ClientConfig, history: Vec<WireMessage>) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: build_messages(history),
        stream: config.stream,
        tools: vec![betting_analysis_tool()],
        web_search_options: config
            .web_search
            .then(|| json!({ "search_context_size": WEB_SEARCH_CONTEXT_SIZE })),
    }
}

impl ChatTransport for ModelClient {
    fn build_request(&self, history: Vec<WireMessage>) -> ChatRequest {
        build_chat_request(&self.config, history)
    }

    async fn open(&self, request: &ChatRequest) -> Result<EventStream> {
        log_request_summary(request);
        let response = self
            .retry
            .execute_with_retry(|| self.send_once(request))
            .await?;

        if request.stream {
            let body = response
                .bytes_stream()
                .map(|r| r.map_err(std::io::Error::other));
            Ok(sse_event_stream(body))
        } else {
            let raw = response.bytes().await?;
            let body: ProviderPulse = serde_json::from_slice(&raw)?;
            log_response_summary(&body);
            Ok(body_event_stream(&body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn config(web_search: bool) -> ClientConfig {
        ClientConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            stream: true,
            web_search,
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(1),
            max_retries: 1,
        }
    }

    #[test]
    fn test_request_shape() {
        let history = vec![WireMessage {
            role: Role::User,
            content: "$20 on the Chiefs".to_string(),
        }];
        let request = build_chat_request(&config(true), history);
        let value = match serde_json::to_value(&request) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "$20 on the Chiefs");
        assert_eq!(value["tools"][0]["function"]["name"], "betting_analysis");
        assert_eq!(value["web_search_options"]["search_context_size"], "low");
        assert_eq!(value["stream"], true);
    }

    #[test]
    fn test_web_search_omitted_when_disabled() {
        let request = build_chat_request(&config(false), Vec::new());
        let value = match serde_json::to_value(&request) {
            Ok(v) => v,
            Err(e) => panic!("{}", e),
        };
        assert!(value.get("web_search_options").is_none());
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client = match ModelClient::new(config(false)) {
            Ok(c) => c,
            Err(e) => panic!("{}", e),
        };
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }
}
