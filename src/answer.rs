//! Answer gateway: context + question → answer text via a chat-completion
//! endpoint.
//!
//! The request is an OpenAI-style chat completion with exactly two
//! messages: the configured system prompt, and a user message carrying the
//! retrieved context followed by the question.
//!
//! A non-success HTTP status is not an error. It is turned into the answer
//! string `"Error: {status} - {body}"` so an interactive session survives a
//! flaky endpoint. Transport failures and timeouts are still errors.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

use projrag_core::RagError;

use crate::config::LlmConfig;

#[async_trait]
pub trait AnswerGateway: Send + Sync {
    async fn answer(&self, context: &str, question: &str) -> Result<String>;
}

/// Format the user turn of the chat exchange.
pub fn user_message(context: &str, question: &str) -> String {
    format!("Context:\n{}\n\nQuestion: {}", context, question)
}

/// [`AnswerGateway`] over an HTTP chat-completion endpoint.
pub struct ChatGateway {
    client: reqwest::Client,
    endpoint_url: String,
    model: String,
    api_key: Option<String>,
    system_prompt: String,
    timeout_secs: u64,
}

impl ChatGateway {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint_url: config.endpoint_url.clone(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            system_prompt: config.system_prompt.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn payload(&self, context: &str, question: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt },
                { "role": "user", "content": user_message(context, question) }
            ]
        })
    }
}

#[async_trait]
impl AnswerGateway for ChatGateway {
    async fn answer(&self, context: &str, question: &str) -> Result<String> {
        let mut request = self
            .client
            .post(&self.endpoint_url)
            .header("Content-Type", "application/json")
            .json(&self.payload(context, question));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!(RagError::Timeout {
                    operation: format!("chat completion at {}", self.endpoint_url),
                    secs: self.timeout_secs,
                })
            } else {
                anyhow!("Failed to reach {}: {}", self.endpoint_url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(RagError::Endpoint {
                status: status.as_u16(),
                body,
            }
            .to_string());
        }

        let json: serde_json::Value = response.json().await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                anyhow!("Invalid chat completion response: missing choices[0].message.content")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn config(url: &str, api_key: &str) -> LlmConfig {
        LlmConfig {
            endpoint_url: url.to_string(),
            model: "test-model".to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    /// Echoes back what it received so tests can assert on the request.
    async fn echo(
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Json<serde_json::Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none")
            .to_string();
        let summary = format!(
            "{}|{}|{}|{}|{}",
            body["model"].as_str().unwrap_or(""),
            body["messages"].as_array().map(|m| m.len()).unwrap_or(0),
            body["messages"][0]["role"].as_str().unwrap_or(""),
            body["messages"][1]["content"].as_str().unwrap_or(""),
            auth
        );
        Json(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": summary } }]
        }))
    }

    #[test]
    fn test_user_message_layout() {
        assert_eq!(
            user_message("hello world", "what?"),
            "Context:\nhello world\n\nQuestion: what?"
        );
    }

    #[tokio::test]
    async fn test_request_shape_with_bearer() {
        let app = Router::new().route("/v1/chat/completions", post(echo));
        let url = serve(app).await;
        let gateway = ChatGateway::new(&config(&url, "sk-123")).unwrap();

        let answer = gateway.answer("ctx", "q?").await.unwrap();
        assert_eq!(
            answer,
            "test-model|2|system|Context:\nctx\n\nQuestion: q?|Bearer sk-123"
        );
    }

    #[tokio::test]
    async fn test_non_success_becomes_answer_text() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "model loading") }),
        );
        let url = serve(app).await;
        let gateway = ChatGateway::new(&config(&url, "k")).unwrap();

        let answer = gateway.answer("ctx", "q").await.unwrap();
        assert_eq!(answer, "Error: 503 - model loading");
    }

    #[tokio::test]
    async fn test_malformed_success_is_error() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(serde_json::json!({ "choices": [] })) }),
        );
        let url = serve(app).await;
        let gateway = ChatGateway::new(&config(&url, "k")).unwrap();

        assert!(gateway.answer("ctx", "q").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!(
            "http://{}/v1/chat/completions",
            listener.local_addr().unwrap()
        );
        drop(listener);

        let gateway = ChatGateway::new(&config(&url, "k")).unwrap();
        assert!(gateway.answer("ctx", "q").await.is_err());
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({
                    "choices": [{ "message": { "content": "too late" } }]
                }))
            }),
        );
        let url = serve(app).await;
        let mut slow = config(&url, "k");
        slow.timeout_secs = 1;
        let gateway = ChatGateway::new(&slow).unwrap();

        let err = gateway.answer("ctx", "q").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<RagError>(),
            Some(&RagError::Timeout {
                operation: format!("chat completion at {}", url),
                secs: 1,
            })
        );
    }
}
