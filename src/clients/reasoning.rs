use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::ModelRequest;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, token: &str, request: &ModelRequest) -> Result<String, AppError>;
}

pub struct HttpReasoningClient {
    http: Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct CompletionCall<'a> {
    action: &'static str,
    data: CompletionData<'a>,
}

#[derive(Debug, Serialize)]
struct CompletionData<'a> {
    system: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionReply {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

impl HttpReasoningClient {
    pub fn new(endpoint: &str) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    async fn complete(&self, token: &str, request: &ModelRequest) -> Result<String, AppError> {
        let body = CompletionCall {
            action: request.intent.action(),
            data: CompletionData {
                system: &request.system_instruction,
                prompt: &request.user_prompt,
                temperature: request.temperature,
                max_tokens: request.max_output_tokens,
            },
        };

        tracing::debug!("Calling reasoning service, action: {}", body.action);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to call AI function: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Transport(format!("Failed to read AI response: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorReply>(&bytes)
                .map(|reply| reply.error)
                .unwrap_or_else(|_| format!("Reasoning service returned status {}", status));
            tracing::error!("Reasoning service call failed: {}", message);
            return Err(AppError::Transport(message));
        }

        let reply: CompletionReply = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Transport(format!("Invalid reasoning service reply: {}", e)))?;

        Ok(reply.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelIntent;
    use mockito::Matcher;
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest {
            intent: ModelIntent::AnswerQuestion,
            system_instruction: "You are a data analyst.".to_string(),
            user_prompt: "Who is the oldest?".to_string(),
            temperature: 0.7,
            max_output_tokens: 800,
        }
    }

    #[tokio::test]
    async fn sends_action_envelope_and_returns_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer tok-1")
            .match_body(Matcher::PartialJson(json!({
                "action": "query-data",
                "data": {
                    "system": "You are a data analyst.",
                    "prompt": "Who is the oldest?",
                    "max_tokens": 800,
                }
            })))
            .with_status(200)
            .with_body(r#"{"content":"Bob, at 31."}"#)
            .create_async()
            .await;

        let client = HttpReasoningClient::new(&server.url()).unwrap();
        let raw = client.complete("tok-1", &request()).await.unwrap();

        assert_eq!(raw, "Bob, at 31.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn surfaces_upstream_error_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .with_body(r#"{"error":"quota exceeded"}"#)
            .create_async()
            .await;

        let client = HttpReasoningClient::new(&server.url()).unwrap();
        let err = client.complete("tok-1", &request()).await.unwrap_err();

        match err {
            AppError::Transport(message) => assert_eq!(message, "quota exceeded"),
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn falls_back_to_status_when_error_body_is_unreadable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("gateway timeout")
            .create_async()
            .await;

        let client = HttpReasoningClient::new(&server.url()).unwrap();
        let err = client.complete("tok-1", &request()).await.unwrap_err();

        match err {
            AppError::Transport(message) => assert!(message.contains("503")),
            other => panic!("expected Transport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn rejects_success_reply_without_content() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("plain text, not the envelope")
            .create_async()
            .await;

        let client = HttpReasoningClient::new(&server.url()).unwrap();
        let err = client.complete("tok-1", &request()).await.unwrap_err();

        assert!(matches!(err, AppError::Transport(_)));
    }
}
