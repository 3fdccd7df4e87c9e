//! The inference engine seen from the chat layer.
//!
//! [`ModelRunner`] is the only thing the orchestrator knows about a model:
//! hand it a composed prompt and sampling settings, get text back.
//! [`LlamaServerRunner`] implements it against the HTTP completion endpoint of
//! a llama.cpp server.

use crate::core::generation::GenerationSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Errors raised by an inference backend.
#[derive(Debug)]
pub enum RunnerError {
    /// The request never produced a response (connection refused, timeout).
    Transport(reqwest::Error),

    /// The engine answered with a non-success status.
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    InvalidResponse(String),

    /// The engine reported a failure of its own.
    Engine(String),
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Transport(err) => write!(f, "Could not reach the model server: {err}"),
            RunnerError::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "Model server returned HTTP {status}")
                } else {
                    write!(f, "Model server returned HTTP {status}: {body}")
                }
            }
            RunnerError::InvalidResponse(msg) => {
                write!(f, "Unexpected response from model server: {msg}")
            }
            RunnerError::Engine(msg) => write!(f, "Model error: {msg}"),
        }
    }
}

impl std::error::Error for RunnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunnerError::Transport(err) => Some(err),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ModelRunner: Send + Sync {
    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, RunnerError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    repeat_penalty: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
    stop: &'a [String],
    stream: bool,
}

impl<'a> CompletionRequest<'a> {
    fn new(prompt: &'a str, settings: &'a GenerationSettings) -> Self {
        let s = &settings.sampling;
        Self {
            prompt,
            n_predict: s.max_tokens,
            temperature: s.temperature,
            top_p: s.top_p,
            top_k: s.top_k,
            repeat_penalty: s.repeat_penalty,
            frequency_penalty: s.frequency_penalty,
            presence_penalty: s.presence_penalty,
            stop: &settings.stop,
            stream: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    tokens_predicted: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for a running llama.cpp server.
#[derive(Clone)]
pub struct LlamaServerRunner {
    client: Client,
    base_url: String,
}

impl LlamaServerRunner {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `true` once the server reports it has finished loading the model.
    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ModelRunner for LlamaServerRunner {
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<String, RunnerError> {
        let url = format!("{}/completion", self.base_url);
        let request = CompletionRequest::new(prompt, settings);
        debug!(
            prompt_chars = prompt.len(),
            n_predict = request.n_predict,
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(RunnerError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(RunnerError::Transport)?;

        if !status.is_success() {
            let body = serde_json::from_str::<ErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(RunnerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|err| RunnerError::InvalidResponse(err.to_string()))?;
        debug!(
            tokens = parsed.tokens_predicted.unwrap_or(0),
            "completion finished"
        );
        Ok(parsed.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one HTTP request with a canned response and hand back
    /// the raw request body.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = Vec::new();
            let mut chunk = [0u8; 4096];
            let request_body = loop {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break String::new();
                }
                buffer.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&buffer).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let headers = text[..header_end].to_ascii_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|value| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    let body_start = header_end + 4;
                    if buffer.len() >= body_start + content_length {
                        break String::from_utf8_lossy(
                            &buffer[body_start..body_start + content_length],
                        )
                        .to_string();
                    }
                }
            };
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request_body
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn sends_sampling_parameters_and_reads_content() {
        let (base_url, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"content":" Arr, matey!","tokens_predicted":4}"#,
        )
        .await;

        let runner = LlamaServerRunner::new(Client::new(), format!("{base_url}/"));
        let mut settings = GenerationSettings::default();
        settings.set("max_tokens", "64").unwrap();

        let text = runner.generate("User: hi\n\nAssistant: ", &settings).await.unwrap();
        assert_eq!(text, " Arr, matey!");

        let request: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(request["prompt"], "User: hi\n\nAssistant: ");
        assert_eq!(request["n_predict"], 64);
        assert_eq!(request["temperature"], 0.7);
        assert_eq!(request["stream"], false);
        assert_eq!(request["stop"][0], "User:");
    }

    #[tokio::test]
    async fn error_status_surfaces_server_message() {
        let (base_url, _server) = serve_once(
            "HTTP/1.1 500 Internal Server Error",
            r#"{"error":{"code":500,"message":"failed to allocate KV cache"}}"#,
        )
        .await;

        let runner = LlamaServerRunner::new(Client::new(), base_url);
        let err = runner
            .generate("prompt", &GenerationSettings::default())
            .await
            .unwrap_err();
        match err {
            RunnerError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "failed to allocate KV cache");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let (base_url, _server) = serve_once("HTTP/1.1 200 OK", r#"{"text":"nope"}"#).await;

        let runner = LlamaServerRunner::new(Client::new(), base_url);
        let err = runner
            .generate("prompt", &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let runner = LlamaServerRunner::new(Client::new(), format!("http://{addr}"));
        assert!(!runner.is_healthy().await);
        let err = runner
            .generate("prompt", &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Transport(_)));
    }
}
