use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000/process";

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub endpoint: String,
    pub timeout_seconds: Option<u64>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Server returned status code {}", .0.as_u16())]
    Status(StatusCode),
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("malformed response body: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("could not start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl TransportError {
    pub fn is_connection_refused(&self) -> bool {
        match self {
            Self::Network(err) => err.is_connect(),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub result: Option<String>,
    pub base64: Option<String>,
}

impl Reply {
    pub fn from_json(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::default();
        };

        Self {
            result: object.get("result").and_then(field_text),
            base64: object.get("base64").and_then(field_text),
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Serialize, Debug)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build().map_err(TransportError::Client)?;

        Ok(Self { client, config })
    }

    pub async fn send(&self, prompt: &str) -> Result<Reply, TransportError> {
        tracing::info!(endpoint = %self.config.endpoint, "sending prompt");

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(&PromptRequest { prompt })
            .send()
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "request failed");
                TransportError::Network(err)
            })?;

        let status = resp.status();
        tracing::debug!(%status, "response received");
        if status != StatusCode::OK {
            tracing::warn!(%status, "endpoint answered with an error status");
            return Err(TransportError::Status(status));
        }

        let body = resp.bytes().await.map_err(TransportError::Network)?;
        let value: Value = serde_json::from_slice(&body).map_err(|err| {
            tracing::warn!(error = %err, "response body is not JSON");
            TransportError::MalformedBody(err)
        })?;

        Ok(Reply::from_json(&value))
    }
}
