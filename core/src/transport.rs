use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::errors::{AiError, TransportError};

/// One POST, one outcome. Retrying is the caller's job.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        url: &str,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError>;
}

/// reqwest-backed transport sharing a single pooled client across calls.
/// Connecting and each read are bounded separately; a slow but steady body is
/// allowed to finish.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .user_agent(concat!("AuditAI-Core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::configuration(format!("failed to construct HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        url: &str,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<Value, TransportError> {
        let mut request = self.client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(classify)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(TransportError::EmptyBody);
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Null) => Err(TransportError::EmptyBody),
            Ok(value @ Value::Object(_)) => Ok(value),
            Ok(_) => Err(TransportError::Decode(
                "expected a JSON object at the top level".to_string(),
            )),
            Err(e) => Err(TransportError::Decode(e.to_string())),
        }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::ConnectionRefused(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
