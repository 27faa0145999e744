//! HTTP Transport Implementation
//!
//! Streaming chat over HTTP with reqwest.
//!
//! # Endpoint
//!
//! `POST {base_url}{stream_path}` with a JSON [`ChatRequest`] body and an
//! `Authorization: Bearer` header. The response body is a long-lived
//! `text/event-stream`; it is handed to the caller unparsed.
//!
//! No read timeout is set: replies may pause for a long time between
//! tokens. Only connection establishment is bounded.

use async_trait::async_trait;
use futures::StreamExt;

use super::traits::{ChatRequest, ChatTransport};
use crate::config::ClientConfig;
use crate::decoder::ByteStream;
use crate::error::TransportError;

/// HTTP transport for the streaming chat endpoint
#[derive(Clone, Debug)]
pub struct HttpTransport {
    /// Full URL of the streaming endpoint
    stream_url: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport from client settings
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("streamchat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self::with_client(config.stream_url(), http_client))
    }

    /// Create a transport with a preconfigured client
    pub fn with_client(stream_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            stream_url: stream_url.into(),
            http_client,
        }
    }

    /// The endpoint this transport posts to
    #[must_use]
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn open_stream(
        &self,
        request: &ChatRequest,
        bearer_token: &str,
    ) -> Result<ByteStream, TransportError> {
        let response = self
            .http_client
            .post(&self.stream_url)
            .bearer_auth(bearer_token)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body });
        }

        if response.status() == reqwest::StatusCode::NO_CONTENT {
            return Err(TransportError::MissingBody);
        }

        tracing::debug!(
            url = %self.stream_url,
            session_id = %request.session_id,
            "Chat stream opened"
        );

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Network(e.to_string())));

        Ok(Box::pin(stream))
    }
}
