//! HTTP Client
//!
//! Async transport for the messages endpoint, with error classification.

use crate::api::ApiErrorBody;
use crate::config::ClientConfig;
use crate::error::{ChatError, Result};
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;

/// Boxed byte stream of a streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// HTTP client bound to one endpoint and one API key
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Messages endpoint URL
    url: String,

    /// Authorization and content type
    headers: HeaderMap,

    /// Timeout for non-streaming requests
    timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| ChatError::Request(format!("Failed to create HTTP client: {}", e)))?;

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| ChatError::Request(format!("Invalid API key format: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            client,
            url: config.messages_url(),
            headers,
            timeout: config.timeout,
        })
    }

    /// Endpoint this client posts to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST a JSON body and decode the JSON response
    pub async fn post_json<T, R>(&self, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body_json = serde_json::to_string(body)
            .map_err(|e| ChatError::Request(format!("Failed to serialize request: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .body(body_json)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(500).collect();
            ChatError::Response(format!("{}. Body: {}", e, preview))
        })
    }

    /// POST a JSON body and return the response body as a byte stream
    pub async fn post_stream(&self, body: &impl Serialize) -> Result<ByteStream> {
        use async_stream::stream;
        use futures::StreamExt;

        let body_json = serde_json::to_string(body)
            .map_err(|e| ChatError::Request(format!("Failed to serialize request: {}", e)))?;

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .body(body_json)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(api_error(status, response).await);
        }

        let mut byte_stream = response.bytes_stream();
        let s = stream! {
            while let Some(chunk) = byte_stream.next().await {
                yield chunk.map_err(|e| ChatError::Stream(e.to_string()));
            }
        };

        Ok(Box::pin(s))
    }
}

/// Consume a non-success response into an API error
async fn api_error(status: StatusCode, response: Response) -> ChatError {
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);

    tracing::warn!(status = status.as_u16(), %message, "Request rejected by API");

    ChatError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Server-provided detail, falling back to the status text
fn error_message(status: StatusCode, body: &str) -> String {
    ApiErrorBody::parse_message(body)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
