//! AnyRouter Chat
//!
//! A small client for the AnyRouter messages API: request/response calls,
//! incremental SSE streaming, and a console conversation loop.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod repl;

use api::{accumulate, ChatRequest, ConversationMessage, EventStream, MessagesResponse};
use client::{ByteStream, HttpClient};
use config::ClientConfig;
use error::{ChatError, Result};

pub use api::StreamEvent;

/// The main chat client
pub struct ChatClient {
    /// Resolved configuration
    config: ClientConfig,

    /// HTTP client
    http_client: HttpClient,
}

impl ChatClient {
    /// Create a client from an explicit configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let http_client = HttpClient::new(&config)?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Model used for requests
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request(&self, messages: &[ConversationMessage]) -> ChatRequest {
        ChatRequest::new(
            self.config.model.clone(),
            self.config.max_tokens,
            messages.to_vec(),
        )
    }

    /// Send a conversation and wait for the complete response text
    pub async fn send_message(&self, messages: &[ConversationMessage]) -> Result<String> {
        let request = self.request(messages);
        tracing::debug!(
            url = self.http_client.url(),
            model = %request.model,
            messages = request.messages.len(),
            stream = false,
            "Sending message"
        );

        let response: MessagesResponse = self.http_client.post_json(&request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| ChatError::Response("response has no text content".to_string()))
    }

    /// Send a single user message
    pub async fn ask(&self, text: &str) -> Result<String> {
        self.send_message(&[ConversationMessage::user(text)]).await
    }

    /// Open a streaming response as a lazy sequence of events
    pub async fn stream_message(
        &self,
        messages: &[ConversationMessage],
    ) -> Result<EventStream<ByteStream>> {
        let request = self.request(messages).streaming();
        tracing::debug!(
            url = self.http_client.url(),
            model = %request.model,
            messages = request.messages.len(),
            stream = true,
            "Sending message"
        );

        let bytes = self.http_client.post_stream(&request).await?;
        Ok(EventStream::new(bytes))
    }

    /// Stream a response, calling `on_delta` for every text fragment in
    /// arrival order, and return the full text
    pub async fn stream_message_with<F>(
        &self,
        messages: &[ConversationMessage],
        on_delta: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let mut events = self.stream_message(messages).await?;
        let text = accumulate(&mut events, on_delta).await?;
        events.stats().log();
        Ok(text)
    }
}
