//! Console Session
//!
//! Reads lines, dispatches commands, and prints responses. Transport errors
//! are reported and the loop keeps going; only console IO errors end it.

use crate::api::ConversationMessage;
use crate::error::{ChatError, Result};
use crate::repl::command::Command;
use crate::ChatClient;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

pub const CREDITS_URL: &str = "https://anyrouter.top/register";

const RULE_WIDTH: usize = 50;

const HELP_TEXT: &str = "
Available commands:
  - Type any message to chat with Claude
  - 'quit' or 'exit' - End the conversation
  - 'help' - Show this help message
  - 'models' - Show available models
  - 'credits' - Get free API credits
  - 'stream' - Toggle streaming mode (real-time responses)
";

const MODELS_TEXT: &str = "
Available Claude models:
  - claude-3-5-sonnet-20241022 (Latest, most advanced)
  - claude-3-opus-20240229 (Most capable)
  - claude-3-sonnet-20240229 (Balanced - default)
  - claude-3-haiku-20240307 (Fastest)
";

/// A console conversation bound to one client
pub struct Session<'a> {
    client: &'a ChatClient,
    streaming: bool,
}

impl<'a> Session<'a> {
    pub fn new(client: &'a ChatClient) -> Self {
        Self {
            client,
            streaming: false,
        }
    }

    /// Start with streaming mode on or off
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Run until the user quits or input ends
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        self.print_banner(out)?;
        let mut input = input;
        let mut buf = Vec::new();

        loop {
            write!(out, "You: ")?;
            out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                writeln!(out)?;
                writeln!(out, "Goodbye!")?;
                return Ok(());
            }

            // Console input is not guaranteed to be UTF-8.
            let line = String::from_utf8_lossy(&buf);

            match Command::parse(&line) {
                Command::Quit => {
                    writeln!(out, "Goodbye! Thanks for using AnyRouter Claude AI!")?;
                    return Ok(());
                }
                Command::Help => write!(out, "{}", HELP_TEXT)?,
                Command::Models => write!(out, "{}", MODELS_TEXT)?,
                Command::Credits => writeln!(out, "Get free API credits: {}", CREDITS_URL)?,
                Command::ToggleStream => {
                    self.streaming = !self.streaming;
                    let state = if self.streaming { "enabled" } else { "disabled" };
                    writeln!(out, "Streaming mode {}", state)?;
                }
                Command::Skip => {}
                Command::Message(text) => {
                    let result = if self.streaming {
                        self.stream_turn(&text, out).await
                    } else {
                        self.whole_turn(&text, out).await
                    };

                    match result {
                        Ok(()) => {}
                        Err(ChatError::Io(e)) => return Err(ChatError::Io(e)),
                        Err(e) => {
                            tracing::debug!(error = %e, "Turn failed");
                            writeln!(out)?;
                            writeln!(out, "Error: {}", e)?;
                            writeln!(out, "Try again or type 'quit' to exit.")?;
                            writeln!(out)?;
                        }
                    }
                }
            }
        }
    }

    fn print_banner<W: Write>(&self, out: &mut W) -> Result<()> {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(out)?;
        writeln!(out, "{}", rule)?;
        writeln!(out, "Claude AI Chat - Powered by AnyRouter")?;
        writeln!(out, "Model: {}", self.client.model())?;
        writeln!(out, "Type 'quit' or 'exit' to end the conversation")?;
        writeln!(out, "Type 'help' for more commands")?;
        writeln!(out, "{}", rule)?;
        writeln!(out)?;
        Ok(())
    }

    async fn whole_turn<W: Write>(&self, text: &str, out: &mut W) -> Result<()> {
        writeln!(out, "Claude is thinking...")?;
        out.flush()?;

        let reply = self.client.ask(text).await?;

        writeln!(out)?;
        writeln!(out, "Claude: {}", reply)?;
        writeln!(out)?;
        Ok(())
    }

    async fn stream_turn<W: Write>(&self, text: &str, out: &mut W) -> Result<()> {
        writeln!(out, "Claude is thinking...")?;
        write!(out, "Claude: ")?;
        out.flush()?;

        let mut write_err: Option<std::io::Error> = None;
        let messages = [ConversationMessage::user(text)];
        self.client
            .stream_message_with(&messages, |delta| {
                if write_err.is_none() {
                    if let Err(e) = write!(out, "{}", delta).and_then(|_| out.flush()) {
                        write_err = Some(e);
                    }
                }
            })
            .await?;

        if let Some(e) = write_err {
            return Err(e.into());
        }

        writeln!(out)?;
        writeln!(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use tokio::io::BufReader;

    fn client(base_url: &str) -> ChatClient {
        ChatClient::new(ClientConfig::new("test-key").with_base_url(base_url)).unwrap()
    }

    async fn run_session(client: &ChatClient, streaming: bool, input: &str) -> String {
        let mut out = Vec::new();
        Session::new(client)
            .with_streaming(streaming)
            .run(BufReader::new(input.as_bytes()), &mut out)
            .await
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_commands_without_network() {
        let client = client("http://127.0.0.1:1");
        let output = run_session(&client, false, "help\nmodels\n\ncredits\nquit\nignored\n").await;

        assert!(output.contains("Claude AI Chat - Powered by AnyRouter"));
        assert!(output.contains("'stream' - Toggle streaming mode"));
        assert!(output.contains("claude-3-haiku-20240307"));
        assert!(output.contains(CREDITS_URL));
        assert!(output.ends_with("Goodbye! Thanks for using AnyRouter Claude AI!\n"));
    }

    #[tokio::test]
    async fn test_toggle_stream() {
        let client = client("http://127.0.0.1:1");
        let mut session = Session::new(&client);
        let mut out = Vec::new();

        session
            .run(BufReader::new("stream\nexit\n".as_bytes()), &mut out)
            .await
            .unwrap();

        assert!(session.is_streaming());
        assert!(String::from_utf8(out).unwrap().contains("Streaming mode enabled"));
    }

    #[tokio::test]
    async fn test_eof_ends_session() {
        let client = client("http://127.0.0.1:1");
        let output = run_session(&client, false, "help\n").await;
        assert!(output.ends_with("Goodbye!\n"));
    }

    #[tokio::test]
    async fn test_message_whole_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "messages": [{"role": "user", "content": "Hello Claude"}]
            })))
            .with_status(200)
            .with_body(r#"{"content":[{"type":"text","text":"Hello human"}]}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let output = run_session(&client, false, "Hello Claude\nquit\n").await;

        assert!(output.contains("Claude is thinking..."));
        assert!(output.contains("Claude: Hello human\n"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_message_streamed_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({"stream": true})))
            .with_status(200)
            .with_body(concat!(
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi\"}}\n",
                "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\" there\"}}\n",
                "data: [DONE]\n",
            ))
            .create_async()
            .await;

        let client = client(&server.url());
        let output = run_session(&client, true, "Hello\nquit\n").await;

        assert!(output.contains("Claude is thinking...\nClaude: Hi there\n"));
    }

    #[tokio::test]
    async fn test_invalid_utf8_input_keeps_loop_running() {
        let client = client("http://127.0.0.1:1");
        let mut out = Vec::new();

        Session::new(&client)
            .run(BufReader::new(&b"caf\xe9\nhelp\nquit\n"[..]), &mut out)
            .await
            .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Error: Network error"));
        assert!(output.contains("Available commands:"));
        assert!(output.ends_with("Goodbye! Thanks for using AnyRouter Claude AI!\n"));
    }

    #[tokio::test]
    async fn test_write_failure_during_stream_ends_session() {
        /// Accepts everything except the streamed delta text
        struct RejectDelta(Vec<u8>);

        impl Write for RejectDelta {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if buf == b"Hi" {
                    return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed"));
                }
                self.0.extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi\"}}\ndata: [DONE]\n")
            .create_async()
            .await;

        let client = client(&server.url());
        let mut out = RejectDelta(Vec::new());
        let result = Session::new(&client)
            .with_streaming(true)
            .run(BufReader::new("Hello\nquit\n".as_bytes()), &mut out)
            .await;

        assert!(matches!(result, Err(ChatError::Io(_))));
        assert!(!String::from_utf8_lossy(&out.0).contains("Goodbye! Thanks"));
    }

    #[tokio::test]
    async fn test_error_keeps_loop_running() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"error":{"message":"invalid key"}}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let output = run_session(&client, false, "Hello\nhelp\nquit\n").await;

        assert!(output.contains("Error: API error 401: invalid key"));
        assert!(output.contains("Try again or type 'quit' to exit."));
        assert!(output.contains("Available commands:"));
        assert!(output.contains("Goodbye!"));
    }

    #[tokio::test]
    async fn test_network_error_is_reported() {
        let client = client("http://127.0.0.1:1");
        let output = run_session(&client, true, "Hello\nquit\n").await;

        assert!(output.contains("Error: Network error"));
    }
}
