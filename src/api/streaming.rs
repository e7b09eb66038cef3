//! Streaming Support
//!
//! Handles Server-Sent Events (SSE) streaming for messages. Network chunks are
//! not aligned with events, so the parser buffers the trailing partial line of
//! every chunk until its terminating newline arrives.

use crate::error::{ChatError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";
const CONTENT_BLOCK_DELTA: &str = "content_block_delta";

/// A parsed unit from the event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental fragment of generated text
    ContentDelta(String),

    /// Terminal marker; nothing after it is interpreted
    Done,

    /// Well-formed event of a type this client does not use
    Unknown,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    delta: Option<RawDelta>,
}

#[derive(Debug, Deserialize)]
struct RawDelta {
    #[serde(default)]
    text: Option<String>,
}

/// Parse a single SSE line.
///
/// Returns `Ok(None)` for blank lines and lines without the `data: ` prefix,
/// and an error when the payload is neither the done marker nor valid JSON.
pub fn parse_sse_line(line: &str) -> Result<Option<StreamEvent>> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        return Ok(None);
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    if payload.trim_end() == DONE_MARKER {
        return Ok(Some(StreamEvent::Done));
    }

    let raw: RawEvent = serde_json::from_str(payload).map_err(|e| {
        ChatError::Response(format!(
            "Failed to parse SSE payload: {}. Data: {}",
            e,
            preview(payload)
        ))
    })?;

    let text = raw.delta.and_then(|d| d.text).filter(|t| !t.is_empty());
    match (raw.kind.as_deref(), text) {
        (Some(CONTENT_BLOCK_DELTA), Some(text)) => Ok(Some(StreamEvent::ContentDelta(text))),
        _ => Ok(Some(StreamEvent::Unknown)),
    }
}

fn preview(payload: &str) -> String {
    payload.chars().take(200).collect()
}

/// Diagnostic counters kept while parsing a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Complete lines examined
    pub lines: usize,

    /// Events handed to the caller (content deltas and done)
    pub events: usize,

    /// Blank lines and non-data fields
    pub ignored: usize,

    /// Data lines whose payload could not be decoded
    pub malformed: usize,

    /// Decoded events of other types
    pub unknown: usize,
}

impl ParseStats {
    /// Log the counters once a stream has been consumed
    pub fn log(&self) {
        tracing::debug!(
            lines = self.lines,
            events = self.events,
            ignored = self.ignored,
            unknown = self.unknown,
            malformed = self.malformed,
            "Stream finished"
        );

        if self.malformed > 0 {
            tracing::warn!(
                malformed = self.malformed,
                "Skipped SSE lines that could not be decoded"
            );
        }
    }
}

/// Incremental SSE decoder
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline
    scanned: usize,
    done: bool,
    stats: ParseStats,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return the events it completes.
    ///
    /// Bytes after the last newline stay buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }

        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.scanned = 0;
            self.process_line(&line[..pos], &mut events);

            if self.done {
                self.buffer.clear();
                break;
            }
        }
        self.scanned = self.buffer.len();

        events
    }

    /// Flush an unterminated trailing line once the byte stream has ended
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;

        if !self.done && !line.is_empty() {
            self.process_line(&line, &mut events);
        }

        events
    }

    /// Whether the done marker has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    fn process_line(&mut self, bytes: &[u8], events: &mut Vec<StreamEvent>) {
        self.stats.lines += 1;

        let line = match std::str::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                self.stats.malformed += 1;
                tracing::debug!(error = %e, "Skipping SSE line with invalid UTF-8");
                return;
            }
        };

        match parse_sse_line(line) {
            Ok(None) => self.stats.ignored += 1,
            Ok(Some(StreamEvent::Unknown)) => self.stats.unknown += 1,
            Ok(Some(event)) => {
                if event == StreamEvent::Done {
                    self.done = true;
                }
                self.stats.events += 1;
                events.push(event);
            }
            Err(e) => {
                self.stats.malformed += 1;
                tracing::debug!(error = %e, "Skipping malformed SSE line");
            }
        }
    }
}

pin_project! {
    /// Lazy sequence of stream events read from a byte stream.
    ///
    /// Ends after yielding `Done`, when the byte stream ends, or after the
    /// first transport error.
    pub struct EventStream<S> {
        #[pin]
        inner: S,
        parser: SseParser,
        pending: VecDeque<StreamEvent>,
        finished: bool,
    }
}

impl<S> EventStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            parser: SseParser::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Parser counters so far
    pub fn stats(&self) -> ParseStats {
        self.parser.stats()
    }
}

impl<S> Stream for EventStream<S>
where
    S: Stream<Item = Result<Bytes>>,
{
    type Item = Result<StreamEvent>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }

            if *this.finished || this.parser.is_done() {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let events = this.parser.feed(&chunk);
                    this.pending.extend(events);
                }
                Some(Err(err)) => {
                    *this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                None => {
                    *this.finished = true;
                    let events = this.parser.finish();
                    this.pending.extend(events);
                }
            }
        }
    }
}

/// Accumulated text of a streamed response
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Concatenated content deltas
    pub content: String,

    /// Number of deltas applied
    pub deltas: usize,

    /// Set once the done marker was applied
    pub done: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event, returning the appended text for content deltas.
    ///
    /// Events after `Done` are ignored.
    pub fn push<'a>(&mut self, event: &'a StreamEvent) -> Option<&'a str> {
        if self.done {
            return None;
        }

        match event {
            StreamEvent::ContentDelta(text) => {
                self.content.push_str(text);
                self.deltas += 1;
                Some(text.as_str())
            }
            StreamEvent::Done => {
                self.done = true;
                None
            }
            StreamEvent::Unknown => None,
        }
    }

    pub fn into_text(self) -> String {
        self.content
    }
}

/// Drain an event stream, calling `on_delta` for each content delta in
/// arrival order, and return the accumulated text.
pub async fn accumulate<S, F>(events: &mut S, mut on_delta: F) -> Result<String>
where
    S: Stream<Item = Result<StreamEvent>> + Unpin + ?Sized,
    F: FnMut(&str),
{
    let mut acc = StreamAccumulator::new();

    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(text) = acc.push(&event) {
            on_delta(text);
        }
        if acc.done {
            break;
        }
    }

    Ok(acc.into_text())
}
