//! Message source abstraction for signaling ingestion.
//!
//! Sources yield decoded [`SignalingMessage`]s: pre-loaded vectors (tests,
//! replays) and line-delimited JSON from any async reader (files, stdin).

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::types::SignalingMessage;

/// Events produced by a message source.
pub enum SourceEvent {
    Message(SignalingMessage),
    /// No more data (EOF for files and stdin).
    Eof,
}

/// Where signaling messages come from.
///
/// The processing loop calls [`next_message`](MessageSource::next_message)
/// in a `select!` with cancellation.
#[async_trait]
pub trait MessageSource: Send {
    /// Returns `SourceEvent::Eof` when no more data is available and `Err`
    /// on unrecoverable read errors.
    async fn next_message(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging
    fn source_name(&self) -> &str;
}

// ============================================================================
// Vec Source
// ============================================================================

/// Replays pre-loaded messages in order.
pub struct VecSource {
    messages: std::vec::IntoIter<SignalingMessage>,
}

impl VecSource {
    pub fn new(messages: Vec<SignalingMessage>) -> Self {
        Self {
            messages: messages.into_iter(),
        }
    }
}

#[async_trait]
impl MessageSource for VecSource {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        Ok(self
            .messages
            .next()
            .map_or(SourceEvent::Eof, SourceEvent::Message))
    }

    fn source_name(&self) -> &str {
        "vec"
    }
}

// ============================================================================
// JSON Lines Source
// ============================================================================

/// Reads one JSON `SignalingMessage` per line. Blank lines are ignored;
/// malformed lines are logged and skipped.
pub struct JsonLinesSource<R> {
    reader: R,
    name: String,
    line_buffer: String,
    line_no: u64,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_buffer: String::with_capacity(1024),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Lines dropped as unparseable so far.
    pub const fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl JsonLinesSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl JsonLinesSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open message file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file), path.display().to_string()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> MessageSource for JsonLinesSource<R> {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        loop {
            self.line_buffer.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line_buffer)
                .await
                .with_context(|| format!("Failed to read from {}", self.name))?;
            if bytes == 0 {
                return Ok(SourceEvent::Eof);
            }
            self.line_no += 1;
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SignalingMessage>(line) {
                Ok(msg) => return Ok(SourceEvent::Message(msg)),
                Err(e) => {
                    self.skipped += 1;
                    warn!(source = %self.name, line = self.line_no, error = %e, "Skipping malformed message");
                }
            }
        }
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
