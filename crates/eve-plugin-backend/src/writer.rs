//! Streaming response writer.
//!
//! A [`ResponseWriter`] turns handler output into response frames:
//!
//! ```text
//! Pending ──set_header/write_status/write──▶ Committed ──flush──▶ Streaming
//!                                              │                   │
//!                                              └──── close ────────┴──▶ (consumed)
//! ```
//!
//! - Headers and status are mutable only while `Pending`.
//! - The first flush always emits `{status, headers, body}`, even with an
//!   empty body. Later flushes emit body-only frames, and only when there is
//!   something buffered.
//! - Send failures go to a [`DeliveryObserver`] and never reach the handler.
//!
//! # Example
//!
//! ```rust,ignore
//! writer.set_header("Content-Type", "application/json");
//! writer.write_status(201);
//! writer.write(b"{}");
//! writer.flush().await;
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use eve_plugin_core::model::CallResourceResponse;
use eve_plugin_core::{Headers, TransportError, TransportResult};

use crate::sniff::{SNIFF_LEN, detect_content_type};

/// Status used when a handler writes without calling `write_status`.
pub const DEFAULT_STATUS: u16 = 200;

// =============================================================================
// Sender & Observer
// =============================================================================

/// Delivers finished frames to the caller.
#[async_trait]
pub trait ResponseSender: Send {
    async fn send(&mut self, response: CallResourceResponse) -> TransportResult<()>;
}

/// Notified when a frame could not be delivered.
pub trait DeliveryObserver: Send + Sync {
    fn delivery_failed(&self, error: &TransportError);
}

/// Default observer: logs every failed delivery.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDeliveryFailures;

impl DeliveryObserver for LogDeliveryFailures {
    fn delivery_failed(&self, error: &TransportError) {
        error!(error = %error, "Failed to send resource response");
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Where a writer is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterPhase {
    /// Nothing committed yet; headers and status may change.
    Pending,
    /// Status and headers are fixed but not sent.
    Committed,
    /// The header frame went out; only body frames follow.
    Streaming,
}

/// Per-call writer handed to resource handlers.
pub struct ResponseWriter<'a> {
    sender: &'a mut dyn ResponseSender,
    observer: Arc<dyn DeliveryObserver>,
    headers: Headers,
    buffer: Vec<u8>,
    status: u16,
    phase: WriterPhase,
}

impl<'a> ResponseWriter<'a> {
    /// Creates a writer that logs delivery failures.
    pub fn new(sender: &'a mut dyn ResponseSender) -> Self {
        Self::with_observer(sender, Arc::new(LogDeliveryFailures))
    }

    pub fn with_observer(
        sender: &'a mut dyn ResponseSender,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        Self {
            sender,
            observer,
            headers: Headers::new(),
            buffer: Vec::new(),
            status: DEFAULT_STATUS,
            phase: WriterPhase::Pending,
        }
    }

    /// Response headers as they stand.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Replaces a header. Ignored once the response is committed.
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        if self.phase == WriterPhase::Pending {
            self.headers.set(key, value);
        }
    }

    /// Appends a header value. Ignored once the response is committed.
    pub fn add_header(&mut self, key: &str, value: impl Into<String>) {
        if self.phase == WriterPhase::Pending {
            self.headers.add(key, value);
        }
    }

    /// Removes a header. Ignored once the response is committed.
    pub fn remove_header(&mut self, key: &str) {
        if self.phase == WriterPhase::Pending {
            let _ = self.headers.remove(key);
        }
    }

    /// Commits the status and current headers. Only the first call counts.
    pub fn write_status(&mut self, status: u16) {
        self.commit(status);
    }

    /// Buffers body bytes, committing with [`DEFAULT_STATUS`] if needed.
    ///
    /// Without an explicit `Content-Type` or `Transfer-Encoding`, the content
    /// type is sniffed from the first bytes written.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.phase == WriterPhase::Pending {
            if !self.headers.contains("Content-Type") && !self.headers.contains("Transfer-Encoding")
            {
                let sniffed = detect_content_type(&bytes[..bytes.len().min(SNIFF_LEN)]);
                self.headers.set("Content-Type", sniffed);
            }
            self.commit(DEFAULT_STATUS);
        }
        self.buffer.extend_from_slice(bytes);
        bytes.len()
    }

    /// Emits buffered output as one frame.
    pub async fn flush(&mut self) {
        let frame = match self.phase {
            WriterPhase::Pending | WriterPhase::Committed => {
                self.commit(DEFAULT_STATUS);
                self.phase = WriterPhase::Streaming;
                CallResourceResponse {
                    status: self.status,
                    headers: self.headers.clone(),
                    body: std::mem::take(&mut self.buffer),
                }
            }
            WriterPhase::Streaming => {
                if self.buffer.is_empty() {
                    return;
                }
                CallResourceResponse::continuation(std::mem::take(&mut self.buffer))
            }
        };

        if let Err(e) = self.sender.send(frame).await {
            self.observer.delivery_failed(&e);
        }
    }

    /// Flushes what is left and ends the response.
    pub async fn close(mut self) {
        self.flush().await;
    }

    /// Committed status, or [`DEFAULT_STATUS`] before commit.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn phase(&self) -> WriterPhase {
        self.phase
    }

    /// Bytes written but not flushed yet.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn commit(&mut self, status: u16) {
        if self.phase == WriterPhase::Pending {
            self.status = status;
            self.phase = WriterPhase::Committed;
        }
    }
}

impl fmt::Debug for ResponseWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("phase", &self.phase)
            .field("headers", &self.headers)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records frames, optionally failing every send.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub frames: Vec<CallResourceResponse>,
        pub fail: bool,
    }

    #[async_trait]
    impl ResponseSender for RecordingSender {
        async fn send(&mut self, response: CallResourceResponse) -> TransportResult<()> {
            if self.fail {
                return Err(TransportError::closed("peer went away"));
            }
            self.frames.push(response);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingObserver(AtomicUsize);

    impl DeliveryObserver for CountingObserver {
        fn delivery_failed(&self, _error: &TransportError) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_single_write_sniffs_and_closes() {
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        assert_eq!(writer.write(b"hello"), 5);
        writer.close().await;

        assert_eq!(sender.frames.len(), 1);
        let frame = &sender.frames[0];
        assert_eq!(frame.status, 200);
        assert_eq!(
            frame.headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(frame.body, b"hello");
    }

    #[tokio::test]
    async fn test_explicit_status_and_stream() {
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        writer.set_header("Content-Type", "application/json");
        writer.write_status(201);
        writer.write(b"{}");
        writer.flush().await;
        writer.write(b"x");
        writer.close().await;

        assert_eq!(sender.frames.len(), 2);
        assert_eq!(sender.frames[0].status, 201);
        assert_eq!(
            sender.frames[0].headers.get("Content-Type"),
            Some("application/json")
        );
        assert_eq!(sender.frames[0].body, b"{}");
        assert!(sender.frames[1].is_continuation());
        assert!(sender.frames[1].headers.is_empty());
        assert_eq!(sender.frames[1].body, b"x");
    }

    #[tokio::test]
    async fn test_close_without_output_sends_header_frame() {
        let mut sender = RecordingSender::default();
        let writer = ResponseWriter::new(&mut sender);
        writer.close().await;

        assert_eq!(sender.frames.len(), 1);
        assert_eq!(sender.frames[0].status, 200);
        assert!(sender.frames[0].headers.is_empty());
        assert!(sender.frames[0].body.is_empty());
    }

    #[tokio::test]
    async fn test_header_commit_is_idempotent() {
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        writer.set_header("X-Before", "1");
        writer.write_status(404);
        writer.write_status(500);
        writer.set_header("X-After", "2");
        writer.add_header("X-Before", "3");
        writer.remove_header("X-Before");
        writer.write(b"missing");
        assert_eq!(writer.phase(), WriterPhase::Committed);
        writer.close().await;

        let frame = &sender.frames[0];
        assert_eq!(frame.status, 404);
        assert_eq!(frame.headers.get_all("X-Before"), ["1".to_string()]);
        assert!(!frame.headers.contains("X-After"));
        // Committed before the write, so nothing was sniffed.
        assert!(!frame.headers.contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_empty_flush_after_header_is_silent() {
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        writer.flush().await;
        writer.flush().await;
        writer.close().await;
        assert_eq!(sender.frames.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_encoding_skips_sniffing() {
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        writer.set_header("Transfer-Encoding", "chunked");
        writer.write(b"<html>");
        writer.close().await;
        assert!(!sender.frames[0].headers.contains("Content-Type"));
    }

    #[tokio::test]
    async fn test_send_failure_is_observed_not_raised() {
        let observer = Arc::new(CountingObserver::default());
        let mut sender = RecordingSender {
            fail: true,
            ..Default::default()
        };
        let mut writer = ResponseWriter::with_observer(&mut sender, observer.clone());
        writer.write(b"a");
        writer.flush().await;
        writer.write(b"b");
        writer.close().await;

        assert_eq!(observer.0.load(Ordering::SeqCst), 2);
        assert!(sender.frames.is_empty());
    }
}
