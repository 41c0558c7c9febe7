//! Message framing.
//!
//! Every message is a big-endian `u32` length prefix followed by a JSON
//! document tagged by `type`:
//!
//! ```text
//! host                                plugin
//!  │ hello {protocol_version, cookie}    │
//!  │ ──────────────────────────────────▶ │
//!  │ hello_ack {capabilities}            │
//!  │ ◀────────────────────────────────── │
//!  │ request {id, call}                  │
//!  │ ──────────────────────────────────▶ │
//!  │ stream_frame {id, frame} ...        │   (resource calls)
//!  │ stream_end {id, error?}             │
//!  │ response {id, result}               │   (unary calls)
//!  │ ◀────────────────────────────────── │
//! ```

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use eve_plugin_core::handshake::Hello;
use eve_plugin_core::{Status, TransportError, TransportResult, wire};

/// Default upper bound on a received message: 16 MiB.
pub const DEFAULT_MAX_RECEIVE_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Limits and timeouts applied to every connection.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Largest message accepted from the peer.
    pub max_receive_message_size: usize,
    /// Largest message this side will send. `None` means unlimited.
    pub max_send_message_size: Option<usize>,
    /// How long a new connection may take to send its hello.
    pub handshake_timeout: Duration,
    /// Outbound queue depth per connection.
    pub outbound_buffer: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            max_receive_message_size: DEFAULT_MAX_RECEIVE_MESSAGE_SIZE,
            max_send_message_size: None,
            handshake_timeout: Duration::from_secs(10),
            outbound_buffer: 256,
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

/// A call issued by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload", rename_all = "snake_case")]
pub enum Call {
    CallResource(wire::CallResourceRequest),
    PluginInfo(wire::PluginInfoRequest),
    CheckHealth(wire::CheckHealthRequest),
    Pub2Channel(wire::Pub2ChannelRequest),
    TaskExec(wire::TaskRequest),
}

impl Call {
    /// Method name used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::CallResource(_) => "call_resource",
            Self::PluginInfo(_) => "plugin_info",
            Self::CheckHealth(_) => "check_health",
            Self::Pub2Channel(_) => "pub2channel",
            Self::TaskExec(_) => "task_exec",
        }
    }
}

/// Successful result of a unary call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload", rename_all = "snake_case")]
pub enum Reply {
    PluginInfo(wire::PluginInfoResponse),
    CheckHealth(wire::CheckHealthResponse),
    Pub2Channel(wire::Pub2ChannelResponse),
    TaskExec(wire::TaskResponse),
}

/// Everything that travels over a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Hello(Hello),
    HelloAck { capabilities: Vec<String> },
    HelloReject { reason: String },
    Request { id: u64, call: Call },
    Response { id: u64, result: Result<Reply, Status> },
    StreamFrame { id: u64, frame: wire::CallResourceResponse },
    StreamEnd { id: u64, error: Option<Status> },
    Shutdown,
}

// =============================================================================
// Codec
// =============================================================================

/// Length-delimited JSON codec for [`Message`].
#[derive(Debug)]
pub struct MessageCodec {
    inner: LengthDelimitedCodec,
    max_send: Option<usize>,
}

impl MessageCodec {
    pub fn new(settings: &TransportSettings) -> Self {
        let inner = LengthDelimitedCodec::builder()
            .max_frame_length(settings.max_receive_message_size)
            .new_codec();
        Self {
            inner,
            max_send: settings.max_send_message_size,
        }
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Message>, TransportError> {
        match self.inner.decode(src)? {
            Some(frame) => Ok(Some(serde_json::from_slice(&frame)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&item)?;
        check_size(payload.len(), self.max_send)?;
        self.inner.encode(Bytes::from(payload), dst)?;
        Ok(())
    }
}

fn check_size(size: usize, limit: Option<usize>) -> TransportResult<()> {
    match limit {
        Some(limit) if size > limit => Err(TransportError::MessageTooLarge { size, limit }),
        _ => Ok(()),
    }
}

/// Fails if `message` would exceed the send limit once encoded.
///
/// Lets a producer learn about an oversized message before it is queued
/// behind a connection's writer task.
pub(crate) fn ensure_sendable(message: &Message, limit: Option<usize>) -> TransportResult<()> {
    if limit.is_none() {
        return Ok(());
    }
    check_size(serde_json::to_vec(message)?.len(), limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tagging() {
        let msg = Message::Request {
            id: 9,
            call: Call::TaskExec(wire::TaskRequest {
                task_name: "cleanup".to_string(),
                ..Default::default()
            }),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "request");
        assert_eq!(json["call"]["method"], "task_exec");
        assert_eq!(json["call"]["payload"]["task_name"], "cleanup");
    }

    #[test]
    fn test_codec_frames_messages() {
        let mut codec = MessageCodec::new(&TransportSettings::default());
        let mut buf = BytesMut::new();
        codec.encode(Message::Shutdown, &mut buf).unwrap();
        codec
            .encode(
                Message::StreamEnd {
                    id: 1,
                    error: Some(Status::internal("boom")),
                },
                &mut buf,
            )
            .unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Message::Shutdown));
        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(second, Message::StreamEnd { id: 1, error: Some(_) }));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn test_send_limit() {
        let settings = TransportSettings {
            max_send_message_size: Some(8),
            ..Default::default()
        };
        let mut codec = MessageCodec::new(&settings);
        let mut buf = BytesMut::new();
        let err = codec
            .encode(
                Message::HelloReject {
                    reason: "far too long for the limit".to_string(),
                },
                &mut buf,
            )
            .unwrap_err();
        assert!(matches!(err, TransportError::MessageTooLarge { limit: 8, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_ensure_sendable() {
        let message = Message::HelloReject {
            reason: "far too long for the limit".to_string(),
        };
        assert!(ensure_sendable(&message, None).is_ok());
        assert!(ensure_sendable(&message, Some(1024)).is_ok());
        assert!(matches!(
            ensure_sendable(&message, Some(8)),
            Err(TransportError::MessageTooLarge { limit: 8, .. })
        ));
    }

    #[test]
    fn test_receive_limit() {
        let small = TransportSettings {
            max_receive_message_size: 16,
            ..Default::default()
        };
        let mut writer = MessageCodec::new(&TransportSettings::default());
        let mut reader = MessageCodec::new(&small);
        let mut buf = BytesMut::new();
        writer
            .encode(
                Message::HelloReject {
                    reason: "x".repeat(64),
                },
                &mut buf,
            )
            .unwrap();
        assert!(reader.decode(&mut buf).is_err());
    }
}
