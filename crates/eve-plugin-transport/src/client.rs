//! Host-side client stub.
//!
//! Hosts (and tests) use [`PluginClient`] to negotiate with a running plugin
//! and issue calls. Several calls may be in flight at once; responses are
//! matched to callers by request id.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use eve_plugin_core::handshake::Hello;
use eve_plugin_core::{HandshakeConfig, HandshakeError, Status, TransportError, TransportResult, wire};

use crate::codec::{Call, Message, MessageCodec, Reply, TransportSettings};

enum StreamEvent {
    Frame(wire::CallResourceResponse),
    End(Option<Status>),
}

enum Pending {
    Unary(oneshot::Sender<Result<Reply, Status>>),
    Stream(mpsc::UnboundedSender<StreamEvent>),
}

type PendingMap = Arc<Mutex<HashMap<u64, Pending>>>;

/// Frames of one resource call, in the order the plugin produced them.
pub struct ResourceStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    done: bool,
}

impl ResourceStream {
    /// Returns the next frame, `None` once the call completed successfully.
    pub async fn next(&mut self) -> Option<TransportResult<wire::CallResourceResponse>> {
        if self.done {
            return None;
        }
        match self.rx.recv().await {
            Some(StreamEvent::Frame(frame)) => Some(Ok(frame)),
            Some(StreamEvent::End(None)) => {
                self.done = true;
                None
            }
            Some(StreamEvent::End(Some(status))) => {
                self.done = true;
                Some(Err(TransportError::Remote(status)))
            }
            None => {
                self.done = true;
                Some(Err(TransportError::closed("plugin connection closed mid-stream")))
            }
        }
    }

    /// Collects every frame, failing if the call ended with an error.
    pub async fn collect(mut self) -> TransportResult<Vec<wire::CallResourceResponse>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next().await {
            frames.push(frame?);
        }
        Ok(frames)
    }
}

/// A negotiated connection to a plugin.
pub struct PluginClient {
    tx: mpsc::Sender<Message>,
    pending: PendingMap,
    next_id: AtomicU64,
    capabilities: Vec<String>,
    reader: JoinHandle<()>,
}

impl PluginClient {
    /// Connects to `addr` and performs the handshake.
    pub async fn connect(
        addr: SocketAddr,
        handshake: &HandshakeConfig,
        settings: &TransportSettings,
    ) -> TransportResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let mut transport = Framed::new(stream, MessageCodec::new(settings));

        transport
            .send(Message::Hello(Hello::from_config(handshake)))
            .await?;
        let capabilities = match transport.next().await {
            Some(Ok(Message::HelloAck { capabilities })) => capabilities,
            Some(Ok(Message::HelloReject { reason })) => {
                return Err(HandshakeError::Rejected { reason }.into());
            }
            Some(Ok(other)) => {
                return Err(TransportError::UnexpectedMessage(format!("{other:?}")));
            }
            Some(Err(e)) => return Err(e),
            None => return Err(TransportError::closed("plugin closed during negotiation")),
        };
        debug!(addr = %addr, capabilities = ?capabilities, "Connected to plugin");

        let (mut sink, mut incoming) = transport.split();
        let (tx, mut rx) = mpsc::channel::<Message>(settings.outbound_buffer);
        tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!(error = %e, "Failed to send to plugin");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let reader_pending = Arc::clone(&pending);
        let reader = tokio::spawn(async move {
            while let Some(msg) = incoming.next().await {
                match msg {
                    Ok(Message::Response { id, result }) => {
                        if let Some(Pending::Unary(waiter)) = reader_pending.lock().remove(&id) {
                            let _ = waiter.send(result);
                        }
                    }
                    Ok(Message::StreamFrame { id, frame }) => {
                        if let Some(Pending::Stream(waiter)) = reader_pending.lock().get(&id) {
                            let _ = waiter.send(StreamEvent::Frame(frame));
                        }
                    }
                    Ok(Message::StreamEnd { id, error }) => {
                        if let Some(Pending::Stream(waiter)) = reader_pending.lock().remove(&id) {
                            let _ = waiter.send(StreamEvent::End(error));
                        }
                    }
                    Ok(other) => warn!(message = ?other, "Unexpected message from plugin"),
                    Err(e) => {
                        warn!(error = %e, "Failed to read from plugin");
                        break;
                    }
                }
            }
            reader_pending.lock().clear();
        });

        Ok(Self {
            tx,
            pending,
            next_id: AtomicU64::new(1),
            capabilities,
            reader,
        })
    }

    /// Capability names the plugin advertised.
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Starts a resource call.
    pub async fn call_resource(
        &self,
        request: wire::CallResourceRequest,
    ) -> TransportResult<ResourceStream> {
        let (events, rx) = mpsc::unbounded_channel();
        self.request(Call::CallResource(request), Pending::Stream(events))
            .await?;
        Ok(ResourceStream { rx, done: false })
    }

    pub async fn plugin_info(
        &self,
        request: wire::PluginInfoRequest,
    ) -> TransportResult<wire::PluginInfoResponse> {
        match self.unary(Call::PluginInfo(request)).await? {
            Reply::PluginInfo(resp) => Ok(resp),
            other => Err(mismatched(other)),
        }
    }

    pub async fn check_health(
        &self,
        request: wire::CheckHealthRequest,
    ) -> TransportResult<wire::CheckHealthResponse> {
        match self.unary(Call::CheckHealth(request)).await? {
            Reply::CheckHealth(resp) => Ok(resp),
            other => Err(mismatched(other)),
        }
    }

    pub async fn pub2channel(
        &self,
        request: wire::Pub2ChannelRequest,
    ) -> TransportResult<wire::Pub2ChannelResponse> {
        match self.unary(Call::Pub2Channel(request)).await? {
            Reply::Pub2Channel(resp) => Ok(resp),
            other => Err(mismatched(other)),
        }
    }

    pub async fn task_exec(&self, request: wire::TaskRequest) -> TransportResult<wire::TaskResponse> {
        match self.unary(Call::TaskExec(request)).await? {
            Reply::TaskExec(resp) => Ok(resp),
            other => Err(mismatched(other)),
        }
    }

    /// Asks the plugin to stop serving.
    pub async fn shutdown(&self) -> TransportResult<()> {
        self.tx
            .send(Message::Shutdown)
            .await
            .map_err(|_| TransportError::closed("plugin connection closed"))
    }

    async fn unary(&self, call: Call) -> TransportResult<Reply> {
        let (waiter, rx) = oneshot::channel();
        self.request(call, Pending::Unary(waiter)).await?;
        match rx.await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(status)) => Err(TransportError::Remote(status)),
            Err(_) => Err(TransportError::closed("plugin connection closed")),
        }
    }

    async fn request(&self, call: Call, pending: Pending) -> TransportResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(id, pending);
        if self.tx.send(Message::Request { id, call }).await.is_err() {
            self.pending.lock().remove(&id);
            return Err(TransportError::closed("plugin connection closed"));
        }
        Ok(())
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn mismatched(reply: Reply) -> TransportError {
    TransportError::UnexpectedMessage(format!("mismatched reply: {reply:?}"))
}
