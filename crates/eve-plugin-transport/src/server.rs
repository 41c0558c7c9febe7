//! Plugin-side RPC server.
//!
//! The server owns one TCP listener bound to a loopback address. Every
//! accepted connection goes through the same steps:
//!
//! 1. **Negotiation**: the first message must be a [`Hello`] matching the
//!    handshake contract, otherwise the connection is rejected and closed
//!    before any capability is visible.
//! 2. **Dispatch**: each request runs on its own task. Resource calls stream
//!    [`Message::StreamFrame`]s followed by one [`Message::StreamEnd`]; unary
//!    calls answer with one [`Message::Response`].
//! 3. **Ordered output**: all outbound messages of a connection go through a
//!    single writer task fed by one FIFO channel, so frames of one response
//!    keep the order in which the handler produced them.
//!
//! # Example
//!
//! ```rust,ignore
//! let server = RpcServer::bind("127.0.0.1:0", capabilities, ServerConfig::default()).await?;
//! println!("{}", server.announce_line());
//! server.serve(CancellationToken::new()).await?;
//! ```

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use eve_plugin_core::handshake::Hello;
use eve_plugin_core::{
    CapabilityKind, CapabilitySet, FrameSink, HANDSHAKE, HandshakeConfig, Status, TransportError,
    TransportResult, wire,
};

use crate::announce::{AnnounceLine, ReattachConfig};
use crate::codec::{Call, Message, MessageCodec, Reply, TransportSettings, ensure_sendable};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Contract every connecting host must satisfy.
    pub handshake: HandshakeConfig,
    /// Limits applied to every connection.
    pub settings: TransportSettings,
    /// Stop serving once a negotiated host connection closes.
    pub exit_on_disconnect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handshake: HANDSHAKE,
            settings: TransportSettings::default(),
            exit_on_disconnect: false,
        }
    }
}

struct Shared {
    handshake: HandshakeConfig,
    capabilities: Arc<CapabilitySet>,
    settings: TransportSettings,
}

/// How a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    Rejected,
    Closed,
    ShutdownRequested,
    Cancelled,
}

/// A bound, not yet serving, RPC server.
pub struct RpcServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    exit_on_disconnect: bool,
}

impl RpcServer {
    /// Binds the listener. Use port `0` to let the OS pick one.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        capabilities: Arc<CapabilitySet>,
        config: ServerConfig,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        debug!(addr = %local_addr, capabilities = ?capabilities, "RPC listener bound");

        Ok(Self {
            listener,
            local_addr,
            shared: Arc::new(Shared {
                handshake: config.handshake,
                capabilities,
                settings: config.settings,
            }),
            exit_on_disconnect: config.exit_on_disconnect,
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The line to print on stdout for a host that spawned this process.
    pub fn announce_line(&self) -> AnnounceLine {
        AnnounceLine::new(self.shared.handshake.protocol_version, self.local_addr)
    }

    /// The address record to hand to a host in debug mode.
    pub fn reattach_config(&self) -> ReattachConfig {
        ReattachConfig::current(self.local_addr)
    }

    /// Accepts connections until `shutdown` is cancelled.
    ///
    /// A `Shutdown` message from a host cancels `shutdown`. With
    /// `exit_on_disconnect`, so does the close of a negotiated connection.
    pub async fn serve(self, shutdown: CancellationToken) -> TransportResult<()> {
        info!(addr = %self.local_addr, "RPC server listening");
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!(addr = %self.local_addr, "RPC server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    debug!(peer = %peer, "Accepted connection");

                    let shared = Arc::clone(&self.shared);
                    let server_token = shutdown.clone();
                    let exit_on_disconnect = self.exit_on_disconnect;
                    connections.spawn(async move {
                        let end = handle_connection(stream, peer, shared, server_token.child_token())
                            .await
                            .unwrap_or_else(|e| {
                                warn!(peer = %peer, error = %e, "Connection failed");
                                ConnectionEnd::Closed
                            });
                        debug!(peer = %peer, end = ?end, "Connection finished");

                        match end {
                            ConnectionEnd::ShutdownRequested => {
                                info!(peer = %peer, "Host requested shutdown");
                                server_token.cancel();
                            }
                            ConnectionEnd::Closed if exit_on_disconnect => {
                                info!(peer = %peer, "Host disconnected");
                                server_token.cancel();
                            }
                            _ => {}
                        }
                    });
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(error = %e, "Connection task panicked");
                    }
                }
            }
        }

        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

// =============================================================================
// Connection Handling
// =============================================================================

type Transport = Framed<TcpStream, MessageCodec>;

async fn negotiate(
    transport: &mut Transport,
    peer: SocketAddr,
    shared: &Shared,
) -> TransportResult<Option<Hello>> {
    let first = tokio::time::timeout(shared.settings.handshake_timeout, transport.next()).await;
    let reason = match first {
        Ok(Some(Ok(Message::Hello(hello)))) => match shared.handshake.verify_hello(&hello) {
            Ok(()) => return Ok(Some(hello)),
            Err(e) => e.to_string(),
        },
        Ok(Some(Ok(_))) => "expected hello as the first message".to_string(),
        Ok(Some(Err(e))) => return Err(e),
        Ok(None) => return Ok(None),
        Err(_) => "timed out waiting for hello".to_string(),
    };

    warn!(peer = %peer, reason = %reason, "Rejecting host connection");
    transport.send(Message::HelloReject { reason }).await?;
    Ok(None)
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    token: CancellationToken,
) -> TransportResult<ConnectionEnd> {
    stream.set_nodelay(true)?;
    let mut transport = Framed::new(stream, MessageCodec::new(&shared.settings));

    let Some(hello) = negotiate(&mut transport, peer, &shared).await? else {
        let _ = transport.close().await;
        return Ok(ConnectionEnd::Rejected);
    };

    let capabilities = shared.capabilities.names();
    transport
        .send(Message::HelloAck {
            capabilities: capabilities.clone(),
        })
        .await?;
    info!(
        peer = %peer,
        protocol_version = hello.protocol_version,
        capabilities = ?capabilities,
        "Host connected"
    );

    let (mut sink, mut incoming) = transport.split();
    let (tx, mut rx) = mpsc::channel::<Message>(shared.settings.outbound_buffer);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match sink.send(msg).await {
                Ok(()) => {}
                Err(e @ TransportError::MessageTooLarge { .. }) => {
                    error!(error = %e, "Dropping oversized outbound message");
                }
                Err(e) => {
                    debug!(error = %e, "Outbound stream closed");
                    break;
                }
            }
        }
        let _ = sink.close().await;
    });

    let mut calls = JoinSet::new();
    let end = loop {
        tokio::select! {
            () = token.cancelled() => break ConnectionEnd::Cancelled,
            next = incoming.next() => match next {
                Some(Ok(Message::Request { id, call })) => {
                    let span = debug_span!("call", id = id, method = call.method());
                    calls.spawn(
                        dispatch(
                            id,
                            call,
                            Arc::clone(&shared.capabilities),
                            tx.clone(),
                            shared.settings.max_send_message_size,
                        )
                        .instrument(span),
                    );
                }
                Some(Ok(Message::Shutdown)) => break ConnectionEnd::ShutdownRequested,
                Some(Ok(other)) => {
                    warn!(peer = %peer, message = ?other, "Ignoring unexpected message");
                }
                Some(Err(e)) => {
                    warn!(peer = %peer, error = %e, "Failed to read from host");
                    break ConnectionEnd::Closed;
                }
                None => break ConnectionEnd::Closed,
            },
            Some(_) = calls.join_next(), if !calls.is_empty() => {}
        }
    };

    if end == ConnectionEnd::ShutdownRequested {
        while calls.join_next().await.is_some() {}
    } else {
        calls.shutdown().await;
    }
    drop(tx);
    let _ = writer.await;
    Ok(end)
}

// =============================================================================
// Dispatch
// =============================================================================

/// Forwards resource frames into the connection's outbound queue.
///
/// Oversized frames are refused here, where the caller still sees the error.
struct ChannelSink {
    id: u64,
    tx: mpsc::Sender<Message>,
    max_send: Option<usize>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: wire::CallResourceResponse) -> TransportResult<()> {
        let message = Message::StreamFrame { id: self.id, frame };
        ensure_sendable(&message, self.max_send)?;
        self.tx
            .send(message)
            .await
            .map_err(|_| TransportError::closed("host connection closed"))
    }
}

fn not_registered(kind: CapabilityKind) -> Status {
    Status::unimplemented(format!("capability '{kind}' is not registered"))
}

fn panicked() -> Status {
    Status::internal("handler panicked")
}

async fn dispatch(
    id: u64,
    call: Call,
    capabilities: Arc<CapabilitySet>,
    tx: mpsc::Sender<Message>,
    max_send: Option<usize>,
) {
    debug!("Dispatching call");
    let outcome = match call {
        Call::CallResource(request) => {
            let error = match capabilities.resource() {
                None => Some(not_registered(CapabilityKind::Resource)),
                Some(service) => {
                    let mut sink = ChannelSink {
                        id,
                        tx: tx.clone(),
                        max_send,
                    };
                    let call = service.call_resource(request, &mut sink);
                    match AssertUnwindSafe(call).catch_unwind().await {
                        Ok(Ok(())) => None,
                        Ok(Err(status)) => Some(status),
                        Err(_) => Some(panicked()),
                    }
                }
            };
            Message::StreamEnd { id, error }
        }
        unary => {
            let call = unary_call(&capabilities, unary);
            let result = AssertUnwindSafe(call)
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(panicked()));
            Message::Response { id, result }
        }
    };

    if let Message::StreamEnd { error: Some(e), .. } | Message::Response { result: Err(e), .. } =
        &outcome
    {
        warn!(code = %e.code, error = %e.message, "Call failed");
    }
    if tx.send(outcome).await.is_err() {
        debug!("Connection closed before the call completed");
    }
}

async fn unary_call(capabilities: &CapabilitySet, call: Call) -> Result<Reply, Status> {
    match call {
        Call::PluginInfo(req) => {
            let info = capabilities
                .info()
                .ok_or_else(|| not_registered(CapabilityKind::Info))?;
            Ok(Reply::PluginInfo(info.plugin_info(req).await?))
        }
        Call::CheckHealth(req) => {
            let info = capabilities
                .info()
                .ok_or_else(|| not_registered(CapabilityKind::Info))?;
            Ok(Reply::CheckHealth(info.check_health(req).await?))
        }
        Call::Pub2Channel(req) => {
            let realtime = capabilities
                .realtime()
                .ok_or_else(|| not_registered(CapabilityKind::Realtime))?;
            Ok(Reply::Pub2Channel(realtime.pub2channel(req).await?))
        }
        Call::TaskExec(req) => {
            let task = capabilities
                .task()
                .ok_or_else(|| not_registered(CapabilityKind::Task))?;
            Ok(Reply::TaskExec(task.task_exec(req).await?))
        }
        Call::CallResource(_) => Err(Status::invalid_argument(
            "call_resource must be issued as a streaming call",
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
