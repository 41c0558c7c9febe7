//! eve-plugin-transport - local RPC substrate between host and plugin.
//!
//! This crate provides:
//! - Length-delimited JSON framing ([`codec`])
//! - The plugin-side server with negotiation and per-call dispatch ([`RpcServer`])
//! - The host-side client stub ([`PluginClient`])
//! - Address announcement for spawned and attached plugins ([`announce`])

pub mod announce;
pub mod client;
pub mod codec;
pub mod server;

pub use announce::{AnnounceLine, ReattachConfig};
pub use client::{PluginClient, ResourceStream};
pub use codec::{
    Call, DEFAULT_MAX_RECEIVE_MESSAGE_SIZE, Message, MessageCodec, Reply, TransportSettings,
};
pub use server::{RpcServer, ServerConfig};

// Re-export for callers that drive `RpcServer::serve`.
pub use tokio_util::sync::CancellationToken;
