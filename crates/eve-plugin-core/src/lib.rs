//! eve-plugin-core - contracts shared by plugin and host.
//!
//! This crate provides:
//! - The handshake contract (`HANDSHAKE`, [`handshake::Hello`])
//! - The wire schema ([`wire`]) and handler model ([`model`])
//! - The conversion layer between them ([`convert`])
//! - The capability registry ([`CapabilitySet`]) and service traits
//! - The error taxonomy shared by all crates ([`TransportError`], [`Status`])

pub mod capability;
pub mod convert;
pub mod error;
pub mod handshake;
pub mod headers;
pub mod model;
pub mod wire;

pub use capability::{
    Capability, CapabilityKind, CapabilitySet, CapabilitySetBuilder, FrameSink, InfoService,
    RealtimeService, ResourceService, TaskService,
};
pub use error::{Code, HandshakeError, Status, TransportError, TransportResult};
pub use handshake::{
    HANDSHAKE, HandshakeConfig, Hello, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE, PROTOCOL_VERSION,
};
pub use headers::{Headers, canonical_header_key};
