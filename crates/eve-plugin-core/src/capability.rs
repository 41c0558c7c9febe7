//! Capability registry.
//!
//! A plugin exposes a closed set of capabilities to the host. Each capability
//! is backed by a server-side service trait operating on wire messages:
//!
//! | Kind | Trait | Calls |
//! |------|-------|-------|
//! | `resource` | [`ResourceService`] | `call_resource` (server streaming) |
//! | `realtime` | [`RealtimeService`] | `pub2channel` |
//! | `task` | [`TaskService`] | `task_exec` |
//! | `info` | [`InfoService`] | `plugin_info`, `check_health` |
//!
//! A [`CapabilitySet`] is assembled once at startup and shared read-only with
//! the transport afterwards. Absent capabilities are never advertised.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Status, TransportResult};
use crate::wire;

// =============================================================================
// Service Traits
// =============================================================================

/// Destination for the frames of one streamed resource response.
#[async_trait]
pub trait FrameSink: Send {
    /// Sends one frame to the caller, preserving call order.
    async fn send(&mut self, frame: wire::CallResourceResponse) -> TransportResult<()>;
}

/// Server side of the `resource` capability.
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// Handles one resource call, emitting response frames into `sink`.
    async fn call_resource(
        &self,
        request: wire::CallResourceRequest,
        sink: &mut dyn FrameSink,
    ) -> Result<(), Status>;
}

/// Server side of the `info` capability.
#[async_trait]
pub trait InfoService: Send + Sync {
    /// Returns the plugin identity.
    async fn plugin_info(
        &self,
        request: wire::PluginInfoRequest,
    ) -> Result<wire::PluginInfoResponse, Status>;

    /// Reports plugin health.
    async fn check_health(
        &self,
        request: wire::CheckHealthRequest,
    ) -> Result<wire::CheckHealthResponse, Status>;
}

/// Server side of the `realtime` capability.
#[async_trait]
pub trait RealtimeService: Send + Sync {
    async fn pub2channel(
        &self,
        request: wire::Pub2ChannelRequest,
    ) -> Result<wire::Pub2ChannelResponse, Status>;
}

/// Server side of the `task` capability.
#[async_trait]
pub trait TaskService: Send + Sync {
    async fn task_exec(&self, request: wire::TaskRequest) -> Result<wire::TaskResponse, Status>;
}

// =============================================================================
// Capability Kinds
// =============================================================================

/// The closed enumeration of capability names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CapabilityKind {
    Resource,
    Realtime,
    Task,
    Info,
}

impl CapabilityKind {
    /// Every kind, in advertisement order.
    pub const ALL: [Self; 4] = [Self::Resource, Self::Realtime, Self::Task, Self::Info];

    /// Returns the name advertised to the host.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Realtime => "realtime",
            Self::Task => "task",
            Self::Info => "info",
        }
    }

    /// Parses an advertised name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered capability server.
#[derive(Clone)]
pub enum Capability {
    Resource(Arc<dyn ResourceService>),
    Realtime(Arc<dyn RealtimeService>),
    Task(Arc<dyn TaskService>),
    Info(Arc<dyn InfoService>),
}

impl Capability {
    /// Returns the kind of this capability.
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Resource(_) => CapabilityKind::Resource,
            Self::Realtime(_) => CapabilityKind::Realtime,
            Self::Task(_) => CapabilityKind::Task,
            Self::Info(_) => CapabilityKind::Info,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.kind()).finish()
    }
}

// =============================================================================
// Capability Set
// =============================================================================

/// The capabilities a plugin serves, keyed by kind.
///
/// Built with [`CapabilitySetBuilder`]; immutable afterwards.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    entries: BTreeMap<CapabilityKind, Capability>,
}

impl CapabilitySet {
    /// Starts building a capability set.
    pub fn builder() -> CapabilitySetBuilder {
        CapabilitySetBuilder::default()
    }

    /// Returns the capability registered under `kind`.
    pub fn get(&self, kind: CapabilityKind) -> Option<&Capability> {
        self.entries.get(&kind)
    }

    /// Returns true when `kind` is served.
    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.entries.contains_key(&kind)
    }

    /// Advertised capability names.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().map(|k| k.as_str().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resource(&self) -> Option<&Arc<dyn ResourceService>> {
        match self.entries.get(&CapabilityKind::Resource) {
            Some(Capability::Resource(svc)) => Some(svc),
            _ => None,
        }
    }

    pub fn realtime(&self) -> Option<&Arc<dyn RealtimeService>> {
        match self.entries.get(&CapabilityKind::Realtime) {
            Some(Capability::Realtime(svc)) => Some(svc),
            _ => None,
        }
    }

    pub fn task(&self) -> Option<&Arc<dyn TaskService>> {
        match self.entries.get(&CapabilityKind::Task) {
            Some(Capability::Task(svc)) => Some(svc),
            _ => None,
        }
    }

    pub fn info(&self) -> Option<&Arc<dyn InfoService>> {
        match self.entries.get(&CapabilityKind::Info) {
            Some(Capability::Info(svc)) => Some(svc),
            _ => None,
        }
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Builder for [`CapabilitySet`].
#[derive(Default)]
pub struct CapabilitySetBuilder {
    entries: BTreeMap<CapabilityKind, Capability>,
}

impl CapabilitySetBuilder {
    /// Registers a capability, replacing any previous one of the same kind.
    pub fn with(mut self, capability: Capability) -> Self {
        self.entries.insert(capability.kind(), capability);
        self
    }

    /// Registers a capability when present.
    pub fn with_optional(self, capability: Option<Capability>) -> Self {
        match capability {
            Some(capability) => self.with(capability),
            None => self,
        }
    }

    pub fn build(self) -> CapabilitySet {
        CapabilitySet {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullTask;

    #[async_trait]
    impl TaskService for NullTask {
        async fn task_exec(
            &self,
            _request: wire::TaskRequest,
        ) -> Result<wire::TaskResponse, Status> {
            Ok(wire::TaskResponse::default())
        }
    }

    #[test]
    fn test_kind_names() {
        let names: Vec<_> = CapabilityKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["resource", "realtime", "task", "info"]);
        assert_eq!(
            CapabilityKind::from_name("realtime"),
            Some(CapabilityKind::Realtime)
        );
        assert_eq!(CapabilityKind::from_name("live"), None);
    }

    #[tokio::test]
    async fn test_set_only_advertises_registered() {
        let set = CapabilitySet::builder()
            .with_optional(Some(Capability::Task(Arc::new(NullTask))))
            .with_optional(None)
            .build();

        assert_eq!(set.names(), ["task"]);
        assert!(set.contains(CapabilityKind::Task));
        assert!(set.resource().is_none());

        let task = set.task().unwrap();
        let resp = task.task_exec(wire::TaskRequest::default()).await.unwrap();
        assert_eq!(resp, wire::TaskResponse::default());
    }
}
