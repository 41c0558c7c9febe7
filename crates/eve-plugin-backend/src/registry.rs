//! Handler registration.
//!
//! [`Handlers`] collects whatever the plugin author supplies;
//! [`build_capabilities`] wraps each one in its adapter. `info` is always
//! served, falling back to [`StaticPluginInfo`] when no info handler is given.
//!
//! ```rust,ignore
//! let handlers = Handlers::new()
//!     .with_call_resource(HttpAdapter::new(router))
//!     .with_check_health(StaticHealth::new("pong"));
//! let capabilities = build_capabilities(handlers, "demo", "1.0.0");
//! ```

use std::fmt;
use std::sync::Arc;

use eve_plugin_core::{Capability, CapabilitySet};

use crate::handler::{
    CallResourceHandler, CheckHealthHandler, PluginInfoHandler, Pub2ChannelHandler,
    StaticPluginInfo, TaskHandler,
};
use crate::resource::ResourceAdapter;
use crate::service::{InfoAdapter, RealtimeAdapter, TaskAdapter};
use crate::writer::DeliveryObserver;

/// Handlers a plugin serves. Every slot is optional.
#[derive(Clone, Default)]
pub struct Handlers {
    pub call_resource: Option<Arc<dyn CallResourceHandler>>,
    pub check_health: Option<Arc<dyn CheckHealthHandler>>,
    pub plugin_info: Option<Arc<dyn PluginInfoHandler>>,
    pub pub2channel: Option<Arc<dyn Pub2ChannelHandler>>,
    pub task: Option<Arc<dyn TaskHandler>>,
    /// Observer for undeliverable resource frames. Logs when unset.
    pub delivery_observer: Option<Arc<dyn DeliveryObserver>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_call_resource(mut self, handler: impl CallResourceHandler + 'static) -> Self {
        self.call_resource = Some(Arc::new(handler));
        self
    }

    pub fn with_check_health(mut self, handler: impl CheckHealthHandler + 'static) -> Self {
        self.check_health = Some(Arc::new(handler));
        self
    }

    pub fn with_plugin_info(mut self, handler: impl PluginInfoHandler + 'static) -> Self {
        self.plugin_info = Some(Arc::new(handler));
        self
    }

    pub fn with_pub2channel(mut self, handler: impl Pub2ChannelHandler + 'static) -> Self {
        self.pub2channel = Some(Arc::new(handler));
        self
    }

    pub fn with_task(mut self, handler: impl TaskHandler + 'static) -> Self {
        self.task = Some(Arc::new(handler));
        self
    }

    pub fn with_delivery_observer(mut self, observer: impl DeliveryObserver + 'static) -> Self {
        self.delivery_observer = Some(Arc::new(observer));
        self
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("call_resource", &self.call_resource.is_some())
            .field("check_health", &self.check_health.is_some())
            .field("plugin_info", &self.plugin_info.is_some())
            .field("pub2channel", &self.pub2channel.is_some())
            .field("task", &self.task.is_some())
            .finish()
    }
}

/// Wraps every supplied handler in its capability adapter.
pub fn build_capabilities(handlers: Handlers, plugin_id: &str, version: &str) -> CapabilitySet {
    let Handlers {
        call_resource,
        check_health,
        plugin_info,
        pub2channel,
        task,
        delivery_observer,
    } = handlers;

    let plugin_info: Arc<dyn PluginInfoHandler> = match plugin_info {
        Some(handler) => handler,
        None => Arc::new(StaticPluginInfo::new(plugin_id, version)),
    };

    let resource = call_resource.map(|handler| {
        let adapter = ResourceAdapter::new(Some(handler));
        let adapter = match delivery_observer {
            Some(observer) => adapter.with_observer(observer),
            None => adapter,
        };
        Capability::Resource(Arc::new(adapter))
    });

    CapabilitySet::builder()
        .with(Capability::Info(Arc::new(InfoAdapter::new(
            plugin_info,
            check_health,
        ))))
        .with_optional(resource)
        .with_optional(pub2channel.map(|h| Capability::Realtime(Arc::new(RealtimeAdapter::new(h)))))
        .with_optional(task.map(|h| Capability::Task(Arc::new(TaskAdapter::new(h)))))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eve_plugin_core::CapabilityKind;
    use eve_plugin_core::model::{TaskRequest, TaskResponse};
    use eve_plugin_core::wire;

    #[tokio::test]
    async fn test_info_is_always_present() {
        let set = build_capabilities(Handlers::new(), "demo", "2.0.0");
        assert_eq!(set.names(), ["info"]);

        let info = set.info().unwrap();
        let resp = info
            .plugin_info(wire::PluginInfoRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.plugin_id, "demo");
        assert_eq!(resp.plugin_version, "2.0.0");
    }

    #[test]
    fn test_only_supplied_handlers_are_advertised() {
        let handlers = Handlers::new().with_task(|req: TaskRequest| async move {
            Ok::<_, anyhow::Error>(TaskResponse::success(req.task_name))
        });
        let set = build_capabilities(handlers, "demo", "1.0.0");

        assert!(set.contains(CapabilityKind::Task));
        assert!(set.contains(CapabilityKind::Info));
        assert!(!set.contains(CapabilityKind::Resource));
        assert!(!set.contains(CapabilityKind::Realtime));
        assert_eq!(set.names(), ["task", "info"]);
    }

    #[tokio::test]
    async fn test_custom_info_handler_wins() {
        let handlers =
            Handlers::new().with_plugin_info(StaticPluginInfo::new("custom", "9.9.9"));
        let set = build_capabilities(handlers, "demo", "1.0.0");
        let resp = set
            .info()
            .unwrap()
            .plugin_info(wire::PluginInfoRequest::default())
            .await
            .unwrap();
        assert_eq!(resp.plugin_id, "custom");
    }
}
