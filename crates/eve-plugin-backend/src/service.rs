//! Unary capability adapters: `info`, `realtime` and `task`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use eve_plugin_core::model::{
    CheckHealthRequest, CheckHealthResult, PluginInfoRequest, Pub2ChannelRequest, TaskRequest,
};
use eve_plugin_core::{InfoService, RealtimeService, Status, TaskService, wire};

use crate::handler::{CheckHealthHandler, PluginInfoHandler, Pub2ChannelHandler, TaskHandler};

fn internal(call: &'static str, error: anyhow::Error) -> Status {
    warn!(call, error = %error, "Handler failed");
    Status::internal(format!("{error:#}"))
}

/// Serves the `info` capability.
///
/// Without a health handler every check answers `OK` with an empty message.
pub struct InfoAdapter {
    info: Arc<dyn PluginInfoHandler>,
    health: Option<Arc<dyn CheckHealthHandler>>,
}

impl InfoAdapter {
    pub fn new(
        info: Arc<dyn PluginInfoHandler>,
        health: Option<Arc<dyn CheckHealthHandler>>,
    ) -> Self {
        Self { info, health }
    }
}

#[async_trait]
impl InfoService for InfoAdapter {
    async fn plugin_info(
        &self,
        request: wire::PluginInfoRequest,
    ) -> Result<wire::PluginInfoResponse, Status> {
        self.info
            .plugin_info(PluginInfoRequest::from(request))
            .await
            .map(Into::into)
            .map_err(|e| internal("plugin_info", e))
    }

    async fn check_health(
        &self,
        request: wire::CheckHealthRequest,
    ) -> Result<wire::CheckHealthResponse, Status> {
        let Some(health) = &self.health else {
            return Ok(CheckHealthResult::ok("").into());
        };
        health
            .check_health(CheckHealthRequest::from(request))
            .await
            .map(Into::into)
            .map_err(|e| internal("check_health", e))
    }
}

/// Serves the `realtime` capability.
pub struct RealtimeAdapter {
    handler: Arc<dyn Pub2ChannelHandler>,
}

impl RealtimeAdapter {
    pub fn new(handler: Arc<dyn Pub2ChannelHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl RealtimeService for RealtimeAdapter {
    async fn pub2channel(
        &self,
        request: wire::Pub2ChannelRequest,
    ) -> Result<wire::Pub2ChannelResponse, Status> {
        self.handler
            .pub2channel(Pub2ChannelRequest::from(request))
            .await
            .map(Into::into)
            .map_err(|e| internal("pub2channel", e))
    }
}

/// Serves the `task` capability.
pub struct TaskAdapter {
    handler: Arc<dyn TaskHandler>,
}

impl TaskAdapter {
    pub fn new(handler: Arc<dyn TaskHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl TaskService for TaskAdapter {
    async fn task_exec(&self, request: wire::TaskRequest) -> Result<wire::TaskResponse, Status> {
        self.handler
            .task_exec(TaskRequest::from(request))
            .await
            .map(Into::into)
            .map_err(|e| internal("task_exec", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::StaticPluginInfo;
    use eve_plugin_core::Code;
    use eve_plugin_core::model::{Pub2ChannelResponse, PubStatus, TaskResponse};

    #[tokio::test]
    async fn test_info_defaults() {
        let adapter = InfoAdapter::new(Arc::new(StaticPluginInfo::new("demo", "0.3.1")), None);
        let info = adapter
            .plugin_info(wire::PluginInfoRequest::default())
            .await
            .unwrap();
        assert_eq!(info.plugin_id, "demo");
        assert_eq!(info.plugin_version, "0.3.1");

        let health = adapter
            .check_health(wire::CheckHealthRequest::default())
            .await
            .unwrap();
        assert_eq!(health.status, wire::HealthStatus::Ok);
        assert!(health.message.is_empty());
    }

    #[tokio::test]
    async fn test_health_handler_error_is_internal() {
        let failing = |_req: CheckHealthRequest| async {
            Err::<CheckHealthResult, _>(anyhow::anyhow!("disk full"))
        };
        let adapter = InfoAdapter::new(
            Arc::new(StaticPluginInfo::default()),
            Some(Arc::new(failing)),
        );
        let status = adapter
            .check_health(wire::CheckHealthRequest::default())
            .await
            .unwrap_err();
        assert_eq!(status.code, Code::Internal);
        assert_eq!(status.message, "disk full");
    }

    #[tokio::test]
    async fn test_realtime_and_task_adapters() {
        let publish = |req: Pub2ChannelRequest| async move {
            Ok::<_, anyhow::Error>(Pub2ChannelResponse {
                status: PubStatus::Ok,
                message: req.channel,
                json_details: Vec::new(),
            })
        };
        let realtime = RealtimeAdapter::new(Arc::new(publish));
        let resp = realtime
            .pub2channel(wire::Pub2ChannelRequest {
                channel: "alerts".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.status, wire::PubStatus::Ok);
        assert_eq!(resp.message, "alerts");

        let run = |req: TaskRequest| async move {
            Ok::<_, anyhow::Error>(TaskResponse::success(format!("ran {}", req.task_name)))
        };
        let task = TaskAdapter::new(Arc::new(run));
        let resp = task
            .task_exec(wire::TaskRequest {
                task_name: "sync".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.status, wire::TaskStatus::Success);
        assert_eq!(resp.message, "ran sync");
    }
}
