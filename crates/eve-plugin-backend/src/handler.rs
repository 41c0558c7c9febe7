//! Handler traits implemented by plugin authors.
//!
//! Every handler returns [`anyhow::Result`]; errors are turned into an
//! `Internal` status on the way back to the host. All but
//! [`CallResourceHandler`] are also implemented for async closures:
//!
//! ```rust,ignore
//! let health = |_req: CheckHealthRequest| async { Ok(CheckHealthResult::ok("ready")) };
//! ```

use std::future::Future;

use async_trait::async_trait;

use eve_plugin_core::model::{
    CallResourceRequest, CheckHealthRequest, CheckHealthResult, PluginInfo, PluginInfoRequest,
    Pub2ChannelRequest, Pub2ChannelResponse, TaskRequest, TaskResponse,
};

use crate::writer::ResponseWriter;

/// Serves HTTP-like resource calls.
#[async_trait]
pub trait CallResourceHandler: Send + Sync {
    /// Handles one call, producing output through `writer`.
    ///
    /// The writer is closed by the caller after this returns, whether or not
    /// the handler failed.
    async fn call_resource(
        &self,
        request: &CallResourceRequest,
        writer: &mut ResponseWriter<'_>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait CheckHealthHandler: Send + Sync {
    async fn check_health(&self, request: CheckHealthRequest) -> anyhow::Result<CheckHealthResult>;
}

#[async_trait]
pub trait PluginInfoHandler: Send + Sync {
    async fn plugin_info(&self, request: PluginInfoRequest) -> anyhow::Result<PluginInfo>;
}

/// Publishes host messages to realtime channels.
#[async_trait]
pub trait Pub2ChannelHandler: Send + Sync {
    async fn pub2channel(&self, request: Pub2ChannelRequest)
    -> anyhow::Result<Pub2ChannelResponse>;
}

/// Runs scheduled tasks.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn task_exec(&self, request: TaskRequest) -> anyhow::Result<TaskResponse>;
}

// =============================================================================
// Closure Handlers
// =============================================================================

#[async_trait]
impl<F, Fut> CheckHealthHandler for F
where
    F: Fn(CheckHealthRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<CheckHealthResult>> + Send + 'static,
{
    async fn check_health(&self, request: CheckHealthRequest) -> anyhow::Result<CheckHealthResult> {
        (self)(request).await
    }
}

#[async_trait]
impl<F, Fut> PluginInfoHandler for F
where
    F: Fn(PluginInfoRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<PluginInfo>> + Send + 'static,
{
    async fn plugin_info(&self, request: PluginInfoRequest) -> anyhow::Result<PluginInfo> {
        (self)(request).await
    }
}

#[async_trait]
impl<F, Fut> Pub2ChannelHandler for F
where
    F: Fn(Pub2ChannelRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Pub2ChannelResponse>> + Send + 'static,
{
    async fn pub2channel(
        &self,
        request: Pub2ChannelRequest,
    ) -> anyhow::Result<Pub2ChannelResponse> {
        (self)(request).await
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(TaskRequest) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<TaskResponse>> + Send + 'static,
{
    async fn task_exec(&self, request: TaskRequest) -> anyhow::Result<TaskResponse> {
        (self)(request).await
    }
}

// =============================================================================
// Default Info
// =============================================================================

/// Answers plugin info requests with a fixed id and version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPluginInfo {
    pub plugin_id: String,
    pub plugin_version: String,
}

impl StaticPluginInfo {
    pub fn new(plugin_id: impl Into<String>, plugin_version: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            plugin_version: plugin_version.into(),
        }
    }
}

#[async_trait]
impl PluginInfoHandler for StaticPluginInfo {
    async fn plugin_info(&self, _request: PluginInfoRequest) -> anyhow::Result<PluginInfo> {
        Ok(PluginInfo {
            plugin_id: self.plugin_id.clone(),
            plugin_version: self.plugin_version.clone(),
        })
    }
}

/// Answers health checks with `OK` and a fixed message and JSON details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticHealth {
    message: String,
    json_details: Vec<u8>,
}

impl StaticHealth {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            json_details: Vec::new(),
        }
    }

    /// Serializes `details` as the health details payload.
    pub fn with_details<T: serde::Serialize + ?Sized>(
        mut self,
        details: &T,
    ) -> serde_json::Result<Self> {
        self.json_details = serde_json::to_vec(details)?;
        Ok(self)
    }
}

#[async_trait]
impl CheckHealthHandler for StaticHealth {
    async fn check_health(
        &self,
        _request: CheckHealthRequest,
    ) -> anyhow::Result<CheckHealthResult> {
        Ok(CheckHealthResult::ok(self.message.clone()).with_details(self.json_details.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eve_plugin_core::model::HealthStatus;

    #[tokio::test]
    async fn test_closure_handlers() {
        let health = |req: CheckHealthRequest| async move {
            Ok::<_, anyhow::Error>(CheckHealthResult::ok(format!(
                "{} headers",
                req.headers.len()
            )))
        };
        let result = health.check_health(CheckHealthRequest::default()).await.unwrap();
        assert_eq!(result.message, "0 headers");

        let task = |req: TaskRequest| async move {
            anyhow::ensure!(!req.task_name.is_empty(), "task name required");
            Ok(TaskResponse::success(req.task_name))
        };
        assert!(task.task_exec(TaskRequest::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_static_handlers() {
        let info = StaticPluginInfo::new("demo", "1.2.0");
        let got = info.plugin_info(PluginInfoRequest::default()).await.unwrap();
        assert_eq!(got.plugin_id, "demo");
        assert_eq!(got.plugin_version, "1.2.0");

        let health = StaticHealth::new("pong")
            .with_details(&serde_json::json!({"plugin_alias": "demo"}))
            .unwrap();
        let got = health.check_health(CheckHealthRequest::default()).await.unwrap();
        assert_eq!(got.status, HealthStatus::Ok);
        assert_eq!(got.message, "pong");
        let details: serde_json::Value = serde_json::from_slice(&got.json_details).unwrap();
        assert_eq!(details["plugin_alias"], "demo");
    }
}
