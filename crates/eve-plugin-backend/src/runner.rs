//! Convenience wrappers for the common shape of task and realtime handlers.
//!
//! A [`TaskRunner`] maps `Ok(message)` to `SUCCESS` and an error to `FAILED`
//! carrying the error text. A [`ChannelPublisher`] maps a JSON object to an
//! `OK` response with that object as details, and an error to `ERROR`.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use eve_plugin_core::model::{Pub2ChannelRequest, Pub2ChannelResponse, PubStatus, TaskRequest, TaskResponse};

use crate::handler::{Pub2ChannelHandler, TaskHandler};

/// Runs a named task on behalf of a user.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Returns a human-readable result message.
    async fn execute(&self, task_name: &str, user_id: i32, json_data: &[u8])
    -> anyhow::Result<String>;
}

/// Adapts a [`TaskExecutor`] into a [`TaskHandler`].
#[derive(Debug, Clone)]
pub struct TaskRunner<E>(pub E);

#[async_trait]
impl<E: TaskExecutor> TaskHandler for TaskRunner<E> {
    async fn task_exec(&self, request: TaskRequest) -> anyhow::Result<TaskResponse> {
        match self
            .0
            .execute(&request.task_name, request.user_id, &request.json_data)
            .await
        {
            Ok(message) => Ok(TaskResponse::success(message)),
            Err(e) => {
                warn!(task = %request.task_name, error = %e, "Task failed");
                Ok(TaskResponse::failed(format!("{e:#}")))
            }
        }
    }
}

/// Publishes data to a realtime channel.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    async fn publish(&self, channel: &str, data: &[u8]) -> anyhow::Result<Map<String, Value>>;
}

/// Adapts a [`ChannelPublisher`] into a [`Pub2ChannelHandler`].
#[derive(Debug, Clone)]
pub struct Publisher<P>(pub P);

#[async_trait]
impl<P: ChannelPublisher> Pub2ChannelHandler for Publisher<P> {
    async fn pub2channel(
        &self,
        request: Pub2ChannelRequest,
    ) -> anyhow::Result<Pub2ChannelResponse> {
        match self.0.publish(&request.channel, &request.data).await {
            Ok(details) => Ok(Pub2ChannelResponse {
                status: PubStatus::Ok,
                message: String::new(),
                json_details: serde_json::to_vec(&details)?,
            }),
            Err(e) => {
                warn!(channel = %request.channel, error = %e, "Publish failed");
                Ok(Pub2ChannelResponse {
                    status: PubStatus::Error,
                    message: format!("{e:#}"),
                    json_details: Vec::new(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eve_plugin_core::model::TaskStatus;

    struct Cleanup;

    #[async_trait]
    impl TaskExecutor for Cleanup {
        async fn execute(
            &self,
            task_name: &str,
            user_id: i32,
            json_data: &[u8],
        ) -> anyhow::Result<String> {
            anyhow::ensure!(user_id > 0, "no user for {task_name}");
            Ok(format!("{task_name}: {} bytes", json_data.len()))
        }
    }

    struct Echo;

    #[async_trait]
    impl ChannelPublisher for Echo {
        async fn publish(&self, channel: &str, data: &[u8]) -> anyhow::Result<Map<String, Value>> {
            anyhow::ensure!(!channel.is_empty(), "channel required");
            let mut details = Map::new();
            details.insert("channel".to_string(), channel.into());
            details.insert("len".to_string(), data.len().into());
            Ok(details)
        }
    }

    #[tokio::test]
    async fn test_task_runner_statuses() {
        let runner = TaskRunner(Cleanup);
        let ok = runner
            .task_exec(TaskRequest {
                task_name: "cleanup".to_string(),
                user_id: 7,
                json_data: b"{}".to_vec(),
            })
            .await
            .unwrap();
        assert_eq!(ok.status, TaskStatus::Success);
        assert_eq!(ok.message, "cleanup: 2 bytes");

        let failed = runner
            .task_exec(TaskRequest {
                task_name: "cleanup".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.message, "no user for cleanup");
    }

    #[tokio::test]
    async fn test_publisher_statuses() {
        let publisher = Publisher(Echo);
        let ok = publisher
            .pub2channel(Pub2ChannelRequest {
                channel: "news".to_string(),
                data: b"abc".to_vec(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ok.status, PubStatus::Ok);
        let details: Value = serde_json::from_slice(&ok.json_details).unwrap();
        assert_eq!(details["channel"], "news");
        assert_eq!(details["len"], 3);

        let err = publisher
            .pub2channel(Pub2ChannelRequest::default())
            .await
            .unwrap();
        assert_eq!(err.status, PubStatus::Error);
        assert_eq!(err.message, "channel required");
    }
}
