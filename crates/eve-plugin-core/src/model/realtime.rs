//! Realtime publish and scheduled task types.

use crate::model::context::PluginContext;
use crate::model::status::{PubStatus, TaskStatus};

/// A message the host asks the plugin to publish on a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pub2ChannelRequest {
    pub plugin_context: PluginContext,
    pub channel: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pub2ChannelResponse {
    pub status: PubStatus,
    pub message: String,
    pub json_details: Vec<u8>,
}

/// A scheduled task run triggered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskRequest {
    pub json_data: Vec<u8>,
    pub task_name: String,
    pub user_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResponse {
    pub status: TaskStatus,
    pub message: String,
}

impl TaskResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Success,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            message: message.into(),
        }
    }
}
