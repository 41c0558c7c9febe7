//! Wire representation of every message exchanged with the host.
//!
//! These types mirror the host's message schema field for field. Handler code
//! never sees them directly; the conversion layer in [`crate::convert`] maps
//! them to the SDK model in [`crate::model`]. Byte payloads are carried as
//! base64 strings inside JSON documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use crate::model::status::{HealthStatus, PubStatus, TaskStatus};

pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Plugin Context
// =============================================================================

/// Values of one multi-valued header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringList {
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInstanceSettings {
    #[serde(default, with = "base64_bytes")]
    pub json_data: Vec<u8>,
    #[serde(default)]
    pub decrypted_secure_json_data: BTreeMap<String, String>,
    #[serde(default)]
    pub last_updated_ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceInstanceSettings {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub basic_auth_enabled: bool,
    #[serde(default)]
    pub basic_auth_user: String,
    #[serde(default, with = "base64_bytes")]
    pub json_data: Vec<u8>,
    #[serde(default)]
    pub decrypted_secure_json_data: BTreeMap<String, String>,
    #[serde(default)]
    pub last_updated_ms: i64,
}

/// Context attached to every call the host makes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginContext {
    #[serde(default)]
    pub org_id: i64,
    #[serde(default)]
    pub plugin_id: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub app_instance_settings: Option<AppInstanceSettings>,
    #[serde(default)]
    pub data_source_instance_settings: Option<DataSourceInstanceSettings>,
}

// =============================================================================
// Resource
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResourceRequest {
    #[serde(default)]
    pub plugin_context: Option<PluginContext>,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, StringList>,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

/// One frame of a streamed resource response.
///
/// Only the first frame of a response carries a meaningful `code` and
/// `headers`; continuation frames carry body bytes with `code == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallResourceResponse {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub headers: BTreeMap<String, StringList>,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
}

// =============================================================================
// Health / Info
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHealthRequest {
    #[serde(default)]
    pub plugin_context: Option<PluginContext>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHealthResponse {
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, with = "base64_bytes")]
    pub json_details: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfoRequest {
    #[serde(default)]
    pub plugin_context: Option<PluginContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfoResponse {
    #[serde(default)]
    pub plugin_id: String,
    #[serde(default)]
    pub plugin_version: String,
}

// =============================================================================
// Realtime
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pub2ChannelRequest {
    #[serde(default)]
    pub plugin_context: Option<PluginContext>,
    #[serde(default)]
    pub channel: String,
    #[serde(default, with = "base64_bytes")]
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pub2ChannelResponse {
    #[serde(default)]
    pub status: PubStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, with = "base64_bytes")]
    pub json_details: Vec<u8>,
}

// =============================================================================
// Task
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    #[serde(default, with = "base64_bytes")]
    pub json_data: Vec<u8>,
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub user_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_travel_as_base64() {
        let frame = CallResourceResponse {
            code: 200,
            headers: BTreeMap::new(),
            body: b"hello".to_vec(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["body"], "aGVsbG8=");

        let back: CallResourceResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_status_enums_use_upper_case_names() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Ok).unwrap(),
            "\"OK\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Running).unwrap(),
            "\"RUNNING\""
        );
        let status: PubStatus = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(status, PubStatus::Error);
    }

    #[test]
    fn test_missing_fields_default() {
        let req: CallResourceRequest = serde_json::from_str(r#"{"path":"ping"}"#).unwrap();
        assert_eq!(req.path, "ping");
        assert!(req.plugin_context.is_none());
        assert!(req.body.is_empty());
    }
}
