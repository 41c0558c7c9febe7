//! Per-call context describing who is calling and with which settings.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;

/// The host user a call is made on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Settings of the app instance the plugin runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInstanceSettings {
    /// Raw JSON configuration.
    pub json_data: Vec<u8>,
    /// Secrets, decrypted by the host.
    pub decrypted_secure_json_data: BTreeMap<String, String>,
    /// Last time the settings were changed.
    pub updated: SystemTime,
}

impl Default for AppInstanceSettings {
    fn default() -> Self {
        Self {
            json_data: Vec::new(),
            decrypted_secure_json_data: BTreeMap::new(),
            updated: UNIX_EPOCH,
        }
    }
}

impl AppInstanceSettings {
    /// Deserializes the JSON configuration.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.json_data)
    }
}

/// Settings of the data source a call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceInstanceSettings {
    pub id: i64,
    pub uid: String,
    /// Data source type; always the id of the plugin serving it.
    pub type_name: String,
    pub name: String,
    pub url: String,
    pub user: String,
    pub database: String,
    pub basic_auth_enabled: bool,
    pub basic_auth_user: String,
    pub json_data: Vec<u8>,
    pub decrypted_secure_json_data: BTreeMap<String, String>,
    pub updated: SystemTime,
}

impl Default for DataSourceInstanceSettings {
    fn default() -> Self {
        Self {
            id: 0,
            uid: String::new(),
            type_name: String::new(),
            name: String::new(),
            url: String::new(),
            user: String::new(),
            database: String::new(),
            basic_auth_enabled: false,
            basic_auth_user: String::new(),
            json_data: Vec::new(),
            decrypted_secure_json_data: BTreeMap::new(),
            updated: UNIX_EPOCH,
        }
    }
}

impl DataSourceInstanceSettings {
    /// Deserializes the JSON configuration.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.json_data)
    }
}

/// Context attached by the host to every call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginContext {
    /// Organisation the call belongs to.
    pub org_id: i64,
    /// Id of the plugin being called.
    pub plugin_id: String,
    /// Calling user, absent for system calls.
    pub user: Option<User>,
    pub app_instance_settings: Option<AppInstanceSettings>,
    pub data_source_instance_settings: Option<DataSourceInstanceSettings>,
}

impl PluginContext {
    /// Returns true when the host sent no context at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
