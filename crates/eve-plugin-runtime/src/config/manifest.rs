//! The plugin manifest (`plugin.json`).
//!
//! The manifest names the plugin and lists its backend routes. Fields this
//! crate does not interpret (frontend routes and the like) are kept verbatim
//! in [`PluginManifest::extra`] so they survive a round trip.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::{ConfigError, ConfigResult};
use super::schema::PluginSection;

/// Parsed `plugin.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin id.
    #[serde(default)]
    pub plugin_alias: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub backend_debug: bool,
    #[serde(default)]
    pub backend_routes: Vec<BackendRoute>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A backend route the host exposes for this plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRoute {
    pub path: String,
    #[serde(default)]
    pub remark: String,
    #[serde(default, rename = "needAuth")]
    pub need_auth: bool,
}

impl PluginManifest {
    pub fn from_json(bytes: &[u8]) -> ConfigResult<Self> {
        let manifest: Self = serde_json::from_slice(bytes)?;
        if manifest.plugin_alias.is_empty() {
            return Err(ConfigError::missing_field("plugin_alias"));
        }
        Ok(manifest)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Self::from_json(&std::fs::read(path)?)
    }

    /// The `plugin` configuration section this manifest describes.
    pub fn plugin_section(&self) -> PluginSection {
        PluginSection {
            id: self.plugin_alias.clone(),
            version: self.version.clone(),
            debug: self.backend_debug,
        }
    }

    /// Details reported by the default health check.
    pub fn health_details(&self) -> Value {
        serde_json::json!({ "plugin_json_data": self })
    }
}
