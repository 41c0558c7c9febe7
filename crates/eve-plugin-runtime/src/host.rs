//! Client for the host's internal HTTP API.
//!
//! Only debug/attach mode talks to the host out of band: it registers the
//! running plugin with `LoadDebugPlugin` and deregisters it on shutdown with
//! `StopDebugPlugin`. Every request carries the plugin id in the
//! [`PLUGIN_ID_HEADER`] header, and the host answers with a JSON envelope
//! `{code, msg, data}` where a non-zero `code` means failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::HostConfig;

/// Header naming the calling plugin.
pub const PLUGIN_ID_HEADER: &str = "Ev-From-Plugin-ID";

pub const LOAD_DEBUG_PLUGIN_PATH: &str = "/api/plugin_util/LoadDebugPlugin";
pub const STOP_DEBUG_PLUGIN_PATH: &str = "/api/plugin_util/StopDebugPlugin";

/// Errors returned by host API calls.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Request to host failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Host answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Host rejected request (code {code}): {msg}")]
    Rejected { code: i64, msg: String },

    #[error("Invalid host response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadDebugPlugin {
    pub id: String,
    /// Listener address, `host:port`.
    pub addr: String,
    pub pid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDebugPlugin {
    pub id: String,
}

/// Response envelope used by every host API endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HostResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Value,
}

impl HostResponse {
    /// Returns `data`, or an error when `code` is non-zero.
    pub fn into_result(self) -> Result<Value, HostError> {
        if self.code != 0 {
            return Err(HostError::Rejected {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(self.data)
    }
}

/// Out-of-band calls a plugin makes to its host.
#[async_trait]
pub trait HostApi: Send + Sync {
    async fn load_debug_plugin(&self, request: &LoadDebugPlugin) -> Result<(), HostError>;

    async fn stop_debug_plugin(&self, request: &StopDebugPlugin) -> Result<(), HostError>;
}

/// [`HostApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpHostApi {
    client: reqwest::Client,
    base_url: String,
    plugin_id: String,
}

impl HttpHostApi {
    pub fn new(config: &HostConfig, plugin_id: impl Into<String>) -> Result<Self, HostError> {
        Self::with_base_url(config.base_url(), config.request_timeout(), plugin_id)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
        plugin_id: impl Into<String>,
    ) -> Result<Self, HostError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            plugin_id: plugin_id.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<Value, HostError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling host API");

        let response = self
            .client
            .post(&url)
            .header(PLUGIN_ID_HEADER, &self.plugin_id)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.as_u16() >= 400 {
            return Err(HostError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice::<HostResponse>(&bytes)?.into_result()
    }
}

#[async_trait]
impl HostApi for HttpHostApi {
    async fn load_debug_plugin(&self, request: &LoadDebugPlugin) -> Result<(), HostError> {
        self.post(LOAD_DEBUG_PLUGIN_PATH, request).await.map(drop)
    }

    async fn stop_debug_plugin(&self, request: &StopDebugPlugin) -> Result<(), HostError> {
        self.post(STOP_DEBUG_PLUGIN_PATH, request).await.map(drop)
    }
}
