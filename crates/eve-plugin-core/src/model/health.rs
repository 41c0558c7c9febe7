//! Health check and plugin metadata types.
//!
//! A [`CheckHealthRequest`] carries a flat string map of headers. Regular HTTP
//! headers forwarded by the host are stored under an `http_` prefix, while the
//! identity headers (`Authorization`, `X-Id-Token`, `Cookie`) may also appear
//! without it.

use std::collections::BTreeMap;

use crate::headers::{Headers, canonical_header_key};
use crate::model::context::PluginContext;
use crate::model::status::HealthStatus;

/// Header carrying the OAuth identity token.
pub const OAUTH_IDENTITY_TOKEN_HEADER: &str = "Authorization";

/// Header carrying the OAuth id token.
pub const OAUTH_IDENTITY_ID_TOKEN_HEADER: &str = "X-Id-Token";

/// Header carrying cookies.
pub const COOKIES_HEADER: &str = "Cookie";

const HTTP_HEADER_PREFIX: &str = "http_";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckHealthRequest {
    pub plugin_context: PluginContext,
    pub headers: BTreeMap<String, String>,
}

impl CheckHealthRequest {
    /// Stores a forwarded HTTP header.
    pub fn set_http_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers
            .insert(format!("{HTTP_HEADER_PREFIX}{key}"), value.into());
    }

    /// Removes the first forwarded header matching `key`, prefixed or not.
    pub fn delete_http_header(&mut self, key: &str) {
        let plain = canonical_header_key(key);
        let prefixed = canonical_header_key(&format!("{HTTP_HEADER_PREFIX}{key}"));
        let found = self.headers.keys().find(|k| {
            let canonical = canonical_header_key(k);
            canonical == plain || canonical == prefixed
        });
        if let Some(k) = found.cloned() {
            self.headers.remove(&k);
        }
    }

    /// Returns the forwarded header `key`.
    pub fn http_header(&self, key: &str) -> Option<String> {
        self.http_headers().get(key).map(str::to_string)
    }

    /// Collects every forwarded header into a [`Headers`] map.
    pub fn http_headers(&self) -> Headers {
        let mut headers = Headers::new();
        for (k, v) in &self.headers {
            let canonical = canonical_header_key(k);
            if canonical == OAUTH_IDENTITY_TOKEN_HEADER
                || canonical == OAUTH_IDENTITY_ID_TOKEN_HEADER
                || canonical == COOKIES_HEADER
            {
                headers.set(k, v.clone());
            }
            if let Some(stripped) = k.strip_prefix(HTTP_HEADER_PREFIX) {
                headers.set(stripped, v.clone());
            }
        }
        headers
    }
}

/// Outcome of a health check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckHealthResult {
    pub status: HealthStatus,
    pub message: String,
    /// Optional JSON payload with details.
    pub json_details: Vec<u8>,
}

impl CheckHealthResult {
    /// A healthy result with the given message.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Ok,
            message: message.into(),
            json_details: Vec::new(),
        }
    }

    /// An unhealthy result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Error,
            message: message.into(),
            json_details: Vec::new(),
        }
    }

    /// Attaches a JSON details payload.
    pub fn with_details(mut self, json_details: Vec<u8>) -> Self {
        self.json_details = json_details;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfoRequest {
    pub plugin_context: PluginContext,
}

/// Static identity of a plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginInfo {
    pub plugin_id: String,
    pub plugin_version: String,
}
