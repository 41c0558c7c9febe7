//! Conversion between the wire schema and the handler model.
//!
//! Every conversion is lossless for the fields the host sends, with two
//! exceptions. A plugin context that is entirely empty is emitted as
//! "absent" on the wire, which is how the host encodes it. A response code
//! that does not fit an HTTP status is read as `500`, since `0` marks a
//! continuation frame.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::headers::Headers;
use crate::model;
use crate::wire;

// =============================================================================
// Helpers
// =============================================================================

/// Converts epoch milliseconds to a [`SystemTime`].
pub fn time_from_millis(ms: i64) -> SystemTime {
    let offset = Duration::from_millis(ms.unsigned_abs());
    if ms >= 0 {
        UNIX_EPOCH + offset
    } else {
        UNIX_EPOCH - offset
    }
}

/// Converts a [`SystemTime`] to epoch milliseconds.
pub fn time_to_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

fn headers_from_wire(headers: BTreeMap<String, wire::StringList>) -> Headers {
    Headers::from_raw(headers.into_iter().map(|(k, v)| (k, v.values)).collect())
}

fn headers_to_wire(headers: Headers) -> BTreeMap<String, wire::StringList> {
    headers
        .into_inner()
        .into_iter()
        .map(|(k, values)| (k, wire::StringList { values }))
        .collect()
}

/// Decodes an optional wire context; absence becomes the empty context.
pub fn context_from_wire(ctx: Option<wire::PluginContext>) -> model::PluginContext {
    ctx.map(model::PluginContext::from).unwrap_or_default()
}

/// Encodes a context; the empty context becomes absence.
pub fn context_to_wire(ctx: model::PluginContext) -> Option<wire::PluginContext> {
    (!ctx.is_empty()).then(|| wire::PluginContext::from(ctx))
}

// =============================================================================
// Context
// =============================================================================

impl From<wire::User> for model::User {
    fn from(u: wire::User) -> Self {
        Self {
            login: u.login,
            name: u.name,
            email: u.email,
            role: u.role,
        }
    }
}

impl From<model::User> for wire::User {
    fn from(u: model::User) -> Self {
        Self {
            login: u.login,
            name: u.name,
            email: u.email,
            role: u.role,
        }
    }
}

impl From<wire::AppInstanceSettings> for model::AppInstanceSettings {
    fn from(s: wire::AppInstanceSettings) -> Self {
        Self {
            json_data: s.json_data,
            decrypted_secure_json_data: s.decrypted_secure_json_data,
            updated: time_from_millis(s.last_updated_ms),
        }
    }
}

impl From<model::AppInstanceSettings> for wire::AppInstanceSettings {
    fn from(s: model::AppInstanceSettings) -> Self {
        Self {
            json_data: s.json_data,
            decrypted_secure_json_data: s.decrypted_secure_json_data,
            last_updated_ms: time_to_millis(s.updated),
        }
    }
}

fn data_source_from_wire(
    s: wire::DataSourceInstanceSettings,
    plugin_id: &str,
) -> model::DataSourceInstanceSettings {
    model::DataSourceInstanceSettings {
        id: s.id,
        uid: s.uid,
        type_name: plugin_id.to_string(),
        name: s.name,
        url: s.url,
        user: s.user,
        database: s.database,
        basic_auth_enabled: s.basic_auth_enabled,
        basic_auth_user: s.basic_auth_user,
        json_data: s.json_data,
        decrypted_secure_json_data: s.decrypted_secure_json_data,
        updated: time_from_millis(s.last_updated_ms),
    }
}

impl From<model::DataSourceInstanceSettings> for wire::DataSourceInstanceSettings {
    fn from(s: model::DataSourceInstanceSettings) -> Self {
        Self {
            id: s.id,
            uid: s.uid,
            name: s.name,
            url: s.url,
            user: s.user,
            database: s.database,
            basic_auth_enabled: s.basic_auth_enabled,
            basic_auth_user: s.basic_auth_user,
            json_data: s.json_data,
            decrypted_secure_json_data: s.decrypted_secure_json_data,
            last_updated_ms: time_to_millis(s.updated),
        }
    }
}

impl From<wire::PluginContext> for model::PluginContext {
    fn from(ctx: wire::PluginContext) -> Self {
        let data_source_instance_settings = ctx
            .data_source_instance_settings
            .map(|ds| data_source_from_wire(ds, &ctx.plugin_id));
        Self {
            org_id: ctx.org_id,
            user: ctx.user.map(Into::into),
            app_instance_settings: ctx.app_instance_settings.map(Into::into),
            data_source_instance_settings,
            plugin_id: ctx.plugin_id,
        }
    }
}

impl From<model::PluginContext> for wire::PluginContext {
    fn from(ctx: model::PluginContext) -> Self {
        Self {
            org_id: ctx.org_id,
            plugin_id: ctx.plugin_id,
            user: ctx.user.map(Into::into),
            app_instance_settings: ctx.app_instance_settings.map(Into::into),
            data_source_instance_settings: ctx.data_source_instance_settings.map(Into::into),
        }
    }
}

// =============================================================================
// Resource
// =============================================================================

impl From<wire::CallResourceRequest> for model::CallResourceRequest {
    fn from(req: wire::CallResourceRequest) -> Self {
        Self {
            plugin_context: context_from_wire(req.plugin_context),
            path: req.path,
            method: req.method,
            url: req.url,
            headers: headers_from_wire(req.headers),
            body: req.body,
        }
    }
}

impl From<model::CallResourceRequest> for wire::CallResourceRequest {
    fn from(req: model::CallResourceRequest) -> Self {
        Self {
            plugin_context: context_to_wire(req.plugin_context),
            path: req.path,
            method: req.method,
            url: req.url,
            headers: headers_to_wire(req.headers),
            body: req.body,
        }
    }
}

impl From<model::CallResourceResponse> for wire::CallResourceResponse {
    fn from(resp: model::CallResourceResponse) -> Self {
        Self {
            code: i32::from(resp.status),
            headers: headers_to_wire(resp.headers),
            body: resp.body,
        }
    }
}

/// Status used for response codes outside the `u16` range.
const INVALID_CODE_STATUS: u16 = 500;

impl From<wire::CallResourceResponse> for model::CallResourceResponse {
    fn from(resp: wire::CallResourceResponse) -> Self {
        Self {
            status: u16::try_from(resp.code).unwrap_or(INVALID_CODE_STATUS),
            headers: headers_from_wire(resp.headers),
            body: resp.body,
        }
    }
}

// =============================================================================
// Health / Info
// =============================================================================

impl From<wire::CheckHealthRequest> for model::CheckHealthRequest {
    fn from(req: wire::CheckHealthRequest) -> Self {
        Self {
            plugin_context: context_from_wire(req.plugin_context),
            headers: req.headers,
        }
    }
}

impl From<model::CheckHealthRequest> for wire::CheckHealthRequest {
    fn from(req: model::CheckHealthRequest) -> Self {
        Self {
            plugin_context: context_to_wire(req.plugin_context),
            headers: req.headers,
        }
    }
}

impl From<model::CheckHealthResult> for wire::CheckHealthResponse {
    fn from(res: model::CheckHealthResult) -> Self {
        Self {
            status: res.status,
            message: res.message,
            json_details: res.json_details,
        }
    }
}

impl From<wire::CheckHealthResponse> for model::CheckHealthResult {
    fn from(res: wire::CheckHealthResponse) -> Self {
        Self {
            status: res.status,
            message: res.message,
            json_details: res.json_details,
        }
    }
}

impl From<wire::PluginInfoRequest> for model::PluginInfoRequest {
    fn from(req: wire::PluginInfoRequest) -> Self {
        Self {
            plugin_context: context_from_wire(req.plugin_context),
        }
    }
}

impl From<model::PluginInfoRequest> for wire::PluginInfoRequest {
    fn from(req: model::PluginInfoRequest) -> Self {
        Self {
            plugin_context: context_to_wire(req.plugin_context),
        }
    }
}

impl From<model::PluginInfo> for wire::PluginInfoResponse {
    fn from(info: model::PluginInfo) -> Self {
        Self {
            plugin_id: info.plugin_id,
            plugin_version: info.plugin_version,
        }
    }
}

impl From<wire::PluginInfoResponse> for model::PluginInfo {
    fn from(info: wire::PluginInfoResponse) -> Self {
        Self {
            plugin_id: info.plugin_id,
            plugin_version: info.plugin_version,
        }
    }
}

// =============================================================================
// Realtime / Task
// =============================================================================

impl From<wire::Pub2ChannelRequest> for model::Pub2ChannelRequest {
    fn from(req: wire::Pub2ChannelRequest) -> Self {
        Self {
            plugin_context: context_from_wire(req.plugin_context),
            channel: req.channel,
            data: req.data,
        }
    }
}

impl From<model::Pub2ChannelRequest> for wire::Pub2ChannelRequest {
    fn from(req: model::Pub2ChannelRequest) -> Self {
        Self {
            plugin_context: context_to_wire(req.plugin_context),
            channel: req.channel,
            data: req.data,
        }
    }
}

impl From<model::Pub2ChannelResponse> for wire::Pub2ChannelResponse {
    fn from(res: model::Pub2ChannelResponse) -> Self {
        Self {
            status: res.status,
            message: res.message,
            json_details: res.json_details,
        }
    }
}

impl From<wire::Pub2ChannelResponse> for model::Pub2ChannelResponse {
    fn from(res: wire::Pub2ChannelResponse) -> Self {
        Self {
            status: res.status,
            message: res.message,
            json_details: res.json_details,
        }
    }
}

impl From<wire::TaskRequest> for model::TaskRequest {
    fn from(req: wire::TaskRequest) -> Self {
        Self {
            json_data: req.json_data,
            task_name: req.task_name,
            user_id: req.user_id,
        }
    }
}

impl From<model::TaskRequest> for wire::TaskRequest {
    fn from(req: model::TaskRequest) -> Self {
        Self {
            json_data: req.json_data,
            task_name: req.task_name,
            user_id: req.user_id,
        }
    }
}

impl From<model::TaskResponse> for wire::TaskResponse {
    fn from(res: model::TaskResponse) -> Self {
        Self {
            status: res.status,
            message: res.message,
        }
    }
}

impl From<wire::TaskResponse> for model::TaskResponse {
    fn from(res: wire::TaskResponse) -> Self {
        Self {
            status: res.status,
            message: res.message,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
