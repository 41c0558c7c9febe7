//! Handler-facing model types.
//!
//! Plugins work with these types; the wire schema in [`crate::wire`] is an
//! implementation detail of the transport.

pub mod context;
pub mod health;
pub mod realtime;
pub mod resource;
pub mod status;

pub use context::{AppInstanceSettings, DataSourceInstanceSettings, PluginContext, User};
pub use health::{
    COOKIES_HEADER, CheckHealthRequest, CheckHealthResult, OAUTH_IDENTITY_ID_TOKEN_HEADER,
    OAUTH_IDENTITY_TOKEN_HEADER, PluginInfo, PluginInfoRequest,
};
pub use realtime::{Pub2ChannelRequest, Pub2ChannelResponse, TaskRequest, TaskResponse};
pub use resource::{CallResourceRequest, CallResourceResponse};
pub use status::{HealthStatus, PubStatus, TaskStatus};
