//! Top-level plugin runtime.
//!
//! [`PluginRuntime`] ties configuration, logging, the plugin's handlers and
//! the host API client together and hands them to a [`Lifecycle`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use eve_plugin_runtime::{PluginRuntime, serve};
//!
//! let runtime = PluginRuntime::builder()
//!     .manifest_json(include_bytes!("../plugin.json"))?
//!     .debug(args.debug)
//!     .build()?
//!     .handlers(handlers);
//!
//! serve(runtime).await;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use eve_plugin_backend::{Handlers, StaticHealth, build_capabilities};
use eve_plugin_core::HANDSHAKE;
use eve_plugin_transport::{ReattachConfig, ServerConfig};

use crate::config::{ConfigError, ConfigLoader, ConfigResult, PluginConfig, PluginManifest};
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{HostApi, HttpHostApi};
use crate::lifecycle::Lifecycle;
use crate::logging;

type ReadyCallback = Box<dyn FnOnce(ReattachConfig) + Send + 'static>;
type ExitCallback = Box<dyn FnOnce() + Send + 'static>;

/// A configured plugin, ready to run.
pub struct PluginRuntime {
    config: PluginConfig,
    manifest: Option<PluginManifest>,
    handlers: Handlers,
    host: Option<Arc<dyn HostApi>>,
    on_ready: Option<ReadyCallback>,
    on_exit: Option<ExitCallback>,
}

impl PluginRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from loaded configuration and initializes logging.
    pub fn from_config(config: PluginConfig) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            plugin_id = %config.plugin.id,
            version = %config.plugin.version,
            debug = config.plugin.debug,
            log_level = %config.logging.level,
            "Plugin runtime configured"
        );

        Self {
            config,
            manifest: None,
            handlers: Handlers::default(),
            host: None,
            on_ready: None,
            on_exit: None,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn manifest(&self) -> Option<&PluginManifest> {
        self.manifest.as_ref()
    }

    /// Uses `manifest` for the default health details.
    pub fn with_manifest(mut self, manifest: PluginManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Replaces the HTTP host client.
    pub fn host_api(mut self, host: impl HostApi + 'static) -> Self {
        self.host = Some(Arc::new(host));
        self
    }

    pub fn on_ready<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ReattachConfig) + Send + 'static,
    {
        self.on_ready = Some(Box::new(callback));
        self
    }

    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_exit = Some(Box::new(callback));
        self
    }

    /// Builds the lifecycle without running it.
    pub fn into_lifecycle(self) -> RuntimeResult<Lifecycle> {
        let Self {
            config,
            manifest,
            mut handlers,
            host,
            on_ready,
            on_exit,
        } = self;

        let plugin = &config.plugin;
        if plugin.id.is_empty() {
            return Err(ConfigError::missing_field("plugin.id").into());
        }

        if handlers.check_health.is_none()
            && let Some(manifest) = &manifest
        {
            let health = StaticHealth::new("pong")
                .with_details(&manifest.health_details())
                .map_err(ConfigError::from)?;
            handlers = handlers.with_check_health(health);
        }

        let capabilities = Arc::new(build_capabilities(handlers, &plugin.id, &plugin.version));
        let host: Arc<dyn HostApi> = match host {
            Some(host) => host,
            None => Arc::new(HttpHostApi::new(&config.host, plugin.id.clone())?),
        };
        let server = ServerConfig {
            handshake: HANDSHAKE,
            settings: config.transport.to_settings(),
            exit_on_disconnect: false,
        };

        let mut lifecycle = Lifecycle::new(capabilities, host, plugin.id.clone())
            .debug(plugin.debug)
            .bind_addr(config.transport.bind_addr()?)
            .server_config(server);
        if let Some(callback) = on_ready {
            lifecycle = lifecycle.on_ready(callback);
        }
        if let Some(callback) = on_exit {
            lifecycle = lifecycle.on_exit(callback);
        }
        Ok(lifecycle)
    }

    /// Runs the plugin until the host, a signal or an error stops it.
    pub async fn run(self) -> RuntimeResult<()> {
        self.into_lifecycle()?.run().await
    }
}

/// Runs `runtime` and exits the process with status 1 on error.
pub async fn serve(runtime: PluginRuntime) {
    if let Err(e) = runtime.run().await {
        report(&e);
        std::process::exit(1);
    }
}

fn report(error: &RuntimeError) {
    if error.is_fatal() {
        error!(error = %error, "Plugin failed to start");
    } else {
        error!(error = %error, "Plugin stopped with an error");
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Loads configuration and produces a [`PluginRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    manifest: Option<PluginManifest>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir().with_user_config_dir(),
            manifest: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    pub fn merge(mut self, config: PluginConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Seeds the plugin identity from a parsed manifest.
    pub fn manifest(mut self, manifest: PluginManifest) -> Self {
        self.config_loader = self.config_loader.manifest(manifest.clone());
        self.manifest = Some(manifest);
        self
    }

    /// Parses `plugin.json` contents, usually embedded with `include_bytes!`.
    pub fn manifest_json(self, bytes: &[u8]) -> ConfigResult<Self> {
        Ok(self.manifest(PluginManifest::from_json(bytes)?))
    }

    pub fn manifest_file<P: AsRef<Path>>(self, path: P) -> ConfigResult<Self> {
        Ok(self.manifest(PluginManifest::from_file(path)?))
    }

    /// Forces debug/attach mode on or off.
    pub fn debug(mut self, debug: bool) -> Self {
        self.config_loader = self.config_loader.set("plugin.debug", debug);
        self
    }

    /// Port of the host's internal API.
    pub fn host_rpc_port(mut self, port: u16) -> Self {
        self.config_loader = self.config_loader.set("host.rpc_port", port);
        self
    }

    pub fn build(self) -> ConfigResult<PluginRuntime> {
        let config = self.config_loader.load()?;
        let runtime = PluginRuntime::from_config(config);
        Ok(match self.manifest {
            Some(manifest) => runtime.with_manifest(manifest),
            None => runtime,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use eve_plugin_core::handshake::MAGIC_COOKIE_VALUE;
    use eve_plugin_core::model::HealthStatus;
    use eve_plugin_core::wire;
    use eve_plugin_transport::{PluginClient, TransportSettings};

    use crate::host::{HostError, LoadDebugPlugin, StopDebugPlugin};

    const MANIFEST: &[u8] = br#"{
        "plugin_alias": "ev-tools",
        "version": "0.0.3",
        "plugin_name": "EV Tools",
        "backend_routes": [{"path": "/api/ping", "remark": "ping", "needAuth": true}]
    }"#;

    struct NoHost;

    #[async_trait]
    impl HostApi for NoHost {
        async fn load_debug_plugin(&self, _: &LoadDebugPlugin) -> Result<(), HostError> {
            Ok(())
        }

        async fn stop_debug_plugin(&self, _: &StopDebugPlugin) -> Result<(), HostError> {
            Ok(())
        }
    }

    fn builder() -> RuntimeBuilder {
        RuntimeBuilder {
            config_loader: ConfigLoader::new().without_env(),
            manifest: None,
        }
    }

    #[test]
    fn test_missing_plugin_id() {
        let runtime = builder().build().unwrap();
        let err = runtime.into_lifecycle().unwrap_err();
        assert!(matches!(err, RuntimeError::Config(ConfigError::MissingField { .. })));
    }

    #[test]
    fn test_builder_applies_manifest_and_flags() {
        let runtime = builder()
            .manifest_json(MANIFEST)
            .unwrap()
            .debug(true)
            .host_rpc_port(9001)
            .build()
            .unwrap();

        let config = runtime.config();
        assert_eq!(config.plugin.id, "ev-tools");
        assert_eq!(config.plugin.version, "0.0.3");
        assert!(config.plugin.debug);
        assert_eq!(config.host.rpc_port, 9001);
        assert_eq!(runtime.manifest().unwrap().backend_routes.len(), 1);
    }

    #[tokio::test]
    async fn test_run_can_be_spawned() {
        let runtime = builder()
            .manifest_json(MANIFEST)
            .unwrap()
            .debug(true)
            .build()
            .unwrap()
            .host_api(NoHost)
            .on_exit(|| {});
        let lifecycle = runtime.into_lifecycle().unwrap().handle_signals(false);
        lifecycle.cancellation_token().cancel();

        tokio::spawn(lifecycle.run()).await.unwrap().unwrap();

        let runtime = builder().build().unwrap();
        let err = tokio::spawn(runtime.run()).await.unwrap().unwrap_err();
        assert!(matches!(err, RuntimeError::Config(ConfigError::MissingField { .. })));
    }

    #[tokio::test]
    async fn test_default_health_reports_manifest() {
        let (tx, ready) = oneshot::channel();
        let lifecycle = builder()
            .manifest_json(MANIFEST)
            .unwrap()
            .build()
            .unwrap()
            .host_api(NoHost)
            .on_ready(move |config| {
                let _ = tx.send(config);
            })
            .into_lifecycle()
            .unwrap()
            .handle_signals(false)
            .env_lookup(|_| Some(MAGIC_COOKIE_VALUE.to_string()));
        let token = lifecycle.cancellation_token();
        let run = tokio::spawn(lifecycle.run());

        let config = ready.await.unwrap();
        let client = PluginClient::connect(config.addr, &HANDSHAKE, &TransportSettings::default())
            .await
            .unwrap();
        assert_eq!(client.capabilities(), ["info"]);

        let health = client
            .check_health(wire::CheckHealthRequest::default())
            .await
            .unwrap();
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.message, "pong");
        let details: serde_json::Value = serde_json::from_slice(&health.json_details).unwrap();
        assert_eq!(details["plugin_json_data"]["plugin_alias"], "ev-tools");

        let info = client
            .plugin_info(wire::PluginInfoRequest::default())
            .await
            .unwrap();
        assert_eq!(info.plugin_version, "0.0.3");

        token.cancel();
        run.await.unwrap().unwrap();
    }
}
