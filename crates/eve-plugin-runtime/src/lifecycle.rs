//! Plugin lifecycle orchestration.
//!
//! A [`Lifecycle`] walks one explicit state machine:
//!
//! ```text
//! Init → Handshaking → Serving        → ShuttingDown → Exited
//!                    ↘ DebugAttaching ↗
//! ```
//!
//! In production mode the plugin was spawned by the host: it verifies the
//! magic cookie, binds, prints the announce line on stdout and serves until
//! the host disconnects, a termination signal arrives or the cancellation
//! token fires.
//!
//! In debug mode the plugin was started by hand. The server runs in a
//! background worker that publishes its address once; the plugin then
//! registers itself with the host and deregisters on the way out.

use std::fmt;
use std::io::Write;
use std::net::SocketAddr;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use eve_plugin_core::{CapabilitySet, TransportError};
use eve_plugin_transport::{
    AnnounceLine, CancellationToken, ReattachConfig, RpcServer, ServerConfig,
};

use crate::error::{FatalError, RuntimeError, RuntimeResult};
use crate::host::{HostApi, LoadDebugPlugin, StopDebugPlugin};
use crate::signal::wait_for_shutdown;

type ReadyCallback = Box<dyn FnOnce(ReattachConfig) + Send + 'static>;
type ExitCallback = Box<dyn FnOnce() + Send + 'static>;
type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
type Worker = JoinHandle<RuntimeResult<()>>;

// =============================================================================
// State
// =============================================================================

/// Where the lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Init,
    Handshaking,
    Serving,
    DebugAttaching,
    ShuttingDown,
    Exited,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Handshaking => "handshaking",
            Self::Serving => "serving",
            Self::DebugAttaching => "debug_attaching",
            Self::ShuttingDown => "shutting_down",
            Self::Exited => "exited",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events that move the lifecycle forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// The server is bound and reachable.
    AddressReady(ReattachConfig),
    /// The server worker stopped on its own.
    CloseNotified,
    /// A termination signal arrived or the token was cancelled.
    Cancelled,
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Runs a plugin server from startup to exit.
pub struct Lifecycle {
    capabilities: Arc<CapabilitySet>,
    host: Arc<dyn HostApi>,
    plugin_id: String,
    debug: bool,
    bind_addr: SocketAddr,
    server: ServerConfig,
    handle_signals: bool,
    env: EnvLookup,
    on_ready: Option<ReadyCallback>,
    on_exit: Option<ExitCallback>,
    cancel: CancellationToken,
    state: watch::Sender<LifecycleState>,
}

impl Lifecycle {
    pub fn new(
        capabilities: Arc<CapabilitySet>,
        host: Arc<dyn HostApi>,
        plugin_id: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Init);
        Self {
            capabilities,
            host,
            plugin_id: plugin_id.into(),
            debug: false,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            server: ServerConfig::default(),
            handle_signals: true,
            env: Arc::new(|key| std::env::var(key).ok()),
            on_ready: None,
            on_exit: None,
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Selects debug/attach mode.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server = config;
        self
    }

    /// Whether Ctrl+C and SIGTERM stop the plugin. Defaults to `true`.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Replaces the environment lookup used for the cookie check.
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// Called once the server is reachable, on its own task.
    pub fn on_ready<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ReattachConfig) + Send + 'static,
    {
        self.on_ready = Some(Box::new(callback));
        self
    }

    /// Called during shutdown, before the server stops.
    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_exit = Some(Box::new(callback));
        self
    }

    /// Token that stops the plugin when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Watches state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Runs until the plugin is told to stop.
    pub async fn run(mut self) -> RuntimeResult<()> {
        info!(plugin_id = %self.plugin_id, debug = self.debug, "Starting plugin");
        let result = if self.debug {
            self.run_debug().await
        } else {
            self.run_production().await
        };
        self.transition(LifecycleState::Exited);
        info!("Plugin server exited");
        result
    }

    async fn run_production(&mut self) -> RuntimeResult<()> {
        self.transition(LifecycleState::Handshaking);
        let env = Arc::clone(&self.env);
        self.server
            .handshake
            .verify_env_with(|key| (*env)(key))
            .map_err(FatalError::Handshake)?;

        let config = ServerConfig {
            exit_on_disconnect: true,
            ..self.server.clone()
        };
        let server = RpcServer::bind(self.bind_addr, Arc::clone(&self.capabilities), config)
            .await
            .map_err(FatalError::Bind)?;
        announce(&server.announce_line())?;
        let reattach = server.reattach_config();

        self.transition(LifecycleState::Serving);
        let server_token = self.cancel.child_token();
        let mut worker: Worker = tokio::spawn({
            let token = server_token.clone();
            async move { server.serve(token).await.map_err(RuntimeError::from) }
        });
        self.spawn_ready(reattach);

        let (signal, finished) =
            wait_for_stop(&mut worker, &self.cancel, self.handle_signals).await;
        debug!(signal = ?signal, "Stopping plugin");
        self.shutdown(worker, finished, server_token).await
    }

    async fn run_debug(&mut self) -> RuntimeResult<()> {
        self.transition(LifecycleState::Handshaking);
        self.transition(LifecycleState::DebugAttaching);

        let (addr_tx, addr_rx) = oneshot::channel::<ReattachConfig>();
        let server_token = self.cancel.child_token();
        let mut worker: Worker = tokio::spawn({
            let token = server_token.clone();
            let bind_addr = self.bind_addr;
            let capabilities = Arc::clone(&self.capabilities);
            let config = ServerConfig {
                exit_on_disconnect: false,
                ..self.server.clone()
            };
            async move {
                let server = RpcServer::bind(bind_addr, capabilities, config)
                    .await
                    .map_err(FatalError::Bind)?;
                let _ = addr_tx.send(server.reattach_config());
                server.serve(token).await.map_err(RuntimeError::from)
            }
        });

        let first = tokio::select! {
            biased;
            ready = addr_rx => match ready {
                Ok(config) => Signal::AddressReady(config),
                Err(_) => Signal::CloseNotified,
            },
            () = self.cancel.cancelled() => Signal::Cancelled,
        };
        debug!(signal = ?first, "Debug worker signalled");

        let reattach = match first {
            Signal::AddressReady(config) => config,
            Signal::CloseNotified => {
                return match join_worker(worker).await {
                    Err(e) => Err(e),
                    Ok(()) => Err(FatalError::NotReady.into()),
                };
            }
            Signal::Cancelled => {
                server_token.cancel();
                return join_worker(worker).await;
            }
        };

        let registration = LoadDebugPlugin {
            id: self.plugin_id.clone(),
            addr: reattach.addr.to_string(),
            pid: reattach.pid,
        };
        if let Err(e) = self.host.load_debug_plugin(&registration).await {
            error!(error = %e, "Failed to register debug plugin");
            server_token.cancel();
            if let Err(join) = join_worker(worker).await {
                warn!(error = %join, "Debug worker failed while stopping");
            }
            return Err(FatalError::DebugRegistration(e).into());
        }
        info!(
            plugin_id = %self.plugin_id,
            addr = %reattach.addr,
            pid = reattach.pid,
            "Debug plugin registered with host"
        );

        self.spawn_ready(reattach);
        let (signal, finished) =
            wait_for_stop(&mut worker, &self.cancel, self.handle_signals).await;
        debug!(signal = ?signal, "Stopping debug plugin");
        self.shutdown(worker, finished, server_token).await
    }

    async fn shutdown(
        &mut self,
        worker: Worker,
        finished: Option<RuntimeResult<()>>,
        server_token: CancellationToken,
    ) -> RuntimeResult<()> {
        self.transition(LifecycleState::ShuttingDown);

        if self.debug {
            let request = StopDebugPlugin {
                id: self.plugin_id.clone(),
            };
            match self.host.stop_debug_plugin(&request).await {
                Ok(()) => info!(plugin_id = %self.plugin_id, "Debug plugin deregistered"),
                Err(e) => warn!(error = %e, "Failed to deregister debug plugin"),
            }
        }

        if let Some(callback) = self.on_exit.take() {
            contained("exit", callback);
        }

        server_token.cancel();
        match finished {
            Some(result) => result,
            None => join_worker(worker).await,
        }
    }

    fn spawn_ready(&mut self, config: ReattachConfig) {
        if let Some(callback) = self.on_ready.take() {
            tokio::spawn(async move { contained("ready", move || callback(config)) });
        }
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Lifecycle transition");
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("plugin_id", &self.plugin_id)
            .field("debug", &self.debug)
            .field("bind_addr", &self.bind_addr)
            .field("state", &self.state())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Prints the announce line the host reads from stdout.
fn announce(line: &AnnounceLine) -> RuntimeResult<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").map_err(TransportError::from)?;
    stdout.flush().map_err(TransportError::from)?;
    debug!(line = %line, "Announced plugin address");
    Ok(())
}

fn contained(name: &str, callback: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        error!(callback = name, "Plugin callback panicked");
    }
}

/// Waits for the worker to stop on its own, a termination signal or
/// cancellation. Returns the worker result if it already finished.
async fn wait_for_stop(
    worker: &mut Worker,
    cancel: &CancellationToken,
    handle_signals: bool,
) -> (Signal, Option<RuntimeResult<()>>) {
    let signals = async move {
        if handle_signals {
            wait_for_shutdown().await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        joined = worker => (Signal::CloseNotified, Some(flatten(joined))),
        () = cancel.cancelled() => (Signal::Cancelled, None),
        () = signals => (Signal::Cancelled, None),
    }
}

async fn join_worker(worker: Worker) -> RuntimeResult<()> {
    flatten(worker.await)
}

fn flatten(joined: Result<RuntimeResult<()>, tokio::task::JoinError>) -> RuntimeResult<()> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(TransportError::closed(format!("server task failed: {e}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use eve_plugin_backend::{Handlers, build_capabilities};
    use eve_plugin_core::handshake::{HANDSHAKE, MAGIC_COOKIE_VALUE};
    use eve_plugin_core::wire;
    use eve_plugin_transport::{PluginClient, TransportSettings};

    use crate::host::HostError;

    #[derive(Default)]
    struct FakeHost {
        calls: Arc<Mutex<Vec<String>>>,
        reject_load: bool,
        registered: Mutex<Option<LoadDebugPlugin>>,
    }

    #[async_trait]
    impl HostApi for FakeHost {
        async fn load_debug_plugin(&self, request: &LoadDebugPlugin) -> Result<(), HostError> {
            self.calls.lock().push("load".to_string());
            *self.registered.lock() = Some(request.clone());
            if self.reject_load {
                return Err(HostError::Rejected {
                    code: 1,
                    msg: "debug disabled".to_string(),
                });
            }
            Ok(())
        }

        async fn stop_debug_plugin(&self, request: &StopDebugPlugin) -> Result<(), HostError> {
            self.calls.lock().push(format!("stop:{}", request.id));
            Ok(())
        }
    }

    fn capabilities() -> Arc<CapabilitySet> {
        Arc::new(build_capabilities(Handlers::new(), "demo", "1.0.0"))
    }

    fn lifecycle(host: Arc<FakeHost>) -> Lifecycle {
        Lifecycle::new(capabilities(), host, "demo")
            .handle_signals(false)
            .env_lookup(|key| (key == HANDSHAKE.cookie_key).then(|| MAGIC_COOKIE_VALUE.to_string()))
    }

    fn ready_channel(lifecycle: Lifecycle) -> (Lifecycle, oneshot::Receiver<ReattachConfig>) {
        let (tx, rx) = oneshot::channel();
        let lifecycle = lifecycle.on_ready(move |config| {
            let _ = tx.send(config);
        });
        (lifecycle, rx)
    }

    #[tokio::test]
    async fn test_missing_cookie_is_fatal() {
        let lifecycle = lifecycle(Arc::default()).env_lookup(|_| None);
        let states = lifecycle.subscribe();

        let err = lifecycle.run().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, RuntimeError::Fatal(FatalError::Handshake(_))));
        assert_eq!(*states.borrow(), LifecycleState::Exited);
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let lifecycle = lifecycle(Arc::default()).bind_addr(taken.local_addr().unwrap());

        let err = lifecycle.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Fatal(FatalError::Bind(_))));
    }

    #[tokio::test]
    async fn test_production_serves_until_cancelled() {
        let exited = Arc::new(AtomicBool::new(false));
        let (lifecycle, ready) = ready_channel(lifecycle(Arc::default()));
        let lifecycle = lifecycle.on_exit({
            let exited = Arc::clone(&exited);
            move || exited.store(true, Ordering::SeqCst)
        });
        let token = lifecycle.cancellation_token();
        let mut states = lifecycle.subscribe();
        let run = tokio::spawn(lifecycle.run());

        let config = ready.await.unwrap();
        assert_eq!(*states.borrow_and_update(), LifecycleState::Serving);

        let client = PluginClient::connect(config.addr, &HANDSHAKE, &TransportSettings::default())
            .await
            .unwrap();
        let info = client
            .plugin_info(wire::PluginInfoRequest::default())
            .await
            .unwrap();
        assert_eq!(info.plugin_id, "demo");

        token.cancel();
        run.await.unwrap().unwrap();
        assert!(exited.load(Ordering::SeqCst));
        assert_eq!(*states.borrow(), LifecycleState::Exited);
    }

    #[tokio::test]
    async fn test_production_stops_on_host_shutdown() {
        let (lifecycle, ready) = ready_channel(lifecycle(Arc::default()));
        let run = tokio::spawn(lifecycle.run());

        let config = ready.await.unwrap();
        let client = PluginClient::connect(config.addr, &HANDSHAKE, &TransportSettings::default())
            .await
            .unwrap();
        client.shutdown().await.unwrap();

        run.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_debug_registers_and_deregisters() {
        let host = Arc::new(FakeHost::default());
        let calls = Arc::clone(&host.calls);
        let (lifecycle, ready) = ready_channel(
            lifecycle(Arc::clone(&host))
                // Debug mode never consults the cookie.
                .env_lookup(|_| None)
                .debug(true),
        );
        let lifecycle = lifecycle.on_exit({
            let calls = Arc::clone(&calls);
            move || calls.lock().push("exit".to_string())
        });
        let token = lifecycle.cancellation_token();
        let run = tokio::spawn(lifecycle.run());

        let config = ready.await.unwrap();
        let registered = host.registered.lock().clone().unwrap();
        assert_eq!(registered.id, "demo");
        assert_eq!(registered.addr, config.addr.to_string());
        assert_eq!(registered.pid, std::process::id());

        token.cancel();
        run.await.unwrap().unwrap();
        assert_eq!(*calls.lock(), ["load", "stop:demo", "exit"]);
    }

    #[tokio::test]
    async fn test_debug_registration_failure_is_fatal() {
        let host = Arc::new(FakeHost {
            reject_load: true,
            ..FakeHost::default()
        });
        let ready_called = Arc::new(AtomicBool::new(false));
        let lifecycle = lifecycle(Arc::clone(&host)).debug(true).on_ready({
            let ready_called = Arc::clone(&ready_called);
            move |_| ready_called.store(true, Ordering::SeqCst)
        });

        let err = lifecycle.run().await.unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Fatal(FatalError::DebugRegistration(HostError::Rejected { .. }))
        ));
        assert_eq!(*host.calls.lock(), ["load"]);
        assert!(!ready_called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_debug_cancelled_before_address_skips_registration() {
        let host = Arc::new(FakeHost::default());
        let lifecycle = lifecycle(Arc::clone(&host)).debug(true);
        // The worker has not run yet, so cancellation wins the race.
        lifecycle.cancellation_token().cancel();

        lifecycle.run().await.unwrap();
        assert!(host.calls.lock().is_empty());
        assert!(host.registered.lock().is_none());
    }

    #[tokio::test]
    async fn test_callback_panics_are_contained() {
        let lifecycle = lifecycle(Arc::default())
            .on_ready(|_| panic!("ready exploded"))
            .on_exit(|| panic!("exit exploded"));
        let token = lifecycle.cancellation_token();
        let mut states = lifecycle.subscribe();
        let run = tokio::spawn(lifecycle.run());

        states
            .wait_for(|state| *state == LifecycleState::Serving)
            .await
            .unwrap();
        token.cancel();
        run.await.unwrap().unwrap();
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_run_future_is_send() {
        let lifecycle = lifecycle(Arc::default())
            .debug(true)
            .on_ready(|_| {})
            .on_exit(|| {});
        lifecycle.cancellation_token().cancel();

        let run = lifecycle.run();
        assert_send(&run);
        tokio::spawn(run).await.unwrap().unwrap();
    }

    #[test]
    fn test_state_names() {
        assert_eq!(LifecycleState::DebugAttaching.to_string(), "debug_attaching");
        assert_eq!(LifecycleState::Exited.as_str(), "exited");
    }
}
