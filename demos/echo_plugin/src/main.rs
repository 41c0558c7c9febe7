//! Echo Plugin Example
//!
//! A minimal eve plugin. HTTP routes are served by an axum router bridged
//! into the resource capability; a task executor and a channel publisher
//! round out the other capabilities.
//!
//! # Usage
//!
//! The host normally launches the binary. To attach to a running host
//! during development:
//!
//! ```bash
//! cargo run --package echo-plugin -- --debug --ev-rpc-port 8091
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use clap::Parser;
use eve_plugin::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value, json};

const MANIFEST: &[u8] = include_bytes!("../plugin.json");

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Attach to a running host instead of being launched by it.
    #[arg(long)]
    debug: bool,

    /// Port of the host's internal API.
    #[arg(long = "ev-rpc-port", default_value_t = 8091)]
    ev_rpc_port: u16,

    /// Directory for temporary files.
    #[arg(long = "tmp-file-store-path", default_value = "store_file_dir")]
    tmp_file_store_path: PathBuf,

    #[arg(long = "db-type", default_value = "sqlite")]
    db_type: String,
}

#[derive(Debug, Clone, Serialize)]
struct Settings {
    tmp_file_store_path: PathBuf,
    db_type: String,
}

// ============================================================================
// HTTP routes
// ============================================================================

async fn ping() -> &'static str {
    "pong"
}

async fn echo(headers: HeaderMap, body: String) -> (StatusCode, HeaderMap, String) {
    let mut reply = HeaderMap::new();
    if let Some(content_type) = headers.get("content-type") {
        reply.insert("content-type", content_type.clone());
    }
    (StatusCode::OK, reply, body)
}

async fn whoami(user: Option<Extension<User>>) -> Result<Json<Value>, StatusCode> {
    let Extension(user) = user.ok_or(StatusCode::UNAUTHORIZED)?;
    Ok(Json(json!({
        "login": user.login,
        "name": user.name,
        "role": user.role,
    })))
}

async fn show_settings(State(settings): State<Arc<Settings>>) -> Json<Settings> {
    Json(settings.as_ref().clone())
}

fn router(settings: Arc<Settings>) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/echo", post(echo))
        .route("/api/whoami", get(whoami))
        .route("/api/settings", get(show_settings))
        .with_state(settings)
}

// ============================================================================
// Task and realtime
// ============================================================================

struct Tasks;

#[async_trait]
impl TaskExecutor for Tasks {
    async fn execute(&self, task_name: &str, user_id: i32, json_data: &[u8]) -> Result<String> {
        match task_name {
            "echo" => Ok(String::from_utf8_lossy(json_data).into_owned()),
            "whoami" => Ok(format!("user {user_id}")),
            other => anyhow::bail!("unknown task `{other}`"),
        }
    }
}

struct Echoes;

#[async_trait]
impl ChannelPublisher for Echoes {
    async fn publish(&self, channel: &str, data: &[u8]) -> Result<Map<String, Value>> {
        let payload: Value = serde_json::from_slice(data)?;
        let mut details = Map::new();
        details.insert("channel".to_string(), Value::from(channel));
        details.insert("echo".to_string(), payload);
        Ok(details)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Arc::new(Settings {
        tmp_file_store_path: args.tmp_file_store_path,
        db_type: args.db_type,
    });
    tokio::fs::create_dir_all(&settings.tmp_file_store_path).await?;

    let handlers = Handlers::new()
        .with_call_resource(HttpAdapter::new(router(Arc::clone(&settings))))
        .with_task(TaskRunner(Tasks))
        .with_pub2channel(Publisher(Echoes));

    let runtime = PluginRuntime::builder()
        .manifest_json(MANIFEST)?
        .debug(args.debug)
        .host_rpc_port(args.ev_rpc_port)
        .build()?
        .handlers(handlers)
        .on_ready(|config| info!(addr = %config.addr, pid = config.pid, "Echo plugin ready"))
        .on_exit(|| info!("Echo plugin exiting"));

    info!(
        db_type = %settings.db_type,
        store = %settings.tmp_file_store_path.display(),
        "Starting echo plugin"
    );
    serve(runtime).await;
    Ok(())
}
