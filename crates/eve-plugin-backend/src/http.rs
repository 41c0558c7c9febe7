//! Serves resource calls with any `tower` service over `http` types, such as
//! an `axum::Router`.
//!
//! The request URI is the call's path plus the query string of its URL. The
//! [`PluginContext`] and, when present, the [`User`] are attached as request
//! extensions:
//!
//! ```rust,ignore
//! async fn whoami(Extension(user): Extension<User>) -> String {
//!     user.login
//! }
//!
//! let router = Router::new().route("/whoami", get(whoami));
//! let handlers = Handlers::new().with_call_resource(HttpAdapter::new(router));
//! ```
//!
//! Response body chunks are forwarded as they arrive, one frame per chunk.
//!
//! [`User`]: eve_plugin_core::model::User

use std::error::Error as StdError;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use futures::StreamExt;
use tower::{Service, ServiceExt};

use eve_plugin_core::model::{CallResourceRequest, PluginContext};

use crate::handler::CallResourceHandler;
use crate::writer::ResponseWriter;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Resource handler backed by a `tower` service.
#[derive(Debug, Clone)]
pub struct HttpAdapter<S> {
    service: S,
}

impl<S> HttpAdapter<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> CallResourceHandler for HttpAdapter<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
{
    async fn call_resource(
        &self,
        request: &CallResourceRequest,
        writer: &mut ResponseWriter<'_>,
    ) -> anyhow::Result<()> {
        let http_request = to_http_request(request)?;
        let response = self
            .service
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|e| {
                let e: BoxError = e.into();
                anyhow::anyhow!(e)
            })?;

        let (parts, body) = response.into_parts();
        for (name, value) in &parts.headers {
            writer.add_header(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        writer.write_status(parts.status.as_u16());

        let mut chunks = body.into_data_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            writer.write(&chunk);
            writer.flush().await;
        }
        Ok(())
    }
}

/// Builds the `http` request for a resource call.
pub fn to_http_request(request: &CallResourceRequest) -> anyhow::Result<Request<Body>> {
    let method = if request.method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(request.method.as_bytes())?
    };

    let mut builder = Request::builder()
        .method(method)
        .uri(request_uri(request))
        .extension(request.plugin_context.clone());
    if let Some(user) = &request.plugin_context.user {
        builder = builder.extension(user.clone());
    }
    for (name, values) in request.headers.iter() {
        for value in values {
            builder = builder.header(name, value.as_str());
        }
    }

    Ok(builder.body(Body::from(request.body.clone()))?)
}

fn request_uri(request: &CallResourceRequest) -> String {
    let mut uri = String::with_capacity(request.path.len() + 1);
    if !request.path.starts_with('/') {
        uri.push('/');
    }
    uri.push_str(&request.path);
    if let Some(query) = request.query() {
        uri.push('?');
        uri.push_str(query);
    }
    uri
}

/// Extracts the plugin context attached by [`HttpAdapter`].
pub fn plugin_context<B>(request: &Request<B>) -> Option<&PluginContext> {
    request.extensions().get::<PluginContext>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::Extension;
    use axum::http::{StatusCode, Uri};
    use axum::routing::{get, post};
    use eve_plugin_core::Headers;
    use eve_plugin_core::model::User;

    use crate::writer::tests::RecordingSender;

    fn router() -> Router {
        Router::new()
            .route("/echo-uri", get(|uri: Uri| async move { uri.to_string() }))
            .route("/echo", post(|body: Bytes| async move { body }))
            .route(
                "/whoami",
                get(|Extension(user): Extension<User>| async move { user.login }),
            )
            .route(
                "/created",
                post(|| async { (StatusCode::CREATED, [("X-Trace", "t1")], "made") }),
            )
    }

    fn call(method: &str, path: &str, url: &str) -> CallResourceRequest {
        CallResourceRequest {
            method: method.to_string(),
            path: path.to_string(),
            url: url.to_string(),
            ..Default::default()
        }
    }

    async fn run(request: CallResourceRequest) -> RecordingSender {
        let adapter = HttpAdapter::new(router());
        let mut sender = RecordingSender::default();
        let mut writer = ResponseWriter::new(&mut sender);
        adapter.call_resource(&request, &mut writer).await.unwrap();
        writer.close().await;
        sender
    }

    #[test]
    fn test_request_uri() {
        let req = call("", "echo-uri", "/api/plugins/demo/resources/echo-uri?a=1&b=2");
        assert_eq!(request_uri(&req), "/echo-uri?a=1&b=2");
        let req = call("", "/plain", "/plain");
        assert_eq!(request_uri(&req), "/plain");
    }

    #[test]
    fn test_http_request_defaults_and_extensions() {
        let mut req = call("", "whoami", "");
        req.headers = Headers::from_iter([("x-token", "abc")]);
        req.plugin_context.plugin_id = "demo".to_string();
        req.plugin_context.user = Some(User {
            login: "admin".to_string(),
            ..Default::default()
        });

        let http = to_http_request(&req).unwrap();
        assert_eq!(http.method(), Method::GET);
        assert_eq!(http.headers()["x-token"], "abc");
        assert_eq!(plugin_context(&http).unwrap().plugin_id, "demo");
        assert_eq!(http.extensions().get::<User>().unwrap().login, "admin");
    }

    #[tokio::test]
    async fn test_router_round_trip() {
        let sender = run(call("GET", "echo-uri", "/x/echo-uri?q=1")).await;
        let body: Vec<u8> = sender.frames.iter().flat_map(|f| f.body.clone()).collect();
        assert_eq!(sender.frames[0].status, 200);
        assert_eq!(body, b"/echo-uri?q=1");
    }

    #[tokio::test]
    async fn test_status_headers_and_body() {
        let mut req = call("POST", "echo", "");
        req.body = b"payload".to_vec();
        let sender = run(req).await;
        let body: Vec<u8> = sender.frames.iter().flat_map(|f| f.body.clone()).collect();
        assert_eq!(body, b"payload");

        let sender = run(call("POST", "created", "")).await;
        let first = &sender.frames[0];
        assert_eq!(first.status, 201);
        assert_eq!(first.headers.get("X-Trace"), Some("t1"));
        assert!(sender.frames[1..].iter().all(|f| f.is_continuation()));
    }

    #[tokio::test]
    async fn test_user_extension() {
        let mut req = call("GET", "whoami", "");
        req.plugin_context.user = Some(User {
            login: "alice".to_string(),
            ..Default::default()
        });
        let sender = run(req).await;
        let body: Vec<u8> = sender.frames.iter().flat_map(|f| f.body.clone()).collect();
        assert_eq!(body, b"alice");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let sender = run(call("GET", "missing", "")).await;
        assert_eq!(sender.frames[0].status, 404);
    }
}
