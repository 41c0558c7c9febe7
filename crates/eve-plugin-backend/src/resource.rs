//! Resource call adapter.
//!
//! Bridges the `resource` capability to a [`CallResourceHandler`]: each call
//! gets a fresh [`ResponseWriter`] bound to the call's frame sink. The writer
//! is always closed before a handler error is reported, so partial output
//! reaches the host ahead of the failure.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use eve_plugin_core::model::{CallResourceRequest, CallResourceResponse};
use eve_plugin_core::{FrameSink, ResourceService, Status, TransportResult, wire};

use crate::handler::CallResourceHandler;
use crate::writer::{DeliveryObserver, LogDeliveryFailures, ResponseSender, ResponseWriter};

/// Status sent when no resource handler is registered.
pub const NOT_IMPLEMENTED_STATUS: u16 = 501;

/// [`ResponseSender`] over a transport [`FrameSink`].
pub struct SinkSender<'a> {
    sink: &'a mut dyn FrameSink,
}

impl<'a> SinkSender<'a> {
    pub fn new(sink: &'a mut dyn FrameSink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl<'a> ResponseSender for SinkSender<'a> {
    async fn send(&mut self, response: CallResourceResponse) -> TransportResult<()> {
        self.sink.send(response.into()).await
    }
}

/// Serves the `resource` capability.
pub struct ResourceAdapter {
    handler: Option<Arc<dyn CallResourceHandler>>,
    observer: Arc<dyn DeliveryObserver>,
}

impl ResourceAdapter {
    pub fn new(handler: Option<Arc<dyn CallResourceHandler>>) -> Self {
        Self {
            handler,
            observer: Arc::new(LogDeliveryFailures),
        }
    }

    /// Replaces the observer notified about undeliverable frames.
    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }
}

#[async_trait]
impl ResourceService for ResourceAdapter {
    async fn call_resource(
        &self,
        request: wire::CallResourceRequest,
        sink: &mut dyn FrameSink,
    ) -> Result<(), Status> {
        let Some(handler) = &self.handler else {
            debug!(path = %request.path, "No resource handler, answering 501");
            let frame = CallResourceResponse {
                status: NOT_IMPLEMENTED_STATUS,
                ..Default::default()
            };
            if let Err(e) = sink.send(frame.into()).await {
                self.observer.delivery_failed(&e);
            }
            return Ok(());
        };

        let request = CallResourceRequest::from(request);
        let mut sender = SinkSender::new(sink);
        let mut writer = ResponseWriter::with_observer(&mut sender, Arc::clone(&self.observer));
        let result = handler.call_resource(&request, &mut writer).await;
        writer.close().await;

        result.map_err(|e| {
            warn!(
                method = %request.method,
                path = %request.path,
                error = %e,
                "Resource handler failed"
            );
            Status::internal(format!("{e:#}"))
        })
    }
}

// =============================================================================
// Response Helpers
// =============================================================================

/// Answers with status 200 and a plain text body.
pub fn send_plain_text(writer: &mut ResponseWriter<'_>, text: &str) {
    writer.set_header("Content-Type", "text/plain");
    writer.write_status(200);
    writer.write(text.as_bytes());
}

/// Answers with status 200 and `value` as a JSON body.
pub fn send_json<T: Serialize + ?Sized>(
    writer: &mut ResponseWriter<'_>,
    value: &T,
) -> serde_json::Result<()> {
    let body = serde_json::to_vec(value)?;
    writer.set_header("Content-Type", "application/json");
    writer.write_status(200);
    writer.write(&body);
    Ok(())
}
