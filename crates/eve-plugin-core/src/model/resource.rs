//! Resource call request and response frames.

use crate::headers::Headers;
use crate::model::context::PluginContext;

/// An HTTP-like request routed to the plugin by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResourceRequest {
    pub plugin_context: PluginContext,
    /// Path relative to the plugin's resource root.
    pub path: String,
    pub method: String,
    /// Full original URL, including the query string.
    pub url: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl CallResourceRequest {
    /// Returns the query part of [`Self::url`], without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        let (_, rest) = self.url.split_once('?')?;
        let query = rest.split_once('#').map_or(rest, |(q, _)| q);
        (!query.is_empty()).then_some(query)
    }
}

/// One frame of a streamed resource response.
///
/// The first frame of a response carries the status and headers. Later frames
/// carry only body bytes and have `status == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResourceResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl CallResourceResponse {
    /// Builds a body-only continuation frame.
    pub fn continuation(body: Vec<u8>) -> Self {
        Self {
            status: 0,
            headers: Headers::new(),
            body,
        }
    }

    /// Returns true for frames that carry only body bytes.
    pub fn is_continuation(&self) -> bool {
        self.status == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_extraction() {
        let mut req = CallResourceRequest {
            url: "/api/plugins/demo/resources/ping?x=1&y=2#frag".to_string(),
            ..Default::default()
        };
        assert_eq!(req.query(), Some("x=1&y=2"));

        req.url = "/no-query".to_string();
        assert_eq!(req.query(), None);

        req.url = "/empty?".to_string();
        assert_eq!(req.query(), None);
    }
}
