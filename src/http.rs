//! http
//!
//! Minimal request/response types shared by applications and the
//! development server.
//!
//! # Contract
//!
//! Anything that can answer requests implements [`Handler`]. Applications
//! are handlers, and so is [`crate::dispatch::LazyDispatcher`], which is
//! what the `run` command actually hands to the server.

use std::sync::Arc;

use anyhow::Result;

/// A parsed HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Request method, upper case (`GET`, `POST`, ...).
    pub method: String,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// Raw query string, if any.
    pub query: Option<String>,
    /// Header fields in arrival order.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Vec<u8>,
}

impl Request {
    /// Build a bodyless request, mostly useful in tests.
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };
        Self {
            method: method.into(),
            path,
            query,
            ..Default::default()
        }
    }

    /// Case-insensitive header lookup (first match wins).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// A `text/plain` response with the given status.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            body: body.into().into_bytes(),
        }
    }

    /// `200 OK` with a plain text body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::text(200, body)
    }

    pub fn not_found() -> Self {
        Self::text(404, "Not Found")
    }

    pub fn internal_server_error() -> Self {
        Self::text(500, "Internal Server Error")
    }

    /// Body decoded as UTF-8 (lossy).
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that answers requests.
///
/// Errors returned here surface to whoever triggered the request; the
/// development server turns them into 500 responses.
pub trait Handler: Send + Sync {
    fn call(&self, request: &Request) -> Result<Response>;
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn call(&self, request: &Request) -> Result<Response> {
        (**self).call(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_splits_query() {
        let req = Request::new("GET", "/items?page=2");
        assert_eq!(req.path, "/items");
        assert_eq!(req.query.as_deref(), Some("page=2"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let mut req = Request::new("GET", "/");
        req.headers
            .push(("Content-Length".to_string(), "3".to_string()));
        assert_eq!(req.header("content-length"), Some("3"));
        assert_eq!(req.header("host"), None);
    }

    #[test]
    fn text_response_sets_content_type() {
        let resp = Response::ok("hi");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_text(), "hi");
        assert!(resp
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v.starts_with("text/plain")));
    }
}
