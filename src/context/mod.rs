//! Per-request state: the context handed to handlers and the outcome handed
//! back to the caller.
//!
//! Captured path segments and the last dispatch error travel in plain structs
//! with typed accessors — [`Context`] flows down into handlers, [`Outcome`]
//! flows back up to whoever drove the dispatch. There is no keyed value bag
//! and no ambient lookup.

use std::collections::HashMap;

use thiserror::Error;

use crate::http::multipart::MultipartError;
use crate::http::{Method, Request, Response};
use crate::resource::BoxedApiError;

/// Path segments captured while matching a pattern, keyed by capture name.
///
/// Freshly allocated per inbound request and discarded with it.
#[derive(Debug, Clone, Default)]
pub struct Captures {
    map: HashMap<String, String>,
}

impl Captures {
    /// Creates an empty capture map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a captured value under `name`.
    pub fn insert(&mut self, name: String, value: String) {
        self.map.insert(name, value);
    }

    /// Returns the captured value for `name`, if the matched pattern bound one.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// Number of captured segments.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the matched pattern had no capture segments.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(name, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The per-request view handed to handlers: the parsed request plus the
/// captures produced by path matching.
///
/// Cloning is cheap enough to give each handler invocation its own copy (the
/// body is a shared [`bytes::Bytes`] buffer); the dispatcher keeps the
/// original to build the [`Outcome`].
#[derive(Debug, Clone)]
pub struct Context {
    request: Request,
    captures: Captures,
}

impl Context {
    /// Creates a context with no captures.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            captures: Captures::new(),
        }
    }

    /// Creates a context carrying the captures from a route match.
    pub fn with_captures(request: Request, captures: Captures) -> Self {
        Self { request, captures }
    }

    /// The inbound request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// All captured path segments.
    pub fn captures(&self) -> &Captures {
        &self.captures
    }

    /// Shorthand for `captures().get(name)`.
    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name)
    }
}

/// Everything a dispatch hands back: the response to write, the final
/// request context, and the last error recorded along the way.
///
/// Downstream code inspects the outcome after the router and dispatcher have
/// run — `error()` answers "did this request fail, and how" without parsing
/// the response.
#[derive(Debug)]
pub struct Outcome {
    context: Context,
    response: Response,
    error: Option<DispatchError>,
}

impl Outcome {
    /// An outcome with no recorded error.
    pub fn ok(context: Context, response: Response) -> Self {
        Self {
            context,
            response,
            error: None,
        }
    }

    /// An outcome carrying a recorded dispatch error.
    pub fn fail(context: Context, response: Response, error: DispatchError) -> Self {
        Self {
            context,
            response,
            error: Some(error),
        }
    }

    /// The final request context (captures included).
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The response produced for this request.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// The last error recorded during dispatch, if any.
    pub fn error(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    /// Discards the bookkeeping and keeps only the response.
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Splits the outcome into its parts.
    pub fn into_parts(self) -> (Context, Response, Option<DispatchError>) {
        (self.context, self.response, self.error)
    }

    // Records `error` unless the handler already recorded one of its own.
    pub(crate) fn record(mut self, error: DispatchError) -> Self {
        self.error.get_or_insert(error);
        self
    }
}

/// Request-time failures, recorded on the [`Outcome`] at the point they occur.
///
/// Every variant is terminal for its single request only: it is converted to
/// an HTTP status and body, never retried, and never propagated out of the
/// dispatch call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No registered pattern matched the request path.
    #[error("no route matched {path}")]
    RouteNotFound { path: String },

    /// The resource has no adapter for this verb.
    #[error("{method} is not supported by this resource")]
    MethodNotAllowed { method: Method },

    /// The request's content type cannot be decoded by this method shape.
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// A `multipart/form-data` payload was sent to a serde-typed method.
    #[error("multipart/form-data payload sent to a non-multipart method")]
    MultipartMismatch,

    /// The request payload failed to decode into the method's typed request.
    #[error("failed to decode request payload: {0}")]
    Decode(#[source] DecodeError),

    /// The handler itself reported an error.
    #[error("handler failed: {0}")]
    Handler(BoxedApiError),

    /// The handler's reply could not be serialized as JSON.
    #[error("failed to encode response body: {0}")]
    Encode(#[source] serde_json::Error),
}

/// The decode failures behind [`DispatchError::Decode`], by payload kind.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid urlencoded payload: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StatusCode;

    fn request() -> Request {
        let raw = b"GET /api/users/u1/ HTTP/1.1\r\nHost: localhost\r\n\r\n";
        Request::parse(raw).unwrap().0
    }

    #[test]
    fn captures_roundtrip() {
        let mut captures = Captures::new();
        assert!(captures.is_empty());
        captures.insert("user-id".into(), "u1".into());
        assert_eq!(captures.get("user-id"), Some("u1"));
        assert_eq!(captures.get("other"), None);
        assert_eq!(captures.len(), 1);
    }

    #[test]
    fn context_exposes_request_and_captures() {
        let mut captures = Captures::new();
        captures.insert("user-id".into(), "u1".into());
        let cx = Context::with_captures(request(), captures);
        assert_eq!(cx.request().path(), "/api/users/u1/");
        assert_eq!(cx.capture("user-id"), Some("u1"));
    }

    #[test]
    fn record_keeps_existing_error() {
        let cx = Context::new(request());
        let outcome = Outcome::fail(
            cx,
            Response::new(StatusCode::MethodNotAllowed),
            DispatchError::MethodNotAllowed {
                method: Method::Post,
            },
        );
        let outcome = outcome.record(DispatchError::RouteNotFound { path: "/x/".into() });
        assert!(matches!(
            outcome.error(),
            Some(DispatchError::MethodNotAllowed { .. })
        ));
    }

    #[test]
    fn record_fills_missing_error() {
        let cx = Context::new(request());
        let outcome = Outcome::ok(cx, Response::new(StatusCode::NotFound));
        let outcome = outcome.record(DispatchError::RouteNotFound { path: "/x/".into() });
        assert!(matches!(
            outcome.error(),
            Some(DispatchError::RouteNotFound { .. })
        ));
    }
}
