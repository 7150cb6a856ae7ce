//! Verb-bound method adapters and the resource that owns them.
//!
//! A [`Resource`] maps up to four HTTP verbs (GET/POST/PUT/DELETE) onto
//! [`MethodAdapter`]s. Each adapter wraps one handler function in one of a
//! closed set of shapes, chosen by its constructor at registration time:
//!
//! | Constructor                       | Handler signature                              | Decodes          | Encodes              |
//! |-----------------------------------|------------------------------------------------|------------------|----------------------|
//! | [`MethodAdapter::plain`]          | `Fn(Context) -> Result<R, _>`                  | nothing          | `R` as JSON          |
//! | [`MethodAdapter::typed`]          | `Fn(Context, T) -> Result<R, _>`               | negotiated (`T`) | `R` as JSON          |
//! | [`MethodAdapter::raw`]            | `Fn(Context) -> Result<Response, _>`           | nothing          | handler's `Response` |
//! | [`MethodAdapter::raw_typed`]      | `Fn(Context, T) -> Result<Response, _>`        | negotiated (`T`) | handler's `Response` |
//! | [`MethodAdapter::multipart`]      | `Fn(Context, MultipartForm) -> Result<R, _>`   | multipart body   | `R` as JSON          |
//!
//! Picking a shape *is* the signature validation: a handler that does not fit
//! any constructor never becomes an adapter, so a resource with a broken
//! method cannot be built at all. A verb the resource does not implement is
//! simply never registered; dispatching it answers `405 Method Not Allowed`.
//!
//! On every call, an adapter with a typed request runs the content
//! negotiation in [`content`], refuses the request before the handler runs
//! when decoding fails, invokes the handler with its own [`Context`] clone,
//! and serializes the handler's reply as JSON with status 200.

use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::context::{Context, DispatchError, Outcome};
use crate::http::multipart::MultipartForm;
use crate::http::{Method, Response, StatusCode};
use crate::router::Handler;

mod content;

/// The error contract for resource handlers.
///
/// Implementors are ordinary error types; overriding [`respond`](Self::respond)
/// additionally lets an error take over response production (the dispatcher
/// then writes that response instead of the generic `500`). Either way the
/// error is recorded on the [`Outcome`].
pub trait ApiError: Error + Send + Sync + 'static {
    /// Produce the response for this error, or `None` to get the generic
    /// `500 Internal Server Error`.
    fn respond(&self) -> Option<Response> {
        None
    }
}

/// A boxed [`ApiError`], the error half of every handler result.
pub type BoxedApiError = Box<dyn ApiError>;

impl<E: ApiError> From<E> for BoxedApiError {
    fn from(error: E) -> Self {
        Box::new(error)
    }
}

/// The shorthand result type handler functions return.
pub type ApiResult<T> = Result<T, BoxedApiError>;

/// A ready-made [`ApiError`] that renders itself as a plain-text response
/// with a chosen status code.
///
/// # Examples
///
/// ```
/// use trellis::http::StatusCode;
/// use trellis::resource::{ApiError, Reject};
///
/// let reject = Reject::new(StatusCode::BadRequest, "no such user");
/// assert!(reject.respond().is_some());
/// ```
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Reject {
    status: StatusCode,
    message: String,
}

impl Reject {
    /// Creates a rejection with the given status and message body.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl ApiError for Reject {
    fn respond(&self) -> Option<Response> {
        Some(Response::new(self.status).body(self.message.clone()))
    }
}

type AdapterFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// One verb's validated handler: decoding, invocation, and response encoding
/// behind a single erased call. Built once at resource construction and
/// immutable afterwards.
pub struct MethodAdapter {
    invoke: Box<dyn Fn(Context) -> AdapterFuture + Send + Sync>,
}

impl MethodAdapter {
    /// A handler with no typed request, replying with a JSON-encoded value.
    pub fn plain<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            invoke: Box::new(move |cx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let result = handler(cx.clone()).await;
                    encode_reply(cx, result)
                })
            }),
        }
    }

    /// A handler taking a typed request decoded per the negotiation table,
    /// replying with a JSON-encoded value.
    pub fn typed<F, Fut, T, R>(handler: F) -> Self
    where
        F: Fn(Context, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        T: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            invoke: Box::new(move |cx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let typed: T = match content::decode(cx.request()) {
                        Ok(typed) => typed,
                        Err(error) => return refuse(cx, error),
                    };
                    let result = handler(cx.clone(), typed).await;
                    encode_reply(cx, result)
                })
            }),
        }
    }

    /// A handler with no typed request that builds its own [`Response`].
    pub fn raw<F, Fut>(handler: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            invoke: Box::new(move |cx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    match handler(cx.clone()).await {
                        Ok(response) => Outcome::ok(cx, response),
                        Err(error) => handler_failure(cx, error),
                    }
                })
            }),
        }
    }

    /// A handler taking a typed request that builds its own [`Response`].
    pub fn raw_typed<F, Fut, T>(handler: F) -> Self
    where
        F: Fn(Context, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<Response>> + Send + 'static,
        T: DeserializeOwned + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            invoke: Box::new(move |cx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let typed: T = match content::decode(cx.request()) {
                        Ok(typed) => typed,
                        Err(error) => return refuse(cx, error),
                    };
                    match handler(cx.clone(), typed).await {
                        Ok(response) => Outcome::ok(cx, response),
                        Err(error) => handler_failure(cx, error),
                    }
                })
            }),
        }
    }

    /// A handler taking the parsed [`MultipartForm`], replying with a
    /// JSON-encoded value. Requires a `multipart/form-data` request.
    pub fn multipart<F, Fut, R>(handler: F) -> Self
    where
        F: Fn(Context, MultipartForm) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self {
            invoke: Box::new(move |cx| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let form = match content::decode_multipart(cx.request()) {
                        Ok(form) => form,
                        Err(error) => return refuse(cx, error),
                    };
                    let result = handler(cx.clone(), form).await;
                    encode_reply(cx, result)
                })
            }),
        }
    }

    /// Runs the adapter for one request.
    pub fn call(&self, cx: Context) -> AdapterFuture {
        (self.invoke)(cx)
    }
}

// Decode failure: the handler never runs; the error picks the status.
fn refuse(cx: Context, error: DispatchError) -> Outcome {
    let status = match &error {
        DispatchError::UnsupportedContentType { .. } | DispatchError::MultipartMismatch => {
            StatusCode::UnsupportedMediaType
        }
        _ => StatusCode::BadRequest,
    };
    debug!(%error, "refusing request before handler invocation");
    let response = Response::new(status).body(error.to_string());
    Outcome::fail(cx, response, error)
}

// Handler error: a responding error controls the response, anything else
// becomes a generic 500. The error is recorded either way.
fn handler_failure(cx: Context, error: BoxedApiError) -> Outcome {
    let response = error
        .respond()
        .unwrap_or_else(|| Response::new(StatusCode::InternalServerError).body("internal error"));
    Outcome::fail(cx, response, DispatchError::Handler(error))
}

// Success path: serialize the reply as JSON with status 200.
fn encode_reply<R: Serialize>(cx: Context, result: ApiResult<R>) -> Outcome {
    match result {
        Ok(value) => match Response::json(&value) {
            Ok(response) => Outcome::ok(cx, response),
            Err(error) => {
                let response =
                    Response::new(StatusCode::InternalServerError).body("internal error");
                Outcome::fail(cx, response, DispatchError::Encode(error))
            }
        },
        Err(error) => handler_failure(cx, error),
    }
}

/// Up to four method adapters keyed by HTTP verb. Built once via
/// [`Resource::builder`], immutable afterwards, and safe to share across
/// concurrent dispatches.
#[derive(Default)]
pub struct Resource {
    get: Option<MethodAdapter>,
    post: Option<MethodAdapter>,
    put: Option<MethodAdapter>,
    delete: Option<MethodAdapter>,
}

impl Resource {
    /// Starts assembling a resource.
    pub fn builder() -> ResourceBuilder {
        ResourceBuilder {
            inner: Resource::default(),
        }
    }

    /// Routes one request to the adapter for its verb.
    ///
    /// A verb with no adapter — including everything outside
    /// GET/POST/PUT/DELETE — answers `405 Method Not Allowed` with a
    /// [`DispatchError::MethodNotAllowed`] recorded on the outcome.
    pub async fn dispatch(&self, cx: Context) -> Outcome {
        let adapter = match cx.request().method() {
            Method::Get => self.get.as_ref(),
            Method::Post => self.post.as_ref(),
            Method::Put => self.put.as_ref(),
            Method::Delete => self.delete.as_ref(),
            _ => None,
        };

        match adapter {
            Some(adapter) => adapter.call(cx).await,
            None => {
                let method = cx.request().method().clone();
                debug!(%method, "verb not supported by resource");
                let response =
                    Response::new(StatusCode::MethodNotAllowed).body("method not allowed");
                Outcome::fail(cx, response, DispatchError::MethodNotAllowed { method })
            }
        }
    }

    /// Adapts this resource to the router's [`Handler`] type.
    pub fn into_handler(self) -> Handler {
        let resource = Arc::new(self);
        Arc::new(move |cx| {
            let resource = Arc::clone(&resource);
            Box::pin(async move { resource.dispatch(cx).await })
        })
    }
}

/// Assembles a [`Resource`] verb by verb.
///
/// # Examples
///
/// ```
/// use trellis::context::Context;
/// use trellis::resource::{ApiResult, MethodAdapter, Resource};
///
/// let resource = Resource::builder()
///     .get(MethodAdapter::plain(|_cx: Context| async move {
///         ApiResult::Ok("hello")
///     }))
///     .build();
/// ```
pub struct ResourceBuilder {
    inner: Resource,
}

impl ResourceBuilder {
    /// Sets the adapter answering GET.
    #[must_use]
    pub fn get(mut self, adapter: MethodAdapter) -> Self {
        self.inner.get = Some(adapter);
        self
    }

    /// Sets the adapter answering POST.
    #[must_use]
    pub fn post(mut self, adapter: MethodAdapter) -> Self {
        self.inner.post = Some(adapter);
        self
    }

    /// Sets the adapter answering PUT.
    #[must_use]
    pub fn put(mut self, adapter: MethodAdapter) -> Self {
        self.inner.put = Some(adapter);
        self
    }

    /// Sets the adapter answering DELETE.
    #[must_use]
    pub fn delete(mut self, adapter: MethodAdapter) -> Self {
        self.inner.delete = Some(adapter);
        self
    }

    /// Finishes the resource.
    pub fn build(self) -> Resource {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::context::DecodeError;
    use crate::http::Request;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        f1: String,
        f2: i64,
    }

    fn context(raw: &str) -> Context {
        Context::new(Request::parse(raw.as_bytes()).unwrap().0)
    }

    fn echo_resource() -> Resource {
        Resource::builder()
            .get(MethodAdapter::typed(|_cx: Context, p: Payload| async move {
                ApiResult::Ok(p)
            }))
            .put(MethodAdapter::typed(|_cx: Context, p: Payload| async move {
                ApiResult::Ok(p)
            }))
            .build()
    }

    fn body_of(outcome: &Outcome) -> &str {
        std::str::from_utf8(outcome.response().body_ref()).unwrap()
    }

    #[tokio::test]
    async fn get_decodes_query_and_replies_json() {
        let outcome = echo_resource()
            .dispatch(context("GET /p/?f1=F1&f2=2 HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;

        assert!(outcome.error().is_none());
        assert_eq!(outcome.response().status(), StatusCode::Ok);
        assert_eq!(
            outcome.response().headers().get("content-type"),
            Some("application/json")
        );
        assert_eq!(body_of(&outcome), "{\"f1\":\"F1\",\"f2\":2}");
    }

    #[tokio::test]
    async fn put_json_round_trips() {
        let json = "{\"f1\":\"F1\",\"f2\":2}";
        let raw = format!(
            "PUT /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{json}",
            json.len(),
        );
        let outcome = echo_resource().dispatch(context(&raw)).await;

        assert!(outcome.error().is_none());
        assert_eq!(body_of(&outcome), json);
    }

    #[tokio::test]
    async fn unsupported_verb_is_405_and_recorded() {
        let outcome = echo_resource()
            .dispatch(context("POST /p/ HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;

        assert_eq!(outcome.response().status(), StatusCode::MethodNotAllowed);
        assert!(matches!(
            outcome.error(),
            Some(DispatchError::MethodNotAllowed {
                method: Method::Post
            })
        ));
    }

    #[tokio::test]
    async fn non_rest_verb_is_405() {
        let outcome = echo_resource()
            .dispatch(context("PATCH /p/ HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;
        assert_eq!(outcome.response().status(), StatusCode::MethodNotAllowed);
    }

    #[tokio::test]
    async fn multipart_against_typed_shape_never_runs_handler() {
        static RAN: AtomicBool = AtomicBool::new(false);

        let resource = Resource::builder()
            .post(MethodAdapter::typed(|_cx: Context, p: Payload| async move {
                RAN.store(true, Ordering::SeqCst);
                ApiResult::Ok(p)
            }))
            .build();

        let outcome = resource
            .dispatch(context(
                "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary=b\r\n\r\n",
            ))
            .await;

        assert!(!RAN.load(Ordering::SeqCst));
        assert_eq!(
            outcome.response().status(),
            StatusCode::UnsupportedMediaType
        );
        assert!(matches!(
            outcome.error(),
            Some(DispatchError::MultipartMismatch)
        ));
    }

    #[tokio::test]
    async fn decode_failure_is_400_before_invocation() {
        let outcome = echo_resource()
            .dispatch(context(
                "PUT /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\nnot json",
            ))
            .await;

        assert_eq!(outcome.response().status(), StatusCode::BadRequest);
        assert!(matches!(
            outcome.error(),
            Some(DispatchError::Decode(DecodeError::Json(_)))
        ));
    }

    #[tokio::test]
    async fn plain_shape_skips_decoding() {
        // invalid JSON body, but the plain shape never decodes it
        let resource = Resource::builder()
            .post(MethodAdapter::plain(|_cx: Context| async move {
                ApiResult::Ok(true)
            }))
            .build();

        let outcome = resource
            .dispatch(context(
                "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\n\r\nnot json",
            ))
            .await;

        assert!(outcome.error().is_none());
        assert_eq!(body_of(&outcome), "true");
    }

    #[tokio::test]
    async fn raw_shape_controls_its_response() {
        let resource = Resource::builder()
            .get(MethodAdapter::raw(|cx: Context| async move {
                let tag = cx.capture("tag").unwrap_or("none").to_owned();
                Ok(Response::new(StatusCode::Created).body(tag))
            }))
            .build();

        let outcome = resource
            .dispatch(context("GET /p/ HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;

        assert_eq!(outcome.response().status(), StatusCode::Created);
        assert_eq!(body_of(&outcome), "none");
    }

    #[tokio::test]
    async fn raw_typed_shape_decodes_then_responds() {
        let resource = Resource::builder()
            .put(MethodAdapter::raw_typed(
                |_cx: Context, p: Payload| async move {
                    Ok(Response::new(StatusCode::Ok).body(p.f1))
                },
            ))
            .build();

        let json = "{\"f1\":\"hello\",\"f2\":1}";
        let raw = format!(
            "PUT /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{json}",
            json.len(),
        );
        let outcome = resource.dispatch(context(&raw)).await;
        assert_eq!(body_of(&outcome), "hello");
    }

    #[tokio::test]
    async fn multipart_shape_receives_the_form() {
        let resource = Resource::builder()
            .post(MethodAdapter::multipart(
                |_cx: Context, form: MultipartForm| async move {
                    ApiResult::Ok(form.value("fieldname").unwrap_or("").to_owned())
                },
            ))
            .build();

        let body =
            "--b\r\nContent-Disposition: form-data; name=\"fieldname\"\r\n\r\nfieldvalue\r\n--b--";
        let raw = format!(
            "POST /p/ HTTP/1.1\r\nHost: x\r\nContent-Type: multipart/form-data; boundary=b\r\nContent-Length: {}\r\n\r\n{body}",
            body.len(),
        );
        let outcome = resource.dispatch(context(&raw)).await;

        assert!(outcome.error().is_none());
        assert_eq!(body_of(&outcome), "\"fieldvalue\"");
    }

    #[derive(Debug, Error)]
    #[error("boom")]
    struct Boom;
    impl ApiError for Boom {}

    #[tokio::test]
    async fn plain_handler_error_is_500_and_recorded() {
        let resource = Resource::builder()
            .get(MethodAdapter::plain(|_cx: Context| async move {
                ApiResult::<bool>::Err(Boom.into())
            }))
            .build();

        let outcome = resource
            .dispatch(context("GET /p/ HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;

        assert_eq!(
            outcome.response().status(),
            StatusCode::InternalServerError
        );
        assert!(matches!(outcome.error(), Some(DispatchError::Handler(_))));
    }

    #[tokio::test]
    async fn responding_error_controls_the_response() {
        let resource = Resource::builder()
            .get(MethodAdapter::plain(|_cx: Context| async move {
                ApiResult::<bool>::Err(
                    Reject::new(StatusCode::BadRequest, "no such user").into(),
                )
            }))
            .build();

        let outcome = resource
            .dispatch(context("GET /p/ HTTP/1.1\r\nHost: x\r\n\r\n"))
            .await;

        assert_eq!(outcome.response().status(), StatusCode::BadRequest);
        assert_eq!(body_of(&outcome), "no such user");
        // recorded as well, not just rendered
        assert!(matches!(outcome.error(), Some(DispatchError::Handler(_))));
    }
}
