//! Prefix-rooted request routing over a path-segment trie.
//!
//! Patterns are `/`-separated segment templates; a segment starting with `:`
//! is a named capture bound at match time:
//!
//! | Pattern                        | Example match                   | Captures                              |
//! |--------------------------------|---------------------------------|---------------------------------------|
//! | `users/`                       | `/api/users/`                   | *(none)*                              |
//! | `users/:user-id`               | `/api/users/u1/`                | `user-id → "u1"`                      |
//! | `users/:user-id/feeds/:feed-id`| `/api/users/u1/feeds/f9/`       | `user-id → "u1"`, `feed-id → "f9"`    |
//! | `` (empty)                     | the prefix itself, `/api/`      | *(none)*                              |
//!
//! Patterns always normalize to a trailing `/`, so matched paths end with one
//! too. Registration happens on [`RouterBuilder`]; [`RouterBuilder::build`]
//! consumes the builder and produces an immutable [`Router`], which makes
//! "no registration after build, no matching before it" a property of the
//! types rather than a runtime check. Literal siblings are tried in
//! registration order; a node can carry at most one capture edge, which
//! [`RouterBuilder::build`] enforces with an [`BuildError::AmbiguousCapture`]
//! error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::context::{Captures, Context, DispatchError, Outcome};
use crate::http::{Request, Response, StatusCode};

mod trie;

/// Type-erased, heap-allocated async handler: consumes a [`Context`],
/// produces an [`Outcome`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so the router can be shared
/// across tasks without copying the underlying closures. Construct them via
/// [`RouterBuilder::handle`] / [`RouterBuilder::not_found`] (any
/// [`IntoHandler`]), or from a resource with
/// [`Resource::into_handler`](crate::resource::Resource::into_handler).
pub type Handler = Arc<
    dyn Fn(Context) -> Pin<Box<dyn Future<Output = Outcome> + Send>> + Send + Sync + 'static,
>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Outcome> + Send` that is also
/// `Send + Sync + 'static` implements this automatically via the blanket
/// impl, so registration sites can take `impl IntoHandler` instead of
/// repeating the two-type-parameter where-bound.
pub trait IntoHandler: Send + Sync + 'static {
    /// Call the handler with the given context, boxing the returned future.
    fn call(&self, cx: Context) -> Pin<Box<dyn Future<Output = Outcome> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Outcome> + Send + 'static,
{
    fn call(&self, cx: Context) -> Pin<Box<dyn Future<Output = Outcome> + Send>> {
        Box::pin((self)(cx))
    }
}

/// Registration-time failures. All of them abort construction — a router
/// with a broken pattern set never exists.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The same segment sequence was registered twice.
    #[error("pattern already registered: {pattern}")]
    DuplicatePattern { pattern: String },

    /// Two differently-named captures would share a parent node.
    #[error("ambiguous capture in pattern {pattern}: a sibling capture {existing} already exists")]
    AmbiguousCapture { pattern: String, existing: String },
}

/// Collects patterns and handlers, then builds an immutable [`Router`].
///
/// # Examples
///
/// ```
/// use trellis::context::Outcome;
/// use trellis::http::{Response, StatusCode};
/// use trellis::router::RouterBuilder;
///
/// # fn main() -> Result<(), trellis::router::BuildError> {
/// let router = RouterBuilder::new("/api/")
///     .handle("users/:user-id", |cx: trellis::Context| async move {
///         let body = cx.capture("user-id").unwrap_or("?").to_owned();
///         Outcome::ok(cx, Response::new(StatusCode::Ok).body(body))
///     })?
///     .build()?;
/// assert_eq!(router.prefix(), "/api/");
/// # Ok(())
/// # }
/// ```
pub struct RouterBuilder {
    prefix: String,
    routes: Vec<(String, Handler)>,
    not_found: Handler,
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("prefix", &self.prefix)
            .field("routes", &self.routes.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RouterBuilder {
    /// Creates a builder rooted at `prefix`.
    ///
    /// The prefix is normalized to start and end with `/` — `""`, `"api"`,
    /// `"/api"`, and `"/api/"` become `"/"`, `"/api/"`, `"/api/"`, `"/api/"`.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            routes: Vec::new(),
            not_found: default_not_found(),
        }
    }

    /// Replaces the fallback handler invoked when no pattern matches.
    ///
    /// The default fallback answers with a plain `404 Not Found`.
    #[must_use]
    pub fn not_found(mut self, handler: impl IntoHandler) -> Self {
        self.not_found = erase(handler);
        self
    }

    /// Registers `pattern` with a handler function.
    ///
    /// The pattern is normalized first: one leading `/` is dropped and a
    /// trailing `/` is appended if absent. The empty pattern addresses the
    /// prefix root itself.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicatePattern`] when the normalized pattern was
    /// already registered.
    pub fn handle(self, pattern: &str, handler: impl IntoHandler) -> Result<Self, BuildError> {
        self.mount(pattern, erase(handler))
    }

    /// Registers `pattern` with a [`Resource`](crate::resource::Resource).
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicatePattern`] when the normalized pattern was
    /// already registered.
    pub fn resource(
        self,
        pattern: &str,
        resource: crate::resource::Resource,
    ) -> Result<Self, BuildError> {
        self.mount(pattern, resource.into_handler())
    }

    fn mount(mut self, pattern: &str, handler: Handler) -> Result<Self, BuildError> {
        let pattern = normalize_pattern(pattern);
        if self.routes.iter().any(|(existing, _)| *existing == pattern) {
            return Err(BuildError::DuplicatePattern { pattern });
        }
        self.routes.push((pattern, handler));
        Ok(self)
    }

    /// Consumes the builder and constructs the trie.
    ///
    /// # Errors
    ///
    /// [`BuildError::AmbiguousCapture`] when two differently-named capture
    /// segments would become siblings; [`BuildError::DuplicatePattern`] when
    /// two registrations collapse to the same segment sequence.
    pub fn build(self) -> Result<Router, BuildError> {
        let root = trie::build(&self.prefix, self.routes)?;
        Ok(Router {
            prefix: self.prefix,
            root,
            not_found: self.not_found,
        })
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new("/")
    }
}

/// The built, immutable router: a prefix, the segment trie, and a fallback
/// handler. Safe to share behind an [`Arc`] across any number of concurrent
/// dispatches — nothing in it is ever mutated after [`RouterBuilder::build`].
pub struct Router {
    prefix: String,
    root: trie::Node,
    not_found: Handler,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// The normalized URL prefix this router is rooted at.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Matches `path` against the trie.
    ///
    /// Returns the registered handler plus the captures bound along the way,
    /// or `None` when the path is outside the prefix or no pattern matches.
    /// A pure function of `(self, path)` — repeated calls always agree.
    pub fn match_path(&self, path: &str) -> Option<(&Handler, Captures)> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            return self
                .root
                .handler()
                .map(|handler| (handler, Captures::new()));
        }
        trie::walk(&self.root, rest)
    }

    /// Routes one request: match, publish captures into the [`Context`], and
    /// run the matched handler — or the fallback when nothing matches, with
    /// a [`DispatchError::RouteNotFound`] recorded on the outcome.
    pub async fn dispatch(&self, request: Request) -> Outcome {
        match self.match_path(request.path()) {
            Some((handler, captures)) => {
                debug!(path = %request.path(), "route matched");
                let cx = Context::with_captures(request, captures);
                handler(cx).await
            }
            None => {
                debug!(path = %request.path(), "no route matched, using fallback");
                let path = request.path().to_owned();
                let outcome = (self.not_found)(Context::new(request)).await;
                outcome.record(DispatchError::RouteNotFound { path })
            }
        }
    }

    /// Renders the trie for debugging: one node per line, children indented,
    /// nodes with a handler marked `(h)`.
    pub fn tree(&self) -> String {
        trie::render(&self.root)
    }
}

fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |cx| handler.call(cx))
}

fn default_not_found() -> Handler {
    Arc::new(|cx| {
        Box::pin(async move {
            Outcome::ok(cx, Response::new(StatusCode::NotFound).body("not found"))
        })
    })
}

fn normalize_prefix(prefix: &str) -> String {
    if prefix.is_empty() {
        return "/".to_owned();
    }
    let mut normalized = String::with_capacity(prefix.len() + 2);
    if !prefix.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(prefix);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.strip_prefix('/').unwrap_or(pattern);
    if pattern.is_empty() || pattern.ends_with('/') {
        pattern.to_owned()
    } else {
        format!("{pattern}/")
    }
}
