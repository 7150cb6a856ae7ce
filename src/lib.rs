//! # trellis
//!
//! Trie-based URL routing and typed REST dispatch for async HTTP services.
//!
//! Two pieces cooperate: a [`Router`] that matches `/`-separated path
//! patterns with named captures (`users/:user-id`) against an immutable
//! segment trie, and a [`Resource`] that binds up to four HTTP verbs to
//! typed handler shapes — decoding the query string, JSON, urlencoded form,
//! or multipart body per content negotiation, and encoding replies as JSON.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use trellis::resource::{ApiResult, MethodAdapter, Resource};
//! use trellis::router::RouterBuilder;
//! use trellis::server::Server;
//! use trellis::Context;
//!
//! #[derive(Deserialize)]
//! struct Page { offset: u32 }
//!
//! #[derive(Serialize)]
//! struct User { id: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let user = Resource::builder()
//!         .get(MethodAdapter::typed(|cx: Context, _page: Page| async move {
//!             let id = cx.capture("user-id").unwrap_or("?").to_owned();
//!             ApiResult::Ok(User { id })
//!         }))
//!         .build();
//!
//!     let router = RouterBuilder::new("/api/")
//!         .resource("users/:user-id", user)?
//!         .build()?;
//!
//!     Server::bind("127.0.0.1:8080").await?.serve(router).await?;
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod http;
pub mod resource;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::{Captures, Context, DispatchError, Outcome};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use resource::{ApiError, MethodAdapter, Resource};
pub use router::{BuildError, Router, RouterBuilder};
pub use server::{Server, ServerError};
