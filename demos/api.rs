//! A small JSON notes API on the built-in transport.
//!
//! Run with `cargo run --example api`, then:
//!
//! ```text
//! curl http://127.0.0.1:8080/api/notes/
//! curl -X POST -H 'Content-Type: application/json' \
//!      -d '{"title":"groceries","body":"eggs, coffee"}' \
//!      http://127.0.0.1:8080/api/notes/
//! curl http://127.0.0.1:8080/api/notes/7/
//! ```

use serde::{Deserialize, Serialize};
use trellis::resource::{ApiResult, MethodAdapter, Reject, Resource};
use trellis::router::RouterBuilder;
use trellis::server::Server;
use trellis::{Context, StatusCode};

#[derive(Debug, Deserialize)]
struct CreateNote {
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct Note {
    id: u64,
    title: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    offset: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trellis=debug".into()),
        )
        .init();

    let notes = Resource::builder()
        .get(MethodAdapter::typed(|_cx: Context, q: ListQuery| async move {
            ApiResult::Ok(vec![Note {
                id: q.offset + 1,
                title: "first".into(),
                body: "hello".into(),
            }])
        }))
        .post(MethodAdapter::typed(
            |_cx: Context, req: CreateNote| async move {
                ApiResult::Ok(Note {
                    id: 1,
                    title: req.title,
                    body: req.body,
                })
            },
        ))
        .build();

    let note = Resource::builder()
        .get(MethodAdapter::plain(|cx: Context| async move {
            let id: u64 = cx
                .capture("note-id")
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| Reject::new(StatusCode::BadRequest, "note id must be a number"))?;
            ApiResult::Ok(Note {
                id,
                title: "first".into(),
                body: "hello".into(),
            })
        }))
        .build();

    let router = RouterBuilder::new("/api/")
        .resource("notes/", notes)?
        .resource("notes/:note-id", note)?
        .build()?;

    eprintln!("{}", router.tree());

    Server::bind("127.0.0.1:8080").await?.serve(router).await?;
    Ok(())
}
