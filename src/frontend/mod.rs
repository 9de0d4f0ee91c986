mod handlers;
mod templates;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::buffer::Buffer;
use crate::scheduler::SchedulerHandle;
pub use templates::Templates;

/// Deadline the Front-end waits for a SUBMIT reply before reporting TIMEOUT.
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(1);
/// Deadline for a CHECK reply.
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(2);
/// Deadline for an EVICT acknowledgement.
pub const EVICT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct AppState {
    pub scheduler: SchedulerHandle,
    pub buffer: Arc<Mutex<Buffer>>,
    pub templates: Templates,
    pub server_address: String,
    pub server_port: u16,
}

/// Builds the Front-end's `axum` router: a single HTTP surface handling the
/// start page, new-submission GETs, poll/retrieve GETs, and renderer-upload
/// POSTs, all at `/`. `Access-Control-Allow-Origin: *` is applied uniformly
/// via a CORS layer rather than per-handler, since every response needs it.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::get_root).post(handlers::post_root))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
