//! Route table of the message board API.

pub mod boards;
pub mod health;
pub mod replies;
pub mod threads;

use std::path::Path;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::services::ServeDir;

use crate::error::ErrorKind;
use crate::state::AppState;

/// Builds the API router. Requests matching no route are served from
/// `static_dir` when one is given. Middleware is added separately, see
/// [`crate::layers`].
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let state = Arc::new(state);
    let api = Router::new()
        .merge(health::router())
        .merge(threads::router())
        .merge(replies::router())
        .merge(boards::router())
        .method_not_allowed_fallback(not_supported);

    let api = match static_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "serving static files");
            let files = ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .fallback(not_supported.into_service());
            api.fallback_service(files)
        }
        None => api.fallback(not_supported),
    };

    api.layer(middleware::from_fn_with_state(state.clone(), count_errors))
        .with_state(state)
}

/// Anything without a route, including a known path with an unknown method.
async fn not_supported(method: Method, uri: Uri) -> (StatusCode, String) {
    let target = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    tracing::debug!(%method, target, "unsupported request");
    (StatusCode::NOT_FOUND, format!("{method} {target} not supported."))
}

async fn count_errors(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if let Some(ErrorKind(kind)) = response.extensions().get::<ErrorKind>() {
        state.metrics.api_error(kind);
    }
    response
}
