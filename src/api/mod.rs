//! API layer -- axum routes, handlers, and middleware.

pub mod error;
mod routes;
pub mod state;

use self::error::ApiError;
use self::state::AppState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> ApiError {
    ApiError::NotFound
}
