pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::applications::handlers;
use crate::state::AppState;
use crate::uploads::MAX_CV_BYTES;

// Large enough that oversized CVs reach the handler and get a TOO_LARGE response
// instead of a bare 413 from the body limit.
const APPLY_BODY_LIMIT: usize = 2 * MAX_CV_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let application = Router::new()
        .route(
            "/apply/:job_id",
            post(handlers::handle_apply).layer(DefaultBodyLimit::max(APPLY_BODY_LIMIT)),
        )
        .route(
            "/candidate_list/:job_id",
            get(handlers::handle_candidate_list),
        )
        .route(
            "/application_list",
            get(handlers::handle_application_list),
        )
        .route("/cv/:filename", get(handlers::handle_get_cv))
        .route("/:id/:action", post(handlers::handle_transition))
        .route("/:id", delete(handlers::handle_withdraw));

    Router::new()
        .route("/health", get(health::health_handler))
        .nest("/api/application", application)
        .with_state(state)
}
