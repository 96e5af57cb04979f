use std::sync::Arc;

use crate::applications::store::ApplicationStore;
use crate::uploads::CvStorage;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable application store. Default: `PgApplicationStore`.
    pub applications: Arc<dyn ApplicationStore>,
    pub cv_storage: CvStorage,
}
