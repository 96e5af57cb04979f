//! Storage seam for applications.
//!
//! Default: `PgApplicationStore` (PostgreSQL via sqlx).
//! `AppState` holds an `Arc<dyn ApplicationStore>` so handlers and the
//! lifecycle functions never see a concrete connection.

use async_trait::async_trait;

use crate::applications::status::ApplicationStatus;
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationSummary, Candidate};

/// Result of inserting an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created(i64),
    /// The (job, user) pair already has an application; nothing was written.
    AlreadyApplied,
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Inserts a `submitted` application. Duplicate (job, user) pairs are
    /// detected by the storage-level unique constraint and reported as
    /// `AlreadyApplied`. A missing job or user is `NotFound`.
    async fn submit_application(
        &self,
        job_id: i64,
        user_id: i64,
        cv_path: Option<&str>,
    ) -> Result<SubmitOutcome, AppError>;

    async fn get_application(&self, application_id: i64)
        -> Result<Option<ApplicationRow>, AppError>;

    /// Applications of one user with job and company summary fields,
    /// ordered by application id.
    async fn list_applications_for_user(
        &self,
        user_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationSummary>, AppError>;

    /// Writes `status`; `NotFound` when the application does not exist.
    async fn set_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
    ) -> Result<(), AppError>;

    /// Deletes the application and hands back the CV file name it referenced.
    async fn delete_application(&self, application_id: i64) -> Result<Option<String>, AppError>;

    /// One record per application to `job_id`, each with the applicant's
    /// declared skills, ordered by application id.
    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, AppError>;
}
