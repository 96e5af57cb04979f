//! Application lifecycle: apply (with CV), status transitions, withdrawal.
//!
//! The CV file and the application row live in different stores, so every
//! path that writes one keeps the other consistent: a stored CV whose row
//! cannot be inserted is deleted again, and a withdrawn application takes
//! its CV with it.

use bytes::Bytes;
use serde::Serialize;
use tracing::{info, warn};

use crate::applications::status::{ApplicationAction, ApplicationStatus};
use crate::applications::store::{ApplicationStore, SubmitOutcome};
use crate::errors::AppError;
use crate::uploads::CvStorage;

/// A CV as received from the multipart body.
#[derive(Debug, Clone)]
pub struct CvUpload {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResponse {
    pub success: bool,
    pub applied: bool,
    pub application_id: i64,
    pub cv: String,
}

/// Stores the CV, then inserts the application referencing it.
///
/// If the insert does not produce a new row (duplicate, missing job, storage
/// failure, timeout) the stored file is removed before the error is returned.
pub async fn apply_with_cv(
    store: &dyn ApplicationStore,
    cv_storage: &CvStorage,
    job_id: i64,
    user_id: i64,
    upload: CvUpload,
) -> Result<ApplyResponse, AppError> {
    let stored_name = cv_storage
        .store_cv(
            &upload.bytes,
            &upload.content_type,
            upload.file_name.as_deref(),
        )
        .await?;

    let outcome = store
        .submit_application(job_id, user_id, Some(&stored_name))
        .await;

    match outcome {
        Ok(SubmitOutcome::Created(application_id)) => Ok(ApplyResponse {
            success: true,
            applied: true,
            application_id,
            cv: stored_name,
        }),
        Ok(SubmitOutcome::AlreadyApplied) => {
            cv_storage.delete_cv(&stored_name).await;
            Err(AppError::Conflict(format!(
                "User {user_id} has already applied to job {job_id}"
            )))
        }
        Err(e) => {
            warn!("Apply to job {job_id} failed, removing stored CV {stored_name}: {e}");
            cv_storage.delete_cv(&stored_name).await;
            Err(e)
        }
    }
}

/// Applies an employer decision. The action is validated before any write.
pub async fn transition_status(
    store: &dyn ApplicationStore,
    application_id: i64,
    action: &str,
) -> Result<ApplicationStatus, AppError> {
    let action: ApplicationAction = action.parse()?;
    let status = action.target_status();
    store.set_status(application_id, status).await?;
    Ok(status)
}

/// Deletes the application, then its CV file.
pub async fn withdraw_application(
    store: &dyn ApplicationStore,
    cv_storage: &CvStorage,
    application_id: i64,
) -> Result<(), AppError> {
    let cv_path = store.delete_application(application_id).await?;
    if let Some(cv_path) = cv_path {
        cv_storage.delete_cv(&cv_path).await;
    }
    info!("Application {application_id} withdrawn");
    Ok(())
}
