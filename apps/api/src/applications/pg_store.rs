use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info, warn};

use crate::applications::candidates::CANDIDATE_LIST_SQL;
use crate::applications::status::ApplicationStatus;
use crate::applications::store::{ApplicationStore, SubmitOutcome};
use crate::db::with_timeout;
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationSummary, Candidate, CandidateRow};

const JOB_FOREIGN_KEY: &str = "applications_job_id_fkey";

/// State of an application INSERT before its transaction is committed.
enum PendingInsert {
    Uncommitted {
        tx: Transaction<'static, Postgres>,
        application_id: i64,
    },
    Duplicate,
}

/// PostgreSQL-backed application store. Every call checks a connection out of
/// the pool for its own duration and is bounded by `timeout`.
#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Runs the INSERT but leaves committing to the caller, so the commit can be
    /// timed separately from the statement.
    async fn insert_application(
        &self,
        job_id: i64,
        user_id: i64,
        cv_path: Option<&str>,
    ) -> Result<PendingInsert, AppError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO applications (job_id, user_id, cv_path)
            VALUES ($1, $2, $3)
            RETURNING application_id
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .bind(cv_path)
        .fetch_one(&mut *tx)
        .await;

        // Early returns drop `tx`, which rolls the transaction back.
        match inserted {
            Ok(application_id) => Ok(PendingInsert::Uncommitted { tx, application_id }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!("User {user_id} already applied to job {job_id}");
                Ok(PendingInsert::Duplicate)
            }
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                if db_err.constraint() == Some(JOB_FOREIGN_KEY) {
                    Err(AppError::NotFound(format!("Job {job_id} not found")))
                } else {
                    Err(AppError::NotFound(format!("User {user_id} not found")))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// A COMMIT cut off by the timeout may still have been applied by the server.
    /// Looks the row up so callers only compensate when it is really absent.
    async fn confirm_commit(
        &self,
        application_id: i64,
        operation: String,
    ) -> Result<SubmitOutcome, AppError> {
        let found = with_timeout(
            self.timeout,
            "confirm application commit",
            self.fetch_application(application_id),
        )
        .await;

        match found {
            Ok(Some(_)) => {
                warn!("Commit of application {application_id} timed out but the row is present");
                Ok(SubmitOutcome::Created(application_id))
            }
            Ok(None) => Err(AppError::Timeout(operation)),
            Err(e) => {
                warn!("Could not confirm commit of application {application_id}: {e}");
                Err(AppError::Timeout(operation))
            }
        }
    }

    async fn fetch_application(
        &self,
        application_id: i64,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT application_id, job_id, user_id, status, cv_path, created_at
            FROM applications
            WHERE application_id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn fetch_user_applications(
        &self,
        user_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationSummary>, AppError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT a.application_id, jb.job_id, jb.title, jb.description, jb.location,
                   cp.name AS company_name, a.status, a.cv_path
            FROM applications AS a
            JOIN jobs AS jb ON a.job_id = jb.job_id
            JOIN companies AS cp ON jb.company_id = cp.company_id
            WHERE a.user_id = "#,
        );
        query.push_bind(user_id);
        if let Some(status) = status {
            query.push(" AND a.status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY a.application_id ASC");

        Ok(query
            .build_query_as::<ApplicationSummary>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn update_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE applications SET status = $1 WHERE application_id = $2")
            .bind(status.as_str())
            .bind(application_id)
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Application {application_id} not found"
            )));
        }

        tx.commit().await?;
        info!("Application {application_id} moved to {status}");
        Ok(())
    }

    async fn remove_application(&self, application_id: i64) -> Result<Option<String>, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed: Option<(Option<String>,)> = sqlx::query_as(
            "DELETE FROM applications WHERE application_id = $1 RETURNING cv_path",
        )
        .bind(application_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (cv_path,) = removed
            .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))?;

        tx.commit().await?;
        info!("Deleted application {application_id}");
        Ok(cv_path)
    }

    async fn fetch_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, AppError> {
        let rows = sqlx::query_as::<_, CandidateRow>(CANDIDATE_LIST_SQL)
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Candidate::from).collect())
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn submit_application(
        &self,
        job_id: i64,
        user_id: i64,
        cv_path: Option<&str>,
    ) -> Result<SubmitOutcome, AppError> {
        let pending = with_timeout(
            self.timeout,
            "submit application",
            self.insert_application(job_id, user_id, cv_path),
        )
        .await?;

        let (tx, application_id) = match pending {
            PendingInsert::Uncommitted { tx, application_id } => (tx, application_id),
            PendingInsert::Duplicate => return Ok(SubmitOutcome::AlreadyApplied),
        };

        let committed = with_timeout(self.timeout, "commit application", async move {
            tx.commit().await?;
            Ok::<_, AppError>(())
        })
        .await;

        match committed {
            Ok(()) => {
                info!("Created application {application_id} for user {user_id} on job {job_id}");
                Ok(SubmitOutcome::Created(application_id))
            }
            Err(AppError::Timeout(operation)) => {
                self.confirm_commit(application_id, operation).await
            }
            Err(e) => Err(e),
        }
    }

    async fn get_application(
        &self,
        application_id: i64,
    ) -> Result<Option<ApplicationRow>, AppError> {
        with_timeout(
            self.timeout,
            "get application",
            self.fetch_application(application_id),
        )
        .await
    }

    async fn list_applications_for_user(
        &self,
        user_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationSummary>, AppError> {
        with_timeout(
            self.timeout,
            "list applications",
            self.fetch_user_applications(user_id, status),
        )
        .await
    }

    async fn set_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        with_timeout(
            self.timeout,
            "update application status",
            self.update_status(application_id, status),
        )
        .await
    }

    async fn delete_application(&self, application_id: i64) -> Result<Option<String>, AppError> {
        with_timeout(
            self.timeout,
            "delete application",
            self.remove_application(application_id),
        )
        .await
    }

    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, AppError> {
        with_timeout(
            self.timeout,
            "list candidates",
            self.fetch_candidates(job_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use sqlx::Row;

    use super::*;

    fn store(pool: PgPool) -> PgApplicationStore {
        PgApplicationStore::new(pool, Duration::from_secs(5))
    }

    /// Company 1 with jobs 42 and 43; user 7 declares three skills, user 8 none.
    async fn seed(pool: &PgPool) {
        for statement in [
            "INSERT INTO companies (company_id, name) VALUES (1, 'Acme')",
            r#"INSERT INTO jobs (job_id, company_id, title, description, location) VALUES
                (42, 1, 'Backend Engineer', 'Build APIs', 'Remote'),
                (43, 1, 'Data Engineer', 'Own pipelines', NULL)"#,
            r#"INSERT INTO users (user_id, email, full_name, phone, password_hash) VALUES
                (7, 'ada@example.com', 'Ada Lovelace', '555-0100', 'hash'),
                (8, 'alan@example.com', 'Alan Turing', NULL, 'hash')"#,
            "INSERT INTO skills (skill_id, name) VALUES (1, 'Rust'), (2, 'Go'), (3, 'SQL')",
            r#"INSERT INTO user_skills (user_id, skill_id, level, years_experience) VALUES
                (7, 3, 'expert', 6), (7, 1, 'advanced', 4), (7, 2, 'intermediate', 2)"#,
        ] {
            sqlx::query(statement).execute(pool).await.unwrap();
        }
    }

    async fn application_rows(pool: &PgPool, job_id: i64, user_id: i64) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE job_id = $1 AND user_id = $2")
            .bind(job_id)
            .bind(user_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn created(store: &PgApplicationStore, job_id: i64, user_id: i64) -> i64 {
        match store
            .submit_application(job_id, user_id, Some("cv.pdf"))
            .await
            .unwrap()
        {
            SubmitOutcome::Created(id) => id,
            SubmitOutcome::AlreadyApplied => panic!("expected a new application"),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_duplicate_submit_hits_unique_constraint(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool.clone());

        created(&store, 42, 7).await;
        let again = store.submit_application(42, 7, Some("other.pdf")).await.unwrap();

        assert_eq!(again, SubmitOutcome::AlreadyApplied);
        assert_eq!(application_rows(&pool, 42, 7).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_concurrent_duplicate_submits_store_one_row(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.submit_application(42, 7, None).await })
            })
            .collect();

        let mut new_rows = 0;
        for handle in handles {
            if let SubmitOutcome::Created(_) = handle.await.unwrap().unwrap() {
                new_rows += 1;
            }
        }
        assert_eq!(new_rows, 1);
        assert_eq!(application_rows(&pool, 42, 7).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_missing_job_or_user_is_not_found(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);

        match store.submit_application(999, 7, None).await {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("Job 999")),
            other => panic!("expected job NotFound, got {other:?}"),
        }
        match store.submit_application(42, 999, None).await {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("User 999")),
            other => panic!("expected user NotFound, got {other:?}"),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_set_status_persists_and_rejects_missing_id(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);
        let id = created(&store, 42, 7).await;

        let row = store.get_application(id).await.unwrap().unwrap();
        assert_eq!(row.status, ApplicationStatus::Submitted);

        store.set_status(id, ApplicationStatus::Interview).await.unwrap();
        let row = store.get_application(id).await.unwrap().unwrap();
        assert_eq!(row.status, ApplicationStatus::Interview);

        assert!(matches!(
            store.set_status(id + 1000, ApplicationStatus::Rejected).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_delete_returns_cv_path(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);
        let id = created(&store, 42, 7).await;

        let cv_path = store.delete_application(id).await.unwrap();
        assert_eq!(cv_path.as_deref(), Some("cv.pdf"));
        assert!(store.get_application(id).await.unwrap().is_none());
        assert!(matches!(
            store.delete_application(id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_candidates_aggregate_skills_without_null_entries(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool.clone());
        let first = created(&store, 42, 7).await;
        let second = created(&store, 42, 8).await;

        let candidates = store.list_candidates(42).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].application_id, first);
        assert_eq!(candidates[1].application_id, second);

        let names: Vec<_> = candidates[0].skills.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Rust", "Go", "SQL"]);
        assert!(candidates[1].skills.is_empty());
        assert_eq!(candidates[1].phone, None);

        // The raw aggregate for the zero-skill applicant is an empty array,
        // not an array holding a null-filled object.
        let rows = sqlx::query(CANDIDATE_LIST_SQL)
            .bind(42_i64)
            .fetch_all(&pool)
            .await
            .unwrap();
        let skills: Value = rows[1].get("skills");
        assert_eq!(skills, json!([]));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_candidates_for_job_without_applicants_is_empty(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);
        created(&store, 42, 7).await;

        assert!(store.list_candidates(43).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_user_applications_filter_by_status(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);
        let backend = created(&store, 42, 7).await;
        created(&store, 43, 7).await;
        store
            .set_status(backend, ApplicationStatus::Rejected)
            .await
            .unwrap();

        let all = store.list_applications_for_user(7, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].company_name, "Acme");
        assert_eq!(all[1].location, None);

        let rejected = store
            .list_applications_for_user(7, Some(ApplicationStatus::Rejected))
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].application_id, backend);
        assert_eq!(rejected[0].title, "Backend Engineer");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_commit_timeout_defers_to_stored_row(pool: PgPool) {
        seed(&pool).await;
        let store = store(pool);
        let id = created(&store, 42, 7).await;

        assert_eq!(
            store
                .confirm_commit(id, "commit application".to_string())
                .await
                .unwrap(),
            SubmitOutcome::Created(id)
        );
        match store
            .confirm_commit(id + 1000, "commit application".to_string())
            .await
        {
            Err(AppError::Timeout(op)) => assert_eq!(op, "commit application"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
