//! In-memory `ApplicationStore` used by unit and router tests.
//!
//! Mirrors the relational constraints the PostgreSQL schema enforces: the
//! (job, user) unique key, foreign keys to jobs and users, and the
//! application-id ordering of list queries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::applications::status::ApplicationStatus;
use crate::applications::store::{ApplicationStore, SubmitOutcome};
use crate::errors::AppError;
use crate::models::application::{ApplicationRow, ApplicationSummary, Candidate, CandidateSkill};

struct JobRecord {
    title: String,
    company_name: String,
}

struct UserRecord {
    email: String,
    full_name: String,
    skills: Vec<CandidateSkill>,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<i64, JobRecord>,
    users: HashMap<i64, UserRecord>,
    applications: BTreeMap<i64, ApplicationRow>,
    next_id: i64,
    writes: usize,
    fail_next_write: bool,
}

impl Inner {
    fn begin_write(&mut self) -> Result<(), AppError> {
        self.writes += 1;
        if std::mem::take(&mut self.fail_next_write) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "simulated write failure".to_string(),
            )));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryApplicationStore {
    inner: Mutex<Inner>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_job(&self, job_id: i64, title: &str, company_name: &str) {
        self.inner.lock().unwrap().jobs.insert(
            job_id,
            JobRecord {
                title: title.to_string(),
                company_name: company_name.to_string(),
            },
        );
    }

    /// `skills` are (skill_id, name) pairs in any order.
    pub fn add_user(&self, user_id: i64, email: &str, full_name: &str, skills: &[(i64, &str)]) {
        let mut skills: Vec<CandidateSkill> = skills
            .iter()
            .map(|(skill_id, name)| CandidateSkill {
                skill_id: *skill_id,
                name: name.to_string(),
            })
            .collect();
        skills.sort_by_key(|s| s.skill_id);

        self.inner.lock().unwrap().users.insert(
            user_id,
            UserRecord {
                email: email.to_string(),
                full_name: full_name.to_string(),
                skills,
            },
        );
    }

    pub fn application_count(&self) -> usize {
        self.inner.lock().unwrap().applications.len()
    }

    /// Number of mutating calls that reached the store.
    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap().writes
    }

    /// Makes the next mutating call fail with a database error.
    pub fn fail_next_write(&self) {
        self.inner.lock().unwrap().fail_next_write = true;
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn submit_application(
        &self,
        job_id: i64,
        user_id: i64,
        cv_path: Option<&str>,
    ) -> Result<SubmitOutcome, AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin_write()?;

        if inner
            .applications
            .values()
            .any(|a| a.job_id == job_id && a.user_id == user_id)
        {
            return Ok(SubmitOutcome::AlreadyApplied);
        }
        if !inner.jobs.contains_key(&job_id) {
            return Err(AppError::NotFound(format!("Job {job_id} not found")));
        }
        if !inner.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User {user_id} not found")));
        }

        inner.next_id += 1;
        let application_id = inner.next_id;
        inner.applications.insert(
            application_id,
            ApplicationRow {
                application_id,
                job_id,
                user_id,
                status: ApplicationStatus::Submitted,
                cv_path: cv_path.map(str::to_string),
                created_at: Utc::now(),
            },
        );
        Ok(SubmitOutcome::Created(application_id))
    }

    async fn get_application(
        &self,
        application_id: i64,
    ) -> Result<Option<ApplicationRow>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .applications
            .get(&application_id)
            .cloned())
    }

    async fn list_applications_for_user(
        &self,
        user_id: i64,
        status: Option<ApplicationStatus>,
    ) -> Result<Vec<ApplicationSummary>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .values()
            .filter(|a| a.user_id == user_id)
            .filter(|a| status.map_or(true, |s| a.status == s))
            .filter_map(|a| {
                inner.jobs.get(&a.job_id).map(|job| ApplicationSummary {
                    application_id: a.application_id,
                    job_id: a.job_id,
                    title: job.title.clone(),
                    description: format!("{} at {}", job.title, job.company_name),
                    location: None,
                    company_name: job.company_name.clone(),
                    status: a.status,
                    cv_path: a.cv_path.clone(),
                })
            })
            .collect())
    }

    async fn set_status(
        &self,
        application_id: i64,
        status: ApplicationStatus,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin_write()?;
        match inner.applications.get_mut(&application_id) {
            Some(row) => {
                row.status = status;
                Ok(())
            }
            None => Err(AppError::NotFound(format!(
                "Application {application_id} not found"
            ))),
        }
    }

    async fn delete_application(&self, application_id: i64) -> Result<Option<String>, AppError> {
        let mut inner = self.inner.lock().unwrap();
        inner.begin_write()?;
        inner
            .applications
            .remove(&application_id)
            .map(|row| row.cv_path)
            .ok_or_else(|| AppError::NotFound(format!("Application {application_id} not found")))
    }

    async fn list_candidates(&self, job_id: i64) -> Result<Vec<Candidate>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .applications
            .values()
            .filter(|a| a.job_id == job_id)
            .filter_map(|a| {
                inner.users.get(&a.user_id).map(|user| Candidate {
                    application_id: a.application_id,
                    user_id: a.user_id,
                    email: user.email.clone(),
                    full_name: user.full_name.clone(),
                    phone: None,
                    status: a.status,
                    cv_path: a.cv_path.clone(),
                    skills: user.skills.clone(),
                })
            })
            .collect())
    }
}
