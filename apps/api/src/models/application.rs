use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use crate::applications::status::ApplicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub application_id: i64,
    pub job_id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub cv_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One of a seeker's applications, joined with the job and hiring company.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationSummary {
    pub application_id: i64,
    pub job_id: i64,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub company_name: String,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub cv_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSkill {
    pub skill_id: i64,
    pub name: String,
}

/// Row shape of the candidate aggregation query; `skills` arrives as a JSON array.
#[derive(Debug, Clone, FromRow)]
pub struct CandidateRow {
    pub application_id: i64,
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ApplicationStatus,
    pub cv_path: Option<String>,
    pub skills: Json<Vec<CandidateSkill>>,
}

/// An applicant seen through their application to a specific job,
/// together with every skill they have declared on their profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "id")]
    pub application_id: i64,
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub status: ApplicationStatus,
    pub cv_path: Option<String>,
    pub skills: Vec<CandidateSkill>,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            application_id: row.application_id,
            user_id: row.user_id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            status: row.status,
            cv_path: row.cv_path,
            skills: row.skills.0,
        }
    }
}
