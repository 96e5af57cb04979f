//! Application status state machine.
//!
//! Every application starts in `Submitted`. Employers move it forward with an
//! explicit action from a closed set; unknown actions are rejected before any
//! statement reaches the database.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Interview,
    Rejected,
}

#[derive(Debug, Error)]
#[error("unknown application status '{0}'")]
pub struct UnknownStatus(pub String);

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "interview" => Ok(ApplicationStatus::Interview),
            "rejected" => Ok(ApplicationStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

// Decoding hook for `#[sqlx(try_from = "String")]` on row structs.
impl TryFrom<String> for ApplicationStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Employer decision on an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationAction {
    Accept,
    Reject,
}

impl ApplicationAction {
    /// The status an application lands in after this action.
    pub fn target_status(self) -> ApplicationStatus {
        match self {
            ApplicationAction::Accept => ApplicationStatus::Interview,
            ApplicationAction::Reject => ApplicationStatus::Rejected,
        }
    }
}

impl FromStr for ApplicationAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(ApplicationAction::Accept),
            "reject" => Ok(ApplicationAction::Reject),
            _ => Err(AppError::InvalidAction(format!(
                "Unknown action '{s}'. Expected 'accept' or 'reject'"
            ))),
        }
    }
}
