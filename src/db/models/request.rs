// src/db/models/request.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::LifecycleState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Request,
    Project,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "request_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    InProcess,
    Completed,
    Rejected,
}

/// A request or project record as stored in the `requests` table.
///
/// `accepted_by` is the list of usernames that opted in. Completion marks
/// live in `participants_completed` and are joined on demand.
#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub department: Option<String>,
    pub departments: Vec<String>,
    pub multi_department: bool,
    pub creator: String,
    pub creator_department: Option<String>,
    pub creator_role: Option<String>,
    pub accepted_by: Vec<String>,
    pub users_needed: i32,
    pub priority: Option<String>,
    pub is_expired: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_status_update: Option<DateTime<Utc>>,
    pub status_changed_by: Option<String>,
}

impl Request {
    /// Build the lifecycle view used to evaluate transition rules.
    pub fn lifecycle<'a>(&'a self, completed_by: &'a [String]) -> LifecycleState<'a> {
        LifecycleState {
            kind: self.kind,
            status: self.status,
            multi_department: self.multi_department,
            archived: self.archived,
            creator: &self.creator,
            accepted_by: &self.accepted_by,
            completed_by,
            users_needed: self.users_needed,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewRequest {
    pub title: String,
    pub description: Option<String>,
    pub kind: RequestKind,
    /// Single target department, for plain requests.
    pub department: Option<String>,
    /// Target departments, for projects and multi-department requests.
    #[serde(default)]
    pub departments: Vec<String>,
    pub users_needed: Option<i32>,
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPayload {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Rejection {
    pub id: Uuid,
    pub request_id: Uuid,
    pub username: String,
    pub reason: Option<String>,
    pub rejected_at: DateTime<Utc>,
    pub hidden: bool,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ParticipantCompletion {
    pub id: Uuid,
    pub request_id: Uuid,
    pub username: String,
    pub completed_at: DateTime<Utc>,
}

/// A request enriched with its rejection history and completion marks.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestDetails {
    #[serde(flatten)]
    pub request: Request,
    pub rejections: Vec<Rejection>,
    pub participants_completed: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::InProcess).unwrap(),
            "\"in_process\""
        );
        assert_eq!(
            serde_json::from_str::<RequestStatus>("\"rejected\"").unwrap(),
            RequestStatus::Rejected
        );
    }

    #[test]
    fn new_request_departments_default_to_empty() {
        let payload: NewRequest = serde_json::from_str(
            r#"{"title": "Fix the printer", "kind": "request", "department": "Engineering"}"#,
        )
        .unwrap();
        assert!(payload.departments.is_empty());
        assert_eq!(payload.kind, RequestKind::Request);
        assert!(payload.users_needed.is_none());
    }
}
