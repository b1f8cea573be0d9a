//! Lifecycle rules for requests and projects.
//!
//! Every status transition, participation threshold, and retention timer is
//! defined here and nowhere else. HTTP handlers and the background sweeper
//! evaluate records through [`LifecycleState`] and [`sweep_action`] instead
//! of re-deriving the rules inline.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::request::{RequestKind, RequestStatus};

/// Minimum number of acceptors before a multi-party item counts as
/// "In Process", and before it can ever be completed.
pub const MIN_PARTICIPANTS: usize = 2;

/// Completed/rejected items expire this long after their last status change.
pub fn expiry_window() -> Duration {
    Duration::days(1)
}

/// Archived items are purged this long after archival.
pub fn archive_retention() -> Duration {
    Duration::days(7)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("request is not open for acceptance")]
    NotAcceptable,
    #[error("user has already accepted this request")]
    AlreadyAccepted,
    #[error("all needed participants have already joined")]
    ParticipantsFull,
    #[error("only accepted participants can mark completion")]
    NotParticipant,
    #[error("user has already marked this request complete")]
    AlreadyCompleted,
    #[error("request must be in process before it can be completed")]
    NotInProcess,
    #[error("request has already been resolved")]
    AlreadyResolved,
    #[error("request has been archived")]
    Archived,
    #[error("only the creator can perform this action")]
    NotCreator,
    #[error("only pending projects can be archived")]
    NotArchivable,
    #[error("only pending requests can be deleted")]
    NotDeletable,
}

/// The lifecycle-relevant slice of a request record.
///
/// Borrowed from a [`crate::db::models::request::Request`] plus the
/// completion marks loaded alongside it.
#[derive(Debug, Clone)]
pub struct LifecycleState<'a> {
    pub kind: RequestKind,
    pub status: RequestStatus,
    pub multi_department: bool,
    pub archived: bool,
    pub creator: &'a str,
    pub accepted_by: &'a [String],
    pub completed_by: &'a [String],
    pub users_needed: i32,
}

impl LifecycleState<'_> {
    /// Projects and multi-department requests track participation as a
    /// list; everything else is a single-acceptor request.
    pub fn is_multi_party(&self) -> bool {
        self.kind == RequestKind::Project || self.multi_department
    }

    fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            RequestStatus::Completed | RequestStatus::Rejected
        )
    }

    fn has_accepted(&self, username: &str) -> bool {
        self.accepted_by.iter().any(|u| u == username)
    }

    fn has_completed(&self, username: &str) -> bool {
        self.completed_by.iter().any(|u| u == username)
    }

    /// Validate an acceptance by `username` and return the status the
    /// record moves to once they are added to the acceptor list.
    pub fn accept(&self, username: &str) -> Result<RequestStatus, LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived);
        }
        if self.is_resolved() {
            return Err(LifecycleError::AlreadyResolved);
        }
        if self.has_accepted(username) {
            return Err(LifecycleError::AlreadyAccepted);
        }
        if self.is_multi_party() {
            if self.accepted_by.len() >= self.users_needed.max(MIN_PARTICIPANTS as i32) as usize {
                return Err(LifecycleError::ParticipantsFull);
            }
            let joined = self.accepted_by.len() + 1;
            if joined >= MIN_PARTICIPANTS {
                Ok(RequestStatus::InProcess)
            } else {
                Ok(RequestStatus::Pending)
            }
        } else {
            if self.status != RequestStatus::Pending {
                return Err(LifecycleError::NotAcceptable);
            }
            // First acceptance picks the request up.
            Ok(RequestStatus::InProcess)
        }
    }

    /// Validate a completion mark by `username` and return the status the
    /// record moves to once the mark is recorded.
    ///
    /// Multi-party items complete only when every acceptor has marked done
    /// and at least [`MIN_PARTICIPANTS`] joined.
    pub fn complete(&self, username: &str) -> Result<RequestStatus, LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived);
        }
        if self.is_resolved() {
            return Err(LifecycleError::AlreadyResolved);
        }
        if self.status != RequestStatus::InProcess {
            return Err(LifecycleError::NotInProcess);
        }
        if !self.has_accepted(username) {
            return Err(LifecycleError::NotParticipant);
        }
        if self.has_completed(username) {
            return Err(LifecycleError::AlreadyCompleted);
        }
        if self.is_multi_party() {
            let done = self.completed_by.len() + 1;
            if done >= self.accepted_by.len() && self.accepted_by.len() >= MIN_PARTICIPANTS {
                Ok(RequestStatus::Completed)
            } else {
                Ok(RequestStatus::InProcess)
            }
        } else {
            Ok(RequestStatus::Completed)
        }
    }

    /// Validate a rejection. Allowed while pending or in process.
    pub fn reject(&self) -> Result<RequestStatus, LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived);
        }
        if self.is_resolved() {
            return Err(LifecycleError::AlreadyResolved);
        }
        Ok(RequestStatus::Rejected)
    }

    /// Only the creator may archive, and only pending projects.
    pub fn archive(&self, username: &str) -> Result<(), LifecycleError> {
        if self.archived {
            return Err(LifecycleError::Archived);
        }
        if self.creator != username {
            return Err(LifecycleError::NotCreator);
        }
        if self.kind != RequestKind::Project || self.status != RequestStatus::Pending {
            return Err(LifecycleError::NotArchivable);
        }
        Ok(())
    }

    /// Only the creator may delete, and only while the item is pending.
    pub fn delete(&self, username: &str) -> Result<(), LifecycleError> {
        if self.creator != username {
            return Err(LifecycleError::NotCreator);
        }
        if self.status != RequestStatus::Pending {
            return Err(LifecycleError::NotDeletable);
        }
        Ok(())
    }
}

/// What the sweeper should do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAction {
    Keep,
    MarkExpired,
    Delete,
}

/// The columns the sweeper needs to classify a record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SweepRow {
    pub id: Uuid,
    pub status: RequestStatus,
    pub is_expired: bool,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub last_status_update: Option<DateTime<Utc>>,
}

/// Classify a record for the periodic sweep.
///
/// Already-flagged and retention-expired records are deleted; freshly
/// stale completed/rejected records are flagged first and picked up on
/// the following pass.
pub fn sweep_action(row: &SweepRow, now: DateTime<Utc>) -> SweepAction {
    if row.is_expired {
        return SweepAction::Delete;
    }
    if row.archived {
        if let Some(archived_at) = row.archived_at {
            if now - archived_at > archive_retention() {
                return SweepAction::Delete;
            }
        }
        return SweepAction::Keep;
    }
    if matches!(
        row.status,
        RequestStatus::Completed | RequestStatus::Rejected
    ) {
        if let Some(changed) = row.last_status_update {
            if now - changed > expiry_window() {
                return SweepAction::MarkExpired;
            }
        }
    }
    SweepAction::Keep
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state<'a>(
        kind: RequestKind,
        status: RequestStatus,
        multi: bool,
        accepted: &'a [String],
        completed: &'a [String],
    ) -> LifecycleState<'a> {
        LifecycleState {
            kind,
            status,
            multi_department: multi,
            archived: false,
            creator: "jane.smith",
            accepted_by: accepted,
            completed_by: completed,
            users_needed: 3,
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn single_request_accept_moves_to_in_process() {
        let accepted = names(&[]);
        let s = state(
            RequestKind::Request,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.accept("alex.wong"), Ok(RequestStatus::InProcess));
    }

    #[test]
    fn single_request_cannot_be_accepted_twice() {
        let accepted = names(&["alex.wong"]);
        let s = state(
            RequestKind::Request,
            RequestStatus::InProcess,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.accept("alex.wong"), Err(LifecycleError::AlreadyAccepted));
        assert_eq!(s.accept("sarah.miller"), Err(LifecycleError::NotAcceptable));
    }

    #[test]
    fn project_stays_pending_until_two_acceptors() {
        let accepted = names(&["jane.smith"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        // Creator was seeded as the first participant; one more tips it over.
        assert_eq!(s.accept("alex.wong"), Ok(RequestStatus::InProcess));

        let nobody = names(&[]);
        let s = state(
            RequestKind::Project,
            RequestStatus::Pending,
            false,
            &nobody,
            &[],
        );
        assert_eq!(s.accept("alex.wong"), Ok(RequestStatus::Pending));
    }

    #[test]
    fn project_rejects_acceptance_past_participant_target() {
        let accepted = names(&["jane.smith", "alex.wong", "sarah.miller"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::InProcess,
            false,
            &accepted,
            &[],
        );
        // users_needed is 3 in the fixture.
        assert_eq!(s.accept("john.doe"), Err(LifecycleError::ParticipantsFull));
    }

    #[test]
    fn resolved_items_accept_nothing() {
        let accepted = names(&["alex.wong"]);
        for status in [RequestStatus::Completed, RequestStatus::Rejected] {
            let s = state(RequestKind::Request, status, false, &accepted, &[]);
            assert_eq!(s.accept("sarah.miller"), Err(LifecycleError::AlreadyResolved));
            assert_eq!(s.reject(), Err(LifecycleError::AlreadyResolved));
        }
    }

    #[test]
    fn single_request_completion_resolves_it() {
        let accepted = names(&["alex.wong"]);
        let s = state(
            RequestKind::Request,
            RequestStatus::InProcess,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.complete("alex.wong"), Ok(RequestStatus::Completed));
    }

    #[test]
    fn completion_requires_participation() {
        let accepted = names(&["alex.wong"]);
        let s = state(
            RequestKind::Request,
            RequestStatus::InProcess,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.complete("sarah.miller"), Err(LifecycleError::NotParticipant));
    }

    #[test]
    fn completion_requires_in_process() {
        let accepted = names(&["jane.smith"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.complete("jane.smith"), Err(LifecycleError::NotInProcess));
    }

    #[test]
    fn project_completes_when_all_participants_are_done() {
        let accepted = names(&["jane.smith", "alex.wong", "sarah.miller"]);
        let one_done = names(&["jane.smith"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::InProcess,
            false,
            &accepted,
            &one_done,
        );
        // Second of three marks done: still in process.
        assert_eq!(s.complete("alex.wong"), Ok(RequestStatus::InProcess));

        let two_done = names(&["jane.smith", "alex.wong"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::InProcess,
            false,
            &accepted,
            &two_done,
        );
        assert_eq!(s.complete("sarah.miller"), Ok(RequestStatus::Completed));
    }

    #[test]
    fn duplicate_completion_marks_are_refused() {
        let accepted = names(&["jane.smith", "alex.wong"]);
        let done = names(&["jane.smith"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::InProcess,
            false,
            &accepted,
            &done,
        );
        assert_eq!(s.complete("jane.smith"), Err(LifecycleError::AlreadyCompleted));
    }

    #[test]
    fn multi_department_request_follows_project_thresholds() {
        let accepted = names(&["sarah.miller"]);
        let s = state(
            RequestKind::Request,
            RequestStatus::Pending,
            true,
            &accepted,
            &[],
        );
        assert!(s.is_multi_party());
        assert_eq!(s.accept("jane.smith"), Ok(RequestStatus::InProcess));
    }

    #[test]
    fn archived_items_refuse_transitions() {
        let accepted = names(&["jane.smith", "alex.wong"]);
        let s = LifecycleState {
            archived: true,
            ..state(
                RequestKind::Project,
                RequestStatus::Pending,
                false,
                &accepted,
                &[],
            )
        };
        assert_eq!(s.accept("sarah.miller"), Err(LifecycleError::Archived));
        assert_eq!(s.reject(), Err(LifecycleError::Archived));
        // Re-archiving is refused too.
        assert_eq!(s.archive("jane.smith"), Err(LifecycleError::Archived));

        let s = LifecycleState {
            archived: true,
            ..state(
                RequestKind::Project,
                RequestStatus::InProcess,
                false,
                &accepted,
                &[],
            )
        };
        assert_eq!(s.complete("jane.smith"), Err(LifecycleError::Archived));
    }

    #[test]
    fn archive_is_creator_only_and_pending_projects_only() {
        let accepted = names(&["jane.smith"]);
        let s = state(
            RequestKind::Project,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.archive("jane.smith"), Ok(()));
        assert_eq!(s.archive("alex.wong"), Err(LifecycleError::NotCreator));

        let s = state(
            RequestKind::Request,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.archive("jane.smith"), Err(LifecycleError::NotArchivable));
    }

    #[test]
    fn delete_is_creator_only_and_pending_only() {
        let accepted = names(&[]);
        let s = state(
            RequestKind::Request,
            RequestStatus::Pending,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.delete("jane.smith"), Ok(()));
        assert_eq!(s.delete("alex.wong"), Err(LifecycleError::NotCreator));

        let s = state(
            RequestKind::Request,
            RequestStatus::InProcess,
            false,
            &accepted,
            &[],
        );
        assert_eq!(s.delete("jane.smith"), Err(LifecycleError::NotDeletable));
    }

    fn sweep_row(
        status: RequestStatus,
        is_expired: bool,
        archived: bool,
        archived_at: Option<DateTime<Utc>>,
        last_status_update: Option<DateTime<Utc>>,
    ) -> SweepRow {
        SweepRow {
            id: Uuid::new_v4(),
            status,
            is_expired,
            archived,
            archived_at,
            last_status_update,
        }
    }

    #[test]
    fn stale_resolved_items_get_flagged_then_deleted() {
        let now = Utc::now();
        let row = sweep_row(
            RequestStatus::Completed,
            false,
            false,
            None,
            Some(now - Duration::days(2)),
        );
        assert_eq!(sweep_action(&row, now), SweepAction::MarkExpired);

        let row = sweep_row(RequestStatus::Completed, true, false, None, None);
        assert_eq!(sweep_action(&row, now), SweepAction::Delete);
    }

    #[test]
    fn fresh_resolved_items_are_kept() {
        let now = Utc::now();
        let row = sweep_row(
            RequestStatus::Rejected,
            false,
            false,
            None,
            Some(now - Duration::hours(12)),
        );
        assert_eq!(sweep_action(&row, now), SweepAction::Keep);
    }

    #[test]
    fn archived_items_survive_the_retention_window() {
        let now = Utc::now();
        let row = sweep_row(
            RequestStatus::Pending,
            false,
            true,
            Some(now - Duration::days(3)),
            None,
        );
        assert_eq!(sweep_action(&row, now), SweepAction::Keep);

        let row = sweep_row(
            RequestStatus::Pending,
            false,
            true,
            Some(now - Duration::days(8)),
            None,
        );
        assert_eq!(sweep_action(&row, now), SweepAction::Delete);
    }

    #[test]
    fn active_items_are_never_touched() {
        let now = Utc::now();
        for status in [RequestStatus::Pending, RequestStatus::InProcess] {
            let row = sweep_row(status, false, false, None, Some(now - Duration::days(30)));
            assert_eq!(sweep_action(&row, now), SweepAction::Keep);
        }
    }
}
