use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::AppError;

/// Lifecycle of a trip invitation.
///
/// `Unsent` invitations only live inside a draft trip. Sending moves them to
/// `Pending`; the invitee answers with `Approved` or `Rejected`, both of which
/// are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[default]
    Unsent,
    Pending,
    Approved,
    Rejected,
}

impl InvitationStatus {
    /// Integer code stored in the `trip_invitations.status` column.
    pub fn code(self) -> i64 {
        match self {
            InvitationStatus::Unsent => -1,
            InvitationStatus::Pending => 0,
            InvitationStatus::Approved => 1,
            InvitationStatus::Rejected => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(InvitationStatus::Unsent),
            0 => Some(InvitationStatus::Pending),
            1 => Some(InvitationStatus::Approved),
            2 => Some(InvitationStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Unsent => "Unsent",
            InvitationStatus::Pending => "Pending",
            InvitationStatus::Approved => "Approved",
            InvitationStatus::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, InvitationStatus::Approved | InvitationStatus::Rejected)
    }

    pub fn can_transition_to(self, next: InvitationStatus) -> bool {
        matches!(
            (self, next),
            (InvitationStatus::Unsent, InvitationStatus::Pending)
                | (InvitationStatus::Pending, InvitationStatus::Approved)
                | (InvitationStatus::Pending, InvitationStatus::Rejected)
        )
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNSENT" => Ok(InvitationStatus::Unsent),
            "PENDING" => Ok(InvitationStatus::Pending),
            "APPROVED" => Ok(InvitationStatus::Approved),
            "REJECTED" => Ok(InvitationStatus::Rejected),
            other => Err(AppError::validation(format!(
                "unknown invitation status {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripInvitation {
    pub id: i64,
    pub trip_id: i64,
    pub user_id: i64,
    pub status: InvitationStatus,
}

impl TripInvitation {
    /// An invitation queued on a draft trip, not yet bound to a stored trip.
    pub fn unsent(user_id: i64) -> Self {
        Self {
            id: 0,
            trip_id: 0,
            user_id,
            status: InvitationStatus::Unsent,
        }
    }

    pub fn pending(trip_id: i64, user_id: i64) -> Self {
        Self {
            id: 0,
            trip_id,
            user_id,
            status: InvitationStatus::Pending,
        }
    }

    /// Returns a copy moved to `next`, or `InvalidTransition` if the state
    /// machine forbids the move.
    pub fn transition(&self, next: InvitationStatus) -> Result<Self, AppError> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        Ok(Self {
            status: next,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_storage() {
        for status in [
            InvitationStatus::Unsent,
            InvitationStatus::Pending,
            InvitationStatus::Approved,
            InvitationStatus::Rejected,
        ] {
            assert_eq!(InvitationStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(InvitationStatus::from_code(7), None);
    }

    #[test]
    fn pending_can_be_answered_once() {
        let invitation = TripInvitation::pending(7, 3);
        let rejected = invitation
            .transition(InvitationStatus::Rejected)
            .expect("pending -> rejected");
        assert_eq!(rejected.status, InvitationStatus::Rejected);

        let err = rejected
            .transition(InvitationStatus::Approved)
            .expect_err("rejected is terminal");
        assert!(err.is_invalid_transition());
    }

    #[test]
    fn unsent_must_be_sent_before_answering() {
        let invitation = TripInvitation::unsent(42);
        assert!(invitation.transition(InvitationStatus::Approved).is_err());
        let pending = invitation
            .transition(InvitationStatus::Pending)
            .expect("unsent -> pending");
        assert_eq!(pending.user_id, 42);
    }

    #[test]
    fn no_backward_moves() {
        assert!(!InvitationStatus::Pending.can_transition_to(InvitationStatus::Unsent));
        assert!(!InvitationStatus::Approved.can_transition_to(InvitationStatus::Pending));
        assert!(!InvitationStatus::Rejected.can_transition_to(InvitationStatus::Rejected));
    }

    #[test]
    fn parses_status_names() {
        assert_eq!(
            "approved".parse::<InvitationStatus>().ok(),
            Some(InvitationStatus::Approved)
        );
        assert!("maybe".parse::<InvitationStatus>().is_err());
    }
}
