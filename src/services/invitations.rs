use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::AppError,
    models::{
        invitation::{InvitationStatus, TripInvitation},
        trip::Trip,
    },
    repository::TripRepository,
};

/// An invitation that could not be sent, with the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationFailure {
    pub user_id: i64,
    pub reason: String,
}

/// Result of sending a trip's queued invitations.
///
/// `invitations` is the trip's full list after the attempt: sent entries are
/// `Pending` with their stored id, failed entries stay `Unsent`.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub invitations: Vec<TripInvitation>,
    pub failed: Vec<InvitationFailure>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn count_with_status(&self, status: InvitationStatus) -> usize {
        self.invitations
            .iter()
            .filter(|invitation| invitation.status == status)
            .count()
    }

    pub fn failed_user_ids(&self) -> Vec<i64> {
        self.failed.iter().map(|failure| failure.user_id).collect()
    }
}

#[derive(Clone)]
pub struct InvitationService {
    repo: Arc<dyn TripRepository>,
    // Serializes responses so two answers to one invitation cannot both pass
    // the terminal-state check.
    respond_lock: Arc<Mutex<()>>,
}

impl InvitationService {
    pub fn new(repo: Arc<dyn TripRepository>) -> Self {
        Self {
            repo,
            respond_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Invites `user_id` to a stored trip right away; the invitation is stored
    /// as `Pending`.
    pub async fn send_invitation(
        &self,
        trip_id: i64,
        user_id: i64,
    ) -> Result<TripInvitation, AppError> {
        let Some(trip) = self.repo.get_trip_by_id(trip_id).await? else {
            return Err(AppError::validation(format!("trip {trip_id} does not exist")));
        };
        if self.repo.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::validation(format!("user {user_id} does not exist")));
        }
        if trip.has_participant(user_id) {
            return Err(AppError::validation(format!(
                "user {user_id} already participates in trip {trip_id}"
            )));
        }
        if self.has_pending_invitation(user_id, trip_id).await? {
            return Err(AppError::validation(format!(
                "user {user_id} already has a pending invitation to trip {trip_id}"
            )));
        }

        let stored = self
            .repo
            .send_trip_invitation(&TripInvitation::pending(trip_id, user_id))
            .await?;
        info!(invitation_id = stored.id, trip_id, user_id, "sent trip invitation");
        Ok(stored)
    }

    /// Builds an `Unsent` invitation for a draft trip. Only the user is
    /// checked, since the trip has no id yet.
    pub async fn queue_invitation(&self, user_id: i64) -> Result<TripInvitation, AppError> {
        if self.repo.get_user_by_id(user_id).await?.is_none() {
            return Err(AppError::validation(format!("user {user_id} does not exist")));
        }
        Ok(TripInvitation::unsent(user_id))
    }

    pub async fn respond_to_invitation(
        &self,
        invitation: &TripInvitation,
        new_status: InvitationStatus,
    ) -> Result<TripInvitation, AppError> {
        if !new_status.is_terminal() {
            return Err(AppError::InvalidTransition {
                from: invitation.status,
                to: new_status,
            });
        }

        let _guard = self.respond_lock.lock().await;
        let stored = self
            .repo
            .get_trip_invitation_by_id(invitation.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("invitation {}", invitation.id)))?;
        let updated = match stored.transition(new_status) {
            Ok(updated) => updated,
            Err(err) => {
                warn!(
                    invitation_id = stored.id,
                    status = %stored.status,
                    requested = %new_status,
                    "rejected invitation response"
                );
                return Err(err);
            }
        };

        debug!(
            invitation_id = updated.id,
            trip_id = updated.trip_id,
            status = %new_status,
            "responding to trip invitation"
        );
        // Participant first: adding is idempotent, so a failed status write
        // can simply be retried.
        if new_status == InvitationStatus::Approved {
            self.add_participant(updated.trip_id, updated.user_id)
                .await?;
        }
        self.repo.update_trip_invitation(&updated).await?;
        Ok(updated)
    }

    /// Adds `user_id` to the stored trip's participants unless already there.
    pub async fn add_participant(&self, trip_id: i64, user_id: i64) -> Result<Trip, AppError> {
        let trip = self
            .repo
            .get_trip_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("trip {trip_id}")))?;
        let user = self
            .repo
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {user_id}")))?;

        if trip.has_participant(user.id) {
            debug!(trip_id, user_id, "user already participates");
            return Ok(trip);
        }
        let trip = trip.with_participant(user.id);
        self.repo.update_trip(&trip).await?;
        info!(trip_id, user_id, "added {} to trip participants", user.full_name());
        Ok(trip)
    }

    /// Sends every `Unsent` invitation of a stored trip. Failed invitations
    /// stay `Unsent` and are listed in the report.
    pub async fn process_unsent_invitations(&self, trip: &Trip) -> DispatchReport {
        let mut report = DispatchReport::default();
        for invitation in &trip.invitations {
            if invitation.status != InvitationStatus::Unsent {
                report.invitations.push(invitation.clone());
                continue;
            }
            let bound = TripInvitation {
                trip_id: trip.id,
                ..invitation.clone()
            };
            match self.send_bound(trip, &bound).await {
                Ok(sent) => report.invitations.push(sent),
                Err(err) => {
                    warn!(
                        trip_id = trip.id,
                        user_id = bound.user_id,
                        "failed to send trip invitation: {err}"
                    );
                    report.failed.push(InvitationFailure {
                        user_id: bound.user_id,
                        reason: err.to_string(),
                    });
                    report.invitations.push(bound);
                }
            }
        }
        debug!(
            trip_id = trip.id,
            failed = report.failed.len(),
            "processed unsent invitations"
        );
        report
    }

    async fn send_bound(
        &self,
        trip: &Trip,
        invitation: &TripInvitation,
    ) -> Result<TripInvitation, AppError> {
        if !trip.is_persisted() {
            return Err(AppError::validation("trip has not been stored yet"));
        }
        let pending = invitation.transition(InvitationStatus::Pending)?;
        self.repo.send_trip_invitation(&pending).await
    }

    pub async fn has_pending_invitation(
        &self,
        user_id: i64,
        trip_id: i64,
    ) -> Result<bool, AppError> {
        let invitations = self.repo.get_trip_invitations_by_trip_id(trip_id).await?;
        Ok(invitations.iter().any(|invitation| {
            invitation.user_id == user_id && invitation.status == InvitationStatus::Pending
        }))
    }

    pub async fn invitations_for_trip(
        &self,
        trip_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError> {
        self.repo.get_trip_invitations_by_trip_id(trip_id).await
    }

    pub async fn invitations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError> {
        self.repo.get_trip_invitations_for_user(user_id).await
    }

    pub async fn delete_invitation(&self, invitation: &TripInvitation) -> Result<(), AppError> {
        self.repo.delete_trip_invitation(invitation).await
    }
}
