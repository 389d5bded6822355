use std::sync::Arc;

use chrono::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    auth::Session,
    error::AppError,
    models::{
        equipment::Equipment,
        result::OperationResult,
        trip::{Trip, TripWithInfo},
        trip_info::TripInfo,
    },
    repository::TripRepository,
    services::invitations::{InvitationFailure, InvitationService},
};

/// How a new-trip submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Trip stored and every queued invitation sent.
    Committed(Trip),
    /// Trip stored, but some invitations could not be sent.
    PartiallyCommitted {
        trip: Trip,
        failed: Vec<InvitationFailure>,
    },
    /// Nothing stored.
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Committed(_))
    }

    pub fn trip(&self) -> Option<&Trip> {
        match self {
            SubmitOutcome::Committed(trip) | SubmitOutcome::PartiallyCommitted { trip, .. } => {
                Some(trip)
            }
            SubmitOutcome::Rejected { .. } => None,
        }
    }

    pub fn to_result(&self) -> OperationResult {
        match self {
            SubmitOutcome::Committed(trip) => {
                OperationResult::ok("Trip created successfully").with_data("tripId", trip.id)
            }
            SubmitOutcome::PartiallyCommitted { trip, failed } => {
                let failed_users: Vec<i64> = failed.iter().map(|f| f.user_id).collect();
                OperationResult::failed("Failed to send some invitations.")
                    .with_data("tripId", trip.id)
                    .with_data("failedInvitations", failed_users)
            }
            SubmitOutcome::Rejected { reason } => OperationResult::failed(reason.clone()),
        }
    }
}

/// Commits trips and runs the remaining trip operations, publishing the
/// outcome of each workflow on the shared result channel.
#[derive(Clone)]
pub struct TripWorkflow {
    repo: Arc<dyn TripRepository>,
    invitations: InvitationService,
    results: broadcast::Sender<OperationResult>,
    default_trip_length: Duration,
}

impl TripWorkflow {
    pub fn new(
        repo: Arc<dyn TripRepository>,
        invitations: InvitationService,
        results: broadcast::Sender<OperationResult>,
        default_trip_length: Duration,
    ) -> Self {
        Self {
            repo,
            invitations,
            results,
            default_trip_length,
        }
    }

    pub fn repo(&self) -> &Arc<dyn TripRepository> {
        &self.repo
    }

    pub fn invitations(&self) -> &InvitationService {
        &self.invitations
    }

    pub fn subscribe_results(&self) -> broadcast::Receiver<OperationResult> {
        self.results.subscribe()
    }

    pub(crate) fn publish(&self, result: OperationResult) -> OperationResult {
        if self.results.send(result.clone()).is_err() {
            debug!("no result observers for: {}", result.reason);
        }
        result
    }

    pub async fn submit_new_trip_with_info(
        &self,
        trip: Trip,
        trip_info: TripInfo,
    ) -> SubmitOutcome {
        let outcome = self.insert_and_dispatch(trip, trip_info).await;
        self.publish(outcome.to_result());
        outcome
    }

    async fn insert_and_dispatch(&self, trip: Trip, trip_info: TripInfo) -> SubmitOutcome {
        let trip = trip
            .with_default_end_time(self.default_trip_length)
            .ensure_owner_participant();
        if let Err(err) = trip.validate() {
            warn!("refusing to store invalid trip: {err}");
            return SubmitOutcome::Rejected {
                reason: format!("Trip is invalid: {err}"),
            };
        }

        let keys = match self.repo.insert_trip_with_info(&trip, &trip_info).await {
            Ok(keys) => keys,
            Err(err) => {
                error!("failed to insert trip and trip info: {err}");
                return SubmitOutcome::Rejected {
                    reason: format!("Failed to insert trip and trip info: {err}"),
                };
            }
        };
        info!(trip_id = keys.trip_id, title = %trip.title, "stored new trip");

        let stamped = Trip {
            id: keys.trip_id,
            trip_info_id: Some(keys.trip_info_id),
            ..trip
        };
        let report = self.invitations.process_unsent_invitations(&stamped).await;
        let trip = Trip {
            invitations: report.invitations.clone(),
            ..stamped
        };
        if report.is_success() {
            SubmitOutcome::Committed(trip)
        } else {
            SubmitOutcome::PartiallyCommitted {
                trip,
                failed: report.failed,
            }
        }
    }

    pub async fn update_existing_trip_with_info(
        &self,
        trip: Trip,
        trip_info: TripInfo,
    ) -> OperationResult {
        let trip = trip.with_default_end_time(self.default_trip_length);
        let trip_info = bind_linked_info(&trip, trip_info);
        let result = match trip.validate() {
            Err(err) => OperationResult::from_error("Trip is invalid", &err),
            Ok(()) => match self.repo.update_trip_with_info(&trip, &trip_info).await {
                Ok(()) => {
                    info!(trip_id = trip.id, "updated trip with info");
                    OperationResult::ok("Trip updated successfully").with_data("tripId", trip.id)
                }
                Err(err) => {
                    error!(trip_id = trip.id, "failed to update trip and trip info: {err}");
                    OperationResult::from_error("Failed to update trip and trip info", &err)
                }
            },
        };
        self.publish(result)
    }

    pub async fn fetch_trip(&self, trip_id: i64) -> Result<Option<TripWithInfo>, AppError> {
        let Some(trip) = self.repo.get_trip_by_id(trip_id).await? else {
            return Ok(None);
        };
        let trip_info = self.trip_info_for(&trip).await?;
        Ok(Some(TripWithInfo::new(trip, trip_info)))
    }

    pub async fn fetch_all_trips(&self) -> Result<Vec<Trip>, AppError> {
        self.repo.get_all_trips().await
    }

    pub async fn fetch_trips_by_owner(&self, user_id: i64) -> Result<Vec<Trip>, AppError> {
        self.repo.get_trips_by_user_id(user_id).await
    }

    pub async fn fetch_trips_for_participant_with_info(
        &self,
        user_id: i64,
    ) -> Result<Vec<TripWithInfo>, AppError> {
        let mut trips = Vec::new();
        for trip in self.repo.get_all_trips().await? {
            if !trip.has_participant(user_id) {
                continue;
            }
            let trip_info = self.trip_info_for(&trip).await?;
            trips.push(TripWithInfo::new(trip, trip_info));
        }
        Ok(trips)
    }

    pub(crate) async fn trip_info_for(
        &self,
        trip: &Trip,
    ) -> Result<Option<TripInfo>, AppError> {
        match trip.trip_info_id {
            Some(id) => self.repo.get_trip_info_by_id(id).await,
            None => Ok(None),
        }
    }

    /// Stores `trip_info` and links it to trip `trip_id`. An unsaved info
    /// replaces the contents of the info the trip already links.
    pub async fn update_trip_info(
        &self,
        trip_id: i64,
        trip_info: &TripInfo,
    ) -> Result<(), AppError> {
        let trip = self
            .repo
            .get_trip_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("trip {trip_id}")))?;
        let trip_info = bind_linked_info(&trip, trip_info.clone());
        self.repo.update_trip_with_info(&trip, &trip_info).await
    }

    /// Deletes a trip on behalf of its owner.
    pub async fn delete_trip(&self, session: &Session, trip: &Trip) -> OperationResult {
        let result = match self.delete_owned_trip(session, trip).await {
            Ok(()) => {
                info!(trip_id = trip.id, "deleted trip");
                OperationResult::ok("Trip deleted successfully")
            }
            Err(err) => {
                warn!(trip_id = trip.id, "failed to delete trip: {err}");
                OperationResult::from_error("Failed to delete trip", &err)
            }
        };
        self.publish(result)
    }

    async fn delete_owned_trip(&self, session: &Session, trip: &Trip) -> Result<(), AppError> {
        let user = session.require_user()?;
        let stored = self
            .repo
            .get_trip_by_id(trip.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("trip {}", trip.id)))?;
        if stored.user_id != user.id {
            return Err(AppError::Unauthorized);
        }
        self.repo.delete_trip(&stored).await
    }

    pub async fn add_equipment(
        &self,
        trip_id: i64,
        equipment: Equipment,
    ) -> Result<Trip, AppError> {
        self.modify_stored_trip(trip_id, |mut trip| {
            trip.equipment.push(equipment);
            trip
        })
        .await
    }

    pub async fn remove_equipment(
        &self,
        trip_id: i64,
        equipment_id: Uuid,
    ) -> Result<Trip, AppError> {
        self.modify_stored_trip(trip_id, |mut trip| {
            trip.equipment.retain(|item| item.id != equipment_id);
            trip
        })
        .await
    }

    /// Replaces the item with id `old_id`; unknown ids leave the list as is.
    pub async fn replace_equipment(
        &self,
        trip_id: i64,
        old_id: Uuid,
        replacement: Equipment,
    ) -> Result<Trip, AppError> {
        self.modify_stored_trip(trip_id, |mut trip| {
            if let Some(slot) = trip.equipment.iter_mut().find(|item| item.id == old_id) {
                *slot = replacement;
            }
            trip
        })
        .await
    }

    async fn modify_stored_trip<F>(&self, trip_id: i64, change: F) -> Result<Trip, AppError>
    where
        F: FnOnce(Trip) -> Trip + Send,
    {
        let trip = self
            .repo
            .get_trip_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("trip {trip_id}")))?;
        let trip = change(trip);
        self.repo.update_trip(&trip).await?;
        Ok(trip)
    }
}

/// Gives an unsaved `trip_info` the id of the info row `trip` already links,
/// so a trip never ends up with a second info row.
fn bind_linked_info(trip: &Trip, trip_info: TripInfo) -> TripInfo {
    match trip.trip_info_id {
        Some(linked) if trip_info.id == 0 => TripInfo {
            id: linked,
            ..trip_info
        },
        _ => trip_info,
    }
}
