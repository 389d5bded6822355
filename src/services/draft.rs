//! View state shared by the trip wizard screens.
//!
//! A [`TripDraftState`] holds two slots: the *draft* (a trip being composed,
//! not stored yet) and the *selected* trip (a stored trip opened for
//! editing). `is_creating_trip_mode` decides which slot is the current trip.
//! Slots are `watch` channels, so screens can subscribe and react to changes.
//! Every update publishes a new value; published trips are never mutated in
//! place.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use crate::{
    auth::Session,
    error::AppError,
    models::{
        equipment::Equipment,
        invitation::TripInvitation,
        result::OperationResult,
        trip::{ShareLevel, Trip, TripWithInfo},
        trip_info::TripInfo,
    },
    services::trips::{SubmitOutcome, TripWorkflow},
};

/// Fields entered on the trip details screen.
#[derive(Debug, Clone, Default)]
pub struct TripForm {
    pub title: String,
    pub description: Option<String>,
    pub gather_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub share_level: ShareLevel,
}

pub struct TripDraftState {
    workflow: TripWorkflow,
    is_creating_trip_mode: bool,
    is_editing_existing_trip: bool,
    draft: watch::Sender<Option<Trip>>,
    draft_info: watch::Sender<Option<TripInfo>>,
    selected: watch::Sender<Option<TripWithInfo>>,
}

impl fmt::Debug for TripDraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TripDraftState")
            .field("is_creating_trip_mode", &self.is_creating_trip_mode)
            .field("is_editing_existing_trip", &self.is_editing_existing_trip)
            .field("draft", &*self.draft.borrow())
            .field("selected", &*self.selected.borrow())
            .finish()
    }
}

impl TripDraftState {
    pub fn new(workflow: TripWorkflow) -> Self {
        Self {
            workflow,
            is_creating_trip_mode: false,
            is_editing_existing_trip: false,
            draft: watch::channel(None).0,
            draft_info: watch::channel(None).0,
            selected: watch::channel(None).0,
        }
    }

    pub fn is_creating_trip_mode(&self) -> bool {
        self.is_creating_trip_mode
    }

    pub fn set_creating_trip_mode(&mut self, creating: bool) {
        self.is_creating_trip_mode = creating;
    }

    pub fn is_editing_existing_trip(&self) -> bool {
        self.is_editing_existing_trip
    }

    pub fn subscribe_draft(&self) -> watch::Receiver<Option<Trip>> {
        self.draft.subscribe()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<TripWithInfo>> {
        self.selected.subscribe()
    }

    pub fn subscribe_results(&self) -> broadcast::Receiver<OperationResult> {
        self.workflow.subscribe_results()
    }

    /// Replaces the draft; returns `false` when `trip` equals the current draft
    /// and observers were left alone.
    pub fn set_draft_trip(&mut self, trip: Trip) -> bool {
        let changed = replace_if_different(&self.draft, trip);
        if !changed {
            trace!("draft trip unchanged");
        }
        changed
    }

    pub fn set_draft_trip_info(&mut self, trip_info: TripInfo) -> bool {
        replace_if_different(&self.draft_info, trip_info)
    }

    /// Opens a stored trip for editing, keeping any info already selected
    /// for the same trip.
    pub fn select_existing_trip(&mut self, trip: Trip) -> bool {
        let trip_info = self
            .selected
            .borrow()
            .as_ref()
            .filter(|current| current.trip.id == trip.id)
            .and_then(|current| current.trip_info.clone());
        self.select_existing_trip_with_info(TripWithInfo::new(trip, trip_info))
    }

    pub fn select_existing_trip_with_info(&mut self, trip_with_info: TripWithInfo) -> bool {
        self.is_editing_existing_trip = true;
        debug!(
            trip_id = trip_with_info.trip.id,
            title = %trip_with_info.trip.title,
            "selecting existing trip"
        );
        replace_if_different(&self.selected, trip_with_info)
    }

    /// The draft in creating mode, the selected trip otherwise.
    pub fn current_trip(&self) -> Option<Trip> {
        if self.is_creating_trip_mode {
            self.draft.borrow().clone()
        } else {
            self.selected
                .borrow()
                .as_ref()
                .map(|selected| selected.trip.clone())
        }
    }

    pub fn current_trip_info(&self) -> Option<TripInfo> {
        if self.is_creating_trip_mode {
            self.draft_info.borrow().clone()
        } else {
            self.selected
                .borrow()
                .as_ref()
                .and_then(|selected| selected.trip_info.clone())
        }
    }

    /// Appends to the draft's invitation list and republishes the draft.
    pub fn add_invitation(&mut self, invitation: TripInvitation) -> Result<(), AppError> {
        let Some(draft) = self.draft.borrow().clone() else {
            return Err(AppError::validation("no trip is being composed"));
        };
        let draft = draft.with_invitation(invitation);
        debug!(invitations = draft.invitations.len(), "added invitation to draft");
        self.draft.send_replace(Some(draft));
        Ok(())
    }

    /// Builds a trip from the details form and caches it in the slot for the
    /// current mode. Lists and unset fields are carried over from the
    /// current trip.
    pub fn cache_form(&mut self, session: &Session, form: TripForm) -> Result<(), AppError> {
        let user = session.require_user()?;
        let current = self.current_trip();
        let mut trip = current
            .clone()
            .unwrap_or_else(|| Trip::new(user.id, form.title.clone()));
        trip.title = form.title;
        trip.description = form.description;
        trip.share_level = form.share_level;
        if form.gather_time.is_some() {
            trip.gather_time = form.gather_time;
        }
        if form.end_time.is_some() {
            trip.end_time = form.end_time;
        }
        if form.image.is_some() {
            trip.image = form.image;
        }
        if current.is_none() {
            trip.user_id = user.id;
        }

        if self.is_creating_trip_mode {
            self.set_draft_trip(trip);
        } else {
            self.select_existing_trip(trip);
        }
        Ok(())
    }

    /// Replaces the current trip's equipment. Outside creating mode the change
    /// is stored right away and the outcome published; in creating mode it
    /// waits for submission.
    pub async fn update_equipment(&mut self, equipment: Vec<Equipment>) {
        let Some(current) = self.current_trip() else {
            self.workflow
                .publish(OperationResult::failed("No trip to update equipment for"));
            return;
        };
        let updated = current.with_equipment(equipment);

        if self.is_creating_trip_mode {
            self.draft.send_replace(Some(updated));
            return;
        }

        match self.workflow.repo().update_trip(&updated).await {
            Ok(()) => {
                self.select_existing_trip(updated);
                self.workflow
                    .publish(OperationResult::ok("Equipment updated successfully"));
            }
            Err(err) => {
                error!("error with update equipment: {err}");
                self.workflow
                    .publish(OperationResult::from_error("Error with update equipment", &err));
            }
        }
    }

    /// Clears every slot and enters creating mode. Ignored while an existing
    /// trip is being edited; returns whether the reset happened.
    pub fn reset_state(&mut self) -> bool {
        if self.is_editing_existing_trip {
            debug!("not resetting trip state while editing an existing trip");
            return false;
        }
        self.selected.send_replace(None);
        self.clear_draft();
        self.is_creating_trip_mode = true;
        debug!("reset new trip state");
        true
    }

    pub fn finish_editing(&mut self) {
        self.is_editing_existing_trip = false;
    }

    fn clear_draft(&mut self) {
        self.draft.send_replace(None);
        self.draft_info.send_replace(None);
    }

    /// Commits the current trip: a new trip in creating mode, an update of
    /// the selected trip otherwise.
    pub async fn submit(&mut self) -> OperationResult {
        if self.is_creating_trip_mode {
            self.submit_draft().await
        } else {
            self.submit_selected().await
        }
    }

    async fn submit_draft(&mut self) -> OperationResult {
        let Some(trip) = self.draft.borrow().clone() else {
            return self
                .workflow
                .publish(OperationResult::failed("No trip is being composed"));
        };
        let trip_info = self
            .draft_info
            .borrow()
            .clone()
            .unwrap_or_else(|| TripInfo::new(trip.title.clone()));

        let outcome = self
            .workflow
            .submit_new_trip_with_info(trip, trip_info.clone())
            .await;
        match &outcome {
            SubmitOutcome::Committed(trip) => {
                info!(trip_id = trip.id, "draft trip submitted");
                self.clear_draft();
                self.reset_state();
            }
            SubmitOutcome::PartiallyCommitted { trip, failed } => {
                warn!(
                    trip_id = trip.id,
                    failed = failed.len(),
                    "draft trip stored with unsent invitations"
                );
                // The stored trip keeps its unsent invitations for a retry.
                let trip_info = TripInfo {
                    id: trip.trip_info_id.unwrap_or_default(),
                    ..trip_info
                };
                self.clear_draft();
                self.is_creating_trip_mode = false;
                self.select_existing_trip_with_info(TripWithInfo::new(
                    trip.clone(),
                    Some(trip_info),
                ));
            }
            SubmitOutcome::Rejected { .. } => {}
        }
        outcome.to_result()
    }

    async fn submit_selected(&mut self) -> OperationResult {
        let Some(selected) = self.selected.borrow().clone() else {
            return self
                .workflow
                .publish(OperationResult::failed("No trip is selected"));
        };
        let trip_info = match self.selected_trip_info(&selected).await {
            Ok(trip_info) => trip_info,
            Err(err) => {
                error!(trip_id = selected.trip.id, "failed to load trip info: {err}");
                return self
                    .workflow
                    .publish(OperationResult::from_error("Failed to load trip info", &err));
            }
        };

        let result = self
            .workflow
            .update_existing_trip_with_info(selected.trip, trip_info)
            .await;
        if result.success {
            self.finish_editing();
        }
        result
    }

    /// The selected info, or the stored info the trip links when none was
    /// selected with it.
    async fn selected_trip_info(&self, selected: &TripWithInfo) -> Result<TripInfo, AppError> {
        if let Some(trip_info) = &selected.trip_info {
            return Ok(trip_info.clone());
        }
        let stored = self.workflow.trip_info_for(&selected.trip).await?;
        Ok(stored.unwrap_or_else(|| TripInfo::new(selected.trip.title.clone())))
    }

    /// Sends the selected trip's `Unsent` invitations again and republishes
    /// the trip with their new states.
    pub async fn retry_unsent_invitations(&mut self) -> OperationResult {
        let Some(selected) = self.selected.borrow().clone() else {
            return self
                .workflow
                .publish(OperationResult::failed("No trip is selected"));
        };
        let trip_id = selected.trip.id;
        let report = self
            .workflow
            .invitations()
            .process_unsent_invitations(&selected.trip)
            .await;
        let result = if report.is_success() {
            OperationResult::ok("Invitations sent successfully")
        } else {
            OperationResult::failed("Failed to send some invitations.")
                .with_data("failedInvitations", report.failed_user_ids())
        };

        let trip = Trip {
            invitations: report.invitations,
            ..selected.trip
        };
        self.selected
            .send_replace(Some(TripWithInfo::new(trip, selected.trip_info)));
        self.workflow.publish(result.with_data("tripId", trip_id))
    }
}

fn replace_if_different<T: PartialEq>(slot: &watch::Sender<Option<T>>, value: T) -> bool {
    slot.send_if_modified(|current| {
        if current.as_ref() == Some(&value) {
            false
        } else {
            *current = Some(value);
            true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{invitation::InvitationStatus, trip_info::DifficultyLevel, user::NewUser},
        state::{testing::fresh_state, AppState},
    };

    async fn stored_owner(state: &AppState) -> i64 {
        state
            .repo
            .insert_user(&NewUser {
                first_name: "Noa".into(),
                surname: None,
                email: "noa@example.com".into(),
                phone: None,
                password_hash: "hash".into(),
                salt: "salt".into(),
                photo: None,
            })
            .await
            .expect("insert user")
    }

    #[tokio::test]
    async fn current_trip_follows_mode() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        assert!(draft.current_trip().is_none());

        draft.reset_state();
        draft.set_draft_trip(Trip::new(1, "Summit Hike"));
        let mut stored = Trip::new(1, "Golan Loop");
        stored.id = 9;
        draft.select_existing_trip(stored);

        draft.set_creating_trip_mode(true);
        assert_eq!(draft.current_trip().map(|t| t.title), Some("Summit Hike".into()));
        draft.set_creating_trip_mode(false);
        assert_eq!(draft.current_trip().map(|t| t.title), Some("Golan Loop".into()));
    }

    #[tokio::test]
    async fn equal_draft_does_not_notify() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        let mut updates = draft.subscribe_draft();

        assert!(draft.set_draft_trip(Trip::new(1, "Summit Hike")));
        updates.borrow_and_update();
        assert!(!draft.set_draft_trip(Trip::new(1, "Summit Hike")));
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn add_invitation_republishes_draft() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        draft.reset_state();
        draft.set_draft_trip(Trip::new(1, "Summit Hike"));
        let mut updates = draft.subscribe_draft();
        updates.borrow_and_update();

        draft
            .add_invitation(TripInvitation::unsent(42))
            .expect("draft exists");

        assert!(updates.has_changed().unwrap());
        let published = updates.borrow_and_update().clone().unwrap();
        assert_eq!(published.invitations.len(), 1);
        assert_eq!(published.invitations[0].status, InvitationStatus::Unsent);
    }

    #[tokio::test]
    async fn add_invitation_without_draft_fails() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        let err = draft
            .add_invitation(TripInvitation::unsent(42))
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn reset_is_ignored_while_editing() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        let mut stored = Trip::new(1, "Golan Loop");
        stored.id = 3;
        draft.select_existing_trip(stored);

        assert!(!draft.reset_state());
        assert_eq!(draft.current_trip().map(|t| t.id), Some(3));

        draft.finish_editing();
        assert!(draft.reset_state());
        assert!(draft.is_creating_trip_mode());
        assert!(draft.current_trip().is_none());
    }

    #[tokio::test]
    async fn equipment_stays_local_while_creating() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        let mut results = draft.subscribe_results();
        draft.reset_state();
        draft.set_draft_trip(Trip::new(1, "Summit Hike"));

        draft
            .update_equipment(vec![Equipment::new("Water"), Equipment::new("Map")])
            .await;

        assert_eq!(draft.current_trip().unwrap().equipment.len(), 2);
        assert!(results.try_recv().is_err());
    }

    #[tokio::test]
    async fn cache_form_requires_a_session() {
        let (state, _root) = fresh_state().await;
        let mut draft = state.draft_state();
        draft.reset_state();
        let err = draft
            .cache_form(&Session::anonymous(), TripForm::default())
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[tokio::test]
    async fn editing_keeps_the_linked_trip_info() {
        let (state, _root) = fresh_state().await;
        let owner = stored_owner(&state).await;
        let info = TripInfo {
            area: Some("Golan".into()),
            difficulty: DifficultyLevel::Hard,
            ..TripInfo::new("Golan Loop")
        };
        let keys = state
            .repo
            .insert_trip_with_info(&Trip::new(owner, "Golan Loop"), &info)
            .await
            .expect("insert trip");
        let stored = state
            .repo
            .get_trip_by_id(keys.trip_id)
            .await
            .unwrap()
            .unwrap();

        let mut draft = state.draft_state();
        draft.select_existing_trip(stored);
        let result = draft.submit().await;
        assert!(result.success, "{}", result.reason);

        let updated = state.repo.get_trip_by_id(keys.trip_id).await.unwrap().unwrap();
        assert_eq!(updated.trip_info_id, Some(keys.trip_info_id));
        let infos = state.repo.get_all_trip_info().await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].area.as_deref(), Some("Golan"));
        assert_eq!(infos[0].difficulty, DifficultyLevel::Hard);
        assert!(!draft.is_editing_existing_trip());
    }

    #[tokio::test]
    async fn committed_draft_is_cleared_while_editing() {
        let (state, _root) = fresh_state().await;
        let owner = stored_owner(&state).await;
        let existing = state
            .repo
            .insert_trip(&Trip::new(owner, "Golan Loop"))
            .await
            .unwrap();
        let stored = state.repo.get_trip_by_id(existing).await.unwrap().unwrap();

        let mut draft = state.draft_state();
        draft.select_existing_trip(stored);
        draft.set_creating_trip_mode(true);
        draft.set_draft_trip(Trip::new(owner, "Summit Hike"));

        assert!(draft.submit().await.success);
        assert!(draft.current_trip().is_none());
        assert!(!draft.submit().await.success);
        assert_eq!(state.repo.get_all_trips().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_commit_selects_trip_with_unsent_invitations() {
        let (state, _root) = fresh_state().await;
        let owner = stored_owner(&state).await;
        let mut draft = state.draft_state();
        draft.reset_state();
        draft.set_draft_trip(Trip::new(owner, "Desert Night"));
        draft
            .add_invitation(TripInvitation::unsent(9999))
            .expect("draft exists");

        let result = draft.submit().await;
        assert!(!result.success);

        assert!(!draft.is_creating_trip_mode());
        let selected = draft.current_trip().expect("stored trip selected");
        assert_eq!(Some(selected.id), result.trip_id());
        assert_eq!(selected.invitations.len(), 1);
        assert_eq!(selected.invitations[0].status, InvitationStatus::Unsent);
        assert_eq!(selected.invitations[0].trip_id, selected.id);

        let retried = draft.retry_unsent_invitations().await;
        assert!(!retried.success);
        assert_eq!(
            retried.data_value("failedInvitations"),
            Some(&serde_json::json!([9999]))
        );
    }
}
