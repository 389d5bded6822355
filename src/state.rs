use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    config::AppConfig,
    db::DbPool,
    repository::{SqliteRepository, TripRepository},
    services::{draft::TripDraftState, invitations::InvitationService, trips::TripWorkflow},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub repo: Arc<dyn TripRepository>,
    pub invitations: InvitationService,
    pub trips: TripWorkflow,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let repo: Arc<dyn TripRepository> = Arc::new(SqliteRepository::new(db.clone()));
        let invitations = InvitationService::new(repo.clone());
        let (results, _) = broadcast::channel(config.result_channel_capacity);
        let trips = TripWorkflow::new(
            repo.clone(),
            invitations.clone(),
            results,
            config.default_trip_length,
        );
        Self {
            config,
            db,
            repo,
            invitations,
            trips,
        }
    }

    /// A fresh wizard state holder publishing on this state's result channel.
    pub fn draft_state(&self) -> TripDraftState {
        TripDraftState::new(self.trips.clone())
    }
}
