//! Persistence facade used by the trip services.
//!
//! Services only see [`TripRepository`]; [`sqlite::SqliteRepository`] is the
//! implementation backing the application and the test suite.

pub mod sqlite;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        invitation::TripInvitation,
        trip::Trip,
        trip_info::TripInfo,
        user::{NewUser, User},
    },
};

pub use sqlite::SqliteRepository;

/// Ids generated by [`TripRepository::insert_trip_with_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripKeys {
    pub trip_id: i64,
    pub trip_info_id: i64,
}

#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn get_trip_by_id(&self, id: i64) -> Result<Option<Trip>, AppError>;
    async fn get_all_trips(&self) -> Result<Vec<Trip>, AppError>;
    async fn get_trips_by_user_id(&self, user_id: i64) -> Result<Vec<Trip>, AppError>;
    async fn insert_trip(&self, trip: &Trip) -> Result<i64, AppError>;
    /// Stores the info, links it to the trip and stores the trip, atomically.
    async fn insert_trip_with_info(
        &self,
        trip: &Trip,
        trip_info: &TripInfo,
    ) -> Result<TripKeys, AppError>;
    async fn update_trip(&self, trip: &Trip) -> Result<(), AppError>;
    async fn update_trip_with_info(
        &self,
        trip: &Trip,
        trip_info: &TripInfo,
    ) -> Result<(), AppError>;
    /// Removes the trip together with its invitations and linked info.
    async fn delete_trip(&self, trip: &Trip) -> Result<(), AppError>;

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn insert_user(&self, user: &NewUser) -> Result<i64, AppError>;

    async fn get_trip_info_by_id(&self, id: i64) -> Result<Option<TripInfo>, AppError>;
    async fn get_all_trip_info(&self) -> Result<Vec<TripInfo>, AppError>;
    async fn insert_trip_info(&self, trip_info: &TripInfo) -> Result<i64, AppError>;
    async fn update_trip_info(&self, trip_info: &TripInfo) -> Result<(), AppError>;
    async fn delete_trip_info(&self, trip_info: &TripInfo) -> Result<(), AppError>;

    /// Stores the invitation and returns it with its generated id.
    async fn send_trip_invitation(
        &self,
        invitation: &TripInvitation,
    ) -> Result<TripInvitation, AppError>;
    async fn update_trip_invitation(&self, invitation: &TripInvitation) -> Result<(), AppError>;
    async fn get_trip_invitation_by_id(&self, id: i64)
        -> Result<Option<TripInvitation>, AppError>;
    async fn get_trip_invitations_by_trip_id(
        &self,
        trip_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError>;
    async fn get_trip_invitations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError>;
    async fn delete_trip_invitation(&self, invitation: &TripInvitation) -> Result<(), AppError>;
}
