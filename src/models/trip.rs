use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::{
        equipment::Equipment,
        invitation::{InvitationStatus, TripInvitation},
        trip_info::TripInfo,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareLevel {
    #[default]
    Public,
    Private,
}

impl ShareLevel {
    pub fn code(self) -> i64 {
        match self {
            ShareLevel::Public => 1,
            ShareLevel::Private => 0,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ShareLevel::Public),
            0 => Some(ShareLevel::Private),
            _ => None,
        }
    }
}

/// A trip. `id` is 0 until the trip has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trip {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub gather_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub user_id: i64,
    pub trip_info_id: Option<i64>,
    pub participants: Vec<i64>,
    pub equipment: Vec<Equipment>,
    pub invitations: Vec<TripInvitation>,
    pub share_level: ShareLevel,
    pub image: Option<String>,
    pub notes: Vec<String>,
}

impl Trip {
    pub fn new(user_id: i64, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            description: None,
            gather_time: None,
            end_time: None,
            user_id,
            trip_info_id: None,
            participants: vec![user_id],
            equipment: Vec::new(),
            invitations: Vec::new(),
            share_level: ShareLevel::Public,
            image: None,
            notes: Vec::new(),
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id > 0
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::validation("trip title is required"));
        }
        match (self.gather_time, self.end_time) {
            (None, Some(_)) => Err(AppError::validation(
                "a gather time is required before an end time",
            )),
            (Some(start), Some(end)) if end - start < Duration::hours(1) => Err(
                AppError::validation("end time must be at least one hour after the gather time"),
            ),
            _ => Ok(()),
        }
    }

    /// Fills a missing end time with `gather_time + length`.
    pub fn with_default_end_time(mut self, length: Duration) -> Self {
        if self.end_time.is_none() {
            self.end_time = self.gather_time.map(|start| start + length);
        }
        self
    }

    pub fn has_participant(&self, user_id: i64) -> bool {
        self.participants.contains(&user_id)
    }

    /// Adds `user_id` to the participants unless already present.
    pub fn with_participant(mut self, user_id: i64) -> Self {
        if !self.has_participant(user_id) {
            self.participants.push(user_id);
        }
        self
    }

    pub fn ensure_owner_participant(self) -> Self {
        let owner = self.user_id;
        self.with_participant(owner)
    }

    pub fn with_invitation(mut self, invitation: TripInvitation) -> Self {
        self.invitations.push(invitation);
        self
    }

    pub fn with_equipment(mut self, equipment: Vec<Equipment>) -> Self {
        self.equipment = equipment;
        self
    }

    pub fn unsent_invitations(&self) -> impl Iterator<Item = &TripInvitation> {
        self.invitations
            .iter()
            .filter(|invitation| invitation.status == InvitationStatus::Unsent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripWithInfo {
    pub trip: Trip,
    pub trip_info: Option<TripInfo>,
}

impl TripWithInfo {
    pub fn new(trip: Trip, trip_info: Option<TripInfo>) -> Self {
        Self { trip, trip_info }
    }
}
