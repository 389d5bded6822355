use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{FromRow, SqliteConnection};
use tracing::debug;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        invitation::{InvitationStatus, TripInvitation},
        trip::{ShareLevel, Trip},
        trip_info::{DifficultyLevel, TripInfo},
        user::{NewUser, User},
    },
    repository::{TripKeys, TripRepository},
};

const SELECT_TRIPS: &str = "SELECT id, title, description, gather_time, end_time, user_id, \
     trip_info_id, participants, equipment, notes, image, share_level FROM trips";
const SELECT_TRIP_INFO: &str =
    "SELECT id, title, area, difficulty, route_description FROM trip_info";
const SELECT_INVITATIONS: &str = "SELECT id, trip_id, user_id, status FROM trip_invitations";
const SELECT_USERS: &str = "SELECT id, first_name, surname, email, phone, password_hash, salt, \
     photo, created_at FROM users";

#[derive(Clone)]
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, rows: Vec<TripRow>) -> Result<Vec<Trip>, AppError> {
        let mut trips = Vec::with_capacity(rows.len());
        for row in rows {
            let invitations = self.get_trip_invitations_by_trip_id(row.id).await?;
            trips.push(row.into_trip(invitations)?);
        }
        Ok(trips)
    }
}

#[derive(FromRow)]
struct TripRow {
    id: i64,
    title: String,
    description: Option<String>,
    gather_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    user_id: i64,
    trip_info_id: Option<i64>,
    participants: String,
    equipment: String,
    notes: String,
    image: Option<String>,
    share_level: i64,
}

impl TripRow {
    fn into_trip(self, invitations: Vec<TripInvitation>) -> Result<Trip, AppError> {
        let share_level = ShareLevel::from_code(self.share_level)
            .ok_or_else(|| AppError::Other(anyhow!("unknown share level {}", self.share_level)))?;
        Ok(Trip {
            id: self.id,
            title: self.title,
            description: self.description,
            gather_time: self.gather_time,
            end_time: self.end_time,
            user_id: self.user_id,
            trip_info_id: self.trip_info_id,
            participants: from_json(&self.participants)?,
            equipment: from_json(&self.equipment)?,
            invitations,
            share_level,
            image: self.image,
            notes: from_json(&self.notes)?,
        })
    }
}

#[derive(FromRow)]
struct TripInfoRow {
    id: i64,
    title: String,
    area: Option<String>,
    difficulty: i64,
    route_description: Option<String>,
}

impl From<TripInfoRow> for TripInfo {
    fn from(row: TripInfoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            area: row.area,
            difficulty: DifficultyLevel::from_id(row.difficulty),
            route_description: row.route_description,
        }
    }
}

#[derive(FromRow)]
struct InvitationRow {
    id: i64,
    trip_id: i64,
    user_id: i64,
    status: i64,
}

impl TryFrom<InvitationRow> for TripInvitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let status = InvitationStatus::from_code(row.status).ok_or_else(|| {
            AppError::Other(anyhow!("unknown invitation status code {}", row.status))
        })?;
        Ok(Self {
            id: row.id,
            trip_id: row.trip_id,
            user_id: row.user_id,
            status,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value).map_err(|err| AppError::Other(err.into()))
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, AppError> {
    serde_json::from_str(raw).map_err(|err| AppError::Other(err.into()))
}

fn invitations_from_rows(rows: Vec<InvitationRow>) -> Result<Vec<TripInvitation>, AppError> {
    rows.into_iter().map(TripInvitation::try_from).collect()
}

async fn insert_trip_row(conn: &mut SqliteConnection, trip: &Trip) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO trips (title, description, gather_time, end_time, user_id, trip_info_id, \
         participants, equipment, notes, image, share_level) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&trip.title)
    .bind(&trip.description)
    .bind(trip.gather_time)
    .bind(trip.end_time)
    .bind(trip.user_id)
    .bind(trip.trip_info_id)
    .bind(to_json(&trip.participants)?)
    .bind(to_json(&trip.equipment)?)
    .bind(to_json(&trip.notes)?)
    .bind(&trip.image)
    .bind(trip.share_level.code())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn update_trip_row(conn: &mut SqliteConnection, trip: &Trip) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE trips SET title = ?, description = ?, gather_time = ?, end_time = ?, \
         user_id = ?, trip_info_id = ?, participants = ?, equipment = ?, notes = ?, image = ?, \
         share_level = ? WHERE id = ?",
    )
    .bind(&trip.title)
    .bind(&trip.description)
    .bind(trip.gather_time)
    .bind(trip.end_time)
    .bind(trip.user_id)
    .bind(trip.trip_info_id)
    .bind(to_json(&trip.participants)?)
    .bind(to_json(&trip.equipment)?)
    .bind(to_json(&trip.notes)?)
    .bind(&trip.image)
    .bind(trip.share_level.code())
    .bind(trip.id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("trip {}", trip.id)));
    }
    Ok(())
}

async fn insert_trip_info_row(
    conn: &mut SqliteConnection,
    trip_info: &TripInfo,
) -> Result<i64, AppError> {
    let result = sqlx::query(
        "INSERT INTO trip_info (title, area, difficulty, route_description) VALUES (?, ?, ?, ?)",
    )
    .bind(&trip_info.title)
    .bind(&trip_info.area)
    .bind(trip_info.difficulty.id())
    .bind(&trip_info.route_description)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn update_trip_info_row(
    conn: &mut SqliteConnection,
    trip_info: &TripInfo,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE trip_info SET title = ?, area = ?, difficulty = ?, route_description = ? \
         WHERE id = ?",
    )
    .bind(&trip_info.title)
    .bind(&trip_info.area)
    .bind(trip_info.difficulty.id())
    .bind(&trip_info.route_description)
    .bind(trip_info.id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("trip info {}", trip_info.id)));
    }
    Ok(())
}

#[async_trait]
impl TripRepository for SqliteRepository {
    async fn get_trip_by_id(&self, id: i64) -> Result<Option<Trip>, AppError> {
        let sql = format!("{SELECT_TRIPS} WHERE id = ?");
        let row = sqlx::query_as::<_, TripRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let invitations = self.get_trip_invitations_by_trip_id(row.id).await?;
                Ok(Some(row.into_trip(invitations)?))
            }
            None => Ok(None),
        }
    }

    async fn get_all_trips(&self) -> Result<Vec<Trip>, AppError> {
        let sql = format!("{SELECT_TRIPS} ORDER BY id");
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn get_trips_by_user_id(&self, user_id: i64) -> Result<Vec<Trip>, AppError> {
        let sql = format!("{SELECT_TRIPS} WHERE user_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, TripRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.hydrate(rows).await
    }

    async fn insert_trip(&self, trip: &Trip) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        let id = insert_trip_row(&mut conn, trip).await?;
        debug!(trip_id = id, title = %trip.title, "inserted trip");
        Ok(id)
    }

    async fn insert_trip_with_info(
        &self,
        trip: &Trip,
        trip_info: &TripInfo,
    ) -> Result<TripKeys, AppError> {
        let mut tx = self.pool.begin().await?;
        let trip_info_id = insert_trip_info_row(&mut tx, trip_info).await?;
        let linked = Trip {
            trip_info_id: Some(trip_info_id),
            ..trip.clone()
        };
        let trip_id = insert_trip_row(&mut tx, &linked).await?;
        tx.commit().await?;
        debug!(trip_id, trip_info_id, "inserted trip with info");
        Ok(TripKeys {
            trip_id,
            trip_info_id,
        })
    }

    async fn update_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        update_trip_row(&mut conn, trip).await
    }

    async fn update_trip_with_info(
        &self,
        trip: &Trip,
        trip_info: &TripInfo,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let trip_info_id = if trip_info.id > 0 {
            update_trip_info_row(&mut tx, trip_info).await?;
            trip_info.id
        } else {
            insert_trip_info_row(&mut tx, trip_info).await?
        };
        let linked = Trip {
            trip_info_id: Some(trip_info_id),
            ..trip.clone()
        };
        update_trip_row(&mut tx, &linked).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_trip(&self, trip: &Trip) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let trip_info_id: Option<Option<i64>> =
            sqlx::query_scalar("SELECT trip_info_id FROM trips WHERE id = ?")
                .bind(trip.id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(trip_info_id) = trip_info_id else {
            return Err(AppError::not_found(format!("trip {}", trip.id)));
        };
        sqlx::query("DELETE FROM trip_invitations WHERE trip_id = ?")
            .bind(trip.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trips WHERE id = ?")
            .bind(trip.id)
            .execute(&mut *tx)
            .await?;
        if let Some(trip_info_id) = trip_info_id {
            sqlx::query("DELETE FROM trip_info WHERE id = ?")
                .bind(trip_info_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(trip_id = trip.id, "deleted trip");
        Ok(())
    }

    async fn get_user_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let sql = format!("{SELECT_USERS} WHERE id = ?");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("{SELECT_USERS} WHERE email = ? COLLATE NOCASE");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &NewUser) -> Result<i64, AppError> {
        let result = sqlx::query(
            "INSERT INTO users (first_name, surname, email, phone, password_hash, salt, photo, \
             created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.first_name)
        .bind(&user.surname)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.salt)
        .bind(&user.photo)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_trip_info_by_id(&self, id: i64) -> Result<Option<TripInfo>, AppError> {
        let sql = format!("{SELECT_TRIP_INFO} WHERE id = ?");
        let row = sqlx::query_as::<_, TripInfoRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(TripInfo::from))
    }

    async fn get_all_trip_info(&self) -> Result<Vec<TripInfo>, AppError> {
        let sql = format!("{SELECT_TRIP_INFO} ORDER BY id");
        let rows = sqlx::query_as::<_, TripInfoRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(TripInfo::from).collect())
    }

    async fn insert_trip_info(&self, trip_info: &TripInfo) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_trip_info_row(&mut conn, trip_info).await
    }

    async fn update_trip_info(&self, trip_info: &TripInfo) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        update_trip_info_row(&mut conn, trip_info).await
    }

    async fn delete_trip_info(&self, trip_info: &TripInfo) -> Result<(), AppError> {
        sqlx::query("DELETE FROM trip_info WHERE id = ?")
            .bind(trip_info.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn send_trip_invitation(
        &self,
        invitation: &TripInvitation,
    ) -> Result<TripInvitation, AppError> {
        let result =
            sqlx::query("INSERT INTO trip_invitations (trip_id, user_id, status) VALUES (?, ?, ?)")
                .bind(invitation.trip_id)
                .bind(invitation.user_id)
                .bind(invitation.status.code())
                .execute(&self.pool)
                .await?;
        let stored = TripInvitation {
            id: result.last_insert_rowid(),
            ..invitation.clone()
        };
        debug!(
            invitation_id = stored.id,
            trip_id = stored.trip_id,
            user_id = stored.user_id,
            "stored trip invitation"
        );
        Ok(stored)
    }

    async fn update_trip_invitation(&self, invitation: &TripInvitation) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE trip_invitations SET trip_id = ?, status = ? WHERE id = ?")
            .bind(invitation.trip_id)
            .bind(invitation.status.code())
            .bind(invitation.id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("invitation {}", invitation.id)));
        }
        Ok(())
    }

    async fn get_trip_invitation_by_id(
        &self,
        id: i64,
    ) -> Result<Option<TripInvitation>, AppError> {
        let sql = format!("{SELECT_INVITATIONS} WHERE id = ?");
        let row = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TripInvitation::try_from).transpose()
    }

    async fn get_trip_invitations_by_trip_id(
        &self,
        trip_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError> {
        let sql = format!("{SELECT_INVITATIONS} WHERE trip_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(trip_id)
            .fetch_all(&self.pool)
            .await?;
        invitations_from_rows(rows)
    }

    async fn get_trip_invitations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<TripInvitation>, AppError> {
        let sql = format!("{SELECT_INVITATIONS} WHERE user_id = ? ORDER BY id");
        let rows = sqlx::query_as::<_, InvitationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        invitations_from_rows(rows)
    }

    async fn delete_trip_invitation(&self, invitation: &TripInvitation) -> Result<(), AppError> {
        sqlx::query("DELETE FROM trip_invitations WHERE id = ?")
            .bind(invitation.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
