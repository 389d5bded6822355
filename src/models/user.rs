use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub surname: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(skip_serializing, default)]
    pub salt: String,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        match self.surname.as_deref() {
            Some(surname) => format!("{} {}", self.first_name, surname),
            None => self.first_name.clone(),
        }
    }
}

/// A user row before insertion; the id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub surname: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub salt: String,
    pub photo: Option<String>,
}
