use anyhow::anyhow;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::{
    error::AppError,
    models::user::{NewUser, User},
    repository::TripRepository,
};

pub const MIN_NAME_LENGTH: usize = 3;
pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+(\d{1,4})\s?(0\d{9}|\d{9})$").expect("valid phone regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
        }
    }
}

/// Identity of whoever is using the app, passed to operations that need it.
#[derive(Debug, Clone, Default)]
pub struct Session(pub Option<AuthenticatedUser>);

impl Session {
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn for_user(user: &User) -> Self {
        Self(Some(AuthenticatedUser::from(user)))
    }

    pub fn is_logged_in(&self) -> bool {
        self.0.is_some()
    }

    pub fn require_user(&self) -> Result<&AuthenticatedUser, AppError> {
        self.0.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn log_out(&mut self) {
        self.0 = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub photo: Option<String>,
}

impl Registration {
    /// Collects every field problem, so a form can show them all at once.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut problems = Vec::new();
        let full_name = self.full_name.trim();
        if full_name.chars().count() < MIN_NAME_LENGTH {
            problems.push(format!(
                "name must have at least {MIN_NAME_LENGTH} characters"
            ));
        }
        if !is_valid_email(&self.email) {
            problems.push("email address is invalid".to_string());
        }
        if self.password.trim().chars().count() < MIN_PASSWORD_LENGTH {
            problems.push(format!(
                "password must have at least {MIN_PASSWORD_LENGTH} characters"
            ));
        }
        if let Some(phone) = normalize_optional(self.phone.clone()) {
            if !is_valid_phone(&phone) {
                problems.push("phone number is invalid".to_string());
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(AppError::validation(problems.join("; ")))
        }
    }

    /// First word is the first name, the rest (if any) the surname.
    pub fn split_name(&self) -> (String, Option<String>) {
        let mut parts = self.full_name.split_whitespace();
        let first_name = parts.next().unwrap_or_default().to_string();
        let rest = parts.collect::<Vec<_>>().join(" ");
        let surname = if rest.is_empty() { None } else { Some(rest) };
        (first_name, surname)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_PATTERN.is_match(phone.trim())
}

pub async fn register_user(
    repo: &dyn TripRepository,
    registration: &Registration,
) -> Result<User, AppError> {
    registration.validate()?;
    let email = registration.email.trim().to_lowercase();
    if repo.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::validation("email address is already registered"));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(registration.password.as_bytes(), &salt)
        .map_err(|err| AppError::Other(anyhow!("password hashing failed: {err}")))?
        .to_string();

    let (first_name, surname) = registration.split_name();
    let new_user = NewUser {
        first_name,
        surname,
        email,
        phone: normalize_optional(registration.phone.clone()),
        password_hash,
        salt: salt.as_str().to_string(),
        photo: normalize_optional(registration.photo.clone()),
    };
    let id = repo.insert_user(&new_user).await?;
    info!(user_id = id, "registered user");

    repo.get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("user {id}")))
}

pub async fn authenticate_user(
    repo: &dyn TripRepository,
    email: &str,
    password: &str,
) -> Result<Session, AppError> {
    let email = email.trim().to_lowercase();
    let Some(user) = repo.get_user_by_email(&email).await? else {
        debug!("login attempt for unknown email");
        return Err(AppError::Unauthorized);
    };
    let parsed = PasswordHash::new(&user.password_hash)
        .map_err(|err| AppError::Other(anyhow!("stored password hash is malformed: {err}")))?;
    if Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_err()
    {
        debug!(user_id = user.id, "login attempt with wrong password");
        return Err(AppError::Unauthorized);
    }
    Ok(Session::for_user(&user))
}

pub fn normalize_optional(input: Option<String>) -> Option<String> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
