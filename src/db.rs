use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::{config::AppConfig, error::AppError};

pub type DbPool = SqlitePool;

pub async fn init_pool(config: &AppConfig) -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;
    debug!("opened database {}", config.database_url);
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    if let Err(err) = sqlx::migrate!("./migrations").run(pool).await {
        error!("migration failed: {err:?}");
        return Err(err.into());
    }
    Ok(())
}
