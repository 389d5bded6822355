use kumve::config::AppConfig;
use kumve::db::{init_pool, run_migrations};
use kumve::error::AppError;
use kumve::models::invitation::InvitationStatus;
use kumve::state::AppState;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_logging(&config.log_filter);

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    let state = AppState::new(config, db);
    let trips = state.trips.fetch_all_trips().await?;
    info!("{} trips stored", trips.len());

    for trip in &trips {
        let pending = trip
            .invitations
            .iter()
            .filter(|invitation| invitation.status == InvitationStatus::Pending)
            .count();
        info!(
            trip_id = trip.id,
            participants = trip.participants.len(),
            equipment = trip.equipment.len(),
            pending,
            "{}",
            trip.title
        );
    }

    Ok(())
}

fn init_logging(fallback: &str) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
