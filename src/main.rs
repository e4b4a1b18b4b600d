use bapp_tracker::{
    config::{database, settings},
    core::dashboard::{DashboardStats, load_dashboard},
    errors::Result,
};
use chrono::Datelike;
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let url = database::get_database_url(app_config.database_url.as_deref());
    let db = database::create_connection(&url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Summarize the dashboard for the configured year
    let year = app_config.year.unwrap_or_else(|| chrono::Local::now().year());
    let dashboard = load_dashboard(&db, year).await?;
    let stats = DashboardStats::from_dashboard(&dashboard);
    info!(
        "{year}: {} customers, {} contracts ({} completed, {} in progress, {} not started)",
        dashboard.len(),
        stats.total_contracts,
        stats.completed,
        stats.in_progress,
        stats.not_started
    );

    Ok(())
}
