use dotenvy::dotenv;
use reseller_ledger::{
    config::{database, settings},
    core::{duration_summary, notify::ChannelNotifier},
    errors::Result,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Ledger settings from config.toml
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!(
        reseller_min_demande = settings.ledger.reseller_min_demande,
        return_supplier = %settings.ledger.return_supplier,
        "Loaded settings"
    );

    // 4. Database and schema
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Stock report
    for summary in duration_summary::low_stock(&db).await? {
        warn!(
            product_id = summary.product_id,
            duration = %summary.duration_label,
            quantity = summary.quantity,
            minimum = summary.minimum_threshold,
            "Low stock"
        );
    }

    let notifier = ChannelNotifier::new(settings.notifications.channel_capacity);
    info!(
        subscribers = notifier.receiver_count(),
        "Ledger ready; routing layer attaches here"
    );

    Ok(())
}
