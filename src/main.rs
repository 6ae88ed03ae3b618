//! BDM Commerce - B2B ordering backend

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bdm_commerce::config::Config;
use bdm_commerce::notify::Notifier;
use bdm_commerce::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(url = %url, "connected to NATS");
                Some(client)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "NATS unavailable, events disabled");
                None
            }
        },
        None => None,
    };

    let notifier = Notifier::new(db.clone(), nats);
    let state = AppState { db, notifier };
    let app = bdm_commerce::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 BDM Commerce listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
