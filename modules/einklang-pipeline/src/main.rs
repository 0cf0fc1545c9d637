use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use einklang_common::AppConfig;
use einklang_pipeline::PipelineDriver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("einklang=info".parse()?))
        .init();

    // No arguments re-runs the whole store (e.g. after a config change).
    let file_ids: Vec<String> = std::env::args().skip(1).collect();

    info!("Einklang pipeline starting...");

    let app = AppConfig::from_env()?;
    let pool = PgPoolOptions::new().max_connections(5).connect(&app.database_url).await?;
    einklang_store::schema::migrate(&pool).await?;

    // Ctrl-C aborts before the persistence transaction; the previous
    // canonical state stays intact.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let driver = PipelineDriver::new(pool, app);
    let result = driver.process_batch(&file_ids, &cancel).await?;

    info!("Pipeline run complete. {result}");
    Ok(())
}
