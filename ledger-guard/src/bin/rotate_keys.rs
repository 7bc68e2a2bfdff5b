//! rotate-keys — re-seal every audit payload under a new master key
//!
//! ```text
//! OLD_MASTER_KEY=<hex> NEW_MASTER_KEY=<hex> DATABASE_URL=postgres://... rotate-keys
//! ```
//!
//! Safe to rerun after an abort: already migrated records are skipped.
//! Run one instance at a time.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use ledger_guard::config::RotationConfig;
use ledger_guard::rotation::{KeyRotationPipeline, RotationError};
use ledger_guard::store::PgStore;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    ledger_guard::init_logger();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(RotationError::Record { record_id, .. }) = e.downcast_ref::<RotationError>() {
                tracing::error!(record_id, "Key rotation failed at audit record {record_id}");
            }
            tracing::error!("{e:#}");
            eprintln!("rotate-keys: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = RotationConfig::from_env().context("invalid rotation configuration")?;
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    let store = PgStore::connect(&database_url)
        .await
        .context("failed to connect to PostgreSQL")?;

    let report = KeyRotationPipeline::from_config(Arc::new(store), config)
        .run()
        .await?;

    tracing::info!(
        scanned = report.scanned,
        migrated = report.migrated,
        already_current = report.already_current,
        batches = report.batches,
        "Key rotation complete"
    );
    println!(
        "Rotation complete: {} scanned, {} migrated, {} already current",
        report.scanned, report.migrated, report.already_current
    );
    Ok(())
}
