use anyhow::Result;
use calbridge_core::Config;
use tracing::{error, info};

use super::build_engine;

pub async fn run(config: &Config) -> Result<()> {
    let mut engine = build_engine(config)?;

    info!(
        source = %config.source.provider,
        sink = %config.sink.provider,
        interval_secs = config.interval_secs,
        "starting sync daemon"
    );

    engine
        .run_until(config.interval(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
