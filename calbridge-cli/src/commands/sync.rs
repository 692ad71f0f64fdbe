use anyhow::Result;
use calbridge_core::Config;
use owo_colors::OwoColorize;

use super::build_engine;
use crate::render::Render;

pub async fn run(config: &Config) -> Result<()> {
    let mut engine = build_engine(config)?;

    println!(
        "{} → {}",
        config.source.provider.bold(),
        config.sink.provider.bold()
    );

    let result = engine.run_cycle().await;

    if let Some(report) = engine.last_report() {
        println!("{}", report.render());
    }

    result?;
    Ok(())
}
