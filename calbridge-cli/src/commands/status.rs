use anyhow::Result;
use calbridge_core::Config;
use owo_colors::OwoColorize;

use super::open_store;
use crate::render::event_time;

pub fn run(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    println!("Source:   {}", config.source.provider.bold());
    println!(
        "Sink:     {} ({})",
        config.sink.provider.bold(),
        config.sink.calendar_id
    );
    println!("Snapshot: {}", config.snapshot_dir()?.display().dimmed());
    println!();

    if store.is_empty() {
        println!("{}", "Nothing synced yet. Run `calbridge sync`.".dimmed());
        return Ok(());
    }

    let mut events: Vec<_> = store.snapshot().values().collect();
    events.sort_by_key(|e| e.start);

    for event in &events {
        let recurring = if event.recurrence.is_some() { " ↻" } else { "" };
        println!(
            "   {} {}{}",
            event_time(event).dimmed(),
            event.summary,
            recurring
        );
    }

    println!("\n{} synced event(s)", events.len());
    Ok(())
}
