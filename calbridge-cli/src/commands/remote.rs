use anyhow::Result;
use calbridge_core::{Config, EventSink};
use owo_colors::OwoColorize;

use crate::render::Render;
use crate::tui;

pub async fn run(config: &Config) -> Result<()> {
    let sink = config.sink_provider();
    let calendar_id = &config.sink.calendar_id;
    let policy = config.remote_policy();

    let spinner = tui::create_spinner(format!("{} {}", sink.name(), calendar_id));
    let result = policy.run("list", || sink.list(calendar_id)).await;
    spinner.finish_and_clear();

    let mut events = match result {
        Ok(events) => events,
        Err(e) => anyhow::bail!("{}", e.to_string().red()),
    };
    events.sort_by_key(|e| e.start.date_time);

    println!("{} {}", sink.name().bold(), calendar_id);
    for event in &events {
        println!("   {}", event.render());
    }
    println!("\n{} event(s)", events.len());

    Ok(())
}
