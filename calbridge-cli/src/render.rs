//! Colored terminal rendering for calbridge-core types.

use calbridge_core::{Action, ActionCounts, CycleReport, Event, SinkEvent, UpdateOutcome};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

fn colorize(action: Action, text: &str) -> String {
    match action {
        Action::Add => text.green().to_string(),
        Action::Update => text.yellow().to_string(),
        Action::Remove => text.red().to_string(),
        Action::Duplicate => text.dimmed().to_string(),
    }
}

impl Render for Action {
    fn render(&self) -> String {
        colorize(*self, &self.to_string())
    }
}

/// Start time as shown in listings, or a placeholder for untimed events.
pub fn event_time(event: &Event) -> String {
    match event.start {
        Some(start) => start.format("%Y-%m-%d %H:%M").to_string(),
        None => "(no start)".to_string(),
    }
}

fn title(event: &Event) -> &str {
    if event.summary.is_empty() {
        &event.id
    } else {
        &event.summary
    }
}

impl Render for UpdateOutcome {
    fn render(&self) -> String {
        let action = self.event.action.unwrap_or(Action::Add);
        let line = format!(
            "{} {} {}",
            action.render(),
            colorize(action, title(&self.event)),
            event_time(&self.event).dimmed()
        );

        match &self.error {
            Some(error) if !self.success => format!("{line}\n      {}", error.red()),
            _ => line,
        }
    }
}

impl Render for ActionCounts {
    fn render(&self) -> String {
        format!(
            "{} added, {} updated, {} removed, {} unchanged",
            self.added.green(),
            self.updated.yellow(),
            self.removed.red(),
            self.unchanged
        )
    }
}

impl Render for CycleReport {
    fn render(&self) -> String {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|o| format!("   {}", o.render()))
            .collect();

        if lines.is_empty() {
            lines.push(format!("   {}", "Everything up to date".dimmed()));
        }

        let elapsed = self.finished_at - self.started_at;
        lines.push(String::new());
        lines.push(format!(
            "{} in {}.{:03}s",
            self.counts.render(),
            elapsed.num_seconds(),
            elapsed.num_milliseconds() % 1000
        ));

        let failed = self.failures().count();
        if failed > 0 {
            lines.push(format!("{}", format!("{failed} failed").red()));
        }

        lines.join("\n")
    }
}

impl Render for SinkEvent {
    fn render(&self) -> String {
        let origin = match self.internal_id() {
            Ok(id) => id,
            Err(_) => "not created by calbridge".to_string(),
        };
        format!(
            "{} {} {}",
            self.start.date_time.format("%Y-%m-%d %H:%M").dimmed(),
            self.summary,
            format!("({origin})").dimmed()
        )
    }
}
