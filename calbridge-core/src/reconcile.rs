//! Classification of a fresh pull against the last synced snapshot.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use tracing::warn;

use crate::event::{Action, Event};

/// Every event from one diff, each tagged with exactly one [`Action`].
///
/// Events from the pull come first in source order, followed by removals in
/// snapshot (id) order.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet(Vec<Event>);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl fmt::Display for ActionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} updated, {} removed, {} unchanged",
            self.added, self.updated, self.removed, self.unchanged
        )
    }
}

impl ChangeSet {
    pub fn events(&self) -> &[Event] {
        &self.0
    }

    pub fn into_events(self) -> Vec<Event> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn with_action(&self, action: Action) -> impl Iterator<Item = &Event> {
        self.0.iter().filter(move |e| e.action == Some(action))
    }

    /// Events that need a remote operation (everything but duplicates).
    pub fn pushable(&self) -> impl Iterator<Item = &Event> {
        self.0
            .iter()
            .filter(|e| e.action != Some(Action::Duplicate))
    }

    pub fn has_changes(&self) -> bool {
        self.pushable().next().is_some()
    }

    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for event in &self.0 {
            match event.action {
                Some(Action::Add) => counts.added += 1,
                Some(Action::Update) => counts.updated += 1,
                Some(Action::Remove) => counts.removed += 1,
                Some(Action::Duplicate) | None => counts.unchanged += 1,
            }
        }
        counts
    }
}

/// Classify `current` against `last_synced`.
///
/// If an id appears more than once in `current`, the first occurrence wins.
pub fn diff(current: &[Event], last_synced: &BTreeMap<String, Event>) -> ChangeSet {
    let mut seen: HashSet<&str> = HashSet::with_capacity(current.len());
    let mut classified = Vec::with_capacity(current.len() + last_synced.len());

    for event in current {
        if !seen.insert(event.id.as_str()) {
            warn!(id = %event.id, "duplicate id in pull, keeping first occurrence");
            continue;
        }

        let action = match last_synced.get(&event.id) {
            None => Action::Add,
            Some(previous) if previous == event => Action::Duplicate,
            Some(_) => Action::Update,
        };
        classified.push(event.clone().with_action(action));
    }

    for (id, previous) in last_synced {
        if !seen.contains(id.as_str()) {
            classified.push(previous.clone().with_action(Action::Remove));
        }
    }

    ChangeSet(classified)
}
