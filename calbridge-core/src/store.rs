//! Local snapshot of synced events.
//!
//! [`EventStore`] keeps the authoritative in-memory collection and mirrors
//! every change to a [`SnapshotStore`] backend. Backend failures are logged
//! and never roll back the in-memory state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{CalBridgeError, CalBridgeResult};
use crate::event::{Action, Event};
use crate::identity;

/// Durable keyed storage for snapshot entries.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, event: &Event) -> CalBridgeResult<()>;
    fn delete(&self, id: &str) -> CalBridgeResult<()>;
    fn find(&self, id: &str) -> CalBridgeResult<Option<Event>>;
    fn all(&self) -> CalBridgeResult<Vec<Event>>;
}

/// Volatile backend, used in tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<BTreeMap<String, Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CalBridgeResult<std::sync::MutexGuard<'_, BTreeMap<String, Event>>> {
        self.events
            .lock()
            .map_err(|_| CalBridgeError::Store("memory store lock poisoned".into()))
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, event: &Event) -> CalBridgeResult<()> {
        self.lock()?.insert(event.id.clone(), event.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> CalBridgeResult<()> {
        self.lock()?.remove(id);
        Ok(())
    }

    fn find(&self, id: &str) -> CalBridgeResult<Option<Event>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn all(&self) -> CalBridgeResult<Vec<Event>> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

/// One JSON file per event, named by a digest of the event id.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> CalBridgeResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entries are named by a digest of the id so every name has the same
    /// short length; the id itself lives in the JSON.
    fn path_for(&self, id: &str) -> CalBridgeResult<PathBuf> {
        identity::encode(id)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"calbridge-snapshot-v1");
        hasher.update(id.as_bytes());
        Ok(self.dir.join(format!("{}.json", hasher.finalize().to_hex())))
    }
}

impl SnapshotStore for FileStore {
    fn save(&self, event: &Event) -> CalBridgeResult<()> {
        let path = self.path_for(&event.id)?;
        let temp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(event)
            .map_err(|e| CalBridgeError::Serialization(e.to_string()))?;

        std::fs::write(&temp, content)?;
        std::fs::rename(&temp, &path)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> CalBridgeResult<()> {
        let path = self.path_for(id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn find(&self, id: &str) -> CalBridgeResult<Option<Event>> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let event = read_event(&path)?;
        Ok((event.id == id).then_some(event))
    }

    fn all(&self) -> CalBridgeResult<Vec<Event>> {
        let mut events = Vec::new();

        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match read_event(&path) {
                Ok(event) => events.push(event),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable snapshot entry"),
            }
        }

        Ok(events)
    }
}

fn read_event(path: &Path) -> CalBridgeResult<Event> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        CalBridgeError::Serialization(format!("{}: {}", path.display(), e))
    })
}

/// In-memory snapshot keyed by internal id, mirrored to a backend.
pub struct EventStore {
    events: BTreeMap<String, Event>,
    backend: Box<dyn SnapshotStore>,
}

impl EventStore {
    /// Materialise the snapshot from the backend. An unreadable backend
    /// yields an empty snapshot.
    pub fn load(backend: Box<dyn SnapshotStore>) -> Self {
        let events = match backend.all() {
            Ok(events) => events.into_iter().map(|e| (e.id.clone(), e)).collect(),
            Err(e) => {
                warn!(error = %e, "could not load snapshot, starting empty");
                BTreeMap::new()
            }
        };
        EventStore { events, backend }
    }

    pub fn snapshot(&self) -> &BTreeMap<String, Event> {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Add an event. Untagged events are tagged `Add`.
    pub fn insert(&mut self, event: &mut Event) {
        if event.action.is_none() {
            event.action = Some(Action::Add);
        }
        self.persist(event);
        self.events.insert(event.id.clone(), stored(event));
    }

    /// Drop an event and tag it `Remove`.
    pub fn remove(&mut self, event: &mut Event) {
        event.action = Some(Action::Remove);
        if let Err(e) = self.backend.delete(&event.id) {
            warn!(id = %event.id, error = %e, "failed to delete snapshot entry");
        }
        self.events.remove(&event.id);
    }

    /// Whether an event with this id is already stored.
    ///
    /// Equal events are tagged `Duplicate`. Changed events are tagged
    /// `Update` and the incoming version replaces the stored one.
    pub fn is_already_synced(&mut self, event: &mut Event) -> bool {
        let Some(existing) = self.events.get(&event.id) else {
            return false;
        };

        if existing == event {
            event.action = Some(Action::Duplicate);
        } else {
            event.action = Some(Action::Update);
            self.persist(event);
            self.events.insert(event.id.clone(), stored(event));
        }
        true
    }

    /// Advance the snapshot to exactly `current`.
    pub fn commit(&mut self, current: &[Event]) {
        let mut next = BTreeMap::new();

        for event in current {
            let mut event = stored(event);
            if !self.is_already_synced(&mut event) {
                self.insert(&mut event);
            }
            next.insert(event.id.clone(), stored(&event));
        }

        let vanished: Vec<Event> = self
            .events
            .values()
            .filter(|e| !next.contains_key(&e.id))
            .cloned()
            .collect();
        for mut event in vanished {
            self.remove(&mut event);
        }

        debug!(entries = next.len(), "snapshot committed");
        self.events = next;
    }

    fn persist(&self, event: &Event) {
        if let Err(e) = self.backend.save(event) {
            warn!(id = %event.id, error = %e, "failed to persist snapshot entry");
        }
    }
}

fn stored(event: &Event) -> Event {
    Event {
        action: None,
        ..event.clone()
    }
}
