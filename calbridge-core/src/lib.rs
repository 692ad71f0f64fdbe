//! Core of calbridge: one-way replication from a source calendar to a sink.
//!
//! - `identity` maps internal event ids to sink-safe remote ids and back
//! - `recurrence` translates source patterns into RRULE/EXDATE lines
//! - `reconcile` classifies a pull against the last synced snapshot
//! - `sync` drives pull, reconcile, push and commit cycles
//! - `remote` talks to provider binaries over stdin/stdout

pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod reconcile;
pub mod recurrence;
pub mod remote;
pub mod retry;
pub mod sink_event;
pub mod source_event;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{BatchFailure, CalBridgeError, CalBridgeResult, ItemFailure};
pub use event::{Action, Attendee, Event, Location, Person, ResponseStatus};
pub use reconcile::{ActionCounts, ChangeSet};
pub use recurrence::RecurrenceRule;
pub use remote::{EventSink, EventSource, Provider};
pub use retry::RemotePolicy;
pub use sink_event::SinkEvent;
pub use source_event::SourceEvent;
pub use store::{EventStore, FileStore, MemoryStore, SnapshotStore};
pub use sync::{CyclePhase, CycleReport, SyncEngine, UpdateOutcome};
