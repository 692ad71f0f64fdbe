//! One-way sync from the source calendar to the sink.
//!
//! A cycle runs `Pulling → Reconciling → Pushing → Committing` and always
//! ends back in `Idle`. Pull and session failures abort the cycle before any
//! remote mutation. Push failures are isolated per item, collected, and
//! raised together once the whole batch has been attempted. The snapshot is
//! advanced to the pulled set whenever the push phase was reached, even if
//! some items failed.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::error::{BatchFailure, CalBridgeError, CalBridgeResult, ItemFailure};
use crate::event::{Action, Event};
use crate::identity;
use crate::reconcile::{self, ActionCounts};
use crate::remote::{EventSink, EventSource};
use crate::retry::RemotePolicy;
use crate::sink_event::SinkEvent;
use crate::source_event::SourceEvent;
use crate::store::EventStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePhase {
    #[default]
    Idle,
    Pulling,
    Reconciling,
    Pushing,
    Committing,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Pulling => "pulling",
            CyclePhase::Reconciling => "reconciling",
            CyclePhase::Pushing => "pushing",
            CyclePhase::Committing => "committing",
        };
        f.write_str(name)
    }
}

/// Result of processing one event during a cycle.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    /// The event as it was processed, tagged with its action
    pub event: Event,
    pub success: bool,
    pub error: Option<String>,
}

impl UpdateOutcome {
    fn succeeded(event: Event) -> Self {
        UpdateOutcome {
            event,
            success: true,
            error: None,
        }
    }

    fn failed(event: Event, err: &CalBridgeError) -> Self {
        UpdateOutcome {
            event,
            success: false,
            error: Some(err.to_string()),
        }
    }

    fn to_failure(&self) -> Option<ItemFailure> {
        if self.success {
            return None;
        }
        Some(ItemFailure {
            id: self.event.id.clone(),
            action: self.event.action.unwrap_or(Action::Add),
            message: self.error.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: ActionCounts,
    pub outcomes: Vec<UpdateOutcome>,
}

impl CycleReport {
    pub fn failures(&self) -> impl Iterator<Item = &UpdateOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Owns the collaborators of one source → sink pairing.
pub struct SyncEngine {
    source: Arc<dyn EventSource>,
    sink: Arc<dyn EventSink>,
    store: EventStore,
    policy: RemotePolicy,
    time_zone: Tz,
    phase: CyclePhase,
    last_report: Option<CycleReport>,
}

impl SyncEngine {
    pub fn new(source: Arc<dyn EventSource>, sink: Arc<dyn EventSink>, store: EventStore) -> Self {
        SyncEngine {
            source,
            sink,
            store,
            policy: RemotePolicy::default(),
            time_zone: Tz::UTC,
            phase: CyclePhase::Idle,
            last_report: None,
        }
    }

    pub fn with_policy(mut self, policy: RemotePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// The wait for the next cycle starts when the previous one finishes, so
    /// cycles never overlap. Shutdown is observed between cycles only.
    pub async fn run_until<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            match self.run_cycle().await {
                Ok(report) => info!(counts = %report.counts, "sync cycle complete"),
                Err(e) => error!(error = %e, "sync cycle failed"),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping scheduler");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    /// Run one full cycle.
    ///
    /// Returns `AggregateBatchFailure` when any item failed; the report is
    /// still available from [`SyncEngine::last_report`] in that case.
    #[tracing::instrument(name = "sync_cycle", skip(self))]
    pub async fn run_cycle(&mut self) -> CalBridgeResult<CycleReport> {
        let result = self.cycle().await;
        self.set_phase(CyclePhase::Idle);
        result
    }

    async fn cycle(&mut self) -> CalBridgeResult<CycleReport> {
        let started_at = Utc::now();

        self.set_phase(CyclePhase::Pulling);
        let pulled = self.pull().await?;

        self.set_phase(CyclePhase::Reconciling);
        let mut outcomes = Vec::new();
        let current = self.translate(pulled, started_at, &mut outcomes);
        let changes = reconcile::diff(&current, self.store.snapshot());
        let counts = changes.counts();
        info!(%counts, "reconciled against snapshot");

        self.set_phase(CyclePhase::Pushing);
        for event in changes.pushable() {
            outcomes.push(self.push(event).await);
        }

        self.set_phase(CyclePhase::Committing);
        self.store.commit(&current);

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            counts,
            outcomes,
        };
        let failures: Vec<ItemFailure> = report
            .outcomes
            .iter()
            .filter_map(UpdateOutcome::to_failure)
            .collect();
        self.last_report = Some(report.clone());

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(CalBridgeError::AggregateBatchFailure(BatchFailure { failures }))
        }
    }

    fn set_phase(&mut self, phase: CyclePhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "cycle phase");
            self.phase = phase;
        }
    }

    async fn pull(&self) -> CalBridgeResult<Vec<SourceEvent>> {
        self.policy
            .run("verify source session", || self.source.verify_session())
            .await?;
        self.policy
            .run("verify sink session", || self.sink.verify_session())
            .await?;

        let pulled = self
            .policy
            .run("pull", || self.source.pull())
            .await
            .map_err(|e| match e {
                CalBridgeError::Authentication(_) => e,
                other => CalBridgeError::Pull(other.to_string()),
            })?;

        debug!(events = pulled.len(), "pulled from source");
        Ok(pulled)
    }

    /// Convert pulled events, dropping repeated ids.
    ///
    /// An event whose recurrence cannot be translated gets a failed outcome
    /// and keeps its snapshot version, so it is neither pushed nor removed.
    fn translate(
        &self,
        pulled: Vec<SourceEvent>,
        now: DateTime<Utc>,
        outcomes: &mut Vec<UpdateOutcome>,
    ) -> Vec<Event> {
        let mut seen = HashSet::with_capacity(pulled.len());
        let mut current = Vec::with_capacity(pulled.len());

        for source_event in pulled {
            if !seen.insert(source_event.id.clone()) {
                warn!(id = %source_event.id, "duplicate id in pull, keeping first occurrence");
                continue;
            }

            match source_event.to_event(now) {
                Ok(event) => current.push(event),
                Err(e) => {
                    let previous = self.store.get(&source_event.id).cloned();
                    let action = if previous.is_some() {
                        Action::Update
                    } else {
                        Action::Add
                    };
                    warn!(id = %source_event.id, error = %e, "recurrence not translatable, skipping");
                    outcomes.push(UpdateOutcome::failed(
                        source_event.without_recurrence().with_action(action),
                        &e,
                    ));
                    current.extend(previous);
                }
            }
        }

        current
    }

    async fn push(&self, event: &Event) -> UpdateOutcome {
        let action = event.action.unwrap_or(Action::Add);
        let result = match action {
            Action::Add => self.create(event).await,
            Action::Update => self.update(event).await,
            Action::Remove => self.delete(event).await,
            Action::Duplicate => Ok(()),
        };

        match result {
            Ok(()) => {
                debug!(id = %event.id, %action, "pushed");
                UpdateOutcome::succeeded(event.clone())
            }
            Err(e) => {
                warn!(id = %event.id, %action, error = %e, "push failed");
                UpdateOutcome::failed(event.clone(), &e)
            }
        }
    }

    async fn create(&self, event: &Event) -> CalBridgeResult<()> {
        let sink_event = SinkEvent::from_event(event, self.time_zone)?;
        self.policy
            .run("create", || self.sink.create(&sink_event))
            .await?;
        Ok(())
    }

    /// Read the stored sequence and write one past it. A missing remote item
    /// is a conflict, never a create.
    async fn update(&self, event: &Event) -> CalBridgeResult<()> {
        let mut sink_event = SinkEvent::from_event(event, self.time_zone)?;

        let existing = self
            .policy
            .run("get", || self.sink.get(&sink_event.id))
            .await?
            .ok_or_else(|| CalBridgeError::RemoteConflict {
                id: event.id.clone(),
                reason: "item no longer exists on the sink".to_string(),
            })?;

        let sequence = existing.sequence + 1;
        sink_event.sequence = sequence;

        self.policy
            .run("update", || self.sink.update(&sink_event, sequence))
            .await?;
        Ok(())
    }

    async fn delete(&self, event: &Event) -> CalBridgeResult<()> {
        let remote_id = identity::encode(&event.id)?;

        match self
            .policy
            .run("delete", || self.sink.delete(&remote_id))
            .await
        {
            Ok(()) => Ok(()),
            Err(CalBridgeError::NotFound(_)) => {
                debug!(id = %event.id, "already gone from sink");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
