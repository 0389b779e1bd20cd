//! EventLedger port - processed-webhook tracking for idempotency.
//!
//! The provider may deliver the same event multiple times (timeouts,
//! 5xx responses, lost acknowledgements), so every applied event is
//! recorded here keyed by its provider event id. The ledger is
//! append-only from the reconciler's point of view; only the
//! retention sweep deletes rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Terminal disposition of a processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// Event mutated entitlement state.
    Applied,
    /// Event was acknowledged without any state change.
    Ignored,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Applied => "applied",
            LedgerOutcome::Ignored => "ignored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "applied" => Some(LedgerOutcome::Applied),
            "ignored" => Some(LedgerOutcome::Ignored),
            _ => None,
        }
    }
}

/// Ledger row for one processed event.
#[derive(Debug, Clone)]
pub struct ProcessedEvent {
    /// Provider event id (evt_xxx). Idempotency key.
    pub event_id: String,

    /// Provider event type string.
    pub event_type: String,

    pub processed_at: DateTime<Utc>,

    pub outcome: LedgerOutcome,

    /// Why the event was ignored, when it was.
    pub note: Option<String>,
}

impl ProcessedEvent {
    pub fn applied(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome: LedgerOutcome::Applied,
            note: None,
        }
    }

    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Utc::now(),
            outcome: LedgerOutcome::Ignored,
            note: Some(note.into()),
        }
    }
}

/// Result of attempting to record a processed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time this key was written.
    Inserted,
    /// Another writer got there first.
    AlreadyExists,
}

/// Port for the processed-event ledger.
///
/// Implementations must back `record` with a database uniqueness
/// constraint so concurrent duplicate deliveries race safely.
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Looks up a previously processed event by provider event id.
    async fn find(&self, event_id: &str) -> Result<Option<ProcessedEvent>, DomainError>;

    /// Records a processed event with insert-if-absent semantics.
    ///
    /// Returns `AlreadyExists` when a concurrent writer inserted the
    /// same event id first.
    async fn record(&self, event: ProcessedEvent) -> Result<SaveResult, DomainError>;

    /// Deletes ledger rows older than the cutoff. Retention only;
    /// never consulted for correctness. Returns rows deleted.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
