//! Belief store seam: durable per-teammate belief records and the append-only
//! trust history. Write failures never interrupt the agent; the in-memory
//! belief keeps governing behaviour for the rest of the session.

use std::collections::BTreeMap;

use contracts::{TrustBelief, TrustHistoryRecord};
use tracing::{debug, warn};

use crate::belief::BeliefPolicy;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("belief store backend error: {0}")]
    Backend(String),

    #[error("belief store is read-only")]
    ReadOnly,
}

/// Durable storage for the trust belief. One record per teammate; `persist`
/// overwrites the whole record.
pub trait BeliefStore {
    fn load(&self, teammate: &str) -> Result<Option<TrustBelief>, StoreError>;

    fn persist(&mut self, teammate: &str, belief: &TrustBelief, tick: u64)
        -> Result<(), StoreError>;

    /// Write-only time series; never read back by the agent.
    fn append_history(&mut self, record: &TrustHistoryRecord) -> Result<(), StoreError>;
}

/// Process-local store, used when no durable backend is attached. Keeps the
/// latest belief per teammate and discards history.
#[derive(Debug, Clone, Default)]
pub struct MemoryBeliefStore {
    beliefs: BTreeMap<String, TrustBelief>,
}

impl MemoryBeliefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_belief(teammate: &str, belief: TrustBelief) -> Self {
        let mut store = Self::default();
        store.beliefs.insert(teammate.to_string(), belief);
        store
    }
}

impl BeliefStore for MemoryBeliefStore {
    fn load(&self, teammate: &str) -> Result<Option<TrustBelief>, StoreError> {
        Ok(self.beliefs.get(teammate).copied())
    }

    fn persist(
        &mut self,
        teammate: &str,
        belief: &TrustBelief,
        _tick: u64,
    ) -> Result<(), StoreError> {
        self.beliefs.insert(teammate.to_string(), *belief);
        Ok(())
    }

    fn append_history(&mut self, _record: &TrustHistoryRecord) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BeliefKeeper
// ---------------------------------------------------------------------------

/// Owns the store for one teammate and tracks what was last written, so the
/// record is only rewritten when a component actually changed.
pub struct BeliefKeeper {
    store: Box<dyn BeliefStore>,
    teammate: String,
    last_written: Option<TrustBelief>,
    last_error: Option<String>,
}

impl BeliefKeeper {
    pub fn new(store: Box<dyn BeliefStore>, teammate: impl Into<String>) -> Self {
        Self {
            store,
            teammate: teammate.into(),
            last_written: None,
            last_error: None,
        }
    }

    /// Learned policy resumes the persisted belief, or starts neutral for an
    /// unknown teammate. Fixed policies ignore history entirely.
    pub fn load(&mut self, policy: &BeliefPolicy) -> TrustBelief {
        match policy {
            BeliefPolicy::Fixed(belief) => *belief,
            BeliefPolicy::Learned => match self.store.load(&self.teammate) {
                Ok(Some(belief)) => {
                    debug!(teammate = %self.teammate, ?belief, "resumed persisted belief");
                    self.last_written = Some(belief);
                    belief.clamped()
                }
                Ok(None) => {
                    self.last_written = Some(TrustBelief::default());
                    TrustBelief::default()
                }
                Err(err) => {
                    warn!(teammate = %self.teammate, error = %err, "belief load failed, starting neutral");
                    self.last_error = Some(err.to_string());
                    self.last_written = Some(TrustBelief::default());
                    TrustBelief::default()
                }
            },
        }
    }

    /// Returns whether a write happened.
    pub fn persist_if_changed(&mut self, belief: &TrustBelief, tick: u64) -> bool {
        if self.last_written.as_ref() == Some(belief) {
            return false;
        }
        match self.store.persist(&self.teammate, belief, tick) {
            Ok(()) => {
                self.last_written = Some(*belief);
                true
            }
            Err(err) => {
                warn!(teammate = %self.teammate, tick, error = %err, "belief persist failed");
                self.last_error = Some(err.to_string());
                false
            }
        }
    }

    pub fn record_history(&mut self, belief: &TrustBelief, tick: u64) {
        let record = TrustHistoryRecord {
            tick,
            teammate: self.teammate.clone(),
            willingness: belief.willingness,
            competence: belief.competence,
        };
        if let Err(err) = self.store.append_history(&record) {
            warn!(teammate = %self.teammate, tick, error = %err, "trust history append failed");
            self.last_error = Some(err.to_string());
        }
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl std::fmt::Debug for BeliefKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeliefKeeper")
            .field("teammate", &self.teammate)
            .field("last_written", &self.last_written)
            .field("last_error", &self.last_error)
            .finish()
    }
}
