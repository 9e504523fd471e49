//! Cross-table transaction coordination (spec §3, §4.5).
//!
//! A single [`TxManager`] is shared by every [`super::MVCCTable`] that may
//! participate in the same transaction, so that `fromTxTables` can scan
//! several tables under one consistent snapshot and `toTxTable` can commit
//! writes that span more than one table atomically.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::PipeError;
use crate::table::transaction::{TransactionId, TxIdCounter, TxStatus};

/// Implemented by each `MVCCTable` a transaction touches, so [`TxManager`]
/// can drive two-phase validate-then-apply commit across all of them.
pub(crate) trait TxParticipant: Send + Sync {
    fn validate(&self, tx: TransactionId) -> bool;
    fn apply(&self, tx: TransactionId);
    fn discard(&self, tx: TransactionId);
}

#[derive(Default)]
pub struct TxManager {
    counter: TxIdCounter,
    status: DashMap<TransactionId, TxStatus>,
    participants: DashMap<TransactionId, Vec<Arc<dyn TxParticipant>>>,
}

impl TxManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `newTx()`: reads the global atomic counter and returns a fresh id;
    /// the snapshot is the id itself, since visibility is defined as
    /// `beginTx <= snapshotOf(r)` (spec §3).
    pub fn new_tx(&self) -> TransactionId {
        let id = self.counter.next();
        self.status.insert(id, TxStatus::Active);
        id
    }

    pub fn status(&self, tx: TransactionId) -> TxStatus {
        self.status.get(&tx).map(|s| *s).unwrap_or(TxStatus::Active)
    }

    pub(crate) fn register_participant(&self, tx: TransactionId, participant: Arc<dyn TxParticipant>) {
        let mut entry = self.participants.entry(tx).or_default();
        if !entry.iter().any(|p| Arc::ptr_eq(p, &participant)) {
            entry.push(participant);
        }
    }

    pub fn commit(&self, tx: TransactionId) -> Result<(), PipeError> {
        if self.status(tx) == TxStatus::Aborted {
            return Err(PipeError::TxAbort {
                tx,
                reason: "transaction already aborted".to_string(),
            });
        }
        let participants = self
            .participants
            .get(&tx)
            .map(|v| v.clone())
            .unwrap_or_default();

        for p in &participants {
            if !p.validate(tx) {
                self.status.insert(tx, TxStatus::Aborted);
                for p in &participants {
                    p.discard(tx);
                }
                return Err(PipeError::TxAbort {
                    tx,
                    reason: "validation failed: a read or write was invalidated by a concurrent commit"
                        .to_string(),
                });
            }
        }
        for p in &participants {
            p.apply(tx);
        }
        self.status.insert(tx, TxStatus::Committed);
        self.participants.remove(&tx);
        Ok(())
    }

    pub fn abort(&self, tx: TransactionId) {
        if let Some((_, participants)) = self.participants.remove(&tx) {
            for p in participants {
                p.discard(tx);
            }
        }
        self.status.insert(tx, TxStatus::Aborted);
    }
}
