//! Transaction bookkeeping shared by every [`super::MVCCTable`] a
//! transaction touches (spec §3).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing transaction id. `beginTx` of every installed
/// version strictly increases over time (spec §4.5's "Conflict resolution
/// ordering").
pub type TransactionId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Active,
    Committed,
    Aborted,
}

/// The global `nextTxID` atomic counter (spec §4.5). One instance is shared
/// by every table a given `Topology`'s transactions touch; in this crate it
/// lives inside [`super::TxManager`].
#[derive(Default)]
pub(crate) struct TxIdCounter(AtomicU64);

impl TxIdCounter {
    pub(crate) fn next(&self) -> TransactionId {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn current(&self) -> TransactionId {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-transaction state: which keys were read (with the version id seen)
/// and which keys were written (with the new value), keyed by an
/// opaque `VersionId` the owning `MVCCTable` hands back.
pub(crate) struct TxState<K, V> {
    pub(crate) status: TxStatus,
    pub(crate) snapshot: TransactionId,
    pub(crate) read_set: HashMap<K, u64>,
    pub(crate) write_set: HashMap<K, V>,
}

impl<K, V> TxState<K, V> {
    pub(crate) fn new(snapshot: TransactionId) -> Self {
        Self {
            status: TxStatus::Active,
            snapshot,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
        }
    }
}
