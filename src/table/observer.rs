//! Observer callbacks attached to a [`super::Table`] (spec §3, §4.5).

/// What happened to a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// When an observer fires relative to the table's write lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObserverMode {
    /// Called under the table lock, synchronously, as part of the
    /// triggering operation. Must not call back into the table (§5).
    Immediate,
    /// Batched and called once the triggering transaction commits, outside
    /// the table lock. For a plain (non-transactional) `Table`, `OnCommit`
    /// observers fire immediately after the mutating call returns, since
    /// every mutation there is already its own implicit transaction.
    OnCommit,
}

pub type ObserverFn<K, V> = Box<dyn Fn(&K, &V, ChangeKind) + Send + Sync>;

pub(crate) struct Observer<K, V> {
    pub(crate) callback: ObserverFn<K, V>,
    pub(crate) mode: ObserverMode,
}
