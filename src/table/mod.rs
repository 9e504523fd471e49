//! Keyed store and transactional table (spec §4.5).

mod mvcc;
mod observer;
mod table;
mod transaction;
mod tx_manager;

pub use mvcc::MVCCTable;
pub use observer::{ChangeKind, ObserverFn, ObserverMode};
pub use table::Table;
pub use transaction::{TransactionId, TxStatus};
pub use tx_manager::TxManager;
