//! The crate-wide error taxonomy (spec §7).
//!
//! Per-element errors ([`PipeError::Parse`], [`PipeError::KeyNotFound`] when
//! an operator chooses to treat a miss as recoverable) are meant to be
//! logged with `tracing::warn!` and the offending element dropped by the
//! caller. State-corrupting errors ([`PipeError::WriteConflict`],
//! [`PipeError::TxAbort`], [`PipeError::Topology`]) should propagate.

use crate::table::TransactionId;

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("key not found in table {table}")]
    KeyNotFound { table: String },

    #[error("write conflict on table {table} for transaction {tx}")]
    WriteConflict { table: String, tx: TransactionId },

    #[error("transaction {tx} aborted: {reason}")]
    TxAbort { tx: TransactionId, reason: String },

    #[error("topology error: {0}")]
    Topology(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type PipeResult<T> = Result<T, PipeError>;
