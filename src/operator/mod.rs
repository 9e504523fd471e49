//! The operator library (spec §4.3).
//!
//! Every operator is either a [`Source`](traits::Source) (only output
//! channels), a [`Sink`](traits::Sink) (only input channels), or a
//! transform (both — [`traits::UnaryTransform`] for one input,
//! [`traits::BinaryTransform`] for two). Each concrete operator owns its
//! channels and is built standalone; a [`crate::topology::Topology`] wires
//! them together with [`crate::channel::connect`].

pub mod traits;

mod assign_timestamps;
mod barrier;
mod batch;
mod filter;
mod hash_join;
mod map;
mod partition_by;
mod scale_join;
mod stateful_map;
mod table_sink;
mod table_source;
mod tx_chopper;
mod window_op;

pub use assign_timestamps::AssignTimestamps;
pub use barrier::{Barrier, BarrierGate};
pub use batch::Batch;
pub use filter::Filter;
pub use hash_join::HashJoin;
pub use map::Map;
pub use partition_by::PartitionBy;
pub use scale_join::ScaleJoin;
pub use stateful_map::StatefulMap;
pub use table_sink::{ToTable, ToTxTable, UpdateTable};
pub use table_source::{FromTxTables, SelectFromTable};
pub use tx_chopper::TxChopper;
pub use window_op::WindowOperator;
