//! PipeFabric runtime core.
//!
//! A stream processing engine's core runtime: the tuple/stream element
//! model (spec §3, [`element`]), a pub-sub operator graph connected by
//! typed channels ([`channel`], [`operator`]), windowing and incremental
//! aggregation ([`window`]), and a transactional MVCC table ([`table`]).
//! [`topology`] wires operators together and owns their lifetime.
//!
//! What this crate is **not**: a SQL parser or query compiler, an ingress
//! adapter (Kafka/MQTT/AMQP/ZeroMQ/REST), a persistent-memory storage
//! engine, or an image/matrix operator library. Those are external
//! collaborators; this crate specifies only the interfaces they consume
//! ([`config`], [`element::csv`]).

pub mod channel;
pub mod config;
pub mod element;
pub mod error;
pub mod operator;
pub mod table;
pub mod timestamp;
pub mod topology;
pub mod window;

pub use config::PipeConfig;
pub use element::{
    CsvExtractor, NullBitmap, Punctuation, PunctuationKind, PunctuationPtr, StreamElement, Tuple,
    Tuple1, Tuple10, Tuple11, Tuple12, Tuple13, Tuple14, Tuple15, Tuple16, Tuple2, Tuple3, Tuple4,
    Tuple5, Tuple6, Tuple7, Tuple8, Tuple9,
};
pub use error::{PipeError, PipeResult};
pub use table::{MVCCTable, Table, TransactionId, TxManager, TxStatus};
pub use timestamp::Timestamp;
pub use topology::{Pipe, Topology};
