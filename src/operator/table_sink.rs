//! `toTable(table)` / `updateTable(table, merge, create)` and the
//! transactional `toTxTable(table)` sink (spec §4.3, §4.5).

use std::hash::Hash;
use std::sync::Arc;

use crate::channel::{InputChannel, PunctuationInputChannel};
use crate::element::{PunctuationKind, PunctuationPtr, StreamElement, Tuple};
use crate::operator::traits::Sink;
use crate::table::{MVCCTable, Table, TransactionId};

/// `toTable(table)`: on each input, insert/replace the record keyed by
/// `key_fn`; an outdated element erases its key instead.
pub struct ToTable<T: Tuple> {
    input: InputChannel<T>,
}

impl<T: Tuple> ToTable<T> {
    pub fn new<K: Ord + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static>(
        table: Arc<Table<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        value_fn: impl Fn(&T) -> V + Send + 'static,
    ) -> Arc<Self> {
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            let key = key_fn(elem.tuple());
            if outdated {
                table.erase(&key);
            } else {
                table.insert(key, value_fn(elem.tuple()));
            }
        });
        Arc::new(Self { input })
    }
}

impl<T: Tuple> Sink<T> for ToTable<T> {
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
}

/// `updateTable(table, merge, create)`: on each input, merge into the
/// existing record if the key is present, else build a fresh one with
/// `create`.
pub struct UpdateTable<T: Tuple> {
    input: InputChannel<T>,
}

impl<T: Tuple> UpdateTable<T> {
    pub fn new<K: Ord + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static>(
        table: Arc<Table<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        merge_fn: impl Fn(&V, &T) -> V + Send + 'static,
        create_fn: impl Fn(&T) -> V + Send + 'static,
    ) -> Arc<Self> {
        let input = InputChannel::new(move |elem: StreamElement<T>, _outdated| {
            let key = key_fn(elem.tuple());
            let value = match table.get_by_key(&key) {
                Ok(existing) => merge_fn(&existing, elem.tuple()),
                Err(_) => create_fn(elem.tuple()),
            };
            table.insert(key, value);
        });
        Arc::new(Self { input })
    }
}

impl<T: Tuple> Sink<T> for UpdateTable<T> {
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
}

/// `toTxTable(table)` (spec §4.5's "Chopping punctuations"): between a
/// `TxBegin(t)` and the matching `TxCommit(t)` on its punctuation input,
/// every data element received is routed through the MVCC interface under
/// transaction `t`; outside of a bracket, each element gets its own
/// single-element transaction.
pub struct ToTxTable<T: Tuple> {
    input: InputChannel<T>,
    punctuation_input: PunctuationInputChannel,
}

impl<T: Tuple> ToTxTable<T> {
    pub fn new<K: Eq + Hash + Ord + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static>(
        table: Arc<MVCCTable<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        value_fn: impl Fn(&T) -> V + Send + 'static,
    ) -> Arc<Self> {
        let current_tx: Arc<parking_lot::Mutex<Option<TransactionId>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let tbl = table.clone();
        let cur = current_tx.clone();
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            let key = key_fn(elem.tuple());
            let bracketed = *cur.lock();
            let tx = bracketed.unwrap_or_else(|| tbl.new_tx());
            let result = if outdated {
                tbl.erase(tx, key)
            } else {
                tbl.insert(tx, key, value_fn(elem.tuple()))
            };
            if result.is_ok() && bracketed.is_none() {
                let _ = tbl.transaction_commit(tx);
            }
        });

        let tbl = table;
        let cur = current_tx;
        let punctuation_input = PunctuationInputChannel::new(move |p: PunctuationPtr| match p.kind {
            PunctuationKind::TxBegin(t) => *cur.lock() = Some(t),
            PunctuationKind::TxCommit(t) => {
                let _ = tbl.transaction_commit(t);
                *cur.lock() = None;
            }
            _ => {}
        });

        Arc::new(Self {
            input,
            punctuation_input,
        })
    }

    pub fn punctuation_input(&self) -> &PunctuationInputChannel {
        &self.punctuation_input
    }
}

impl<T: Tuple> Sink<T> for ToTxTable<T> {
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
}
