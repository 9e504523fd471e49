//! Transaction chopping (spec §4.5, SPEC_FULL.md §10.6): an upstream
//! `statefulMap` that watches an application-level transaction id column and
//! brackets each run of same-id elements with `TxBegin`/`TxCommit`
//! punctuations, so a downstream `toTxTable` can commit each run as one MVCC
//! transaction.
//!
//! The original `TxProcessing.cpp` chops on exactly this signal: the first
//! tuple of a fresh stream opens a transaction without a preceding commit,
//! and every subsequent change of the application-level id commits the
//! previous transaction before beginning the next one. The still-open
//! transaction is committed when `EndOfStream` arrives.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{Punctuation, PunctuationKind, StreamElement, Tuple};
use crate::operator::traits::UnaryTransform;
use crate::table::{TransactionId, TxManager};

pub struct TxChopper<T: Tuple, A> {
    input: InputChannel<T>,
    output: OutputChannel<T>,
    punct_out: Arc<PunctuationOutputChannel>,
    punctuation_input: PunctuationInputChannel,
    _marker: std::marker::PhantomData<A>,
}

impl<T: Tuple, A: Eq + Clone + Send + 'static> TxChopper<T, A> {
    /// `app_tx_id` extracts the application-level transaction id column from
    /// each element; a change in its value is what triggers chopping.
    pub fn new(tx_manager: Arc<TxManager>, app_tx_id: impl Fn(&T) -> A + Send + 'static) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let punct_out = Arc::new(PunctuationOutputChannel::new());
        let current: Arc<Mutex<Option<(A, TransactionId)>>> = Arc::new(Mutex::new(None));

        let downstream = output.clone();
        let punct_for_input = punct_out.clone();
        let current_for_input = current.clone();
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            let ts = elem.timestamp();
            let incoming = app_tx_id(elem.tuple());
            let mut cur = current_for_input.lock();
            let should_roll = match &*cur {
                None => true,
                Some((cur_id, _)) => *cur_id != incoming,
            };
            if should_roll {
                if let Some((_, prev_tx)) = cur.take() {
                    punct_for_input.publish(Punctuation::tx_commit(prev_tx, ts));
                }
                let tx = tx_manager.new_tx();
                punct_for_input.publish(Punctuation::tx_begin(tx, ts));
                *cur = Some((incoming, tx));
            }
            drop(cur);
            downstream.publish(elem, outdated);
        });

        // Forwards upstream punctuation; on `EndOfStream` it first closes
        // whatever transaction is still open.
        let punct_for_eos = punct_out.clone();
        let punctuation_input = PunctuationInputChannel::new(move |p| {
            if p.kind == PunctuationKind::EndOfStream {
                if let Some((_, tx)) = current.lock().take() {
                    punct_for_eos.publish(Punctuation::tx_commit(tx, p.timestamp));
                }
            }
            punct_for_eos.publish(p);
        });

        Arc::new(Self {
            input,
            output,
            punct_out,
            punctuation_input,
            _marker: std::marker::PhantomData,
        })
    }

    pub fn punctuation_input(&self) -> &PunctuationInputChannel {
        &self.punctuation_input
    }
}

impl<T: Tuple, A: Eq + Clone + Send + 'static> UnaryTransform<T, T> for TxChopper<T, A> {
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
    fn output(&self) -> &OutputChannel<T> {
        &self.output
    }
    fn punctuation_output(&self) -> &PunctuationOutputChannel {
        &self.punct_out
    }
}

impl<T: Tuple, A: Eq + Clone + Send + 'static> crate::operator::traits::HasPunctuationOutput
    for TxChopper<T, A>
{
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::Tuple2;

    #[test]
    fn commits_on_every_app_tx_id_change() {
        let mgr = TxManager::new();
        let chopper = TxChopper::<Tuple2<i64, i64>, i64>::new(mgr, |t| t.a1);
        let punctuations = Arc::new(Mutex::new(Vec::new()));
        let p = punctuations.clone();
        let punct_sink =
            PunctuationInputChannel::new(move |punct| p.lock().push((*punct).kind.clone()));
        let _psub = chopper.punctuation_output().connect(&punct_sink);

        let upstream = OutputChannel::one_to_one();
        let _sub = connect(&upstream, chopper.input()).unwrap();
        // (value, app_tx_id): two elements in tx 100, one in tx 200.
        for (v, tx) in [(1, 100), (2, 100), (3, 200)] {
            upstream.publish(StreamElement::new(Tuple2::new(v, tx), 0), false);
        }

        let kinds = punctuations.lock().clone();
        // first element: TxBegin(1) only (no preceding commit).
        // third element (new app tx id): TxCommit(1), TxBegin(2).
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], PunctuationKind::TxBegin(1)));
        assert!(matches!(kinds[1], PunctuationKind::TxCommit(1)));
        assert!(matches!(kinds[2], PunctuationKind::TxBegin(2)));
    }

    #[test]
    fn end_of_stream_closes_the_open_transaction() {
        let mgr = TxManager::new();
        let chopper = TxChopper::<Tuple2<i64, i64>, i64>::new(mgr, |t| t.a1);
        let punctuations = Arc::new(Mutex::new(Vec::new()));
        let p = punctuations.clone();
        let punct_sink =
            PunctuationInputChannel::new(move |punct| p.lock().push((*punct).kind.clone()));
        let _psub = chopper.punctuation_output().connect(&punct_sink);

        let upstream = OutputChannel::one_to_one();
        let _sub = connect(&upstream, chopper.input()).unwrap();
        upstream.publish(StreamElement::new(Tuple2::new(1i64, 100i64), 0), false);

        let feed = PunctuationOutputChannel::new();
        let _feed_sub = feed.connect(chopper.punctuation_input());
        feed.publish(Punctuation::end_of_stream(5));

        let kinds = punctuations.lock().clone();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], PunctuationKind::TxBegin(1)));
        assert!(matches!(kinds[1], PunctuationKind::TxCommit(1)));
        assert!(matches!(kinds[2], PunctuationKind::EndOfStream));
    }
}
