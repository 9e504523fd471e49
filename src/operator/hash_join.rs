//! `join(keyL, keyR, pred)` (spec §4.3): binary symmetric hash join. Each
//! side keeps a multimap keyed by its extracted key; a non-outdated arrival
//! probes the other side's map and emits every match satisfying `pred`, an
//! outdated arrival erases the matching entry from its own side's map.

use std::hash::Hash;
use std::sync::Arc;

use fxhash::FxHashMap;
use parking_lot::Mutex;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, BinaryTransform};

pub struct HashJoin<L: Tuple, R: Tuple, Out: Tuple> {
    left_input: InputChannel<L>,
    right_input: InputChannel<R>,
    output: OutputChannel<Out>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<L: Tuple + PartialEq, R: Tuple + PartialEq, Out: Tuple> HashJoin<L, R, Out> {
    pub fn new<K: Eq + Hash + Clone + Send + Sync + 'static>(
        key_l: impl Fn(&L) -> K + Send + Sync + 'static,
        key_r: impl Fn(&R) -> K + Send + Sync + 'static,
        pred: impl Fn(&L, &R) -> bool + Send + Sync + 'static,
        combine: impl Fn(&L, &R) -> Out + Send + Sync + 'static,
    ) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let left_map: Arc<Mutex<FxHashMap<K, Vec<StreamElement<L>>>>> =
            Arc::new(Mutex::new(FxHashMap::default()));
        let right_map: Arc<Mutex<FxHashMap<K, Vec<StreamElement<R>>>>> =
            Arc::new(Mutex::new(FxHashMap::default()));
        let pred = Arc::new(pred);
        let combine = Arc::new(combine);

        let (lm, rm, p, c, out) = (
            left_map.clone(),
            right_map.clone(),
            pred.clone(),
            combine.clone(),
            output.clone(),
        );
        let left_input = InputChannel::new(move |elem: StreamElement<L>, outdated| {
            let k = key_l(elem.tuple());
            if outdated {
                if let Some(v) = lm.lock().get_mut(&k) {
                    v.retain(|e| e.tuple() != elem.tuple());
                }
            } else {
                lm.lock().entry(k.clone()).or_default().push(elem.clone());
                if let Some(matches) = rm.lock().get(&k) {
                    for r_elem in matches {
                        if p(elem.tuple(), r_elem.tuple()) {
                            let ts = elem.timestamp().max(r_elem.timestamp());
                            out.publish(StreamElement::new(c(elem.tuple(), r_elem.tuple()), ts), false);
                        }
                    }
                }
            }
        });

        let (lm, rm, p, c, out) = (left_map, right_map, pred, combine, output.clone());
        let right_input = InputChannel::new(move |elem: StreamElement<R>, outdated| {
            let k = key_r(elem.tuple());
            if outdated {
                if let Some(v) = rm.lock().get_mut(&k) {
                    v.retain(|e| e.tuple() != elem.tuple());
                }
            } else {
                rm.lock().entry(k.clone()).or_default().push(elem.clone());
                if let Some(matches) = lm.lock().get(&k) {
                    for l_elem in matches {
                        if p(l_elem.tuple(), elem.tuple()) {
                            let ts = elem.timestamp().max(l_elem.timestamp());
                            out.publish(StreamElement::new(c(l_elem.tuple(), elem.tuple()), ts), false);
                        }
                    }
                }
            }
        });

        Arc::new(Self {
            left_input,
            right_input,
            output,
            punct_out: Arc::new(PunctuationOutputChannel::new()),
        })
    }

    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        forwarding_punctuation_input(self.punct_out.clone())
    }
}

impl<L: Tuple + PartialEq, R: Tuple + PartialEq, Out: Tuple> BinaryTransform<L, R, Out>
    for HashJoin<L, R, Out>
{
    fn left_input(&self) -> &InputChannel<L> {
        &self.left_input
    }
    fn right_input(&self) -> &InputChannel<R> {
        &self.right_input
    }
    fn output(&self) -> &OutputChannel<Out> {
        &self.output
    }
    fn punctuation_output(&self) -> &PunctuationOutputChannel {
        &self.punct_out
    }
}

impl<L: Tuple + PartialEq, R: Tuple + PartialEq, Out: Tuple> crate::operator::traits::HasPunctuationOutput
    for HashJoin<L, R, Out>
{
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::{Tuple1, Tuple2};
    use parking_lot::Mutex as PMutex;

    /// The lettered end-to-end join scenario (spec §8 Scenario C, with
    /// string payloads) lives in `tests/scenario_c_symmetric_hash_join.rs`;
    /// this is the same key-matching logic over plain integer payloads.
    #[test]
    fn symmetric_join_matches_keys_on_both_sides() {
        let join = HashJoin::<Tuple1<i64>, Tuple1<i64>, Tuple2<i64, i64>>::new(
            |l| l.a0,
            |r| r.a0,
            |_l, _r| true,
            |l, r| Tuple2::new(l.a0, r.a0),
        );
        let seen = Arc::new(PMutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple2<i64, i64>>, _o| {
            s.lock().push((e.tuple().a0, e.tuple().a1))
        });
        let _sub = connect(join.output(), &sink).unwrap();

        let left = OutputChannel::one_to_one();
        let right = OutputChannel::one_to_one();
        let _l = connect(&left, join.left_input()).unwrap();
        let _r = connect(&right, join.right_input()).unwrap();

        left.publish(StreamElement::new(Tuple1::new(1), 0), false);
        right.publish(StreamElement::new(Tuple1::new(1), 1), false);
        right.publish(StreamElement::new(Tuple1::new(2), 2), false);
        left.publish(StreamElement::new(Tuple1::new(2), 3), false);

        assert_eq!(*seen.lock(), vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn outdated_arrival_erases_its_own_side() {
        let join = HashJoin::<Tuple1<i64>, Tuple1<i64>, Tuple2<i64, i64>>::new(
            |l| l.a0,
            |r| r.a0,
            |_l, _r| true,
            |l, r| Tuple2::new(l.a0, r.a0),
        );
        let seen = Arc::new(PMutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple2<i64, i64>>, _o| {
            s.lock().push((e.tuple().a0, e.tuple().a1))
        });
        let _sub = connect(join.output(), &sink).unwrap();

        let left = OutputChannel::one_to_one();
        let right = OutputChannel::one_to_one();
        let _l = connect(&left, join.left_input()).unwrap();
        let _r = connect(&right, join.right_input()).unwrap();

        left.publish(StreamElement::new(Tuple1::new(1), 0), false);
        left.publish(StreamElement::new(Tuple1::new(1), 0), true);
        right.publish(StreamElement::new(Tuple1::new(1), 1), false);

        assert!(seen.lock().is_empty());
    }
}
