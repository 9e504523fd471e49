//! `scaleJoin(id, n, …)` (spec §4.3): `n` sibling join instances share the
//! same pair of key maps. An arriving tuple is owned by exactly one sibling,
//! `id == hash(key(tuple)) % n`; only the owning sibling stores it and only
//! the owning sibling probes the opposite side's map and emits matches, so
//! the union of the `n` instances' stores holds each tuple exactly once and
//! the union of their outputs contains each match exactly once.
//!
//! The partition assignment is a pure function of the tuple's join key, not
//! a counter shared across siblings, for two reasons. First, every
//! sibling's `InputChannel` is invoked once per published element (the
//! upstream is a `one_to_many` broadcast, so all `n` siblings observe the
//! identical sequence) — a counter incremented once per *observation* would
//! advance once per sibling per tuple rather than once per tuple, so every
//! sibling would compute the same `ord % n` for itself and all would store
//! the tuple. Second, and more fundamentally, partitioning by arrival order
//! rather than by key gives no guarantee that a left tuple and a right
//! tuple sharing the same join key land in the same partition — keying the
//! partition on the join key itself is what makes a match findable at all
//! when each sibling only stores and probes its own partition's slice (see
//! DESIGN.md's Open Question decision).

use std::hash::Hash;
use std::sync::Arc;

use fxhash::{FxHashMap, FxHasher};
use parking_lot::Mutex;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, BinaryTransform};

struct SharedState<L: Tuple, R: Tuple, K> {
    left_map: Mutex<FxHashMap<K, Vec<StreamElement<L>>>>,
    right_map: Mutex<FxHashMap<K, Vec<StreamElement<R>>>>,
}

fn partition_of<K: Hash>(key: &K, n: usize) -> usize {
    use std::hash::Hasher;
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % n
}

pub struct ScaleJoin<L: Tuple, R: Tuple, Out: Tuple> {
    left_input: InputChannel<L>,
    right_input: InputChannel<R>,
    output: OutputChannel<Out>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<L: Tuple + PartialEq, R: Tuple + PartialEq, Out: Tuple> ScaleJoin<L, R, Out> {
    /// Builds the `n` sibling instances sharing one pair of key maps.
    pub fn group<K: Eq + Hash + Clone + Send + Sync + 'static>(
        n: usize,
        key_l: impl Fn(&L) -> K + Send + Sync + Clone + 'static,
        key_r: impl Fn(&R) -> K + Send + Sync + Clone + 'static,
        pred: impl Fn(&L, &R) -> bool + Send + Sync + 'static,
        combine: impl Fn(&L, &R) -> Out + Send + Sync + 'static,
    ) -> Vec<Arc<Self>> {
        assert!(n > 0, "scaleJoin needs at least one sibling");
        let shared = Arc::new(SharedState::<L, R, K> {
            left_map: Mutex::new(FxHashMap::default()),
            right_map: Mutex::new(FxHashMap::default()),
        });
        let pred = Arc::new(pred);
        let combine = Arc::new(combine);

        (0..n)
            .map(|id| {
                let output = OutputChannel::one_to_many();
                let (sh, kl, p, c, out) = (
                    shared.clone(),
                    key_l.clone(),
                    pred.clone(),
                    combine.clone(),
                    output.clone(),
                );
                let left_input = InputChannel::new(move |elem: StreamElement<L>, outdated| {
                    let k = kl(elem.tuple());
                    if partition_of(&k, n) != id {
                        return;
                    }
                    if outdated {
                        if let Some(v) = sh.left_map.lock().get_mut(&k) {
                            v.retain(|e| e.tuple() != elem.tuple());
                        }
                    } else {
                        sh.left_map.lock().entry(k.clone()).or_default().push(elem.clone());
                        if let Some(matches) = sh.right_map.lock().get(&k) {
                            for r_elem in matches {
                                if p(elem.tuple(), r_elem.tuple()) {
                                    let ts = elem.timestamp().max(r_elem.timestamp());
                                    out.publish(
                                        StreamElement::new(c(elem.tuple(), r_elem.tuple()), ts),
                                        false,
                                    );
                                }
                            }
                        }
                    }
                });

                let (sh, kr, p, c, out) =
                    (shared.clone(), key_r.clone(), pred.clone(), combine.clone(), output.clone());
                let right_input = InputChannel::new(move |elem: StreamElement<R>, outdated| {
                    let k = kr(elem.tuple());
                    if partition_of(&k, n) != id {
                        return;
                    }
                    if outdated {
                        if let Some(v) = sh.right_map.lock().get_mut(&k) {
                            v.retain(|e| e.tuple() != elem.tuple());
                        }
                    } else {
                        sh.right_map.lock().entry(k.clone()).or_default().push(elem.clone());
                        if let Some(matches) = sh.left_map.lock().get(&k) {
                            for l_elem in matches {
                                if p(l_elem.tuple(), elem.tuple()) {
                                    let ts = elem.timestamp().max(l_elem.timestamp());
                                    out.publish(
                                        StreamElement::new(c(l_elem.tuple(), elem.tuple()), ts),
                                        false,
                                    );
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
            })
            .collect()
    }

    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        forwarding_punctuation_input(self.punct_out.clone())
    }
}

impl<L: Tuple + PartialEq, R: Tuple + PartialEq, Out: Tuple> BinaryTransform<L, R, Out>
    for ScaleJoin<L, R, Out>
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
    for ScaleJoin<L, R, Out>
{
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}
