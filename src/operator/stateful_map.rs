//! `statefulMap(f, init)` (spec §4.3): unary transform carrying
//! per-operator mutable state, with a context callback `f` can use to emit
//! punctuation of its own (used below to build [`super::tx_chopper::TxChopper`]).

use std::sync::Arc;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{Punctuation, PunctuationKind, StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

pub struct StatefulMap<In: Tuple, Out: Tuple> {
    input: InputChannel<In>,
    output: OutputChannel<Out>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<In: Tuple, Out: Tuple> StatefulMap<In, Out> {
    /// `f(elem, outdated, state, emit)` returns the transformed element; it
    /// may call `emit` any number of times to push punctuation tagged with
    /// the input element's timestamp.
    pub fn new<S: Send + 'static>(
        init: S,
        mut f: impl FnMut(&In, bool, &mut S, &mut dyn FnMut(PunctuationKind)) -> Out + Send + 'static,
    ) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let punct_out = Arc::new(PunctuationOutputChannel::new());
        let downstream = output.clone();
        let punct_for_input = punct_out.clone();
        let mut state = init;
        let input = InputChannel::new(move |elem: StreamElement<In>, outdated| {
            let ts = elem.timestamp();
            let mut emit = |kind: PunctuationKind| {
                punct_for_input.publish(Punctuation::new(kind, ts));
            };
            let mapped = f(elem.tuple(), outdated, &mut state, &mut emit);
            downstream.publish(StreamElement::new(mapped, ts), outdated);
        });
        Arc::new(Self {
            input,
            output,
            punct_out,
        })
    }

    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        forwarding_punctuation_input(self.punct_out.clone())
    }
}

impl<In: Tuple, Out: Tuple> UnaryTransform<In, Out> for StatefulMap<In, Out> {
    fn input(&self) -> &InputChannel<In> {
        &self.input
    }
    fn output(&self) -> &OutputChannel<Out> {
        &self.output
    }
    fn punctuation_output(&self) -> &PunctuationOutputChannel {
        &self.punct_out
    }
}

impl<In: Tuple, Out: Tuple> crate::operator::traits::HasPunctuationOutput for StatefulMap<In, Out> {
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::Tuple1;
    use parking_lot::Mutex;

    #[test]
    fn accumulates_running_total() {
        let op = StatefulMap::<Tuple1<i64>, Tuple1<i64>>::new(0i64, |t, _o, state, _emit| {
            *state += t.a0;
            Tuple1::new(*state)
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| {
            s.lock().push(e.tuple().a0)
        });
        let _out_sub = connect(op.output(), &sink).unwrap();
        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, op.input()).unwrap();
        for v in [1, 2, 3] {
            upstream.publish(StreamElement::new(Tuple1::new(v), 0), false);
        }
        assert_eq!(*seen.lock(), vec![1, 3, 6]);
    }
}
