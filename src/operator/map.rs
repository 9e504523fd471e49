//! `map(f)` (spec §4.3): unary, stateless, 1:1 element transform.

use std::sync::Arc;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

pub struct Map<In: Tuple, Out: Tuple> {
    input: InputChannel<In>,
    output: OutputChannel<Out>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<In: Tuple, Out: Tuple> Map<In, Out> {
    pub fn new(f: impl Fn(&In, bool) -> Out + Send + Sync + 'static) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let input = InputChannel::new(move |elem: StreamElement<In>, outdated| {
            let mapped = f(elem.tuple(), outdated);
            downstream.publish(StreamElement::new(mapped, elem.timestamp()), outdated);
        });
        Arc::new(Self {
            input,
            output,
            punct_out: Arc::new(PunctuationOutputChannel::new()),
        })
    }

    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        forwarding_punctuation_input(self.punct_out.clone())
    }
}

impl<In: Tuple, Out: Tuple> UnaryTransform<In, Out> for Map<In, Out> {
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

impl<In: Tuple, Out: Tuple> crate::operator::traits::HasPunctuationOutput for Map<In, Out> {
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
    fn doubles_every_element() {
        let map = Map::<Tuple1<i64>, Tuple1<i64>>::new(|t, _outdated| Tuple1::new(t.a0 * 2));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| {
            s.lock().push(e.tuple().a0)
        });
        let _out_sub = connect(map.output(), &sink).unwrap();

        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, map.input()).unwrap();
        upstream.publish(StreamElement::new(Tuple1::new(21), 0), false);

        assert_eq!(*seen.lock(), vec![42]);
    }
}
