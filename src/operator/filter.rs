//! `where(p)` (spec §4.3): unary, forwards an element iff the predicate
//! holds; punctuations always pass through.

use std::sync::Arc;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

pub struct Filter<T: Tuple> {
    input: InputChannel<T>,
    output: OutputChannel<T>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<T: Tuple> Filter<T> {
    pub fn new(predicate: impl Fn(&T, bool) -> bool + Send + Sync + 'static) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            if predicate(elem.tuple(), outdated) {
                downstream.publish(elem, outdated);
            }
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

impl<T: Tuple> UnaryTransform<T, T> for Filter<T> {
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

impl<T: Tuple> crate::operator::traits::HasPunctuationOutput for Filter<T> {
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
    fn keeps_only_matching_elements() {
        let filter = Filter::<Tuple1<i64>>::new(|t, _o| t.a0 % 2 == 0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| {
            s.lock().push(e.tuple().a0)
        });
        let _out_sub = connect(filter.output(), &sink).unwrap();

        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, filter.input()).unwrap();
        for v in [1, 2, 3, 4] {
            upstream.publish(StreamElement::new(Tuple1::new(v), 0), false);
        }
        assert_eq!(*seen.lock(), vec![2, 4]);
    }
}
