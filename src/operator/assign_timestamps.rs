//! `assignTimestamps(f)` (spec §4.3): replaces an element's arrival
//! timestamp with `f(e)`. Unary, stateless, forwards punctuation unchanged.

use std::sync::Arc;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

pub struct AssignTimestamps<T: Tuple> {
    input: InputChannel<T>,
    output: OutputChannel<T>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<T: Tuple> AssignTimestamps<T> {
    pub fn new(f: impl Fn(&T) -> crate::timestamp::Timestamp + Send + Sync + 'static) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            let ts = f(elem.tuple());
            downstream.publish(elem.with_timestamp(ts), outdated);
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

impl<T: Tuple> UnaryTransform<T, T> for AssignTimestamps<T> {
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

impl<T: Tuple> crate::operator::traits::HasPunctuationOutput for AssignTimestamps<T> {
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}
