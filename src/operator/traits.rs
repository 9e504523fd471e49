//! Operator roles (spec §4.3): every operator is a **Source** (only output
//! channels), a **Sink** (only input channels), or a **Transform** (both).
//! Every operator also carries a punctuation channel alongside its data
//! channel; transforms forward punctuation downstream unless documented
//! otherwise.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::channel::{OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::Tuple;

/// Most transforms neither originate nor consume punctuation: they just
/// relay whatever arrives on their upstream punctuation channel. This
/// builds the forwarding slot shared by all of them.
pub(crate) fn forwarding_punctuation_input(
    out: Arc<PunctuationOutputChannel>,
) -> PunctuationInputChannel {
    PunctuationInputChannel::new(move |p| out.publish(p))
}

/// A runnable source: `run` pumps elements into its output channel until
/// either the underlying data is exhausted or `stop` is observed, then
/// publishes `EndOfStream` on its punctuation output (spec §4.6,
/// `stopThreads`).
pub trait Runnable: Send + Sync {
    fn run(&self, stop: &AtomicBool);
}

pub trait Source<T: Tuple>: Runnable {
    fn output(&self) -> &OutputChannel<T>;
    fn punctuation_output(&self) -> &PunctuationOutputChannel;
}

pub trait Sink<T: Tuple> {
    fn input(&self) -> &crate::channel::InputChannel<T>;
}

pub trait UnaryTransform<In: Tuple, Out: Tuple> {
    fn input(&self) -> &crate::channel::InputChannel<In>;
    fn output(&self) -> &OutputChannel<Out>;
    fn punctuation_output(&self) -> &PunctuationOutputChannel;
}

pub trait BinaryTransform<L: Tuple, R: Tuple, Out: Tuple> {
    fn left_input(&self) -> &crate::channel::InputChannel<L>;
    fn right_input(&self) -> &crate::channel::InputChannel<R>;
    fn output(&self) -> &OutputChannel<Out>;
    fn punctuation_output(&self) -> &PunctuationOutputChannel;
}

/// Type-erased access to an operator's punctuation output, so a
/// [`crate::topology::Pipe`] can hold "whatever built the previous stage"
/// without naming its concrete type or its upstream element type. Every
/// operator that owns a `punct_out: Arc<PunctuationOutputChannel>` field
/// implements this by cloning that `Arc`.
pub trait HasPunctuationOutput: Send + Sync {
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel>;
}
