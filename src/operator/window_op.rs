//! `slidingWindow(kind, size)` / `tumblingWindow(kind, size)` followed by
//! an aggregation (spec §4.3, §4.4): the channel-wired transform around a
//! [`crate::window::WindowAggregate`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::tuple::Tuple1;
use crate::element::{PunctuationKind, StreamElement, Tuple, WireAttribute};
use crate::operator::traits::UnaryTransform;
use crate::window::{Aggregate, WindowAggregate, WindowManager};

/// Wraps a [`WindowAggregate`] as an operator: each input element is fed
/// through the window, any aggregate snapshot it produces is published
/// (wrapped as a single-attribute [`Tuple1`]) on the data output, and the
/// punctuation the window raises (`WindowExpired` or `SlideExpired`) is
/// published on the punctuation output alongside whatever arrives on the
/// upstream punctuation channel.
pub struct WindowOperator<T, A>
where
    T: Tuple,
    A: Aggregate,
    A::Out: Clone + Send + Sync + WireAttribute + 'static,
{
    input: InputChannel<T>,
    output: OutputChannel<Tuple1<A::Out>>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<T, A> WindowOperator<T, A>
where
    T: Tuple,
    A: Aggregate,
    A::Out: Clone + Send + Sync + WireAttribute + 'static,
{
    pub fn new(
        manager: Box<dyn WindowManager<T>>,
        extract: impl Fn(&T) -> A::In + Send + 'static,
    ) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let punct_out = Arc::new(PunctuationOutputChannel::new());
        let emit_punct = punct_out.clone();

        let state = Mutex::new(WindowAggregate::<T, A>::new(manager, extract));
        let input = InputChannel::new(move |elem: StreamElement<T>, _outdated| {
            let ts = elem.timestamp();
            let (snapshot, punctuation) = state
                .lock()
                .process(elem)
                .expect("aggregate iterate should not fail on a live window");
            if let Some(out) = snapshot {
                downstream.publish(StreamElement::new(Tuple1::new(out), ts), false);
            }
            if let Some(kind) = punctuation {
                emit_punct.publish(crate::element::Punctuation::new(kind, ts));
            }
        });

        Arc::new(Self {
            input,
            output,
            punct_out,
        })
    }

    /// Forwards any upstream punctuation (e.g. `EndOfStream`) straight
    /// through; punctuation the window itself raises is published from
    /// inside the data slot instead (see [`Self::new`]).
    pub fn punctuation_input(&self) -> PunctuationInputChannel {
        let out = self.punct_out.clone();
        PunctuationInputChannel::new(move |p| {
            if !matches!(
                p.kind,
                PunctuationKind::WindowExpired | PunctuationKind::SlideExpired
            ) {
                out.publish(p);
            }
        })
    }
}

impl<T, A> UnaryTransform<T, Tuple1<A::Out>> for WindowOperator<T, A>
where
    T: Tuple,
    A: Aggregate,
    A::Out: Clone + Send + Sync + WireAttribute + 'static,
{
    fn input(&self) -> &InputChannel<T> {
        &self.input
    }
    fn output(&self) -> &OutputChannel<Tuple1<A::Out>> {
        &self.output
    }
    fn punctuation_output(&self) -> &PunctuationOutputChannel {
        &self.punct_out
    }
}

impl<T, A> crate::operator::traits::HasPunctuationOutput for WindowOperator<T, A>
where
    T: Tuple,
    A: Aggregate,
    A::Out: Clone + Send + Sync + WireAttribute + 'static,
{
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::Tuple1 as T1;
    use crate::window::{SumI64, TumblingWindow, WindowKind};

    /// Scenario A's numbers (spec §8) driven through the real pub-sub
    /// channel fabric instead of calling `WindowAggregate` directly (see
    /// `tests/scenario_a_tumbling_row_sum.rs` for the lettered version).
    #[test]
    fn tumbling_row_sum_through_channels() {
        let op = WindowOperator::<T1<i64>, SumI64>::new(
            Box::new(TumblingWindow::new(WindowKind::Row(3))),
            |t| t.a0,
        );
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| s.lock().push(e.tuple().a0));
        let _out_sub = connect(op.output(), &sink).unwrap();
        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, op.input()).unwrap();

        for (i, v) in (10..=100).step_by(10).enumerate() {
            upstream.publish(StreamElement::new(T1::new(v), 11 + i as u64), false);
        }
        assert_eq!(*seen.lock(), vec![60, 150, 240]);
    }
}
