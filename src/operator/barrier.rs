//! `barrier(pred, cv, mtx)` (spec §4.3, §5): before forwarding an element,
//! sleep on a condition variable until `pred` becomes true. Used to hold
//! back late events until some external clock has advanced enough; the
//! condvar wait is one of the concurrency model's named suspension points.

use std::sync::{Arc, Condvar, Mutex};

use crate::channel::{InputChannel, OutputChannel, PunctuationInputChannel, PunctuationOutputChannel};
use crate::element::{StreamElement, Tuple};
use crate::operator::traits::{forwarding_punctuation_input, UnaryTransform};

/// The condvar/mutex pair a barrier waits on. Whatever advances the
/// external clock calls [`BarrierGate::notify_all`] after updating the
/// state `pred` reads.
#[derive(Default)]
pub struct BarrierGate {
    mutex: Mutex<()>,
    cvar: Condvar,
}

impl BarrierGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notify_all(&self) {
        self.cvar.notify_all();
    }

    fn wait_until(&self, mut pred: impl FnMut() -> bool) {
        let mut guard = self.mutex.lock().unwrap();
        while !pred() {
            guard = self.cvar.wait(guard).unwrap();
        }
    }
}

pub struct Barrier<T: Tuple> {
    input: InputChannel<T>,
    output: OutputChannel<T>,
    punct_out: Arc<PunctuationOutputChannel>,
}

impl<T: Tuple> Barrier<T> {
    pub fn new(
        gate: Arc<BarrierGate>,
        pred: impl Fn(&StreamElement<T>) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        let output = OutputChannel::one_to_many();
        let downstream = output.clone();
        let input = InputChannel::new(move |elem: StreamElement<T>, outdated| {
            gate.wait_until(|| pred(&elem));
            downstream.publish(elem, outdated);
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

impl<T: Tuple> UnaryTransform<T, T> for Barrier<T> {
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

impl<T: Tuple> crate::operator::traits::HasPunctuationOutput for Barrier<T> {
    fn punctuation_output_channel(&self) -> Arc<PunctuationOutputChannel> {
        self.punct_out.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::connect;
    use crate::element::tuple::Tuple1;
    use parking_lot::Mutex as PMutex;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn releases_once_clock_advances() {
        let clock = Arc::new(AtomicI64::new(0));
        let gate = BarrierGate::new();
        let c = clock.clone();
        let barrier = Barrier::<Tuple1<i64>>::new(gate.clone(), move |e| e.tuple().a0 <= c.load(Ordering::SeqCst));

        let seen = Arc::new(PMutex::new(Vec::new()));
        let s = seen.clone();
        let sink = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| s.lock().push(e.tuple().a0));
        let _out_sub = connect(barrier.output(), &sink).unwrap();
        let upstream = OutputChannel::one_to_one();
        let _in_sub = connect(&upstream, barrier.input()).unwrap();

        let up = upstream.clone();
        let handle = thread::spawn(move || {
            up.publish(StreamElement::new(Tuple1::new(5), 0), false);
        });

        thread::sleep(Duration::from_millis(20));
        assert!(seen.lock().is_empty());
        clock.store(5, Ordering::SeqCst);
        gate.notify_all();
        handle.join().unwrap();
        assert_eq!(*seen.lock(), vec![5]);
    }
}
