//! Topology builder and source runtime (spec §4.6).
//!
//! A [`Topology`] owns the sources of one or more pipelines plus the
//! bookkeeping needed to tear them down in the deterministic order §4.6
//! requires: sinks first, then transforms in reverse topological order,
//! then sources. [`Pipe`] is the builder returned by [`Topology::new_stream`]
//! and chained through `.map()`/`.filter()`/… the way `newStream…` and its
//! appended operators are described in §4.6's first paragraph.
//!
//! Operators with more than one input or output channel — `join`,
//! `scaleJoin`, `partitionBy` — don't fit a single linear chain and are
//! wired by hand with [`crate::channel::connect`] once a [`Pipe`] is peeled
//! open with [`Pipe::into_parts`]; see that method's docs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, info_span, warn};

use crate::channel::{connect, OutputChannel, PunctuationOutputChannel};
use crate::element::Tuple;
use crate::error::{PipeError, PipeResult};
use crate::operator::traits::{HasPunctuationOutput, Runnable, Sink, Source, UnaryTransform};
use crate::operator::{
    AssignTimestamps, Barrier, BarrierGate, Batch, Filter, Map, StatefulMap, ToTable, ToTxTable,
    TxChopper, UpdateTable, WindowOperator,
};
use crate::table::{MVCCTable, Table, TxManager};
use crate::timestamp::Timestamp;
use crate::window::{Aggregate, WindowManager};

/// A marker covering anything that can sit in a type-erased teardown slot:
/// every operator `Arc` and every [`crate::channel::Subscription`] we hold
/// onto qualifies, since both are `Send + Sync + 'static`.
trait Teardown: Send + Sync {}
impl<T: Send + Sync + ?Sized> Teardown for T {}

struct SourceHandle {
    name: String,
    runnable: Arc<dyn Runnable>,
}

/// Builder + runtime for one or more source-rooted pipelines (spec §4.6).
pub struct Topology {
    name: String,
    sources: Vec<SourceHandle>,
    /// Kept in creation (topological) order; teardown drains from the back
    /// so the most-downstream transform is dropped first.
    transforms: Vec<Box<dyn Teardown>>,
    sinks: Vec<Box<dyn Teardown>>,
    /// Hand-wired operators (join/scaleJoin/partitionBy/…) register a
    /// closure here to join their own worker threads on `stop_threads()`.
    extra_stop_hooks: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    stop: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    error_tx: flume::Sender<PipeError>,
    error_rx: flume::Receiver<PipeError>,
}

impl Topology {
    pub fn new(name: impl Into<String>) -> Self {
        let (error_tx, error_rx) = flume::unbounded();
        Self {
            name: name.into(),
            sources: Vec::new(),
            transforms: Vec::new(),
            sinks: Vec::new(),
            extra_stop_hooks: Mutex::new(Vec::new()),
            stop: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
            error_tx,
            error_rx,
        }
    }

    /// Roots a new [`Pipe`] at `source`, named `name` for tracing.
    pub fn new_stream<T: Tuple>(
        &mut self,
        name: impl Into<String>,
        source: Arc<impl Source<T> + 'static>,
    ) -> Pipe<'_, T> {
        let name = name.into();
        debug!(topology = %self.name, source = %name, "registering source");
        self.sources.push(SourceHandle {
            name,
            runnable: source.clone() as Arc<dyn Runnable>,
        });
        Pipe {
            output: source.output().clone(),
            upstream_punct: source,
            topology: self,
        }
    }

    /// Registers a closure run during [`Self::stop_threads`] after every
    /// source has stopped, for operators not wired through [`Pipe`] (e.g.
    /// [`crate::operator::PartitionBy::stop`]).
    pub fn register_stop_hook(&self, hook: impl FnOnce() + Send + 'static) {
        self.extra_stop_hooks.lock().push(Box::new(hook));
    }

    /// The topology-wide error channel (spec §7's "topology-wide error
    /// channel whose default sink is the process stderr"); a source thread
    /// that hits an `IOError` sends it here instead of panicking.
    pub fn error_sender(&self) -> flume::Sender<PipeError> {
        self.error_tx.clone()
    }

    /// Drains and logs every error queued so far, the default sink
    /// mentioned in §7.
    fn drain_errors_to_stderr(&self) {
        while let Ok(err) = self.error_rx.try_recv() {
            eprintln!("[{}] topology error: {err}", self.name);
        }
    }

    /// `start(async)` (spec §4.6): starts each registered source, each in
    /// its own thread when `run_async` is true, otherwise runs every source
    /// to completion synchronously on the calling thread before returning.
    pub fn start(&self, run_async: bool) {
        info!(topology = %self.name, run_async, sources = self.sources.len(), "starting topology");
        for src in &self.sources {
            let stop = self.stop.clone();
            let runnable = src.runnable.clone();
            let name = src.name.clone();
            let topology_name = self.name.clone();
            if run_async {
                let handle = std::thread::Builder::new()
                    .name(format!("source-{name}"))
                    .spawn(move || {
                        let _span = info_span!("source", topology = %topology_name, name = %name).entered();
                        debug!("source starting");
                        runnable.run(&stop);
                        debug!("source finished");
                    })
                    .expect("failed to spawn source thread");
                self.handles.lock().push(handle);
            } else {
                let _span = info_span!("source", topology = %topology_name, name = %name).entered();
                runnable.run(&stop);
            }
        }
    }

    /// `wait()` (spec §4.6): blocks until every source started by
    /// [`Self::start`] has signalled `EndOfStream` (synchronous sources
    /// already did so by the time `start` returned; async sources are
    /// joined here).
    pub fn wait(&self) {
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for h in handles {
            if h.join().is_err() {
                warn!(topology = %self.name, "a source thread panicked");
            }
        }
        self.drain_errors_to_stderr();
    }

    /// `runEvery(dt)` (spec §4.6): runs every source synchronously, then
    /// sleeps `dt`, repeatedly, until [`Self::stop_threads`] is called from
    /// another thread. Intended for periodic table snapshot queries
    /// (`selectFromTable`/`fromTxTables` sources).
    pub fn run_every(&self, dt: Duration) {
        info!(topology = %self.name, ?dt, "entering runEvery loop");
        while !self.stop.load(Ordering::Relaxed) {
            for src in &self.sources {
                let _span = info_span!("run_every", topology = %self.name, name = %src.name).entered();
                src.runnable.run(&self.stop);
            }
            self.drain_errors_to_stderr();
            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(dt);
        }
    }

    /// `stopThreads()` (spec §4.6): signals every source to stop, joins all
    /// worker threads (async sources, plus whatever registered an
    /// [`Self::register_stop_hook`]), then tears the graph down in the
    /// order §4.6 requires — sinks first, transforms in reverse topological
    /// order, sources last.
    pub fn stop_threads(&mut self) {
        info!(topology = %self.name, "stopping topology");
        self.stop.store(true, Ordering::Relaxed);
        for h in self.handles.lock().drain(..) {
            let _ = h.join();
        }
        for hook in self.extra_stop_hooks.lock().drain(..) {
            hook();
        }

        self.sinks.clear();
        while let Some(t) = self.transforms.pop() {
            drop(t);
        }
        self.sources.clear();
        self.drain_errors_to_stderr();
    }
}

/// A source-rooted, still-growing pipeline (spec §4.6). Each method
/// consumes `self` and returns a new `Pipe` over the appended operator's
/// output, borrowing the owning [`Topology`] for the builder's lifetime.
pub struct Pipe<'t, T: Tuple> {
    output: OutputChannel<T>,
    upstream_punct: Arc<dyn HasPunctuationOutput>,
    topology: &'t mut Topology,
}

impl<'t, T: Tuple> Pipe<'t, T> {
    fn chain<Op, Out: Tuple>(self, op: Arc<Op>) -> PipeResult<Pipe<'t, Out>>
    where
        Op: UnaryTransform<T, Out> + HasPunctuationOutput + 'static,
    {
        let data_sub = connect(&self.output, op.input())?;
        let punct_sub = self.upstream_punct.punctuation_output_channel().connect(
            &forwarding_punctuation_input(op.punctuation_output_channel()),
        );
        self.topology
            .transforms
            .push(Box::new((data_sub, punct_sub, op.clone())));
        Ok(Pipe {
            output: op.output().clone(),
            upstream_punct: op,
            topology: self.topology,
        })
    }

    pub fn map<Out: Tuple>(self, f: impl Fn(&T, bool) -> Out + Send + Sync + 'static) -> Pipe<'t, Out> {
        self.chain(Map::new(f)).expect("map: channel wiring cannot fail on a fresh pair")
    }

    pub fn filter(self, predicate: impl Fn(&T, bool) -> bool + Send + Sync + 'static) -> Pipe<'t, T> {
        self.chain(Filter::new(predicate))
            .expect("filter: channel wiring cannot fail on a fresh pair")
    }

    pub fn assign_timestamps(
        self,
        f: impl Fn(&T) -> Timestamp + Send + Sync + 'static,
    ) -> Pipe<'t, T> {
        self.chain(AssignTimestamps::new(f))
            .expect("assignTimestamps: channel wiring cannot fail on a fresh pair")
    }

    pub fn batch(self, n: usize) -> Pipe<'t, crate::operator::batch::BatchedTuple<T>> {
        self.chain(Batch::new(n))
            .expect("batch: channel wiring cannot fail on a fresh pair")
    }

    pub fn stateful_map<S: Send + 'static, Out: Tuple>(
        self,
        init: S,
        f: impl FnMut(&T, bool, &mut S, &mut dyn FnMut(crate::element::PunctuationKind)) -> Out
            + Send
            + 'static,
    ) -> Pipe<'t, Out> {
        let op = StatefulMap::new(init, f);
        let data_sub = connect(&self.output, op.input())
            .expect("statefulMap: channel wiring cannot fail on a fresh pair");
        self.topology.transforms.push(Box::new((data_sub, op.clone())));
        Pipe {
            output: op.output().clone(),
            upstream_punct: op,
            topology: self.topology,
        }
    }

    pub fn barrier(
        self,
        gate: Arc<BarrierGate>,
        pred: impl Fn(&crate::element::StreamElement<T>) -> bool + Send + Sync + 'static,
    ) -> Pipe<'t, T> {
        self.chain(Barrier::new(gate, pred))
            .expect("barrier: channel wiring cannot fail on a fresh pair")
    }

    /// `app_tx_id` extracts the application-level transaction id column
    /// whose value changes bracket the chopped transactions (§4.5).
    pub fn tx_chopper<A: Eq + Clone + Send + 'static>(
        self,
        tx_manager: Arc<TxManager>,
        app_tx_id: impl Fn(&T) -> A + Send + 'static,
    ) -> Pipe<'t, T> {
        let op = TxChopper::new(tx_manager, app_tx_id);
        let data_sub = connect(&self.output, op.input())
            .expect("txChopper: channel wiring cannot fail on a fresh pair");
        let punct_sub = self
            .upstream_punct
            .punctuation_output_channel()
            .connect(op.punctuation_input());
        self.topology
            .transforms
            .push(Box::new((data_sub, punct_sub, op.clone())));
        Pipe {
            output: op.output().clone(),
            upstream_punct: op,
            topology: self.topology,
        }
    }

    pub fn window_aggregate<A>(
        self,
        manager: Box<dyn WindowManager<T>>,
        extract: impl Fn(&T) -> A::In + Send + 'static,
    ) -> Pipe<'t, crate::element::tuple::Tuple1<A::Out>>
    where
        A: Aggregate + 'static,
        A::Out: Clone + Send + Sync + crate::element::WireAttribute + 'static,
    {
        self.chain(WindowOperator::<T, A>::new(manager, extract))
            .expect("windowAggregate: channel wiring cannot fail on a fresh pair")
    }

    fn finish_sink<S: Sink<T> + Send + Sync + 'static>(self, sink: Arc<S>) -> PipeResult<()> {
        let sub = connect(&self.output, sink.input())?;
        self.topology.sinks.push(Box::new((sub, sink)));
        Ok(())
    }

    pub fn to_table<K: Ord + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static>(
        self,
        table: Arc<Table<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        value_fn: impl Fn(&T) -> V + Send + 'static,
    ) {
        let sink = ToTable::new(table, key_fn, value_fn);
        self.finish_sink(sink)
            .expect("toTable: channel wiring cannot fail on a fresh pair");
    }

    pub fn update_table<K: Ord + Clone + Send + Sync + 'static, V: Clone + Send + Sync + 'static>(
        self,
        table: Arc<Table<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        merge_fn: impl Fn(&V, &T) -> V + Send + 'static,
        create_fn: impl Fn(&T) -> V + Send + 'static,
    ) {
        let sink = UpdateTable::new(table, key_fn, merge_fn, create_fn);
        self.finish_sink(sink)
            .expect("updateTable: channel wiring cannot fail on a fresh pair");
    }

    pub fn to_tx_table<
        K: Eq + std::hash::Hash + Ord + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    >(
        self,
        table: Arc<MVCCTable<K, V>>,
        key_fn: impl Fn(&T) -> K + Send + 'static,
        value_fn: impl Fn(&T) -> V + Send + 'static,
    ) {
        let sink = ToTxTable::new(table, key_fn, value_fn);
        let data_sub = connect(&self.output, sink.input())
            .expect("toTxTable: channel wiring cannot fail on a fresh pair");
        let punct_sub = self
            .upstream_punct
            .punctuation_output_channel()
            .connect(sink.punctuation_input());
        self.topology.sinks.push(Box::new((data_sub, punct_sub, sink)));
    }

    /// Peels this pipe open for hand-wiring into an operator that doesn't
    /// fit the single-input/single-output `Pipe` chain: `join`,
    /// `scaleJoin`'s `n` siblings, or `partitionBy`'s `n` outputs. The
    /// caller connects `.0` into the target's input with
    /// [`crate::channel::connect`], relays `.1`'s punctuation as needed, and
    /// is responsible for registering the target's lifetime (and any worker
    /// threads it owns) with the owning topology via
    /// [`Topology::register_stop_hook`] if it should be torn down by
    /// `stop_threads()`.
    pub fn into_parts(self) -> (OutputChannel<T>, Arc<dyn HasPunctuationOutput>) {
        (self.output, self.upstream_punct)
    }
}

fn forwarding_punctuation_input(
    out: Arc<PunctuationOutputChannel>,
) -> crate::channel::PunctuationInputChannel {
    crate::channel::PunctuationInputChannel::new(move |p| out.publish(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InputChannel;
    use crate::element::tuple::Tuple1;
    use crate::element::StreamElement;
    use crate::operator::traits::Runnable;
    use parking_lot::Mutex as PMutex;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    struct VecSource {
        values: PMutex<Vec<i64>>,
        output: OutputChannel<Tuple1<i64>>,
        punct_out: Arc<PunctuationOutputChannel>,
    }

    impl VecSource {
        fn new(values: Vec<i64>) -> Arc<Self> {
            Arc::new(Self {
                values: PMutex::new(values),
                output: OutputChannel::one_to_many(),
                punct_out: Arc::new(PunctuationOutputChannel::new()),
            })
        }
    }

    impl Runnable for VecSource {
        fn run(&self, stop: &StdAtomicBool) {
            let values = std::mem::take(&mut *self.values.lock());
            for v in values {
                if stop.load(Ordering::Relaxed) {
                    return;
                }
                self.output.publish(StreamElement::new(Tuple1::new(v), 0), false);
            }
            self.punct_out
                .publish(crate::element::Punctuation::end_of_stream(0));
        }
    }

    impl Source<Tuple1<i64>> for VecSource {
        fn output(&self) -> &OutputChannel<Tuple1<i64>> {
            &self.output
        }
        fn punctuation_output(&self) -> &PunctuationOutputChannel {
            &self.punct_out
        }
    }

    #[test]
    fn scenario_f_teardown_leaves_no_subscribers_or_threads() {
        let seen = Arc::new(PMutex::new(Vec::new()));
        let s = seen.clone();
        let sink_channel = InputChannel::new(move |e: StreamElement<Tuple1<i64>>, _o| {
            s.lock().push(e.tuple().a0)
        });

        let mut topology = Topology::new("scenario-f");
        let source = VecSource::new(vec![1, 2, 3]);
        let source_output = source.output().clone();
        let pipe = topology.new_stream("vec", source).map(|t, _o| Tuple1::new(t.a0 * 2));
        let (output, _punct) = pipe.into_parts();
        let _sub = connect(&output, &sink_channel).unwrap();

        topology.start(false);
        topology.wait();
        assert_eq!(*seen.lock(), vec![2, 4, 6]);

        topology.stop_threads();
        assert_eq!(source_output.subscriber_count(), 0);
        assert!(topology.transforms.is_empty());
        assert!(topology.sources.is_empty());
    }
}
