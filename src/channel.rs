//! Type-safe pub/sub data channels (spec §4.2).
//!
//! An [`OutputChannel`] holds an ordered list of subscriber slots and
//! invokes every one of them, synchronously and in subscription order, on
//! `publish`. An [`InputChannel`] holds exactly one slot. [`connect`]
//! installs the input channel's slot into the output channel and returns a
//! [`Subscription`] handle; dropping (or explicitly [`Subscription::close`]ing)
//! that handle removes the entry. Because the output side stores only a
//! `Weak` reference to the input, destroying either endpoint invalidates
//! the connection without requiring the two sides to coordinate (spec
//! §4.2's "Invariant").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;

use crate::element::{PunctuationPtr, StreamElement, Tuple};
use crate::error::PipeError;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    /// Rejects a second subscription (`OneToOneSignal.hpp` in the original).
    OneToOne,
    /// Accepts arbitrarily many subscribers (`OneToManySignal.hpp`).
    OneToMany,
}

type DataFn<T> = dyn FnMut(StreamElement<T>, bool) + Send;
type PunctFn = dyn FnMut(PunctuationPtr) + Send;

enum Slot<F: ?Sized> {
    Plain(Mutex<Box<F>>),
    /// The "synchronized" variant of §4.1: a reentrant mutex so a slot may
    /// recursively re-enter itself (e.g. a stateful operator publishing a
    /// punctuation from within its own processing callback) without
    /// deadlocking.
    Synchronized(ReentrantMutex<RefCell<Box<F>>>),
}

impl<F: ?Sized> Slot<F> {
    fn call<R>(&self, f: impl FnOnce(&mut Box<F>) -> R) -> R {
        match self {
            Slot::Plain(m) => f(&mut m.lock()),
            Slot::Synchronized(m) => {
                let guard = m.lock();
                f(&mut guard.borrow_mut())
            }
        }
    }
}

struct InputChannelInner<T: Tuple> {
    slot: Slot<DataFn<T>>,
}

/// The single-slot receiving end of a data connection (spec §4.2).
pub struct InputChannel<T: Tuple> {
    inner: Arc<InputChannelInner<T>>,
}

impl<T: Tuple> Clone for InputChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Tuple> InputChannel<T> {
    pub fn new(slot: impl FnMut(StreamElement<T>, bool) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(InputChannelInner {
                slot: Slot::Plain(Mutex::new(Box::new(slot))),
            }),
        }
    }

    /// A slot that serializes concurrent invocations with a reentrant
    /// mutex (spec §4.2's "synchronized" variant).
    pub fn synchronized(slot: impl FnMut(StreamElement<T>, bool) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(InputChannelInner {
                slot: Slot::Synchronized(ReentrantMutex::new(RefCell::new(Box::new(slot)))),
            }),
        }
    }

    fn invoke(&self, elem: StreamElement<T>, outdated: bool) {
        self.inner.slot.call(|f| f(elem, outdated));
    }

    fn downgrade(&self) -> Weak<InputChannelInner<T>> {
        Arc::downgrade(&self.inner)
    }
}

struct Entry<T: Tuple> {
    id: u64,
    input: Weak<InputChannelInner<T>>,
}

struct OutputChannelInner<T: Tuple> {
    mode: ChannelMode,
    subscribers: Mutex<Vec<Entry<T>>>,
}

/// The (possibly multi-subscriber) sending end of a data connection.
pub struct OutputChannel<T: Tuple> {
    inner: Arc<OutputChannelInner<T>>,
}

impl<T: Tuple> Clone for OutputChannel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Tuple> OutputChannel<T> {
    pub fn one_to_one() -> Self {
        Self::with_mode(ChannelMode::OneToOne)
    }

    pub fn one_to_many() -> Self {
        Self::with_mode(ChannelMode::OneToMany)
    }

    fn with_mode(mode: ChannelMode) -> Self {
        Self {
            inner: Arc::new(OutputChannelInner {
                mode,
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Invokes every live subscriber's slot, in subscription order. Dead
    /// (dropped) subscribers are pruned as part of the same pass, so the
    /// subscriber list converges to "live entries only" without requiring
    /// active notification from the input side on drop.
    pub fn publish(&self, elem: StreamElement<T>, outdated: bool) {
        let mut subs = self.inner.subscribers.lock();
        subs.retain(|entry| entry.input.upgrade().is_some());
        for entry in subs.iter() {
            if let Some(input) = entry.input.upgrade() {
                InputChannel { inner: input }.invoke(elem.clone(), outdated);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.inner.subscribers.lock();
        subs.retain(|entry| entry.input.upgrade().is_some());
        subs.len()
    }
}

/// A live connection between one output channel and one input channel
/// (spec §4.2's "Subscription"). Dropping it (or calling [`close`][Self::close])
/// removes the entry from the output channel's subscriber list.
pub struct Subscription<T: Tuple> {
    id: u64,
    output: Weak<OutputChannelInner<T>>,
}

impl<T: Tuple> Subscription<T> {
    pub fn close(self) {
        drop(self);
    }
}

impl<T: Tuple> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(output) = self.output.upgrade() {
            output.subscribers.lock().retain(|e| e.id != self.id);
        }
    }
}

/// Connects `input`'s slot to `output`, returning a handle that is the only
/// permitted way to later disconnect them (spec §4.2).
pub fn connect<T: Tuple>(
    output: &OutputChannel<T>,
    input: &InputChannel<T>,
) -> Result<Subscription<T>, PipeError> {
    let mut subs = output.inner.subscribers.lock();
    subs.retain(|e| e.input.upgrade().is_some());
    if output.inner.mode == ChannelMode::OneToOne && !subs.is_empty() {
        return Err(PipeError::Topology(
            "one-to-one output channel already has a subscriber".to_string(),
        ));
    }
    let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
    subs.push(Entry {
        id,
        input: input.downgrade(),
    });
    Ok(Subscription {
        id,
        output: Arc::downgrade(&output.inner),
    })
}

struct PunctuationOutputChannelInner {
    subscribers: Mutex<Vec<(u64, Weak<Mutex<Box<PunctFn>>>)>>,
}

/// The punctuation-carrying sibling of [`OutputChannel`]/[`InputChannel`].
/// Every operator has exactly one of these in addition to its data channel
/// (spec §4.3). Like [`OutputChannel`], the subscriber list lives behind an
/// `Arc` and [`connect`][Self::connect] returns an owned, `'static`
/// [`PunctuationSubscription`] holding only a `Weak` back-reference — so a
/// topology can store it in a type-erased, long-lived container without
/// tying it to a borrow of this channel.
pub struct PunctuationOutputChannel {
    inner: Arc<PunctuationOutputChannelInner>,
}

impl Default for PunctuationOutputChannel {
    fn default() -> Self {
        Self {
            inner: Arc::new(PunctuationOutputChannelInner {
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl PunctuationOutputChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, p: PunctuationPtr) {
        let mut subs = self.inner.subscribers.lock();
        subs.retain(|(_, w)| w.upgrade().is_some());
        for (_, w) in subs.iter() {
            if let Some(slot) = w.upgrade() {
                (slot.lock())(p.clone());
            }
        }
    }

    pub fn connect(&self, input: &PunctuationInputChannel) -> PunctuationSubscription {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .push((id, Arc::downgrade(&input.slot)));
        PunctuationSubscription {
            id,
            channel: Arc::downgrade(&self.inner),
        }
    }
}

pub struct PunctuationSubscription {
    id: u64,
    channel: Weak<PunctuationOutputChannelInner>,
}

impl PunctuationSubscription {
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for PunctuationSubscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

pub struct PunctuationInputChannel {
    slot: Arc<Mutex<Box<PunctFn>>>,
}

impl PunctuationInputChannel {
    pub fn new(slot: impl FnMut(PunctuationPtr) + Send + 'static) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Box::new(slot))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Tuple1;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn publishes_in_subscription_order() {
        let out = OutputChannel::<Tuple1<i64>>::one_to_many();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let in1 = InputChannel::new(move |_e, _o| o1.lock().push(1));
        let o2 = order.clone();
        let in2 = InputChannel::new(move |_e, _o| o2.lock().push(2));
        let _s1 = connect(&out, &in1).unwrap();
        let _s2 = connect(&out, &in2).unwrap();
        out.publish(StreamElement::new(Tuple1::new(1i64), 0), false);
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[test]
    fn one_to_one_rejects_second_subscriber() {
        let out = OutputChannel::<Tuple1<i64>>::one_to_one();
        let in1 = InputChannel::new(|_e, _o| {});
        let in2 = InputChannel::new(|_e, _o| {});
        let _s1 = connect(&out, &in1).unwrap();
        assert!(connect(&out, &in2).is_err());
    }

    #[test]
    fn dropping_subscription_stops_delivery() {
        let out = OutputChannel::<Tuple1<i64>>::one_to_many();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let input = InputChannel::new(move |_e, _o| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let sub = connect(&out, &input).unwrap();
        out.publish(StreamElement::new(Tuple1::new(1i64), 0), false);
        sub.close();
        out.publish(StreamElement::new(Tuple1::new(1i64), 0), false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_input_channel_invalidates_subscription() {
        let out = OutputChannel::<Tuple1<i64>>::one_to_many();
        let input = InputChannel::new(|_e, _o| {});
        let _sub = connect(&out, &input).unwrap();
        drop(input);
        out.publish(StreamElement::new(Tuple1::new(1i64), 0), false);
        assert_eq!(out.subscriber_count(), 0);
    }
}
