//! Aggregate functions (spec §4.4): incremental accumulators that can
//! `iterate` both a fresh value and, for range/row windows, an outdated one
//! being evicted.

use std::collections::{BTreeMap, VecDeque};
use std::hash::Hash;

use fxhash::FxHashMap;

use crate::error::PipeError;

/// One accumulator. `iterate` is called once per element that enters the
/// window (`outdated = false`) and once per element leaving it
/// (`outdated = true`); `GlobalMin`/`GlobalMax` cannot undo and return
/// [`PipeError::Topology`] if asked to.
pub trait Aggregate: Send + 'static {
    type In: Clone + Send + 'static;
    type Out: Clone + Send + 'static;

    fn init() -> Self;
    fn iterate(&mut self, input: &Self::In, outdated: bool) -> Result<(), PipeError>;
    fn value(&self) -> Self::Out;
}

macro_rules! numeric_sum {
    ($name:ident, $t:ty) => {
        #[derive(Default)]
        pub struct $name {
            sum: $t,
        }
        impl Aggregate for $name {
            type In = $t;
            type Out = $t;
            fn init() -> Self {
                Self::default()
            }
            fn iterate(&mut self, input: &$t, outdated: bool) -> Result<(), PipeError> {
                if outdated {
                    self.sum -= *input;
                } else {
                    self.sum += *input;
                }
                Ok(())
            }
            fn value(&self) -> $t {
                self.sum
            }
        }
    };
}

numeric_sum!(SumI64, i64);
numeric_sum!(SumF64, f64);

#[derive(Default)]
pub struct Count<T> {
    count: i64,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Clone + Send + 'static> Aggregate for Count<T> {
    type In = T;
    type Out = i64;

    fn init() -> Self {
        Self::default()
    }

    fn iterate(&mut self, _input: &T, outdated: bool) -> Result<(), PipeError> {
        self.count += if outdated { -1 } else { 1 };
        Ok(())
    }

    fn value(&self) -> i64 {
        self.count
    }
}

/// `None` is this aggregate's empty-window identity (spec §8: "Avg fails
/// with DivZero") — division by a zero count never happens, it is simply
/// not attempted.
#[derive(Default)]
pub struct Avg {
    sum: f64,
    count: i64,
}

impl Aggregate for Avg {
    type In = f64;
    type Out = Option<f64>;

    fn init() -> Self {
        Self::default()
    }

    fn iterate(&mut self, input: &f64, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            self.sum -= *input;
            self.count -= 1;
        } else {
            self.sum += *input;
            self.count += 1;
        }
        Ok(())
    }

    fn value(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Tracks the min/max of the current window via an ordered multiset, so an
/// outdated value can be removed without rescanning every other member.
pub struct MultisetExtremum<T: Ord + Clone + Send + 'static> {
    counts: BTreeMap<T, usize>,
    take_max: bool,
}

impl<T: Ord + Clone + Send + 'static> MultisetExtremum<T> {
    fn new(take_max: bool) -> Self {
        Self {
            counts: BTreeMap::new(),
            take_max,
        }
    }
}

impl<T: Ord + Clone + Send + 'static> Aggregate for MultisetExtremum<T> {
    type In = T;
    type Out = Option<T>;

    fn init() -> Self {
        // `take_max` is overwritten by `Min::init`/`Max::init` wrappers below.
        Self::new(false)
    }

    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            if let Some(c) = self.counts.get_mut(input) {
                *c -= 1;
                if *c == 0 {
                    self.counts.remove(input);
                }
            }
        } else {
            *self.counts.entry(input.clone()).or_insert(0) += 1;
        }
        Ok(())
    }

    fn value(&self) -> Option<T> {
        if self.take_max {
            self.counts.keys().next_back().cloned()
        } else {
            self.counts.keys().next().cloned()
        }
    }
}

pub struct Min<T: Ord + Clone + Send + 'static>(MultisetExtremum<T>);
pub struct Max<T: Ord + Clone + Send + 'static>(MultisetExtremum<T>);

impl<T: Ord + Clone + Send + 'static> Aggregate for Min<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(MultisetExtremum::new(false))
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        self.0.iterate(input, outdated)
    }
    fn value(&self) -> Option<T> {
        self.0.value()
    }
}

impl<T: Ord + Clone + Send + 'static> Aggregate for Max<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(MultisetExtremum::new(true))
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        self.0.iterate(input, outdated)
    }
    fn value(&self) -> Option<T> {
        self.0.value()
    }
}

/// Monotonic min/max over the entire stream; an outdated call is a logic
/// error since nothing this aggregate has ever seen can be un-seen.
pub struct GlobalMin<T: PartialOrd + Clone + Send + 'static>(Option<T>);
pub struct GlobalMax<T: PartialOrd + Clone + Send + 'static>(Option<T>);

impl<T: PartialOrd + Clone + Send + 'static> Aggregate for GlobalMin<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(None)
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            return Err(PipeError::Topology(
                "GlobalMin cannot undo a past observation".to_string(),
            ));
        }
        self.0 = Some(match self.0.take() {
            Some(cur) if cur <= *input => cur,
            _ => input.clone(),
        });
        Ok(())
    }
    fn value(&self) -> Option<T> {
        self.0.clone()
    }
}

impl<T: PartialOrd + Clone + Send + 'static> Aggregate for GlobalMax<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(None)
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            return Err(PipeError::Topology(
                "GlobalMax cannot undo a past observation".to_string(),
            ));
        }
        self.0 = Some(match self.0.take() {
            Some(cur) if cur >= *input => cur,
            _ => input.clone(),
        });
        Ok(())
    }
    fn value(&self) -> Option<T> {
        self.0.clone()
    }
}

/// Keeps the earliest (least recent) still-active value.
pub struct LRecent<T: Clone + Send + 'static>(VecDeque<T>);

impl<T: Clone + Send + 'static> Aggregate for LRecent<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(VecDeque::new())
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            self.0.pop_front();
        } else {
            self.0.push_back(input.clone());
        }
        Ok(())
    }
    fn value(&self) -> Option<T> {
        self.0.front().cloned()
    }
}

/// Keeps the latest (most recent) still-active value.
pub struct MRecent<T: Clone + Send + 'static>(VecDeque<T>);

impl<T: Clone + Send + 'static> Aggregate for MRecent<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self(VecDeque::new())
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            self.0.pop_front();
        } else {
            self.0.push_back(input.clone());
        }
        Ok(())
    }
    fn value(&self) -> Option<T> {
        self.0.back().cloned()
    }
}

/// Median of the active window, via an ordered multiset positional scan.
pub struct Median<T: Ord + Clone + Send + 'static> {
    counts: BTreeMap<T, usize>,
    len: usize,
}

impl<T: Ord + Clone + Send + 'static> Aggregate for Median<T> {
    type In = T;
    type Out = Option<T>;
    fn init() -> Self {
        Self {
            counts: BTreeMap::new(),
            len: 0,
        }
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            if let Some(c) = self.counts.get_mut(input) {
                *c -= 1;
                if *c == 0 {
                    self.counts.remove(input);
                }
                self.len -= 1;
            }
        } else {
            *self.counts.entry(input.clone()).or_insert(0) += 1;
            self.len += 1;
        }
        Ok(())
    }
    fn value(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let mid = (self.len - 1) / 2;
        let mut seen = 0;
        for (k, c) in self.counts.iter() {
            seen += c;
            if seen > mid {
                return Some(k.clone());
            }
        }
        None
    }
}

/// Distinct element count of the active window.
pub struct DCount<T: Eq + Hash + Clone + Send + 'static> {
    counts: FxHashMap<T, usize>,
}

impl<T: Eq + Hash + Clone + Send + 'static> Aggregate for DCount<T> {
    type In = T;
    type Out = i64;
    fn init() -> Self {
        Self {
            counts: FxHashMap::default(),
        }
    }
    fn iterate(&mut self, input: &T, outdated: bool) -> Result<(), PipeError> {
        if outdated {
            if let Some(c) = self.counts.get_mut(input) {
                *c -= 1;
                if *c == 0 {
                    self.counts.remove(input);
                }
            }
        } else {
            *self.counts.entry(input.clone()).or_insert(0) += 1;
        }
        Ok(())
    }
    fn value(&self) -> i64 {
        self.counts.len() as i64
    }
}
