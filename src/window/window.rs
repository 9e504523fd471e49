//! Window eviction policies (spec §4.4): sliding windows evict one head
//! element at a time as new ones arrive; tumbling windows accumulate until
//! full, then evict everything in a single burst.

use std::collections::VecDeque;

use crate::element::{PunctuationKind, StreamElement, Tuple};
use crate::timestamp::Timestamp;

#[derive(Clone, Copy, Debug)]
pub enum WindowKind {
    /// Row-count based: at most `n` elements are ever active at once.
    Row(usize),
    /// Time-range based: the newest and oldest active elements' timestamps
    /// may differ by at most `size` (inclusive).
    Range(Timestamp),
}

/// What happened when an element was added to a window.
pub struct WindowOutcome<T: Tuple> {
    /// Elements evicted by this add, oldest first; each must be re-iterated
    /// into the aggregate with `outdated = true`.
    pub outdated: Vec<StreamElement<T>>,
    /// The punctuation to forward downstream, if any eviction occurred.
    pub punctuation: Option<PunctuationKind>,
    /// Whether the aggregation sitting on top of this window should emit
    /// its current value now.
    pub emit_snapshot: bool,
}

pub trait WindowManager<T: Tuple>: Send {
    fn add(&mut self, elem: StreamElement<T>) -> WindowOutcome<T>;
}

pub struct SlidingWindow<T: Tuple> {
    kind: WindowKind,
    buffer: VecDeque<StreamElement<T>>,
}

impl<T: Tuple> SlidingWindow<T> {
    pub fn new(kind: WindowKind) -> Self {
        Self {
            kind,
            buffer: VecDeque::new(),
        }
    }

    fn is_expired(&self) -> bool {
        if self.buffer.len() <= 1 {
            return false;
        }
        match self.kind {
            WindowKind::Row(size) => self.buffer.len() > size,
            WindowKind::Range(size) => {
                let newest = self.buffer.back().unwrap().timestamp();
                let oldest = self.buffer.front().unwrap().timestamp();
                newest.saturating_sub(oldest) > size
            }
        }
    }
}

impl<T: Tuple> WindowManager<T> for SlidingWindow<T> {
    fn add(&mut self, elem: StreamElement<T>) -> WindowOutcome<T> {
        self.buffer.push_back(elem);
        let mut outdated = Vec::new();
        while self.is_expired() {
            outdated.push(self.buffer.pop_front().unwrap());
        }
        let punctuation = if outdated.is_empty() {
            None
        } else {
            Some(PunctuationKind::SlideExpired)
        };
        WindowOutcome {
            outdated,
            punctuation,
            emit_snapshot: true,
        }
    }
}

pub struct TumblingWindow<T: Tuple> {
    kind: WindowKind,
    buffer: VecDeque<StreamElement<T>>,
}

impl<T: Tuple> TumblingWindow<T> {
    pub fn new(kind: WindowKind) -> Self {
        Self {
            kind,
            buffer: VecDeque::new(),
        }
    }

    /// Whether `candidate` arriving now should burst the *current* contents
    /// of the buffer before it is itself admitted. Checked against the
    /// buffer as it stands before `candidate` is appended, so the element
    /// that closes a window opens the next one instead of being swept into
    /// the burst (spec §8 Scenario B: three-second range windows over
    /// second-spaced input must each hold exactly 3 elements, not 4).
    fn would_close(&self, candidate: &StreamElement<T>) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        match self.kind {
            WindowKind::Row(size) => self.buffer.len() >= size,
            WindowKind::Range(size) => {
                let oldest = self.buffer.front().unwrap().timestamp();
                candidate.timestamp().saturating_sub(oldest) >= size
            }
        }
    }
}

impl<T: Tuple> WindowManager<T> for TumblingWindow<T> {
    fn add(&mut self, elem: StreamElement<T>) -> WindowOutcome<T> {
        if self.would_close(&elem) {
            let outdated: Vec<_> = self.buffer.drain(..).collect();
            self.buffer.push_back(elem);
            WindowOutcome {
                outdated,
                punctuation: Some(PunctuationKind::WindowExpired),
                emit_snapshot: true,
            }
        } else {
            self.buffer.push_back(elem);
            WindowOutcome {
                outdated: Vec::new(),
                punctuation: None,
                emit_snapshot: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::tuple::Tuple1;

    fn elem(ts: u64, v: i64) -> StreamElement<Tuple1<i64>> {
        StreamElement::new(Tuple1::new(v), ts)
    }

    #[test]
    fn row_window_single_size_makes_prior_outdated() {
        let mut w: SlidingWindow<Tuple1<i64>> = SlidingWindow::new(WindowKind::Row(1));
        let o1 = w.add(elem(0, 1));
        assert!(o1.outdated.is_empty());
        let o2 = w.add(elem(1, 2));
        assert_eq!(o2.outdated.len(), 1);
        assert_eq!(o2.outdated[0].tuple().a0, 1);
    }

    #[test]
    fn tumbling_row_window_bursts_at_size() {
        let mut w: TumblingWindow<Tuple1<i64>> = TumblingWindow::new(WindowKind::Row(3));
        assert!(w.add(elem(0, 10)).outdated.is_empty());
        assert!(w.add(elem(1, 20)).outdated.is_empty());
        assert!(w.add(elem(2, 30)).outdated.is_empty());
        // the 4th element closes the first window (3 elements) and opens a
        // fresh one containing only itself.
        let burst = w.add(elem(3, 40));
        assert_eq!(burst.outdated.len(), 3);
        assert!(matches!(
            burst.punctuation,
            Some(PunctuationKind::WindowExpired)
        ));
        assert!(w.add(elem(4, 50)).outdated.is_empty());
    }

    #[test]
    fn tumbling_range_window_bursts_on_span() {
        let mut w: TumblingWindow<Tuple1<i64>> = TumblingWindow::new(WindowKind::Range(3));
        assert!(w.add(elem(10, 10)).outdated.is_empty());
        assert!(w.add(elem(11, 20)).outdated.is_empty());
        // ts 13 is 3 past the window's oldest (ts 10): closes the window
        // holding only the first two elements, then opens the next one
        // with itself as the sole member.
        let burst = w.add(elem(13, 30));
        assert_eq!(burst.outdated.len(), 2);
        assert!(w.add(elem(14, 40)).outdated.is_empty());
    }
}
