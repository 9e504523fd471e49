//! Trigger policies for [`super::group_by::GroupBy`] (spec §4.4): decide how
//! often a continuously maintained aggregate emits its current value.

use std::time::{Duration, Instant};

use crate::timestamp::Timestamp;

#[derive(Clone, Copy, Debug)]
pub enum TriggerPolicy {
    /// Emit on every element.
    All,
    /// Emit every `n`th element.
    ByCount(u64),
    /// Emit at most once per wall-clock `Duration`.
    ByTime(Duration),
    /// Emit at most once per `Timestamp` delta (event time).
    ByTimestamp(Timestamp),
}

pub struct Trigger {
    policy: TriggerPolicy,
    count: u64,
    last_wall: Instant,
    last_ts: Timestamp,
    primed: bool,
}

impl Trigger {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            count: 0,
            last_wall: Instant::now(),
            last_ts: 0,
            primed: false,
        }
    }

    pub fn on_element(&mut self, ts: Timestamp) -> bool {
        self.count += 1;
        match self.policy {
            TriggerPolicy::All => true,
            TriggerPolicy::ByCount(n) => n > 0 && self.count % n == 0,
            TriggerPolicy::ByTime(dt) => {
                if !self.primed || self.last_wall.elapsed() >= dt {
                    self.last_wall = Instant::now();
                    self.primed = true;
                    true
                } else {
                    false
                }
            }
            TriggerPolicy::ByTimestamp(dt) => {
                if !self.primed || ts.saturating_sub(self.last_ts) >= dt {
                    self.last_ts = ts;
                    self.primed = true;
                    true
                } else {
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_count_fires_every_nth() {
        let mut t = Trigger::new(TriggerPolicy::ByCount(3));
        let fires: Vec<bool> = (0..6).map(|_| t.on_element(0)).collect();
        assert_eq!(fires, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn by_timestamp_fires_on_delta() {
        let mut t = Trigger::new(TriggerPolicy::ByTimestamp(10));
        assert!(t.on_element(0));
        assert!(!t.on_element(5));
        assert!(t.on_element(11));
    }
}
