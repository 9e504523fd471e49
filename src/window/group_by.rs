//! Continuous (non-windowed) per-key aggregation (spec §4.4): maintains one
//! [`Aggregate`] state per group key, emitting per the group's
//! [`TriggerPolicy`].

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::PipeError;
use crate::timestamp::Timestamp;
use crate::window::aggregate::Aggregate;
use crate::window::trigger::{Trigger, TriggerPolicy};

pub struct GroupBy<K, A>
where
    K: Eq + Hash + Clone + Send + 'static,
    A: Aggregate,
{
    groups: HashMap<K, (A, Trigger)>,
    policy: TriggerPolicy,
}

impl<K, A> GroupBy<K, A>
where
    K: Eq + Hash + Clone + Send + 'static,
    A: Aggregate,
{
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            groups: HashMap::new(),
            policy,
        }
    }

    pub fn process(
        &mut self,
        key: K,
        value: &A::In,
        ts: Timestamp,
    ) -> Result<Option<(K, A::Out)>, PipeError> {
        let policy = self.policy;
        let entry = self
            .groups
            .entry(key.clone())
            .or_insert_with(|| (A::init(), Trigger::new(policy)));
        entry.0.iterate(value, false)?;
        if entry.1.on_element(ts) {
            Ok(Some((key, entry.0.value())))
        } else {
            Ok(None)
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::aggregate::SumI64;

    #[test]
    fn emits_per_group_on_every_element() {
        let mut g: GroupBy<&'static str, SumI64> = GroupBy::new(TriggerPolicy::All);
        let r1 = g.process("a", &10, 0).unwrap().unwrap();
        assert_eq!(r1, ("a", 10));
        let r2 = g.process("b", &5, 1).unwrap().unwrap();
        assert_eq!(r2, ("b", 5));
        let r3 = g.process("a", &20, 2).unwrap().unwrap();
        assert_eq!(r3, ("a", 30));
        assert_eq!(g.group_count(), 2);
    }
}
