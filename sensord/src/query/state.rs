//! Folding state of one aggregate read

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::actor::ActorId;
use crate::group::TemperatureReading;

/// What a query has collected so far
///
/// `still_waiting` and the keys of `replies_so_far` partition the snapshot at all
/// times. Transitions never mutate a state in place; each returns a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    device_ids: Arc<HashMap<ActorId, String>>,
    replies_so_far: BTreeMap<String, TemperatureReading>,
    still_waiting: HashSet<ActorId>,
}

impl QueryState {
    /// Start with every snapshotted device outstanding
    pub fn new(device_ids: HashMap<ActorId, String>) -> Self {
        let still_waiting = device_ids.keys().copied().collect();
        Self {
            device_ids: Arc::new(device_ids),
            replies_so_far: BTreeMap::new(),
            still_waiting,
        }
    }

    pub fn replies_so_far(&self) -> &BTreeMap<String, TemperatureReading> {
        &self.replies_so_far
    }

    pub fn still_waiting(&self) -> &HashSet<ActorId> {
        &self.still_waiting
    }

    pub fn is_waiting_for(&self, device: ActorId) -> bool {
        self.still_waiting.contains(&device)
    }

    pub fn is_complete(&self) -> bool {
        self.still_waiting.is_empty()
    }

    /// Size of the original snapshot
    pub fn snapshot_len(&self) -> usize {
        self.device_ids.len()
    }

    /// Record the outcome for `device`
    ///
    /// Returns `None` when `device` is not outstanding (already resolved, or never
    /// part of the snapshot); a recorded outcome is never overwritten.
    pub fn resolve(&self, device: ActorId, reading: TemperatureReading) -> Option<QueryState> {
        if !self.still_waiting.contains(&device) {
            return None;
        }
        let device_id = self.device_ids.get(&device)?;

        let mut still_waiting = self.still_waiting.clone();
        still_waiting.remove(&device);
        let mut replies_so_far = self.replies_so_far.clone();
        replies_so_far.insert(device_id.clone(), reading);

        Some(Self {
            device_ids: Arc::clone(&self.device_ids),
            replies_so_far,
            still_waiting,
        })
    }

    /// Close the query at the deadline: every outstanding device becomes `TimedOut`
    pub fn into_timed_out(self) -> BTreeMap<String, TemperatureReading> {
        let mut replies = self.replies_so_far;
        for device in &self.still_waiting {
            if let Some(device_id) = self.device_ids.get(device) {
                replies.insert(device_id.clone(), TemperatureReading::TimedOut);
            }
        }
        replies
    }

    /// Final replies of a completed query
    pub fn into_replies(self) -> BTreeMap<String, TemperatureReading> {
        self.replies_so_far
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(n: usize) -> (Vec<ActorId>, HashMap<ActorId, String>) {
        let ids: Vec<ActorId> = (0..n).map(|_| ActorId::next()).collect();
        let names = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, format!("device{}", i + 1)))
            .collect();
        (ids, names)
    }

    #[test]
    fn test_new_state_waits_for_everyone() {
        let (ids, names) = snapshot(3);
        let state = QueryState::new(names);

        assert_eq!(state.snapshot_len(), 3);
        assert!(state.replies_so_far().is_empty());
        assert!(ids.iter().all(|id| state.is_waiting_for(*id)));
        assert!(!state.is_complete());
    }

    #[test]
    fn test_resolve_produces_new_state() {
        let (ids, names) = snapshot(2);
        let initial = QueryState::new(names);

        let next = initial.resolve(ids[0], TemperatureReading::Value(1.0)).unwrap();

        // The prior state is untouched
        assert_eq!(initial.still_waiting().len(), 2);
        assert!(initial.replies_so_far().is_empty());

        assert_eq!(next.still_waiting().len(), 1);
        assert_eq!(next.replies_so_far()["device1"], TemperatureReading::Value(1.0));
    }

    #[test]
    fn test_resolved_device_is_never_overwritten() {
        let (ids, names) = snapshot(2);
        let state = QueryState::new(names)
            .resolve(ids[0], TemperatureReading::Value(1.0))
            .unwrap();

        assert!(state.resolve(ids[0], TemperatureReading::DeviceUnreachable).is_none());
        assert!(state.resolve(ActorId::next(), TemperatureReading::Value(9.0)).is_none());
        assert_eq!(state.replies_so_far()["device1"], TemperatureReading::Value(1.0));
    }

    #[test]
    fn test_time_out_marks_outstanding_devices() {
        let (ids, names) = snapshot(3);
        let state = QueryState::new(names)
            .resolve(ids[1], TemperatureReading::NotAvailable)
            .unwrap();

        let replies = state.into_timed_out();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies["device1"], TemperatureReading::TimedOut);
        assert_eq!(replies["device2"], TemperatureReading::NotAvailable);
        assert_eq!(replies["device3"], TemperatureReading::TimedOut);
    }

    #[test]
    fn test_empty_snapshot_is_complete() {
        let state = QueryState::new(HashMap::new());
        assert!(state.is_complete());
        assert!(state.into_replies().is_empty());
    }

    fn reading_strategy() -> impl Strategy<Value = TemperatureReading> {
        prop_oneof![
            (-40.0f64..60.0).prop_map(TemperatureReading::Value),
            Just(TemperatureReading::NotAvailable),
            Just(TemperatureReading::DeviceUnreachable),
        ]
    }

    proptest! {
        #[test]
        fn prop_arrival_order_does_not_matter(
            (readings, order) in prop::collection::vec(reading_strategy(), 1..12)
                .prop_flat_map(|readings| {
                    let order: Vec<usize> = (0..readings.len()).collect();
                    (Just(readings), Just(order).prop_shuffle())
                }),
            duplicates in prop::collection::vec(any::<prop::sample::Index>(), 0..6),
        ) {
            let (ids, names) = snapshot(readings.len());
            let expected: BTreeMap<String, TemperatureReading> = names
                .iter()
                .map(|(id, name)| {
                    let i = ids.iter().position(|x| x == id).unwrap();
                    (name.clone(), readings[i])
                })
                .collect();

            let mut state = QueryState::new(names);
            for i in order {
                state = state.resolve(ids[i], readings[i]).unwrap();
                // Repeated events about resolved devices change nothing
                for dup in &duplicates {
                    let j = dup.index(ids.len());
                    if !state.is_waiting_for(ids[j]) {
                        prop_assert!(state.resolve(ids[j], TemperatureReading::TimedOut).is_none());
                    }
                }
            }

            prop_assert!(state.is_complete());
            let replies = state.into_replies();
            prop_assert_eq!(replies.len(), readings.len());
            prop_assert_eq!(replies, expected);
        }

        #[test]
        fn prop_timed_out_covers_snapshot(n in 0usize..10, resolved in 0usize..10) {
            let (ids, names) = snapshot(n);
            let mut state = QueryState::new(names);
            for id in ids.iter().take(resolved) {
                state = state.resolve(*id, TemperatureReading::NotAvailable).unwrap();
            }
            let replies = state.into_timed_out();
            prop_assert_eq!(replies.len(), n);
            let timed_out = replies.values().filter(|r| **r == TemperatureReading::TimedOut).count();
            prop_assert_eq!(timed_out, n.saturating_sub(resolved));
        }
    }
}
