use crate::state::DAY;
use serde::{Deserialize, Serialize};

/// Number of housekeeping task slots
pub const TASK_COUNT: usize = 16;

/// When each housekeeping task last ran
///
/// Passed into and returned from each housekeeping step; the spider persists it
/// between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskScheduleState {
    last_ran: [i64; TASK_COUNT],
}

impl TaskScheduleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from stored timestamps, ignoring out-of-range slots
    pub fn from_entries(entries: impl IntoIterator<Item = (usize, i64)>) -> Self {
        let mut state = Self::new();
        for (slot, last_ran) in entries {
            if let Some(cell) = state.last_ran.get_mut(slot) {
                *cell = last_ran;
            }
        }
        state
    }

    /// Epoch at which `slot` last ran (0 if never)
    pub fn last_ran(&self, slot: usize) -> i64 {
        self.last_ran.get(slot).copied().unwrap_or(0)
    }

    /// True when `slot` has not run within the rolling day before `now`
    pub fn is_due(&self, slot: usize, now: i64) -> bool {
        slot < TASK_COUNT && now - self.last_ran(slot) > DAY
    }

    /// Returns a copy with `slot` stamped as run at `now`
    #[must_use]
    pub fn mark_ran(mut self, slot: usize, now: i64) -> Self {
        if let Some(cell) = self.last_ran.get_mut(slot) {
            *cell = now;
        }
        self
    }

    /// Iterates `(slot, last_ran)` pairs
    pub fn entries(&self) -> impl Iterator<Item = (usize, i64)> + '_ {
        self.last_ran.iter().copied().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_state_is_due_everywhere() {
        let state = TaskScheduleState::new();
        for slot in 0..TASK_COUNT {
            assert!(state.is_due(slot, DAY + 1));
        }
        assert!(!state.is_due(TASK_COUNT, DAY + 1));
    }

    #[test]
    fn test_task_not_due_within_a_day() {
        let now = 10 * DAY;
        let state = TaskScheduleState::new().mark_ran(3, now);

        assert!(!state.is_due(3, now));
        assert!(!state.is_due(3, now + DAY));
        assert!(state.is_due(3, now + DAY + 1));
        assert!(state.is_due(4, now));
    }

    #[test]
    fn test_entries_roundtrip() {
        let state = TaskScheduleState::new().mark_ran(0, 5).mark_ran(15, 9);
        let restored = TaskScheduleState::from_entries(state.entries());
        assert_eq!(state, restored);
        assert_eq!(restored.last_ran(15), 9);
    }

    #[test]
    fn test_from_entries_ignores_unknown_slots() {
        let state = TaskScheduleState::from_entries(vec![(99, 5), (1, 7)]);
        assert_eq!(state.last_ran(1), 7);
        assert_eq!(state.last_ran(99), 0);
    }
}
