use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{round_down_to_quarter, ControlMode, EnergyFlow};

/// One published quarter-hour dispatch decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub time: DateTime<Utc>,
    pub state: ControlMode,
    /// Stored energy [Wh] at the start of the quarter.
    pub ess_initial: i64,
    pub price: f64,
    pub flow: EnergyFlow,
}

/// The published dispatch schedule: a time-ordered map from quarter start to
/// the decision for that quarter.
///
/// Replaced wholesale on every optimizer cycle, except that the entry of the
/// currently active quarter is preserved verbatim. A running quarter's
/// decision must not change mid-flight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schedule {
    entries: BTreeMap<DateTime<Utc>, ScheduleEntry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, time: DateTime<Utc>) -> Option<&ScheduleEntry> {
        self.entries.get(&time)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Utc>, &ScheduleEntry)> {
        self.entries.iter()
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.entries.keys().next_back().copied()
    }

    /// The per-slot control modes, for seeding the next optimization run.
    pub fn states(&self) -> BTreeMap<DateTime<Utc>, ControlMode> {
        self.entries.iter().map(|(t, e)| (*t, e.state)).collect()
    }

    /// Replaces this schedule with `new_entries`, keeping the entry of the
    /// quarter containing `now` unchanged if one was present. Entries whose
    /// timestamp does not appear in the new horizon are dropped.
    pub fn merge(&mut self, now: DateTime<Utc>, new_entries: BTreeMap<DateTime<Utc>, ScheduleEntry>) {
        let this_quarter = round_down_to_quarter(now);
        let current = self.entries.get(&this_quarter).copied();
        self.entries = new_entries;
        if let Some(current) = current {
            self.entries.insert(this_quarter, current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(time: DateTime<Utc>, state: ControlMode, ess_initial: i64) -> ScheduleEntry {
        ScheduleEntry {
            time,
            state,
            ess_initial,
            price: 100.0,
            flow: EnergyFlow::default(),
        }
    }

    #[test]
    fn test_merge_preserves_active_quarter_and_drops_stale_entries() {
        let t = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let q = chrono::TimeDelta::minutes(15);

        let mut schedule = Schedule::new();
        let mut old = BTreeMap::new();
        for (i, time) in [t - q, t, t + q, t + q * 2, t + q * 3].iter().enumerate() {
            old.insert(*time, entry(*time, ControlMode::DelayDischarge, 1000 * i as i64));
        }
        schedule.merge(t - q * 2, old);
        assert_eq!(schedule.len(), 5);

        let mut new = BTreeMap::new();
        for time in [t, t + q, t + q * 2] {
            new.insert(time, entry(time, ControlMode::Balancing, 9999));
        }
        // "now" is 5 minutes into the quarter starting at t
        schedule.merge(t + chrono::TimeDelta::minutes(5), new);

        assert_eq!(schedule.len(), 3);
        // active quarter kept verbatim
        let kept = schedule.get(t).unwrap();
        assert_eq!(kept.state, ControlMode::DelayDischarge);
        assert_eq!(kept.ess_initial, 1000);
        // later quarters replaced
        assert_eq!(schedule.get(t + q).unwrap().state, ControlMode::Balancing);
        assert_eq!(schedule.get(t + q * 2).unwrap().state, ControlMode::Balancing);
        // outside the new horizon dropped
        assert!(schedule.get(t - q).is_none());
        assert!(schedule.get(t + q * 3).is_none());
    }

    #[test]
    fn test_merge_keeps_active_quarter_even_if_absent_from_new_horizon() {
        let t = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let q = chrono::TimeDelta::minutes(15);

        let mut schedule = Schedule::new();
        let mut old = BTreeMap::new();
        old.insert(t, entry(t, ControlMode::ChargeGrid, 500));
        schedule.merge(t, old);

        let mut new = BTreeMap::new();
        new.insert(t + q, entry(t + q, ControlMode::Balancing, 0));
        schedule.merge(t, new);

        assert_eq!(schedule.len(), 2);
        assert_eq!(schedule.get(t).unwrap().state, ControlMode::ChargeGrid);
    }

    #[test]
    fn test_states_projection() {
        let t = Utc.with_ymd_and_hms(2026, 8, 25, 12, 0, 0).unwrap();
        let mut schedule = Schedule::new();
        let mut new = BTreeMap::new();
        new.insert(t, entry(t, ControlMode::DelayDischarge, 0));
        schedule.merge(t, new);

        let states = schedule.states();
        assert_eq!(states.get(&t), Some(&ControlMode::DelayDischarge));
    }
}
