//! Free-slot search over one technician's day.
//!
//! Candidates sit on a fixed grid inside the working window. A candidate is
//! returned only when `[start, start + duration)` misses every busy interval,
//! so intervals that do not line up with the grid are still respected.

use serde::Serialize;

use super::time::{ClockTime, TimeRange};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    pub start: ClockTime,
    pub end: ClockTime,
    pub granularity: u32,
}

impl WorkingWindow {
    pub fn new(start: ClockTime, end: ClockTime, granularity: u32) -> Result<Self, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(
                "working day must end after it starts".into(),
            ));
        }
        if granularity == 0 {
            return Err(ServiceError::ValidationError(
                "slot granularity must be positive".into(),
            ));
        }
        Ok(Self {
            start,
            end,
            granularity,
        })
    }

    /// Grid points from the opening time up to (excluding) closing time.
    pub fn grid(&self) -> impl Iterator<Item = ClockTime> + '_ {
        (self.start.minutes()..self.end.minutes())
            .step_by(self.granularity as usize)
            .filter_map(|m| ClockTime::from_minutes(m).ok())
    }
}

/// 07:00-18:00 on a 30 minute grid.
impl Default for WorkingWindow {
    fn default() -> Self {
        Self {
            start: ClockTime::hm(7, 0),
            end: ClockTime::hm(18, 0),
            granularity: 30,
        }
    }
}

/// Everything that blocks a technician on a given day.
#[derive(Debug, Clone, Default)]
pub struct DaySchedule {
    pub busy: Vec<TimeRange>,
    pub break_window: Option<TimeRange>,
}

impl DaySchedule {
    fn blockers(&self) -> impl Iterator<Item = &TimeRange> {
        self.busy.iter().chain(self.break_window.iter())
    }

    pub fn is_free(&self, range: &TimeRange) -> bool {
        !self.blockers().any(|b| b.overlaps(range))
    }

    /// Minutes already committed to jobs and appointments (break excluded).
    pub fn booked_minutes(&self) -> u32 {
        self.busy.iter().map(TimeRange::duration).sum()
    }
}

/// Ordered start times where `duration` minutes fit without touching any
/// blocker and without running past closing time.
pub fn candidate_starts(
    window: &WorkingWindow,
    day: &DaySchedule,
    duration: u32,
) -> Result<Vec<ClockTime>, ServiceError> {
    if duration == 0 {
        return Err(ServiceError::InvalidScheduleQuery(
            "duration must be positive".into(),
        ));
    }
    let open_minutes = window.end.minutes() - window.start.minutes();
    if duration > open_minutes {
        return Err(ServiceError::InvalidScheduleQuery(format!(
            "duration of {} minutes is longer than the {} minute working day",
            duration, open_minutes
        )));
    }

    let mut out = Vec::new();
    for start in window.grid() {
        let end_minutes = start.minutes().saturating_add(duration);
        if end_minutes > window.end.minutes() {
            break;
        }
        let Ok(end) = ClockTime::from_minutes(end_minutes) else {
            break;
        };
        let candidate = TimeRange { start, end };
        if day.is_free(&candidate) {
            out.push(start);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WalkInSlots {
    pub remaining_minutes: u32,
    pub slots: Vec<ClockTime>,
}

/// Fixed-length walk-in starts, limited to as many as the technician's
/// remaining daily budget can absorb.
pub fn walk_in_slots(
    window: &WorkingWindow,
    day: &DaySchedule,
    slot_minutes: u32,
    daily_budget_minutes: u32,
) -> Result<WalkInSlots, ServiceError> {
    let remaining = daily_budget_minutes.saturating_sub(day.booked_minutes());
    let cap = (remaining / slot_minutes.max(1)) as usize;
    let slots = candidate_starts(window, day, slot_minutes)?
        .into_iter()
        .take(cap)
        .collect();
    Ok(WalkInSlots {
        remaining_minutes: remaining,
        slots,
    })
}
