//! Pure scheduling math: no persistence, no clocks.

pub mod availability;
pub mod time;

pub use availability::{candidate_starts, walk_in_slots, DaySchedule, WalkInSlots, WorkingWindow};
pub use time::{
    duration_minutes, end_time_with_break, format_minutes, overlaps, subtract_break, to_minutes,
    ClockTime, TimeRange,
};
