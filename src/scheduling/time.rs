//! Wall-clock helpers for "HH:MM" schedule strings.
//!
//! All ranges are half-open `[start, end)` within a single workshop day.
//! Ranges that wrap past midnight are rejected when a `TimeRange` is built;
//! `duration_minutes` on raw strings still reports the signed difference.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ServiceError;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u32);

impl ClockTime {
    pub fn from_minutes(minutes: u32) -> Result<Self, ServiceError> {
        if minutes >= MINUTES_PER_DAY {
            return Err(ServiceError::InvalidTimeFormat(format!(
                "{} minutes is past the end of the day",
                minutes
            )));
        }
        Ok(Self(minutes))
    }

    /// For literal constants only; out-of-range input is not checked.
    pub(crate) const fn hm(hours: u32, minutes: u32) -> Self {
        Self(hours * 60 + minutes)
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Adds minutes, failing if the result leaves the day.
    pub fn plus(self, minutes: u32) -> Result<Self, ServiceError> {
        let total = self.0.checked_add(minutes).unwrap_or(u32::MAX);
        Self::from_minutes(total)
    }
}

impl FromStr for ClockTime {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_minutes(s).map(ClockTime)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses "HH:MM" (hour may be a single digit) into minutes since midnight.
pub fn to_minutes(hhmm: &str) -> Result<u32, ServiceError> {
    let invalid = || ServiceError::InvalidTimeFormat(format!("expected HH:MM, got {:?}", hhmm));

    let (hours, minutes) = hhmm.trim().split_once(':').ok_or_else(invalid)?;
    if hours.is_empty()
        || hours.len() > 2
        || minutes.len() != 2
        || !hours.bytes().all(|b| b.is_ascii_digit())
        || !minutes.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let h: u32 = hours.parse().map_err(|_| invalid())?;
    let m: u32 = minutes.parse().map_err(|_| invalid())?;
    if h > 23 || m > 59 {
        return Err(invalid());
    }
    Ok(h * 60 + m)
}

pub fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// `end - start` in minutes. Negative when `end` precedes `start`.
pub fn duration_minutes(start: &str, end: &str) -> Result<i32, ServiceError> {
    Ok(to_minutes(end)? as i32 - to_minutes(start)? as i32)
}

/// Half-open overlap test.
pub fn overlaps(a_start: u32, a_end: u32, b_start: u32, b_end: u32) -> bool {
    a_start < b_end && a_end > b_start
}

/// A non-empty, same-day `[start, end)` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeRange {
    pub fn new(start: ClockTime, end: ClockTime) -> Result<Self, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(format!(
                "time range {}-{} must end after it starts (ranges cannot cross midnight)",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ServiceError> {
        Self::new(start.parse()?, end.parse()?)
    }

    pub fn duration(&self) -> u32 {
        self.end.minutes() - self.start.minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(
            self.start.minutes(),
            self.end.minutes(),
            other.start.minutes(),
            other.end.minutes(),
        )
    }

    pub fn contains(&self, t: ClockTime) -> bool {
        self.start <= t && t < self.end
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// End time for `duration` minutes of work starting at `start`, pausing
/// through the break window instead of counting it as work.
pub fn end_time_with_break(
    start: ClockTime,
    duration: u32,
    break_window: Option<&TimeRange>,
) -> Result<ClockTime, ServiceError> {
    let past_midnight = || {
        ServiceError::ValidationError(format!(
            "{} minutes of work from {} runs past midnight",
            duration, start
        ))
    };
    if duration >= MINUTES_PER_DAY {
        return Err(past_midnight());
    }

    let s = start.minutes();
    let naive_end = s + duration;

    let end = match break_window {
        Some(b) if overlaps(s, naive_end, b.start.minutes(), b.end.minutes()) => {
            if s < b.start.minutes() {
                let before_break = b.start.minutes() - s;
                b.end.minutes() + (duration - before_break)
            } else {
                // starts inside the break
                b.end.minutes() + duration
            }
        }
        _ => naive_end,
    };

    ClockTime::from_minutes(end).map_err(|_| past_midnight())
}

/// Pushes the end of `range` later by however much of the break it covers.
pub fn subtract_break(range: &TimeRange, break_window: &TimeRange) -> Result<ClockTime, ServiceError> {
    end_time_with_break(range.start, range.duration(), Some(break_window))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("00:00", 0)]
    #[case("07:00", 420)]
    #[case("7:05", 425)]
    #[case("18:00", 1080)]
    #[case(" 23:59 ", 1439)]
    fn parses_valid_times(#[case] raw: &str, #[case] expected: u32) {
        assert_eq!(to_minutes(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("9")]
    #[case("24:00")]
    #[case("12:60")]
    #[case("12:5")]
    #[case("123:00")]
    #[case("ab:cd")]
    #[case("-1:30")]
    fn rejects_malformed_times(#[case] raw: &str) {
        assert!(matches!(
            to_minutes(raw),
            Err(ServiceError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn duration_can_be_negative() {
        assert_eq!(duration_minutes("08:00", "09:30").unwrap(), 90);
        assert_eq!(duration_minutes("22:00", "01:00").unwrap(), -1260);
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(overlaps(60, 120, 90, 150));
        assert!(!overlaps(60, 120, 120, 180));
        assert!(!overlaps(120, 180, 60, 120));
        assert!(overlaps(60, 180, 90, 100));
    }

    #[test]
    fn time_range_rejects_cross_midnight() {
        assert!(TimeRange::parse("22:00", "01:00").is_err());
        assert!(TimeRange::parse("10:00", "10:00").is_err());
        assert_eq!(TimeRange::parse("10:00", "11:15").unwrap().duration(), 75);
    }

    #[test]
    fn display_is_zero_padded() {
        assert_eq!(t("7:05").to_string(), "07:05");
        assert_eq!(format_minutes(545), "09:05");
    }

    #[test]
    fn end_time_skips_through_lunch() {
        let lunch = TimeRange::parse("12:00", "13:00").unwrap();
        assert_eq!(
            end_time_with_break(t("09:00"), 240, Some(&lunch)).unwrap(),
            t("14:00")
        );
    }

    #[rstest]
    #[case("08:00", 60, "09:00")]
    #[case("11:30", 60, "13:30")]
    #[case("12:15", 30, "13:30")]
    #[case("13:00", 45, "13:45")]
    #[case("10:00", 120, "12:00")]
    fn end_time_cases(#[case] start: &str, #[case] duration: u32, #[case] expected: &str) {
        let lunch = TimeRange::parse("12:00", "13:00").unwrap();
        assert_eq!(
            end_time_with_break(t(start), duration, Some(&lunch)).unwrap(),
            t(expected)
        );
    }

    #[test]
    fn end_time_without_break_is_plain_addition() {
        assert_eq!(end_time_with_break(t("09:00"), 240, None).unwrap(), t("13:00"));
        assert!(end_time_with_break(t("23:00"), 120, None).is_err());
    }

    #[test]
    fn oversized_durations_are_errors_not_overflows() {
        let lunch = TimeRange::parse("12:00", "13:00").unwrap();
        assert!(matches!(
            end_time_with_break(t("09:00"), u32::MAX, None),
            Err(ServiceError::ValidationError(_))
        ));
        assert!(end_time_with_break(t("11:00"), u32::MAX, Some(&lunch)).is_err());
        assert!(t("09:00").plus(u32::MAX).is_err());
    }

    #[test]
    fn subtract_break_extends_range_end() {
        let range = TimeRange::parse("09:00", "13:00").unwrap();
        let lunch = TimeRange::parse("12:00", "13:00").unwrap();
        assert_eq!(subtract_break(&range, &lunch).unwrap(), t("14:00"));
    }

    #[test]
    fn clock_time_serde_uses_strings() {
        let json = serde_json::to_string(&t("08:30")).unwrap();
        assert_eq!(json, "\"08:30\"");
        let back: ClockTime = serde_json::from_str("\"8:30\"").unwrap();
        assert_eq!(back, t("08:30"));
        assert!(serde_json::from_str::<ClockTime>("\"8h30\"").is_err());
    }
}
