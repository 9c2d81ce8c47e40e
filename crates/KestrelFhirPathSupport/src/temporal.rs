//! # Partial-Precision Dates and Times
//!
//! FHIRPath date, date-time and time values may omit trailing components
//! (`@2024`, `@2024-06`, `@2024-06-15T10`). The precision of a value is the
//! last component that was written, and it takes part in every comparison:
//! two values of different precision can only be ordered while a component
//! they both carry differs. Once the shared components are exhausted the
//! comparison is ambiguous and [`compare`](PrecisionDate::compare) returns
//! `None`.
//!
//! Seconds and milliseconds are treated as a single precision level, so
//! `@T10:30:00` and `@T10:30:00.000` compare equal.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{
    DateTime as ChronoDateTime, Datelike, Duration, FixedOffset, Months, NaiveDate,
    NaiveDateTime, NaiveTime, Timelike,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

static DATE_GRAMMAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?$").expect("valid date grammar"));

static TIME_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2})(?::(\d{2})(?::(\d{2})(?:\.(\d+))?)?)?$").expect("valid time grammar")
});

static DATE_TIME_GRAMMAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})(?:-(\d{2})(?:-(\d{2}))?)?(?:T(?:(\d{2})(?::(\d{2})(?::(\d{2})(?:\.(\d+))?)?)?)?(Z|[+-]\d{2}:\d{2})?)?$",
    )
    .expect("valid date-time grammar")
});

/// Precision levels for Date values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

/// Precision levels for Time values. Seconds and milliseconds compare as one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimePrecision {
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// Precision levels for DateTime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DateTimePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

/// Units a temporal value can be shifted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl CalendarUnit {
    /// Recognizes calendar keywords (`year`, `months`, ...) and the definite-duration
    /// UCUM codes `wk`, `d`, `h`, `min`, `s` and `ms`.
    ///
    /// UCUM `a` and `mo` are not calendar durations and are rejected.
    pub fn from_unit(unit: &str) -> Option<Self> {
        match unit {
            "year" | "years" => Some(CalendarUnit::Year),
            "month" | "months" => Some(CalendarUnit::Month),
            "week" | "weeks" | "wk" => Some(CalendarUnit::Week),
            "day" | "days" | "d" => Some(CalendarUnit::Day),
            "hour" | "hours" | "h" => Some(CalendarUnit::Hour),
            "minute" | "minutes" | "min" => Some(CalendarUnit::Minute),
            "second" | "seconds" | "s" => Some(CalendarUnit::Second),
            "millisecond" | "milliseconds" | "ms" => Some(CalendarUnit::Millisecond),
            _ => None,
        }
    }

    fn is_date_unit(self) -> bool {
        matches!(
            self,
            CalendarUnit::Year | CalendarUnit::Month | CalendarUnit::Week | CalendarUnit::Day
        )
    }
}

fn capture_u32(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index).and_then(|m| m.as_str().parse().ok())
}

/// Normalizes a fractional-second digit string to milliseconds.
fn fraction_to_millis(digits: &str) -> u32 {
    let mut padded: String = digits.chars().take(3).collect();
    while padded.len() < 3 {
        padded.push('0');
    }
    padded.parse().unwrap_or(0)
}

/// Compares two component vectors. Equal prefixes of unequal length are ambiguous.
fn compare_components(left: &[i64], right: &[i64]) -> Option<Ordering> {
    for (l, r) in left.iter().zip(right.iter()) {
        match l.cmp(r) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    if left.len() == right.len() {
        Some(Ordering::Equal)
    } else {
        None
    }
}

/// A calendar date with optional month and day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionDate {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
    original: Arc<str>,
}

impl PrecisionDate {
    /// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, with or without a leading `@`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let caps = DATE_GRAMMAR.captures(s)?;
        let year = caps.get(1)?.as_str().parse().ok()?;
        Self::from_parts(year, capture_u32(&caps, 2), capture_u32(&caps, 3))
    }

    fn from_parts(year: i32, month: Option<u32>, day: Option<u32>) -> Option<Self> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return None;
            }
        }
        if let Some(d) = day {
            NaiveDate::from_ymd_opt(year, month?, d)?;
        }
        let original = Self::render(year, month, day);
        Some(Self {
            year,
            month,
            day,
            original: Arc::from(original),
        })
    }

    fn render(year: i32, month: Option<u32>, day: Option<u32>) -> String {
        let mut out = format!("{:04}", year);
        if let Some(m) = month {
            out.push_str(&format!("-{:02}", m));
            if let Some(d) = day {
                out.push_str(&format!("-{:02}", d));
            }
        }
        out
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        let original = Self::render(date.year(), Some(date.month()), Some(date.day()));
        Self {
            year: date.year(),
            month: Some(date.month()),
            day: Some(date.day()),
            original: Arc::from(original),
        }
    }

    pub fn precision(&self) -> DatePrecision {
        match (self.month, self.day) {
            (Some(_), Some(_)) => DatePrecision::Day,
            (Some(_), None) => DatePrecision::Month,
            _ => DatePrecision::Year,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Option<u32> {
        self.month
    }

    pub fn day(&self) -> Option<u32> {
        self.day
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Converts to a chrono date, defaulting missing components to 1.
    pub fn to_naive_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month.unwrap_or(1), self.day.unwrap_or(1))
            .unwrap_or_default()
    }

    fn components(&self) -> Vec<i64> {
        let mut parts = vec![self.year as i64];
        if let Some(m) = self.month {
            parts.push(m as i64);
            if let Some(d) = self.day {
                parts.push(d as i64);
            }
        }
        parts
    }

    /// Precision-aware ordering. `None` means the values cannot be ordered.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// Shifts the date, keeping its precision. Sub-day amounts move the date
    /// only when they cross midnight.
    pub fn add_duration(&self, amount: Decimal, unit: CalendarUnit) -> Option<Self> {
        let start = self.to_naive_date().and_hms_opt(0, 0, 0)?;
        let shifted = shift_naive(start, amount, unit)?;
        let date = shifted.date();
        match self.precision() {
            DatePrecision::Year => Self::from_parts(date.year(), None, None),
            DatePrecision::Month => Self::from_parts(date.year(), Some(date.month()), None),
            DatePrecision::Day => Self::from_parts(date.year(), Some(date.month()), Some(date.day())),
        }
    }
}

/// A time of day with optional minute, second and millisecond.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionTime {
    hour: u32,
    minute: Option<u32>,
    second: Option<u32>,
    millisecond: Option<u32>,
    original: Arc<str>,
}

impl PrecisionTime {
    /// Parses `HH`, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`, accepting a leading `@T` or `T`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let s = s.strip_prefix('T').unwrap_or(s);
        let caps = TIME_GRAMMAR.captures(s)?;
        Self::from_parts(
            capture_u32(&caps, 1)?,
            capture_u32(&caps, 2),
            capture_u32(&caps, 3),
            caps.get(4).map(|m| fraction_to_millis(m.as_str())),
        )
    }

    fn from_parts(
        hour: u32,
        minute: Option<u32>,
        second: Option<u32>,
        millisecond: Option<u32>,
    ) -> Option<Self> {
        if hour > 23 || minute.is_some_and(|m| m > 59) || second.is_some_and(|s| s > 59) {
            return None;
        }
        let original = Self::render(hour, minute, second, millisecond);
        Some(Self {
            hour,
            minute,
            second,
            millisecond,
            original: Arc::from(original),
        })
    }

    fn render(hour: u32, minute: Option<u32>, second: Option<u32>, ms: Option<u32>) -> String {
        let mut out = format!("{:02}", hour);
        if let Some(m) = minute {
            out.push_str(&format!(":{:02}", m));
            if let Some(s) = second {
                out.push_str(&format!(":{:02}", s));
                if let Some(ms) = ms {
                    out.push_str(&format!(".{:03}", ms));
                }
            }
        }
        out
    }

    pub fn from_naive(time: NaiveTime) -> Self {
        let ms = time.nanosecond() / 1_000_000;
        let (h, m, s) = (time.hour(), time.minute(), time.second());
        Self {
            hour: h,
            minute: Some(m),
            second: Some(s),
            millisecond: Some(ms),
            original: Arc::from(Self::render(h, Some(m), Some(s), Some(ms))),
        }
    }

    pub fn precision(&self) -> TimePrecision {
        match (self.minute, self.second, self.millisecond) {
            (Some(_), Some(_), Some(_)) => TimePrecision::Millisecond,
            (Some(_), Some(_), None) => TimePrecision::Second,
            (Some(_), None, _) => TimePrecision::Minute,
            _ => TimePrecision::Hour,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> Option<u32> {
        self.minute
    }

    pub fn second(&self) -> Option<u32> {
        self.second
    }

    pub fn millisecond(&self) -> Option<u32> {
        self.millisecond
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_milli_opt(
            self.hour,
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
            self.millisecond.unwrap_or(0),
        )
        .unwrap_or_default()
    }

    fn components(&self) -> Vec<i64> {
        let mut parts = vec![self.hour as i64];
        if let Some(m) = self.minute {
            parts.push(m as i64);
            if let Some(s) = self.second {
                parts.push(s as i64 * 1000 + self.millisecond.unwrap_or(0) as i64);
            }
        }
        parts
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.components(), &other.components())
    }

    /// Shifts the time by a sub-day amount, wrapping around midnight.
    pub fn add_duration(&self, amount: Decimal, unit: CalendarUnit) -> Option<Self> {
        if unit.is_date_unit() {
            return None;
        }
        let shift = duration_for(amount, unit)?;
        let (shifted, _) = self.to_naive_time().overflowing_add_signed(shift);
        Self::truncated(shifted, self.precision())
    }

    fn truncated(time: NaiveTime, precision: TimePrecision) -> Option<Self> {
        let ms = time.nanosecond() / 1_000_000;
        match precision {
            TimePrecision::Hour => Self::from_parts(time.hour(), None, None, None),
            TimePrecision::Minute => Self::from_parts(time.hour(), Some(time.minute()), None, None),
            TimePrecision::Second => Self::from_parts(
                time.hour(),
                Some(time.minute()),
                Some(time.second()),
                None,
            ),
            TimePrecision::Millisecond => Self::from_parts(
                time.hour(),
                Some(time.minute()),
                Some(time.second()),
                Some(ms),
            ),
        }
    }
}

/// A date with optional time of day and timezone offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrecisionDateTime {
    date: PrecisionDate,
    time: Option<PrecisionTime>,
    /// Offset from UTC in minutes.
    offset_minutes: Option<i32>,
    original: Arc<str>,
}

impl PrecisionDateTime {
    /// Parses a partial ISO-8601 date-time such as `2024`, `2024-06-15T`,
    /// `2024-06-15T10:30` or `2024-06-15T10:30:00.250+02:00`.
    ///
    /// A time zone is only accepted when at least the hour is present.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('@').unwrap_or(s);
        let caps = DATE_TIME_GRAMMAR.captures(s)?;
        let year = caps.get(1)?.as_str().parse().ok()?;
        let date = PrecisionDate::from_parts(year, capture_u32(&caps, 2), capture_u32(&caps, 3))?;
        let time = match capture_u32(&caps, 4) {
            Some(hour) => {
                date.day?;
                Some(PrecisionTime::from_parts(
                    hour,
                    capture_u32(&caps, 5),
                    capture_u32(&caps, 6),
                    caps.get(7).map(|m| fraction_to_millis(m.as_str())),
                )?)
            }
            None => None,
        };
        let offset_minutes = match caps.get(8) {
            Some(tz) => {
                time.as_ref()?;
                Some(parse_offset(tz.as_str())?)
            }
            None => None,
        };
        Some(Self::from_parts(date, time, offset_minutes))
    }

    fn from_parts(date: PrecisionDate, time: Option<PrecisionTime>, offset: Option<i32>) -> Self {
        let mut original = date.as_str().to_string();
        if let Some(t) = &time {
            original.push('T');
            original.push_str(t.as_str());
            if let Some(offset) = offset {
                original.push_str(&render_offset(offset));
            }
        }
        Self {
            date,
            time,
            offset_minutes: if original.contains('T') { offset } else { None },
            original: Arc::from(original),
        }
    }

    pub fn from_date(date: PrecisionDate) -> Self {
        Self::from_parts(date, None, None)
    }

    pub fn from_chrono(value: ChronoDateTime<FixedOffset>) -> Self {
        let local = value.naive_local();
        Self::from_parts(
            PrecisionDate::from_naive(local.date()),
            Some(PrecisionTime::from_naive(local.time())),
            Some(value.offset().local_minus_utc() / 60),
        )
    }

    pub fn precision(&self) -> DateTimePrecision {
        match &self.time {
            None => match self.date.precision() {
                DatePrecision::Year => DateTimePrecision::Year,
                DatePrecision::Month => DateTimePrecision::Month,
                DatePrecision::Day => DateTimePrecision::Day,
            },
            Some(t) => match t.precision() {
                TimePrecision::Hour => DateTimePrecision::Hour,
                TimePrecision::Minute => DateTimePrecision::Minute,
                TimePrecision::Second => DateTimePrecision::Second,
                TimePrecision::Millisecond => DateTimePrecision::Millisecond,
            },
        }
    }

    pub fn date(&self) -> &PrecisionDate {
        &self.date
    }

    pub fn time(&self) -> Option<&PrecisionTime> {
        self.time.as_ref()
    }

    pub fn offset_minutes(&self) -> Option<i32> {
        self.offset_minutes
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    fn to_naive(&self) -> NaiveDateTime {
        let time = self
            .time
            .as_ref()
            .map(PrecisionTime::to_naive_time)
            .unwrap_or_default();
        self.date.to_naive_date().and_time(time)
    }

    /// Components up to this value's precision, shifted to UTC when the value has
    /// a time. A value without an offset is taken to be in UTC.
    fn utc_components(&self) -> Vec<i64> {
        let Some(time) = &self.time else {
            return self.date.components();
        };
        let utc = self.to_naive() - Duration::minutes(self.offset_minutes.unwrap_or(0) as i64);
        let mut parts = vec![
            utc.year() as i64,
            utc.month() as i64,
            utc.day() as i64,
            utc.hour() as i64,
        ];
        if time.minute.is_some() {
            parts.push(utc.minute() as i64);
            if time.second.is_some() {
                parts.push(utc.second() as i64 * 1000 + time.millisecond.unwrap_or(0) as i64);
            }
        }
        parts
    }

    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        compare_components(&self.utc_components(), &other.utc_components())
    }

    /// Shifts the date-time by a calendar duration, keeping its precision and offset.
    pub fn add_duration(&self, amount: Decimal, unit: CalendarUnit) -> Option<Self> {
        let shifted = shift_naive(self.to_naive(), amount, unit)?;
        let date = match self.date.precision() {
            DatePrecision::Year => PrecisionDate::from_parts(shifted.year(), None, None)?,
            DatePrecision::Month => {
                PrecisionDate::from_parts(shifted.year(), Some(shifted.month()), None)?
            }
            DatePrecision::Day => PrecisionDate::from_naive(shifted.date()),
        };
        let time = match &self.time {
            Some(t) => Some(PrecisionTime::truncated(shifted.time(), t.precision())?),
            None => None,
        };
        Some(Self::from_parts(date, time, self.offset_minutes))
    }
}

fn parse_offset(tz: &str) -> Option<i32> {
    if tz == "Z" {
        return Some(0);
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let (hours, minutes) = tz[1..].split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

fn render_offset(offset: i32) -> String {
    if offset == 0 {
        return "Z".to_string();
    }
    let sign = if offset < 0 { '-' } else { '+' };
    let abs = offset.abs();
    format!("{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

/// Converts a sub-day amount to a chrono duration. Seconds keep millisecond fractions.
fn duration_for(amount: Decimal, unit: CalendarUnit) -> Option<Duration> {
    let whole = amount.trunc().to_i64()?;
    match unit {
        CalendarUnit::Week => Duration::try_weeks(whole),
        CalendarUnit::Day => Duration::try_days(whole),
        CalendarUnit::Hour => Duration::try_hours(whole),
        CalendarUnit::Minute => Duration::try_minutes(whole),
        CalendarUnit::Second => {
            let millis = (amount * Decimal::from(1000)).round().to_i64()?;
            Duration::try_milliseconds(millis)
        }
        CalendarUnit::Millisecond => Duration::try_milliseconds(whole),
        CalendarUnit::Year | CalendarUnit::Month => None,
    }
}

/// Applies a calendar shift. Year and month shifts clamp the day to the end of
/// the target month.
fn shift_naive(start: NaiveDateTime, amount: Decimal, unit: CalendarUnit) -> Option<NaiveDateTime> {
    let whole = amount.trunc().to_i64()?;
    let months = match unit {
        CalendarUnit::Year => Some(whole.checked_mul(12)?),
        CalendarUnit::Month => Some(whole),
        _ => None,
    };
    let shifted = match months {
        Some(m) if m >= 0 => start.checked_add_months(Months::new(u32::try_from(m).ok()?))?,
        Some(m) => start.checked_sub_months(Months::new(u32::try_from(-m).ok()?))?,
        None => start.checked_add_signed(duration_for(amount, unit)?)?,
    };
    if (1..=9999).contains(&shifted.year()) {
        Some(shifted)
    } else {
        None
    }
}

impl fmt::Display for PrecisionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl fmt::Display for PrecisionTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl fmt::Display for PrecisionDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> PrecisionDate {
        PrecisionDate::parse(s).unwrap()
    }

    fn dt(s: &str) -> PrecisionDateTime {
        PrecisionDateTime::parse(s).unwrap()
    }

    fn time(s: &str) -> PrecisionTime {
        PrecisionTime::parse(s).unwrap()
    }

    #[test]
    fn parses_partial_dates() {
        assert_eq!(date("2024").precision(), DatePrecision::Year);
        assert_eq!(date("@2024-06").precision(), DatePrecision::Month);
        assert_eq!(date("2024-06-15").precision(), DatePrecision::Day);
        assert!(PrecisionDate::parse("2024-13").is_none());
        assert!(PrecisionDate::parse("2023-02-29").is_none());
        assert!(PrecisionDate::parse("24-01-01").is_none());
    }

    #[test]
    fn parses_date_times_with_offsets() {
        let value = dt("2024-06-15T10:30:00.5+02:00");
        assert_eq!(value.precision(), DateTimePrecision::Millisecond);
        assert_eq!(value.offset_minutes(), Some(120));
        assert_eq!(value.to_string(), "2024-06-15T10:30:00.500+02:00");
        assert_eq!(dt("@2024-06-15T").precision(), DateTimePrecision::Day);
        assert!(PrecisionDateTime::parse("2024-06T10").is_none());
        assert!(PrecisionDateTime::parse("2024-06-15Z").is_none());
    }

    #[test]
    fn parses_times() {
        assert_eq!(time("@T14").precision(), TimePrecision::Hour);
        assert_eq!(time("14:30:15").precision(), TimePrecision::Second);
        assert!(PrecisionTime::parse("24:00").is_none());
    }

    #[test]
    fn differing_precision_orders_while_components_differ() {
        assert_eq!(date("2024").compare(&date("2025-06-15")), Some(Ordering::Less));
        assert_eq!(date("2024").compare(&date("2024-06-15")), None);
        assert_eq!(date("2024-06").compare(&date("2024-05-31")), Some(Ordering::Greater));
    }

    #[test]
    fn seconds_and_milliseconds_share_precision() {
        assert_eq!(time("10:30:00").compare(&time("10:30:00.000")), Some(Ordering::Equal));
        assert_eq!(time("10:30").compare(&time("10:30:00")), None);
    }

    #[test]
    fn offsets_are_normalized_before_comparing() {
        let a = dt("2024-06-15T10:00:00+02:00");
        let b = dt("2024-06-15T08:00:00Z");
        assert_eq!(a.compare(&b), Some(Ordering::Equal));
        let c = dt("2024-06-15T09:00:00Z");
        assert_eq!(a.compare(&c), Some(Ordering::Less));
    }

    #[test]
    fn month_arithmetic_clamps_day() {
        let shifted = date("2024-01-31").add_duration(dec!(1), CalendarUnit::Month).unwrap();
        assert_eq!(shifted.to_string(), "2024-02-29");
        let back = date("2024-03-31").add_duration(dec!(-1), CalendarUnit::Month).unwrap();
        assert_eq!(back.to_string(), "2024-02-29");
    }

    #[test]
    fn arithmetic_keeps_precision() {
        let shifted = date("2014").add_duration(dec!(24), CalendarUnit::Month).unwrap();
        assert_eq!(shifted.to_string(), "2016");
        let later = dt("2024-06-15T23:30Z").add_duration(dec!(1), CalendarUnit::Hour).unwrap();
        assert_eq!(later.to_string(), "2024-06-16T00:30Z");
    }

    #[test]
    fn time_arithmetic_wraps_midnight() {
        let shifted = time("23:30").add_duration(dec!(45), CalendarUnit::Minute).unwrap();
        assert_eq!(shifted.to_string(), "00:15");
        assert!(time("10:00").add_duration(dec!(1), CalendarUnit::Day).is_none());
    }

    #[test]
    fn calendar_units_reject_ucum_year_and_month() {
        assert_eq!(CalendarUnit::from_unit("years"), Some(CalendarUnit::Year));
        assert_eq!(CalendarUnit::from_unit("wk"), Some(CalendarUnit::Week));
        assert_eq!(CalendarUnit::from_unit("a"), None);
        assert_eq!(CalendarUnit::from_unit("mo"), None);
    }
}
