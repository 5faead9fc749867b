//! Date, date-time and duration values.
//!
//! Dates and date-times keep an optional timezone offset. Values without a
//! timezone are compared against zoned values through an implicit timezone
//! supplied by the caller.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::ValueError;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

static DAY_TIME_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .expect("BUG: invalid DAY_TIME_DURATION_RE regex literal")
});

static YEAR_MONTH_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?$")
        .expect("BUG: invalid YEAR_MONTH_DURATION_RE regex literal")
});

/// Splits a trailing `Z` or `(+|-)hh:mm` timezone from a lexical date or date-time.
fn split_timezone(text: &str) -> Result<(&str, Option<FixedOffset>), String> {
    if let Some(rest) = text.strip_suffix('Z') {
        return Ok((rest, FixedOffset::east_opt(0)));
    }
    let bytes = text.as_bytes();
    if bytes.len() > 6 {
        let sign_at = bytes.len() - 6;
        let sign = bytes[sign_at];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            let zone = &text[sign_at + 1..];
            let hours: i32 = zone[..2]
                .parse()
                .map_err(|_| format!("invalid timezone hours in '{}'", zone))?;
            let minutes: i32 = zone[3..]
                .parse()
                .map_err(|_| format!("invalid timezone minutes in '{}'", zone))?;
            if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
                return Err(format!("timezone '{}' out of range", zone));
            }
            let mut seconds = hours * 3600 + minutes * 60;
            if sign == b'-' {
                seconds = -seconds;
            }
            return Ok((&text[..sign_at], FixedOffset::east_opt(seconds)));
        }
    }
    Ok((text, None))
}

fn format_timezone(offset: &FixedOffset, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let seconds = offset.local_minus_utc();
    if seconds == 0 {
        return write!(f, "Z");
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.abs();
    write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
}

fn to_utc(
    value: NaiveDateTime,
    offset: Option<FixedOffset>,
    implicit: FixedOffset,
) -> Option<NaiveDateTime> {
    let offset = offset.unwrap_or(implicit);
    value.checked_sub_signed(TimeDelta::seconds(i64::from(offset.local_minus_utc())))
}

/// A calendar date with an optional timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    pub date: NaiveDate,
    pub timezone: Option<FixedOffset>,
}

impl Date {
    pub fn new(date: NaiveDate, timezone: Option<FixedOffset>) -> Self {
        Self { date, timezone }
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let (body, timezone) = split_timezone(text.trim())?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|e| format!("'{}' is not a date: {}", body, e))?;
        Ok(Self { date, timezone })
    }

    pub fn to_date_time(self) -> DateTime {
        DateTime {
            value: self.date.and_time(NaiveTime::MIN),
            timezone: self.timezone,
        }
    }

    pub fn instant(&self, implicit: FixedOffset) -> Option<NaiveDateTime> {
        to_utc(self.date.and_time(NaiveTime::MIN), self.timezone, implicit)
    }

    pub fn compare(&self, other: &Date, implicit: FixedOffset) -> Ordering {
        self.instant(implicit).cmp(&other.instant(implicit))
    }

    pub fn add_months(&self, months: i64) -> Option<Self> {
        let date = shift_months(self.date.and_time(NaiveTime::MIN), months)?.date();
        Some(Self { date, ..*self })
    }

    pub fn add_delta(&self, delta: TimeDelta) -> Option<Self> {
        let date = self
            .date
            .and_time(NaiveTime::MIN)
            .checked_add_signed(delta)?
            .date();
        Some(Self { date, ..*self })
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        match &self.timezone {
            Some(tz) => format_timezone(tz, f),
            None => Ok(()),
        }
    }
}

/// A date and time of day with an optional timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    pub value: NaiveDateTime,
    pub timezone: Option<FixedOffset>,
}

impl DateTime {
    pub fn new(value: NaiveDateTime, timezone: Option<FixedOffset>) -> Self {
        Self { value, timezone }
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let (body, timezone) = split_timezone(text.trim())?;
        let value = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| format!("'{}' is not a date-time: {}", body, e))?;
        Ok(Self { value, timezone })
    }

    pub fn to_date(self) -> Date {
        Date {
            date: self.value.date(),
            timezone: self.timezone,
        }
    }

    pub fn instant(&self, implicit: FixedOffset) -> Option<NaiveDateTime> {
        to_utc(self.value, self.timezone, implicit)
    }

    pub fn compare(&self, other: &DateTime, implicit: FixedOffset) -> Ordering {
        self.instant(implicit).cmp(&other.instant(implicit))
    }

    pub fn add_months(&self, months: i64) -> Option<Self> {
        let value = shift_months(self.value, months)?;
        Some(Self { value, ..*self })
    }

    pub fn add_delta(&self, delta: TimeDelta) -> Option<Self> {
        let value = self.value.checked_add_signed(delta)?;
        Some(Self { value, ..*self })
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value.format("%Y-%m-%dT%H:%M:%S%.f"))?;
        match &self.timezone {
            Some(tz) => format_timezone(tz, f),
            None => Ok(()),
        }
    }
}

fn shift_months(value: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        value.checked_add_months(Months::new(magnitude))
    } else {
        value.checked_sub_months(Months::new(magnitude))
    }
}

/// Difference between two instants, as used by `date - date` and `date-time - date-time`.
pub fn difference(
    left: NaiveDateTime,
    right: NaiveDateTime,
) -> Result<DayTimeDuration, ValueError> {
    left.signed_duration_since(right)
        .num_nanoseconds()
        .map(DayTimeDuration::from_nanos)
        .ok_or_else(|| ValueError::overflow("date difference exceeds duration range"))
}

/// A duration measured in days, hours, minutes and (fractional) seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayTimeDuration {
    nanos: i64,
}

impl DayTimeDuration {
    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub fn from_seconds(seconds: i64) -> Option<Self> {
        seconds.checked_mul(NANOS_PER_SECOND).map(Self::from_nanos)
    }

    pub fn nanos(&self) -> i64 {
        self.nanos
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::nanoseconds(self.nanos)
    }

    /// Total length in seconds as an exact decimal.
    pub fn seconds(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.nanos), 9).normalize()
    }

    pub fn from_decimal_seconds(seconds: Decimal) -> Option<Self> {
        let nanos = seconds.checked_mul(Decimal::from(NANOS_PER_SECOND))?;
        nanos.trunc().to_i64().map(Self::from_nanos)
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let caps = DAY_TIME_DURATION_RE
            .captures(text)
            .ok_or_else(|| format!("'{}' is not a day-time duration", text))?;
        if text.ends_with('P') || text.ends_with('T') {
            return Err(format!("'{}' has no duration components", text));
        }
        let component = |idx: usize| -> Result<i64, String> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<i64>())
                .transpose()
                .map(|v| v.unwrap_or(0))
                .map_err(|e| e.to_string())
        };
        let days = component(2)?;
        let hours = component(3)?;
        let minutes = component(4)?;
        let seconds = caps
            .get(5)
            .map(|m| m.as_str().parse::<Decimal>())
            .transpose()
            .map_err(|e| e.to_string())?
            .unwrap_or(Decimal::ZERO);

        let whole = days
            .checked_mul(86_400)
            .and_then(|d| d.checked_add(hours.checked_mul(3_600)?))
            .and_then(|d| d.checked_add(minutes.checked_mul(60)?))
            .ok_or_else(|| format!("duration '{}' is too large", text))?;
        let total = Decimal::from(whole) + seconds;
        let mut duration = Self::from_decimal_seconds(total)
            .ok_or_else(|| format!("duration '{}' is too large", text))?;
        if caps.get(1).is_some() {
            duration.nanos = -duration.nanos;
        }
        Ok(duration)
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.nanos.checked_add(other.nanos).map(Self::from_nanos)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.nanos.checked_sub(other.nanos).map(Self::from_nanos)
    }

    pub fn negate(&self) -> Option<Self> {
        self.nanos.checked_neg().map(Self::from_nanos)
    }
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return write!(f, "PT0S");
        }
        if self.nanos < 0 {
            write!(f, "-")?;
        }
        let abs = self.nanos.unsigned_abs();
        let nanos_per_second = NANOS_PER_SECOND.unsigned_abs();
        let total_seconds = abs / nanos_per_second;
        let fraction = abs % nanos_per_second;
        let days = total_seconds / 86_400;
        let hours = (total_seconds % 86_400) / 3_600;
        let minutes = (total_seconds % 3_600) / 60;
        let seconds = total_seconds % 60;

        write!(f, "P")?;
        if days > 0 {
            write!(f, "{}D", days)?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 || fraction > 0 {
            write!(f, "T")?;
            if hours > 0 {
                write!(f, "{}H", hours)?;
            }
            if minutes > 0 {
                write!(f, "{}M", minutes)?;
            }
            if fraction > 0 {
                let digits = format!("{:09}", fraction);
                write!(f, "{}.{}S", seconds, digits.trim_end_matches('0'))?;
            } else if seconds > 0 {
                write!(f, "{}S", seconds)?;
            }
        }
        Ok(())
    }
}

/// A duration measured in whole months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonthDuration {
    months: i64,
}

impl YearMonthDuration {
    pub fn from_months(months: i64) -> Self {
        Self { months }
    }

    pub fn months(&self) -> i64 {
        self.months
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let caps = YEAR_MONTH_DURATION_RE
            .captures(text)
            .ok_or_else(|| format!("'{}' is not a year-month duration", text))?;
        if text.ends_with('P') {
            return Err(format!("'{}' has no duration components", text));
        }
        let component = |idx: usize| -> Result<i64, String> {
            caps.get(idx)
                .map(|m| m.as_str().parse::<i64>())
                .transpose()
                .map(|v| v.unwrap_or(0))
                .map_err(|e| e.to_string())
        };
        let months = component(2)?
            .checked_mul(12)
            .and_then(|y| y.checked_add(component(3).ok()?))
            .ok_or_else(|| format!("duration '{}' is too large", text))?;
        Ok(Self {
            months: if caps.get(1).is_some() { -months } else { months },
        })
    }

    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.months.checked_add(other.months).map(Self::from_months)
    }

    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        self.months.checked_sub(other.months).map(Self::from_months)
    }

    pub fn negate(&self) -> Option<Self> {
        self.months.checked_neg().map(Self::from_months)
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months == 0 {
            return write!(f, "P0M");
        }
        if self.months < 0 {
            write!(f, "-")?;
        }
        let abs = self.months.unsigned_abs();
        let (years, months) = (abs / 12, abs % 12);
        write!(f, "P")?;
        if years > 0 {
            write!(f, "{}Y", years)?;
        }
        if months > 0 {
            write!(f, "{}M", months)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_with_timezone_round_trip() {
        let date = Date::parse("2024-02-29-05:00").unwrap();
        assert_eq!(date.timezone, FixedOffset::west_opt(5 * 3600));
        assert_eq!(date.to_string(), "2024-02-29-05:00");
    }

    #[test]
    fn test_date_time_fraction_and_utc() {
        let dt = DateTime::parse("2024-01-01T10:30:00.250Z").unwrap();
        assert_eq!(dt.to_string(), "2024-01-01T10:30:00.250Z");
        let plain = DateTime::parse("2024-01-01T10:30:00").unwrap();
        assert!(plain.timezone.is_none());
        assert_eq!(plain.to_string(), "2024-01-01T10:30:00");
    }

    #[test]
    fn test_invalid_date_rejected() {
        assert!(Date::parse("2023-02-29").is_err());
        assert!(Date::parse("2023-13-01").is_err());
        assert!(DateTime::parse("2023-01-01").is_err());
    }

    #[test]
    fn test_zoned_comparison_uses_instant() {
        let utc = DateTime::parse("2024-01-01T12:00:00Z").unwrap();
        let east = DateTime::parse("2024-01-01T13:00:00+01:00").unwrap();
        let implicit = FixedOffset::east_opt(0).unwrap();
        assert_eq!(utc.compare(&east, implicit), Ordering::Equal);
    }

    #[test]
    fn test_day_time_duration_parse_and_format() {
        let d = DayTimeDuration::parse("P1DT2H3M4.5S").unwrap();
        assert_eq!(d.to_string(), "P1DT2H3M4.5S");
        assert_eq!(DayTimeDuration::parse("-PT90M").unwrap().to_string(), "-PT1H30M");
        assert_eq!(DayTimeDuration::from_nanos(0).to_string(), "PT0S");
        assert!(DayTimeDuration::parse("P").is_err());
        assert!(DayTimeDuration::parse("P1DT").is_err());
    }

    #[test]
    fn test_year_month_duration_parse_and_format() {
        assert_eq!(YearMonthDuration::parse("P14M").unwrap().to_string(), "P1Y2M");
        assert_eq!(YearMonthDuration::parse("-P2Y").unwrap().months(), -24);
        assert!(YearMonthDuration::parse("P1D").is_err());
    }

    #[test]
    fn test_month_arithmetic_clamps_day() {
        let date = Date::parse("2024-01-31").unwrap();
        assert_eq!(date.add_months(1).unwrap().to_string(), "2024-02-29");
        assert_eq!(date.add_months(-2).unwrap().to_string(), "2023-11-30");
    }
}
