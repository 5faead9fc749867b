use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{Ipv4Addr, Ipv6Addr};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::FixedOffset;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::atomic_type::AtomicType;
use crate::error::ValueError;
use crate::temporal::{Date, DateTime, DayTimeDuration, YearMonthDuration};

/// An immutable typed scalar value.
#[derive(Debug, Clone)]
pub enum AtomicItem {
    Boolean(bool),
    String(String),
    Token(String),
    Integer(i64),
    Decimal(Decimal),
    DayTimeDuration(DayTimeDuration),
    YearMonthDuration(YearMonthDuration),
    Date(Date),
    DateWithTimezone(Date),
    DateTime(DateTime),
    DateTimeWithTimezone(DateTime),
    Uri(String),
    UriReference(String),
    Base64Binary(Vec<u8>),
    IpV4Address(Ipv4Addr),
    IpV6Address(Ipv6Addr),
    Hostname(String),
    EmailAddress(String),
    Uuid(Uuid),
    MarkupLine(String),
    MarkupMultiline(String),
}

/// How two atomic values relate for comparison purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Boolean,
    Numeric,
    Text,
    DayTime,
    YearMonth,
    Date,
    DateTime,
    IpV4,
    IpV6,
    Binary,
}

impl AtomicItem {
    pub fn string(value: impl Into<String>) -> Self {
        AtomicItem::String(value.into())
    }

    pub fn atomic_type(&self) -> AtomicType {
        match self {
            AtomicItem::Boolean(_) => AtomicType::Boolean,
            AtomicItem::String(_) => AtomicType::String,
            AtomicItem::Token(_) => AtomicType::Token,
            AtomicItem::Integer(_) => AtomicType::Integer,
            AtomicItem::Decimal(_) => AtomicType::Decimal,
            AtomicItem::DayTimeDuration(_) => AtomicType::DayTimeDuration,
            AtomicItem::YearMonthDuration(_) => AtomicType::YearMonthDuration,
            AtomicItem::Date(_) => AtomicType::Date,
            AtomicItem::DateWithTimezone(_) => AtomicType::DateWithTimezone,
            AtomicItem::DateTime(_) => AtomicType::DateTime,
            AtomicItem::DateTimeWithTimezone(_) => AtomicType::DateTimeWithTimezone,
            AtomicItem::Uri(_) => AtomicType::Uri,
            AtomicItem::UriReference(_) => AtomicType::UriReference,
            AtomicItem::Base64Binary(_) => AtomicType::Base64Binary,
            AtomicItem::IpV4Address(_) => AtomicType::IpV4Address,
            AtomicItem::IpV6Address(_) => AtomicType::IpV6Address,
            AtomicItem::Hostname(_) => AtomicType::Hostname,
            AtomicItem::EmailAddress(_) => AtomicType::EmailAddress,
            AtomicItem::Uuid(_) => AtomicType::Uuid,
            AtomicItem::MarkupLine(_) => AtomicType::MarkupLine,
            AtomicItem::MarkupMultiline(_) => AtomicType::MarkupMultiline,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.atomic_type().name()
    }

    /// The canonical lexical form.
    pub fn as_string(&self) -> String {
        match self {
            AtomicItem::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            AtomicItem::String(s)
            | AtomicItem::Token(s)
            | AtomicItem::Uri(s)
            | AtomicItem::UriReference(s)
            | AtomicItem::Hostname(s)
            | AtomicItem::EmailAddress(s)
            | AtomicItem::MarkupLine(s)
            | AtomicItem::MarkupMultiline(s) => s.clone(),
            AtomicItem::Integer(i) => i.to_string(),
            AtomicItem::Decimal(d) => d.normalize().to_string(),
            AtomicItem::DayTimeDuration(d) => d.to_string(),
            AtomicItem::YearMonthDuration(d) => d.to_string(),
            AtomicItem::Date(d) | AtomicItem::DateWithTimezone(d) => d.to_string(),
            AtomicItem::DateTime(d) | AtomicItem::DateTimeWithTimezone(d) => d.to_string(),
            AtomicItem::Base64Binary(bytes) => BASE64.encode(bytes),
            AtomicItem::IpV4Address(ip) => ip.to_string(),
            AtomicItem::IpV6Address(ip) => ip.to_string(),
            AtomicItem::Uuid(u) => u.hyphenated().to_string(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, AtomicItem::Integer(_) | AtomicItem::Decimal(_))
    }

    /// The value as a decimal, for numeric items.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AtomicItem::Integer(i) => Some(Decimal::from(*i)),
            AtomicItem::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AtomicItem::Integer(i) => Some(*i),
            AtomicItem::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            _ => None,
        }
    }

    /// Truthiness of a singleton value, or `None` when the kind has no
    /// effective boolean value.
    pub fn effective_boolean_value(&self) -> Option<bool> {
        match self {
            AtomicItem::Boolean(b) => Some(*b),
            AtomicItem::Integer(i) => Some(*i != 0),
            AtomicItem::Decimal(d) => Some(!d.is_zero()),
            AtomicItem::String(s)
            | AtomicItem::Token(s)
            | AtomicItem::Uri(s)
            | AtomicItem::UriReference(s)
            | AtomicItem::Hostname(s)
            | AtomicItem::EmailAddress(s)
            | AtomicItem::MarkupLine(s)
            | AtomicItem::MarkupMultiline(s) => Some(!s.is_empty()),
            _ => None,
        }
    }

    fn family(&self) -> Family {
        match self {
            AtomicItem::Boolean(_) => Family::Boolean,
            AtomicItem::Integer(_) | AtomicItem::Decimal(_) => Family::Numeric,
            AtomicItem::String(_)
            | AtomicItem::Token(_)
            | AtomicItem::Uri(_)
            | AtomicItem::UriReference(_)
            | AtomicItem::Hostname(_)
            | AtomicItem::EmailAddress(_)
            | AtomicItem::MarkupLine(_)
            | AtomicItem::MarkupMultiline(_)
            | AtomicItem::Uuid(_) => Family::Text,
            AtomicItem::DayTimeDuration(_) => Family::DayTime,
            AtomicItem::YearMonthDuration(_) => Family::YearMonth,
            AtomicItem::Date(_) | AtomicItem::DateWithTimezone(_) => Family::Date,
            AtomicItem::DateTime(_) | AtomicItem::DateTimeWithTimezone(_) => Family::DateTime,
            AtomicItem::IpV4Address(_) => Family::IpV4,
            AtomicItem::IpV6Address(_) => Family::IpV6,
            AtomicItem::Base64Binary(_) => Family::Binary,
        }
    }

    fn incomparable(&self, other: &AtomicItem) -> ValueError {
        ValueError::incomparable(self.type_name(), other.type_name())
    }

    /// Orders two values of a comparable kind.
    ///
    /// `implicit_timezone` is applied to dates and date-times that carry no
    /// timezone of their own.
    pub fn compare(
        &self,
        other: &AtomicItem,
        implicit_timezone: FixedOffset,
    ) -> Result<Ordering, ValueError> {
        match (self, other) {
            (AtomicItem::Integer(a), AtomicItem::Integer(b)) => Ok(a.cmp(b)),
            (AtomicItem::Boolean(a), AtomicItem::Boolean(b)) => Ok(a.cmp(b)),
            (AtomicItem::DayTimeDuration(a), AtomicItem::DayTimeDuration(b)) => Ok(a.cmp(b)),
            (AtomicItem::YearMonthDuration(a), AtomicItem::YearMonthDuration(b)) => Ok(a.cmp(b)),
            (AtomicItem::IpV4Address(a), AtomicItem::IpV4Address(b)) => Ok(a.cmp(b)),
            (AtomicItem::IpV6Address(a), AtomicItem::IpV6Address(b)) => Ok(a.cmp(b)),
            (
                AtomicItem::Date(a) | AtomicItem::DateWithTimezone(a),
                AtomicItem::Date(b) | AtomicItem::DateWithTimezone(b),
            ) => Ok(a.compare(b, implicit_timezone)),
            (
                AtomicItem::DateTime(a) | AtomicItem::DateTimeWithTimezone(a),
                AtomicItem::DateTime(b) | AtomicItem::DateTimeWithTimezone(b),
            ) => Ok(a.compare(b, implicit_timezone)),
            _ => match (self.family(), other.family()) {
                (Family::Numeric, Family::Numeric) => {
                    match (self.as_decimal(), other.as_decimal()) {
                        (Some(a), Some(b)) => Ok(a.cmp(&b)),
                        _ => Err(self.incomparable(other)),
                    }
                }
                (Family::Text, Family::Text) => Ok(self.as_string().cmp(&other.as_string())),
                _ => Err(self.incomparable(other)),
            },
        }
    }

    /// Value equality, defined for every pair of kinds that can be compared
    /// with `eq`.
    pub fn value_equals(
        &self,
        other: &AtomicItem,
        implicit_timezone: FixedOffset,
    ) -> Result<bool, ValueError> {
        match (self, other) {
            (AtomicItem::Base64Binary(a), AtomicItem::Base64Binary(b)) => Ok(a == b),
            (AtomicItem::DayTimeDuration(a), AtomicItem::YearMonthDuration(b))
            | (AtomicItem::YearMonthDuration(b), AtomicItem::DayTimeDuration(a)) => {
                Ok(a.nanos() == 0 && b.months() == 0)
            }
            _ => Ok(self.compare(other, implicit_timezone)? == Ordering::Equal),
        }
    }

    /// Converts this value to `target` following the casting rules.
    pub fn cast(&self, target: AtomicType) -> Result<AtomicItem, ValueError> {
        let source = self.atomic_type();
        if source == target {
            return Ok(self.clone());
        }

        match (self, target) {
            (_, AtomicType::String) => Ok(AtomicItem::String(self.as_string())),
            (AtomicItem::Integer(i), AtomicType::Decimal) => Ok(AtomicItem::Decimal(Decimal::from(*i))),
            (AtomicItem::Decimal(d), AtomicType::Integer) => d
                .trunc()
                .to_i64()
                .map(AtomicItem::Integer)
                .ok_or_else(|| ValueError::invalid("integer", d.to_string(), "out of range")),
            (
                AtomicItem::Integer(_) | AtomicItem::Decimal(_),
                AtomicType::NonNegativeInteger | AtomicType::PositiveInteger,
            ) => {
                let AtomicItem::Integer(value) = self.cast(AtomicType::Integer)? else {
                    return Err(ValueError::cast(source.name(), target.name()));
                };
                target.parse_value(&value.to_string())
            }
            (AtomicItem::Boolean(b), AtomicType::Integer) => Ok(AtomicItem::Integer(i64::from(*b))),
            (AtomicItem::Boolean(b), AtomicType::Decimal) => {
                Ok(AtomicItem::Decimal(Decimal::from(i64::from(*b))))
            }
            (AtomicItem::Integer(_) | AtomicItem::Decimal(_), AtomicType::Boolean) => {
                Ok(AtomicItem::Boolean(self.effective_boolean_value().unwrap_or(false)))
            }
            (AtomicItem::DateTime(dt) | AtomicItem::DateTimeWithTimezone(dt), AtomicType::Date) => {
                Ok(AtomicItem::Date(dt.to_date()))
            }
            (
                AtomicItem::DateTime(dt) | AtomicItem::DateTimeWithTimezone(dt),
                AtomicType::DateWithTimezone,
            ) => match dt.timezone {
                Some(_) => Ok(AtomicItem::DateWithTimezone(dt.to_date())),
                None => Err(ValueError::invalid(target.name(), self.as_string(), "a timezone is required")),
            },
            (AtomicItem::Date(d) | AtomicItem::DateWithTimezone(d), AtomicType::DateTime) => {
                Ok(AtomicItem::DateTime(d.to_date_time()))
            }
            (
                AtomicItem::Date(d) | AtomicItem::DateWithTimezone(d),
                AtomicType::DateTimeWithTimezone,
            ) => match d.timezone {
                Some(_) => Ok(AtomicItem::DateTimeWithTimezone(d.to_date_time())),
                None => Err(ValueError::invalid(target.name(), self.as_string(), "a timezone is required")),
            },
            (AtomicItem::Date(d), AtomicType::DateWithTimezone) => match d.timezone {
                Some(_) => Ok(AtomicItem::DateWithTimezone(*d)),
                None => Err(ValueError::invalid(target.name(), self.as_string(), "a timezone is required")),
            },
            (AtomicItem::DateTime(d), AtomicType::DateTimeWithTimezone) => match d.timezone {
                Some(_) => Ok(AtomicItem::DateTimeWithTimezone(*d)),
                None => Err(ValueError::invalid(target.name(), self.as_string(), "a timezone is required")),
            },
            (AtomicItem::DateWithTimezone(d), AtomicType::Date) => Ok(AtomicItem::Date(*d)),
            (AtomicItem::DateTimeWithTimezone(d), AtomicType::DateTime) => Ok(AtomicItem::DateTime(*d)),
            _ if self.family() == Family::Text && source != AtomicType::Uuid => {
                target.parse_value(&self.as_string())
            }
            (AtomicItem::Uuid(_), _) if target_is_textual(target) => {
                target.parse_value(&self.as_string())
            }
            _ => Err(ValueError::cast(source.name(), target.name())),
        }
    }

    /// Whether `cast(target)` would succeed.
    pub fn castable(&self, target: AtomicType) -> bool {
        self.cast(target).is_ok()
    }
}

fn target_is_textual(target: AtomicType) -> bool {
    matches!(
        target,
        AtomicType::String
            | AtomicType::Token
            | AtomicType::MarkupLine
            | AtomicType::MarkupMultiline
            | AtomicType::UriReference
            | AtomicType::Uri
    )
}

/// Key identity used by maps and `distinct-values`: numeric values compare
/// by magnitude across integer and decimal, text kinds by their string value.
#[derive(PartialEq, Eq, Hash)]
enum KeyIdentity {
    Boolean(bool),
    Numeric(Decimal),
    Text(String),
    Other(AtomicType, String),
}

impl AtomicItem {
    fn key_identity(&self) -> KeyIdentity {
        match self.family() {
            Family::Boolean => KeyIdentity::Boolean(matches!(self, AtomicItem::Boolean(true))),
            Family::Numeric => match self.as_decimal() {
                Some(d) => KeyIdentity::Numeric(d.normalize()),
                None => KeyIdentity::Other(self.atomic_type(), self.as_string()),
            },
            Family::Text => KeyIdentity::Text(self.as_string()),
            _ => KeyIdentity::Other(self.atomic_type(), self.as_string()),
        }
    }
}

impl PartialEq for AtomicItem {
    fn eq(&self, other: &Self) -> bool {
        self.key_identity() == other.key_identity()
    }
}

impl Eq for AtomicItem {}

impl Hash for AtomicItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key_identity().hash(state);
    }
}

impl fmt::Display for AtomicItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<bool> for AtomicItem {
    fn from(value: bool) -> Self {
        AtomicItem::Boolean(value)
    }
}

impl From<i64> for AtomicItem {
    fn from(value: i64) -> Self {
        AtomicItem::Integer(value)
    }
}

impl From<Decimal> for AtomicItem {
    fn from(value: Decimal) -> Self {
        AtomicItem::Decimal(value)
    }
}

impl From<&str> for AtomicItem {
    fn from(value: &str) -> Self {
        AtomicItem::String(value.to_string())
    }
}

impl From<String> for AtomicItem {
    fn from(value: String) -> Self {
        AtomicItem::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn dec(s: &str) -> AtomicItem {
        AtomicItem::Decimal(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_canonical_decimal_drops_trailing_zeros() {
        assert_eq!(dec("1.500").as_string(), "1.5");
        assert_eq!(dec("3.0").as_string(), "3");
        assert_eq!(dec("-0.0").as_string(), "0");
    }

    #[test]
    fn test_numeric_promotion_in_comparison() {
        let ord = AtomicItem::Integer(2).compare(&dec("2.5"), utc()).unwrap();
        assert_eq!(ord, Ordering::Less);
        assert!(AtomicItem::Integer(3).value_equals(&dec("3.0"), utc()).unwrap());
    }

    #[test]
    fn test_string_kinds_compare_by_codepoint() {
        let a = AtomicItem::string("abc");
        let b = AtomicItem::Hostname("abd".to_string());
        assert_eq!(a.compare(&b, utc()).unwrap(), Ordering::Less);
    }

    #[test]
    fn test_cross_family_comparison_fails() {
        let err = AtomicItem::string("1").compare(&AtomicItem::Integer(1), utc());
        assert!(matches!(err, Err(ValueError::Incomparable { .. })));
        let bin = AtomicType::Base64Binary.parse_value("AQI=").unwrap();
        assert!(bin.compare(&bin, utc()).is_err());
        assert!(bin.value_equals(&bin, utc()).unwrap());
    }

    #[test]
    fn test_effective_boolean_value() {
        assert_eq!(AtomicItem::Integer(0).effective_boolean_value(), Some(false));
        assert_eq!(AtomicItem::string("").effective_boolean_value(), Some(false));
        assert_eq!(dec("0.1").effective_boolean_value(), Some(true));
        let date = AtomicType::Date.parse_value("2020-01-01").unwrap();
        assert_eq!(date.effective_boolean_value(), None);
    }

    #[test]
    fn test_cast_string_to_integer_invalid_value() {
        let err = AtomicItem::string("abc").cast(AtomicType::Integer).unwrap_err();
        assert!(matches!(err, ValueError::InvalidValue { .. }));
    }

    #[test]
    fn test_cast_without_rule_is_invalid_for_cast() {
        let date = AtomicType::Date.parse_value("2020-01-01").unwrap();
        let err = date.cast(AtomicType::Integer).unwrap_err();
        assert!(matches!(err, ValueError::InvalidValueForCast { .. }));
    }

    #[test]
    fn test_cast_numeric_and_temporal() {
        assert_eq!(dec("-3.9").cast(AtomicType::Integer).unwrap(), AtomicItem::Integer(-3));
        assert_eq!(
            AtomicItem::Integer(0).cast(AtomicType::Boolean).unwrap(),
            AtomicItem::Boolean(false)
        );
        let dt = AtomicType::DateTime.parse_value("2020-01-01T10:00:00Z").unwrap();
        assert_eq!(dt.cast(AtomicType::Date).unwrap().as_string(), "2020-01-01Z");
        assert!(
            AtomicItem::Integer(0)
                .cast(AtomicType::PositiveInteger)
                .is_err()
        );
    }

    #[test]
    fn test_key_identity_spans_numeric_kinds() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(AtomicItem::Integer(1));
        assert!(set.contains(&dec("1.0")));
        assert!(!set.contains(&AtomicItem::string("1")));
    }
}
