use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use regex::Regex;
use rust_decimal::Decimal;
use url::Url;
use uuid::Uuid;

use crate::atomic::AtomicItem;
use crate::error::ValueError;
use crate::temporal::{Date, DateTime, DayTimeDuration, YearMonthDuration};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\p{L}|_)(\p{L}|\p{N}|[.\-_])*$").expect("BUG: invalid TOKEN_RE regex literal")
});

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}\p{N}]([\p{L}\p{N}-]{0,62})?(\.[\p{L}\p{N}]([\p{L}\p{N}-]{0,62})?)*\.?$")
        .expect("BUG: invalid HOSTNAME_RE regex literal")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("BUG: invalid EMAIL_RE regex literal")
});

static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?\d+$").expect("BUG: invalid INTEGER_RE regex literal")
});

static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("BUG: invalid DECIMAL_RE regex literal")
});

/// The atomic data types an [`AtomicItem`] can carry, plus the integer
/// subtypes that are only meaningful as cast targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    Boolean,
    String,
    Token,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Decimal,
    DayTimeDuration,
    YearMonthDuration,
    Date,
    DateWithTimezone,
    DateTime,
    DateTimeWithTimezone,
    Uri,
    UriReference,
    Base64Binary,
    IpV4Address,
    IpV6Address,
    Hostname,
    EmailAddress,
    Uuid,
    MarkupLine,
    MarkupMultiline,
}

impl AtomicType {
    pub const ALL: [AtomicType; 23] = [
        AtomicType::Boolean,
        AtomicType::String,
        AtomicType::Token,
        AtomicType::Integer,
        AtomicType::NonNegativeInteger,
        AtomicType::PositiveInteger,
        AtomicType::Decimal,
        AtomicType::DayTimeDuration,
        AtomicType::YearMonthDuration,
        AtomicType::Date,
        AtomicType::DateWithTimezone,
        AtomicType::DateTime,
        AtomicType::DateTimeWithTimezone,
        AtomicType::Uri,
        AtomicType::UriReference,
        AtomicType::Base64Binary,
        AtomicType::IpV4Address,
        AtomicType::IpV6Address,
        AtomicType::Hostname,
        AtomicType::EmailAddress,
        AtomicType::Uuid,
        AtomicType::MarkupLine,
        AtomicType::MarkupMultiline,
    ];

    /// The Metaschema data-type name.
    pub fn name(&self) -> &'static str {
        match self {
            AtomicType::Boolean => "boolean",
            AtomicType::String => "string",
            AtomicType::Token => "token",
            AtomicType::Integer => "integer",
            AtomicType::NonNegativeInteger => "non-negative-integer",
            AtomicType::PositiveInteger => "positive-integer",
            AtomicType::Decimal => "decimal",
            AtomicType::DayTimeDuration => "day-time-duration",
            AtomicType::YearMonthDuration => "year-month-duration",
            AtomicType::Date => "date",
            AtomicType::DateWithTimezone => "date-with-timezone",
            AtomicType::DateTime => "date-time",
            AtomicType::DateTimeWithTimezone => "date-time-with-timezone",
            AtomicType::Uri => "uri",
            AtomicType::UriReference => "uri-reference",
            AtomicType::Base64Binary => "base64",
            AtomicType::IpV4Address => "ip-v4-address",
            AtomicType::IpV6Address => "ip-v6-address",
            AtomicType::Hostname => "hostname",
            AtomicType::EmailAddress => "email-address",
            AtomicType::Uuid => "uuid",
            AtomicType::MarkupLine => "markup-line",
            AtomicType::MarkupMultiline => "markup-multiline",
        }
    }

    /// Resolves a type by its Metaschema name or its XML Schema alias.
    pub fn from_name(name: &str) -> Option<AtomicType> {
        if let Some(found) = Self::ALL.iter().find(|t| t.name() == name) {
            return Some(*found);
        }
        let aliased = match name {
            "dateTime" => AtomicType::DateTime,
            "anyURI" => AtomicType::UriReference,
            "base64Binary" => AtomicType::Base64Binary,
            "dayTimeDuration" => AtomicType::DayTimeDuration,
            "yearMonthDuration" => AtomicType::YearMonthDuration,
            "nonNegativeInteger" => AtomicType::NonNegativeInteger,
            "positiveInteger" => AtomicType::PositiveInteger,
            "email" => AtomicType::EmailAddress,
            _ => return None,
        };
        Some(aliased)
    }

    /// True when values of `self` are also instances of `other`.
    pub fn derives_from(&self, other: AtomicType) -> bool {
        if *self == other {
            return true;
        }
        matches!(
            (self, other),
            (AtomicType::Integer, AtomicType::Decimal)
                | (AtomicType::NonNegativeInteger, AtomicType::Integer | AtomicType::Decimal)
                | (
                    AtomicType::PositiveInteger,
                    AtomicType::NonNegativeInteger | AtomicType::Integer | AtomicType::Decimal
                )
                | (
                    AtomicType::Token
                        | AtomicType::Hostname
                        | AtomicType::EmailAddress
                        | AtomicType::Uuid,
                    AtomicType::String
                )
                | (AtomicType::DateWithTimezone, AtomicType::Date)
                | (AtomicType::DateTimeWithTimezone, AtomicType::DateTime)
                | (AtomicType::Uri, AtomicType::UriReference)
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AtomicType::Integer
                | AtomicType::NonNegativeInteger
                | AtomicType::PositiveInteger
                | AtomicType::Decimal
        )
    }

    /// Parses the lexical form `text` into a value of this type.
    pub fn parse_value(&self, text: &str) -> Result<AtomicItem, ValueError> {
        let invalid = |reason: String| ValueError::invalid(self.name(), text, reason);
        let trimmed = text.trim();

        match self {
            AtomicType::Boolean => match trimmed {
                "true" | "1" => Ok(AtomicItem::Boolean(true)),
                "false" | "0" => Ok(AtomicItem::Boolean(false)),
                _ => Err(invalid("expected 'true', 'false', '1' or '0'".to_string())),
            },
            AtomicType::String => Ok(AtomicItem::String(text.to_string())),
            AtomicType::Token => {
                if TOKEN_RE.is_match(trimmed) {
                    Ok(AtomicItem::Token(trimmed.to_string()))
                } else {
                    Err(invalid("not a valid token".to_string()))
                }
            }
            AtomicType::Integer => parse_integer(trimmed)
                .map(AtomicItem::Integer)
                .map_err(invalid),
            AtomicType::NonNegativeInteger => {
                let value = parse_integer(trimmed).map_err(invalid)?;
                if value < 0 {
                    return Err(ValueError::invalid(self.name(), text, "must not be negative"));
                }
                Ok(AtomicItem::Integer(value))
            }
            AtomicType::PositiveInteger => {
                let value = parse_integer(trimmed).map_err(invalid)?;
                if value < 1 {
                    return Err(ValueError::invalid(self.name(), text, "must be positive"));
                }
                Ok(AtomicItem::Integer(value))
            }
            AtomicType::Decimal => {
                if !DECIMAL_RE.is_match(trimmed) {
                    return Err(invalid("not a decimal number".to_string()));
                }
                let normalized = trimmed.strip_prefix('+').unwrap_or(trimmed);
                normalized
                    .parse::<Decimal>()
                    .map(AtomicItem::Decimal)
                    .map_err(|e| invalid(e.to_string()))
            }
            AtomicType::DayTimeDuration => DayTimeDuration::parse(trimmed)
                .map(AtomicItem::DayTimeDuration)
                .map_err(invalid),
            AtomicType::YearMonthDuration => YearMonthDuration::parse(trimmed)
                .map(AtomicItem::YearMonthDuration)
                .map_err(invalid),
            AtomicType::Date => Date::parse(trimmed).map(AtomicItem::Date).map_err(invalid),
            AtomicType::DateWithTimezone => {
                let date = Date::parse(trimmed).map_err(invalid)?;
                if date.timezone.is_none() {
                    return Err(ValueError::invalid(self.name(), text, "a timezone is required"));
                }
                Ok(AtomicItem::DateWithTimezone(date))
            }
            AtomicType::DateTime => DateTime::parse(trimmed)
                .map(AtomicItem::DateTime)
                .map_err(invalid),
            AtomicType::DateTimeWithTimezone => {
                let value = DateTime::parse(trimmed).map_err(invalid)?;
                if value.timezone.is_none() {
                    return Err(ValueError::invalid(self.name(), text, "a timezone is required"));
                }
                Ok(AtomicItem::DateTimeWithTimezone(value))
            }
            AtomicType::Uri => {
                Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
                Ok(AtomicItem::Uri(trimmed.to_string()))
            }
            AtomicType::UriReference => {
                let base = Url::parse("http://localhost/").map_err(|e| invalid(e.to_string()))?;
                base.join(trimmed).map_err(|e| invalid(e.to_string()))?;
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(invalid("whitespace is not allowed".to_string()));
                }
                Ok(AtomicItem::UriReference(trimmed.to_string()))
            }
            AtomicType::Base64Binary => {
                let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
                BASE64
                    .decode(compact.as_bytes())
                    .map(AtomicItem::Base64Binary)
                    .map_err(|e| invalid(e.to_string()))
            }
            AtomicType::IpV4Address => trimmed
                .parse::<Ipv4Addr>()
                .map(AtomicItem::IpV4Address)
                .map_err(|e| invalid(e.to_string())),
            AtomicType::IpV6Address => trimmed
                .parse::<Ipv6Addr>()
                .map(AtomicItem::IpV6Address)
                .map_err(|e| invalid(e.to_string())),
            AtomicType::Hostname => {
                if HOSTNAME_RE.is_match(trimmed) {
                    Ok(AtomicItem::Hostname(trimmed.to_string()))
                } else {
                    Err(invalid("not a valid hostname".to_string()))
                }
            }
            AtomicType::EmailAddress => {
                if EMAIL_RE.is_match(trimmed) {
                    Ok(AtomicItem::EmailAddress(trimmed.to_string()))
                } else {
                    Err(invalid("not a valid email address".to_string()))
                }
            }
            AtomicType::Uuid => Uuid::parse_str(trimmed)
                .map(AtomicItem::Uuid)
                .map_err(|e| invalid(e.to_string())),
            AtomicType::MarkupLine => {
                if text.contains('\n') {
                    return Err(invalid("markup-line must not span lines".to_string()));
                }
                Ok(AtomicItem::MarkupLine(text.to_string()))
            }
            AtomicType::MarkupMultiline => Ok(AtomicItem::MarkupMultiline(text.to_string())),
        }
    }
}

fn parse_integer(text: &str) -> Result<i64, String> {
    if !INTEGER_RE.is_match(text) {
        return Err("not an integer".to_string());
    }
    let normalized = text.strip_prefix('+').unwrap_or(text);
    normalized.parse::<i64>().map_err(|e| e.to_string())
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
