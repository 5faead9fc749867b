//! Constructor functions: one `<type-name>#1` per atomic type, casting its
//! argument the way `cast as <type-name>?` does.

use metapath_types::AtomicType;

use super::{FunctionImpl, FunctionLibrary};
use crate::context::{DynamicContext, META_NS, XS_NS};
use crate::error::MetapathError;
use crate::types::Sequence;

macro_rules! constructors {
    ($($function:ident => $ty:ident),* $(,)?) => {
        $(
            fn $function<'t>(
                _ctx: &DynamicContext<'t>,
                args: Vec<Sequence<'t>>,
            ) -> Result<Sequence<'t>, MetapathError> {
                construct(&args, AtomicType::$ty)
            }
        )*

        const CONSTRUCTORS: &[(AtomicType, FunctionImpl)] = &[$((AtomicType::$ty, $function)),*];
    };
}

constructors! {
    boolean_fn => Boolean,
    string_fn => String,
    token_fn => Token,
    integer_fn => Integer,
    non_negative_integer_fn => NonNegativeInteger,
    positive_integer_fn => PositiveInteger,
    decimal_fn => Decimal,
    day_time_duration_fn => DayTimeDuration,
    year_month_duration_fn => YearMonthDuration,
    date_fn => Date,
    date_with_timezone_fn => DateWithTimezone,
    date_time_fn => DateTime,
    date_time_with_timezone_fn => DateTimeWithTimezone,
    uri_fn => Uri,
    uri_reference_fn => UriReference,
    base64_fn => Base64Binary,
    ip_v4_address_fn => IpV4Address,
    ip_v6_address_fn => IpV6Address,
    hostname_fn => Hostname,
    email_address_fn => EmailAddress,
    uuid_fn => Uuid,
    markup_line_fn => MarkupLine,
    markup_multiline_fn => MarkupMultiline,
}

/// XML Schema names for the types that have one.
const XS_ALIASES: &[(&str, AtomicType)] = &[
    ("boolean", AtomicType::Boolean),
    ("string", AtomicType::String),
    ("token", AtomicType::Token),
    ("integer", AtomicType::Integer),
    ("nonNegativeInteger", AtomicType::NonNegativeInteger),
    ("positiveInteger", AtomicType::PositiveInteger),
    ("decimal", AtomicType::Decimal),
    ("dayTimeDuration", AtomicType::DayTimeDuration),
    ("yearMonthDuration", AtomicType::YearMonthDuration),
    ("date", AtomicType::Date),
    ("dateTime", AtomicType::DateTime),
    ("anyURI", AtomicType::UriReference),
    ("base64Binary", AtomicType::Base64Binary),
];

pub(super) fn register(library: &mut FunctionLibrary) {
    for &(ty, implementation) in CONSTRUCTORS {
        library.add(META_NS, ty.name(), 1, Some(1), implementation);
    }
    for &(alias, ty) in XS_ALIASES {
        if let Some(&(_, implementation)) = CONSTRUCTORS.iter().find(|(t, _)| *t == ty) {
            library.add(XS_NS, alias, 1, Some(1), implementation);
        }
    }
}

fn construct<'t>(args: &[Sequence<'t>], target: AtomicType) -> Result<Sequence<'t>, MetapathError> {
    match args[0].atomize_optional(target.name())? {
        Some(value) => Ok(Sequence::from(value.cast(target)?)),
        None => Ok(Sequence::empty()),
    }
}
