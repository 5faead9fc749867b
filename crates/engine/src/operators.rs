//! Comparison and arithmetic operators.
//!
//! Operands arrive as sequences and are atomized here. Arithmetic and value
//! comparisons yield the empty sequence when either operand is empty.

use std::cmp::Ordering;

use chrono::FixedOffset;
use metapath_types::temporal::difference;
use metapath_types::{AtomicItem, Date, DateTime, DayTimeDuration, Decimal, YearMonthDuration};
use rust_decimal::prelude::ToPrimitive;

use crate::ast::{ArithmeticOp, ComparisonOp, NodeComparisonOp};
use crate::error::MetapathError;
use crate::types::Sequence;

fn holds(op: ComparisonOp, ordering: Ordering) -> bool {
    match op {
        ComparisonOp::Equal => ordering == Ordering::Equal,
        ComparisonOp::NotEqual => ordering != Ordering::Equal,
        ComparisonOp::LessThan => ordering == Ordering::Less,
        ComparisonOp::LessOrEqual => ordering != Ordering::Greater,
        ComparisonOp::GreaterThan => ordering == Ordering::Greater,
        ComparisonOp::GreaterOrEqual => ordering != Ordering::Less,
    }
}

/// Compares two atomic values with `op`.
pub fn compare_atomic(
    op: ComparisonOp,
    left: &AtomicItem,
    right: &AtomicItem,
    implicit_timezone: FixedOffset,
) -> Result<bool, MetapathError> {
    match op {
        ComparisonOp::Equal => Ok(left.value_equals(right, implicit_timezone)?),
        ComparisonOp::NotEqual => Ok(!left.value_equals(right, implicit_timezone)?),
        _ => Ok(holds(op, left.compare(right, implicit_timezone)?)),
    }
}

/// `=`, `!=`, `<` …: true when any pair drawn from the two atomized operands
/// satisfies `op`. An empty operand makes the comparison false.
pub fn general_compare(
    op: ComparisonOp,
    left: &Sequence<'_>,
    right: &Sequence<'_>,
    implicit_timezone: FixedOffset,
) -> Result<bool, MetapathError> {
    let left = left.atomize()?;
    let right = right.atomize()?;
    for l in &left {
        for r in &right {
            if compare_atomic(op, l, r, implicit_timezone)? {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// `eq`, `ne`, `lt` …: both operands must atomize to at most one value.
pub fn value_compare(
    op: ComparisonOp,
    left: &Sequence<'_>,
    right: &Sequence<'_>,
    implicit_timezone: FixedOffset,
) -> Result<Option<bool>, MetapathError> {
    let what = op.value_symbol();
    match (left.atomize_optional(what)?, right.atomize_optional(what)?) {
        (Some(l), Some(r)) => compare_atomic(op, &l, &r, implicit_timezone).map(Some),
        _ => Ok(None),
    }
}

/// `is`, `<<`, `>>`: identity and document order of two single nodes.
pub fn node_compare(
    op: NodeComparisonOp,
    left: &Sequence<'_>,
    right: &Sequence<'_>,
) -> Result<Option<bool>, MetapathError> {
    let what = op.symbol();
    let (Some(l), Some(r)) = (left.zero_or_one(what)?, right.zero_or_one(what)?) else {
        return Ok(None);
    };
    let (Some(l), Some(r)) = (l.as_node(), r.as_node()) else {
        return Err(MetapathError::type_error(format!(
            "'{}' compares nodes, got {} and {}",
            what,
            l.type_name(),
            r.type_name()
        )));
    };
    Ok(Some(match op {
        NodeComparisonOp::Is => l.is_same_node(&r),
        NodeComparisonOp::Precedes => l < r,
        NodeComparisonOp::Follows => l > r,
    }))
}

/// Applies `op` to the atomized operands.
pub fn arithmetic(
    op: ArithmeticOp,
    left: &Sequence<'_>,
    right: &Sequence<'_>,
    implicit_timezone: FixedOffset,
) -> Result<Option<AtomicItem>, MetapathError> {
    let what = op.symbol();
    match (left.atomize_optional(what)?, right.atomize_optional(what)?) {
        (Some(l), Some(r)) => arithmetic_atomic(op, &l, &r, implicit_timezone).map(Some),
        _ => Ok(None),
    }
}

fn unsupported(op: ArithmeticOp, left: &AtomicItem, right: &AtomicItem) -> MetapathError {
    MetapathError::type_error(format!(
        "'{}' is not defined for {} and {}",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(op: ArithmeticOp) -> MetapathError {
    MetapathError::overflow(format!("result of '{}' is out of range", op.symbol()))
}

pub fn arithmetic_atomic(
    op: ArithmeticOp,
    left: &AtomicItem,
    right: &AtomicItem,
    implicit_timezone: FixedOffset,
) -> Result<AtomicItem, MetapathError> {
    use AtomicItem as A;

    if left.is_numeric() && right.is_numeric() {
        return numeric(op, left, right);
    }

    match (left, right) {
        (A::YearMonthDuration(a), A::YearMonthDuration(b)) => match op {
            ArithmeticOp::Add => a.checked_add(b).map(A::YearMonthDuration).ok_or_else(|| overflow(op)),
            ArithmeticOp::Subtract => a.checked_sub(b).map(A::YearMonthDuration).ok_or_else(|| overflow(op)),
            ArithmeticOp::Divide => ratio(Decimal::from(a.months()), Decimal::from(b.months())),
            _ => Err(unsupported(op, left, right)),
        },
        (A::DayTimeDuration(a), A::DayTimeDuration(b)) => match op {
            ArithmeticOp::Add => a.checked_add(b).map(A::DayTimeDuration).ok_or_else(|| overflow(op)),
            ArithmeticOp::Subtract => a.checked_sub(b).map(A::DayTimeDuration).ok_or_else(|| overflow(op)),
            ArithmeticOp::Divide => ratio(Decimal::from(a.nanos()), Decimal::from(b.nanos())),
            _ => Err(unsupported(op, left, right)),
        },
        (A::YearMonthDuration(d), n) | (n, A::YearMonthDuration(d))
            if n.is_numeric() && op == ArithmeticOp::Multiply =>
        {
            scale_months(op, *d, factor(n)?)
        }
        (A::YearMonthDuration(d), n) if n.is_numeric() && op == ArithmeticOp::Divide => {
            scale_months(op, *d, reciprocal(n)?)
        }
        (A::DayTimeDuration(d), n) | (n, A::DayTimeDuration(d))
            if n.is_numeric() && op == ArithmeticOp::Multiply =>
        {
            scale_nanos(op, *d, factor(n)?)
        }
        (A::DayTimeDuration(d), n) if n.is_numeric() && op == ArithmeticOp::Divide => {
            scale_nanos(op, *d, reciprocal(n)?)
        }
        _ => temporal(op, left, right, implicit_timezone),
    }
}

fn factor(n: &AtomicItem) -> Result<Decimal, MetapathError> {
    n.as_decimal()
        .ok_or_else(|| MetapathError::type_error(format!("{} is not numeric", n.type_name())))
}

fn reciprocal(n: &AtomicItem) -> Result<Decimal, MetapathError> {
    let divisor = factor(n)?;
    if divisor.is_zero() {
        return Err(MetapathError::DivideByZero);
    }
    Decimal::ONE
        .checked_div(divisor)
        .ok_or_else(|| overflow(ArithmeticOp::Divide))
}

fn ratio(dividend: Decimal, divisor: Decimal) -> Result<AtomicItem, MetapathError> {
    if divisor.is_zero() {
        return Err(MetapathError::DivideByZero);
    }
    dividend
        .checked_div(divisor)
        .map(AtomicItem::Decimal)
        .ok_or_else(|| overflow(ArithmeticOp::Divide))
}

/// Scales a year-month duration, rounding to the nearest whole month.
fn scale_months(
    op: ArithmeticOp,
    duration: YearMonthDuration,
    factor: Decimal,
) -> Result<AtomicItem, MetapathError> {
    Decimal::from(duration.months())
        .checked_mul(factor)
        .map(|months| months.round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero))
        .and_then(|months| months.to_i64())
        .map(|months| AtomicItem::YearMonthDuration(YearMonthDuration::from_months(months)))
        .ok_or_else(|| overflow(op))
}

fn scale_nanos(
    op: ArithmeticOp,
    duration: DayTimeDuration,
    factor: Decimal,
) -> Result<AtomicItem, MetapathError> {
    Decimal::from(duration.nanos())
        .checked_mul(factor)
        .and_then(|nanos| nanos.round().to_i64())
        .map(|nanos| AtomicItem::DayTimeDuration(DayTimeDuration::from_nanos(nanos)))
        .ok_or_else(|| overflow(op))
}

/// Date and date-time arithmetic. Results keep the variant (zoned or not)
/// of the temporal operand.
fn temporal(
    op: ArithmeticOp,
    left: &AtomicItem,
    right: &AtomicItem,
    implicit_timezone: FixedOffset,
) -> Result<AtomicItem, MetapathError> {
    use AtomicItem as A;

    let rewrap_date = |original: &AtomicItem, date: Date| match original {
        A::DateWithTimezone(_) => A::DateWithTimezone(date),
        _ => A::Date(date),
    };
    let rewrap_date_time = |original: &AtomicItem, value: DateTime| match original {
        A::DateTimeWithTimezone(_) => A::DateTimeWithTimezone(value),
        _ => A::DateTime(value),
    };

    // date/date-time minus date/date-time
    if op == ArithmeticOp::Subtract {
        let instants = match (left, right) {
            (A::Date(a) | A::DateWithTimezone(a), A::Date(b) | A::DateWithTimezone(b)) => {
                Some((a.instant(implicit_timezone), b.instant(implicit_timezone)))
            }
            (
                A::DateTime(a) | A::DateTimeWithTimezone(a),
                A::DateTime(b) | A::DateTimeWithTimezone(b),
            ) => Some((a.instant(implicit_timezone), b.instant(implicit_timezone))),
            _ => None,
        };
        if let Some(instants) = instants {
            let (Some(a), Some(b)) = instants else {
                return Err(overflow(op));
            };
            return Ok(A::DayTimeDuration(difference(a, b)?));
        }
    }

    // Addition is commutative for a duration and a point in time.
    let (point, duration, negate) = match (op, left, right) {
        (ArithmeticOp::Add, p, d @ (A::YearMonthDuration(_) | A::DayTimeDuration(_)))
        | (ArithmeticOp::Add, d @ (A::YearMonthDuration(_) | A::DayTimeDuration(_)), p) => {
            (p, d, false)
        }
        (ArithmeticOp::Subtract, p, d @ (A::YearMonthDuration(_) | A::DayTimeDuration(_))) => {
            (p, d, true)
        }
        _ => return Err(unsupported(op, left, right)),
    };

    let shifted = match (point, duration) {
        (A::Date(date) | A::DateWithTimezone(date), A::YearMonthDuration(d)) => {
            let months = if negate { d.negate() } else { Some(*d) };
            months
                .and_then(|m| date.add_months(m.months()))
                .map(|date| rewrap_date(point, date))
        }
        (A::Date(date) | A::DateWithTimezone(date), A::DayTimeDuration(d)) => {
            let delta = if negate { d.negate() } else { Some(*d) };
            delta
                .and_then(|d| date.add_delta(d.as_delta()))
                .map(|date| rewrap_date(point, date))
        }
        (A::DateTime(value) | A::DateTimeWithTimezone(value), A::YearMonthDuration(d)) => {
            let months = if negate { d.negate() } else { Some(*d) };
            months
                .and_then(|m| value.add_months(m.months()))
                .map(|value| rewrap_date_time(point, value))
        }
        (A::DateTime(value) | A::DateTimeWithTimezone(value), A::DayTimeDuration(d)) => {
            let delta = if negate { d.negate() } else { Some(*d) };
            delta
                .and_then(|d| value.add_delta(d.as_delta()))
                .map(|value| rewrap_date_time(point, value))
        }
        _ => return Err(unsupported(op, left, right)),
    };
    shifted.ok_or_else(|| overflow(op))
}

fn numeric(
    op: ArithmeticOp,
    left: &AtomicItem,
    right: &AtomicItem,
) -> Result<AtomicItem, MetapathError> {
    if let (AtomicItem::Integer(a), AtomicItem::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let result = match op {
            ArithmeticOp::Add => a.checked_add(b),
            ArithmeticOp::Subtract => a.checked_sub(b),
            ArithmeticOp::Multiply => a.checked_mul(b),
            ArithmeticOp::Divide => return ratio(Decimal::from(a), Decimal::from(b)),
            ArithmeticOp::IntegerDivide => return numeric_integer_divide(left, right),
            ArithmeticOp::Mod => return numeric_mod(left, right),
        };
        return result.map(AtomicItem::Integer).ok_or_else(|| overflow(op));
    }

    let (a, b) = (factor(left)?, factor(right)?);
    let result = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Subtract => a.checked_sub(b),
        ArithmeticOp::Multiply => a.checked_mul(b),
        ArithmeticOp::Divide => return ratio(a, b),
        ArithmeticOp::IntegerDivide => return numeric_integer_divide(left, right),
        ArithmeticOp::Mod => return numeric_mod(left, right),
    };
    result.map(AtomicItem::Decimal).ok_or_else(|| overflow(op))
}

/// `idiv`: the quotient truncated towards zero, as an integer.
pub fn numeric_integer_divide(
    dividend: &AtomicItem,
    divisor: &AtomicItem,
) -> Result<AtomicItem, MetapathError> {
    let op = ArithmeticOp::IntegerDivide;
    if let (AtomicItem::Integer(a), AtomicItem::Integer(b)) = (dividend, divisor) {
        if *b == 0 {
            return Err(MetapathError::DivideByZero);
        }
        return a
            .checked_div(*b)
            .map(AtomicItem::Integer)
            .ok_or_else(|| overflow(op));
    }

    let (a, b) = (numeric_operand(op, dividend)?, numeric_operand(op, divisor)?);
    if b.is_zero() {
        return Err(MetapathError::DivideByZero);
    }
    a.checked_div(b)
        .and_then(|quotient| quotient.trunc().to_i64())
        .map(AtomicItem::Integer)
        .ok_or_else(|| overflow(op))
}

/// `mod`: the remainder of truncating division. The result takes the sign
/// of the dividend, so `a = b * (a idiv b) + (a mod b)`.
pub fn numeric_mod(dividend: &AtomicItem, divisor: &AtomicItem) -> Result<AtomicItem, MetapathError> {
    let op = ArithmeticOp::Mod;
    if let (AtomicItem::Integer(a), AtomicItem::Integer(b)) = (dividend, divisor) {
        if *b == 0 {
            return Err(MetapathError::DivideByZero);
        }
        // i64::MIN % -1 overflows in Rust but is mathematically zero
        return Ok(AtomicItem::Integer(a.checked_rem(*b).unwrap_or(0)));
    }

    let (a, b) = (numeric_operand(op, dividend)?, numeric_operand(op, divisor)?);
    if b.is_zero() {
        return Err(MetapathError::DivideByZero);
    }
    a.checked_rem(b)
        .map(AtomicItem::Decimal)
        .ok_or_else(|| overflow(op))
}

fn numeric_operand(op: ArithmeticOp, value: &AtomicItem) -> Result<Decimal, MetapathError> {
    value.as_decimal().ok_or_else(|| {
        MetapathError::type_error(format!(
            "'{}' requires numeric operands, got {}",
            op.symbol(),
            value.type_name()
        ))
    })
}

/// Unary minus.
pub fn negate(value: &AtomicItem) -> Result<AtomicItem, MetapathError> {
    let overflow = || MetapathError::overflow(format!("cannot negate {}", value));
    match value {
        AtomicItem::Integer(i) => i.checked_neg().map(AtomicItem::Integer).ok_or_else(overflow),
        AtomicItem::Decimal(d) => Ok(AtomicItem::Decimal(-*d)),
        AtomicItem::DayTimeDuration(d) => d.negate().map(AtomicItem::DayTimeDuration).ok_or_else(overflow),
        AtomicItem::YearMonthDuration(d) => {
            d.negate().map(AtomicItem::YearMonthDuration).ok_or_else(overflow)
        }
        other => Err(MetapathError::type_error(format!(
            "unary '-' is not defined for {}",
            other.type_name()
        ))),
    }
}
