use std::cmp::Ordering;

use metapath_types::{AtomicItem, Decimal};
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;

use super::{FunctionLibrary, required_integer};
use crate::ast::ArithmeticOp;
use crate::context::{DynamicContext, FUNCTIONS_NS, OPERATORS_NS};
use crate::error::MetapathError;
use crate::operators;
use crate::types::Sequence;

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "abs", 1, Some(1), fn_abs);
    library.add(FUNCTIONS_NS, "ceiling", 1, Some(1), fn_ceiling);
    library.add(FUNCTIONS_NS, "floor", 1, Some(1), fn_floor);
    library.add(FUNCTIONS_NS, "round", 1, Some(2), fn_round);
    library.add(FUNCTIONS_NS, "sum", 1, Some(2), fn_sum);
    library.add(FUNCTIONS_NS, "avg", 1, Some(1), fn_avg);
    library.add(FUNCTIONS_NS, "min", 1, Some(1), fn_min);
    library.add(FUNCTIONS_NS, "max", 1, Some(1), fn_max);
    library.add(FUNCTIONS_NS, "idiv", 2, Some(2), fn_idiv);
    library.add(FUNCTIONS_NS, "mod", 2, Some(2), fn_mod);
    library.add(OPERATORS_NS, "numeric-integer-divide", 2, Some(2), op_numeric_integer_divide);
    library.add(OPERATORS_NS, "numeric-mod", 2, Some(2), op_numeric_mod);
}

/// The optional numeric argument of `function`.
fn numeric_arg(value: &Sequence<'_>, function: &str) -> Result<Option<AtomicItem>, MetapathError> {
    match value.atomize_optional(function)? {
        Some(n) if !n.is_numeric() => Err(MetapathError::type_error(format!(
            "{} requires a numeric argument, got {}",
            function,
            n.type_name()
        ))),
        other => Ok(other),
    }
}

/// Applies `on_decimal` to decimals; integers pass through `on_integer`.
fn unary_numeric<'t>(
    args: &[Sequence<'t>],
    function: &str,
    on_integer: impl FnOnce(i64) -> Option<i64>,
    on_decimal: impl FnOnce(Decimal) -> Decimal,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(match numeric_arg(&args[0], function)? {
        None => Sequence::empty(),
        Some(AtomicItem::Integer(i)) => on_integer(i)
            .map(Sequence::integer)
            .ok_or_else(|| MetapathError::overflow(format!("{}({}) is out of range", function, i)))?,
        Some(AtomicItem::Decimal(d)) => Sequence::from(AtomicItem::Decimal(on_decimal(d))),
        Some(other) => {
            return Err(MetapathError::type_error(format!(
                "{} is not defined for {}",
                function,
                other.type_name()
            )));
        }
    })
}

fn fn_abs<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    unary_numeric(&args, "abs", i64::checked_abs, |d| d.abs())
}

fn fn_ceiling<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    unary_numeric(&args, "ceiling", Some, |d| d.ceil())
}

fn fn_floor<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    unary_numeric(&args, "floor", Some, |d| d.floor())
}

/// Rounds to `precision` decimal places, halves going towards positive
/// infinity. A negative precision rounds to a power of ten.
pub(crate) fn round_half_up(value: Decimal, precision: i64) -> Result<Decimal, MetapathError> {
    let strategy = if value.is_sign_negative() {
        RoundingStrategy::MidpointTowardZero
    } else {
        RoundingStrategy::MidpointAwayFromZero
    };
    if precision >= 0 {
        let places = u32::try_from(precision).unwrap_or(u32::MAX).min(28);
        return Ok(value.round_dp_with_strategy(places, strategy));
    }
    let out_of_range = || MetapathError::overflow(format!("round({}, {})", value, precision));
    if precision < -28 {
        return Ok(Decimal::ZERO);
    }
    let mut scale = Decimal::ONE;
    for _ in 0..precision.unsigned_abs() {
        scale = scale.checked_mul(Decimal::TEN).ok_or_else(out_of_range)?;
    }
    let shifted = value.checked_div(scale).ok_or_else(out_of_range)?;
    shifted
        .round_dp_with_strategy(0, strategy)
        .checked_mul(scale)
        .ok_or_else(out_of_range)
}

fn fn_round<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let precision = match args.get(1) {
        Some(precision) => required_integer(precision, "round")?,
        None => 0,
    };
    Ok(match numeric_arg(&args[0], "round")? {
        None => Sequence::empty(),
        Some(AtomicItem::Integer(i)) if precision >= 0 => Sequence::integer(i),
        Some(AtomicItem::Integer(i)) => {
            let rounded = round_half_up(Decimal::from(i), precision)?;
            let rounded = rounded
                .to_i64()
                .ok_or_else(|| MetapathError::overflow(format!("round({}, {})", i, precision)))?;
            Sequence::integer(rounded)
        }
        Some(AtomicItem::Decimal(d)) => Sequence::from(AtomicItem::Decimal(round_half_up(d, precision)?)),
        Some(other) => {
            return Err(MetapathError::type_error(format!(
                "round is not defined for {}",
                other.type_name()
            )));
        }
    })
}

fn fn_sum<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let values = args[0].atomize()?;
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Ok(args.get(1).cloned().unwrap_or_else(|| Sequence::integer(0)));
    };
    let tz = ctx.implicit_timezone();
    let total = values.try_fold(first, |total, value| {
        operators::arithmetic_atomic(ArithmeticOp::Add, &total, &value, tz)
    })?;
    Ok(Sequence::from(total))
}

fn fn_avg<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let values = args[0].atomize()?;
    let count = values.len();
    let mut values = values.into_iter();
    let Some(first) = values.next() else {
        return Ok(Sequence::empty());
    };
    let tz = ctx.implicit_timezone();
    let total = values.try_fold(first, |total, value| {
        operators::arithmetic_atomic(ArithmeticOp::Add, &total, &value, tz)
    })?;
    let count = AtomicItem::Integer(i64::try_from(count).unwrap_or(i64::MAX));
    operators::arithmetic_atomic(ArithmeticOp::Divide, &total, &count, tz).map(Sequence::from)
}

fn extreme<'t>(
    ctx: &DynamicContext<'t>,
    args: &[Sequence<'t>],
    keep: Ordering,
) -> Result<Sequence<'t>, MetapathError> {
    let tz = ctx.implicit_timezone();
    let mut best: Option<AtomicItem> = None;
    for value in args[0].atomize()? {
        best = Some(match best {
            Some(current) if value.compare(&current, tz)? != keep => current,
            _ => value,
        });
    }
    Ok(best.map(Sequence::from).unwrap_or_default())
}

fn fn_min<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    extreme(ctx, &args, Ordering::Less)
}

fn fn_max<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    extreme(ctx, &args, Ordering::Greater)
}

fn binary_numeric<'t>(
    args: &[Sequence<'t>],
    function: &str,
    apply: fn(&AtomicItem, &AtomicItem) -> Result<AtomicItem, MetapathError>,
) -> Result<Sequence<'t>, MetapathError> {
    match (numeric_arg(&args[0], function)?, numeric_arg(&args[1], function)?) {
        (Some(dividend), Some(divisor)) => apply(&dividend, &divisor).map(Sequence::from),
        _ => Ok(Sequence::empty()),
    }
}

fn op_numeric_integer_divide<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    binary_numeric(&args, "numeric-integer-divide", operators::numeric_integer_divide)
}

fn fn_idiv<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    binary_numeric(&args, "idiv", operators::numeric_integer_divide)
}

fn fn_mod<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    binary_numeric(&args, "mod", operators::numeric_mod)
}

fn op_numeric_mod<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    binary_numeric(&args, "numeric-mod", operators::numeric_mod)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval_str, value};
    use super::*;
    use rstest::rstest;

    fn dec(text: &str) -> Sequence<'static> {
        Sequence::from(AtomicItem::Decimal(text.parse().unwrap()))
    }

    #[rstest]
    #[case("abs(-3)", "3")]
    #[case("abs(-2.5)", "2.5")]
    #[case("ceiling(2.1)", "3")]
    #[case("ceiling(-2.1)", "-2")]
    #[case("floor(-2.1)", "-3")]
    #[case("round(2.5)", "3")]
    #[case("round(-2.5)", "-2")]
    #[case("round(-2.51)", "-3")]
    #[case("round(3.14159, 2)", "3.14")]
    #[case("round(1.125, 2)", "1.13")]
    fn test_decimal_rounding(#[case] expr: &str, #[case] expected: &str) {
        let result = value(expr);
        let expected: Decimal = expected.parse().unwrap();
        let actual = result.first().and_then(|item| item.as_atomic()).and_then(AtomicItem::as_decimal);
        assert_eq!(actual, Some(expected), "{}", expr);
    }

    #[test]
    fn test_integer_rounding_keeps_integers() {
        assert_eq!(value("round(7)"), Sequence::integer(7));
        assert_eq!(value("round(1250, -2)"), Sequence::integer(1300));
        assert_eq!(value("round(-1250, -2)"), Sequence::integer(-1200));
        assert_eq!(value("abs(-4)"), Sequence::integer(4));
    }

    #[test]
    fn test_empty_arguments() {
        assert!(value("abs(())").is_empty());
        assert!(value("round(())").is_empty());
        assert!(value("avg(())").is_empty());
        assert!(value("max(())").is_empty());
        assert_eq!(value("sum(())"), Sequence::integer(0));
        assert_eq!(value("sum((), 'none')"), Sequence::string("none"));
    }

    #[test]
    fn test_aggregates() {
        assert_eq!(value("sum((1, 2, 3))"), Sequence::integer(6));
        assert_eq!(value("sum((1, 2.5))"), dec("3.5"));
        assert_eq!(value("avg((1, 2))"), dec("1.5"));
        assert_eq!(value("max((3, 1, 2))"), Sequence::integer(3));
        assert_eq!(value("min((3, 1, 2))"), Sequence::integer(1));
        assert_eq!(value("max(('b', 'a'))"), Sequence::string("b"));
        assert!(matches!(eval_str("max((1, 'a'))"), Err(MetapathError::TypeError(_))));
    }

    #[test]
    fn test_non_numeric_argument() {
        assert!(matches!(eval_str("abs('1')"), Err(MetapathError::TypeError(_))));
    }

    #[test]
    fn test_abs_overflow() {
        let err = eval_str("abs(-9223372036854775807 - 1)").unwrap_err();
        assert!(matches!(err, MetapathError::ArithmeticOverflow(_)));
    }

    #[rstest]
    #[case("op:numeric-integer-divide(10, 3)", 3)]
    #[case("op:numeric-integer-divide(3, -2)", -1)]
    #[case("op:numeric-integer-divide(-3, 2)", -1)]
    #[case("op:numeric-integer-divide(-3, -2)", 1)]
    #[case("op:numeric-integer-divide(9.0, 3)", 3)]
    #[case("op:numeric-integer-divide(-3.5, 3)", -1)]
    #[case("op:numeric-mod(5, 3)", 2)]
    #[case("op:numeric-mod(6, -2)", 0)]
    #[case("op:numeric-mod(123, 6)", 3)]
    #[case("idiv(10, 3)", 3)]
    #[case("idiv(-3, 2)", -1)]
    #[case("fn:idiv(-3.5, 3)", -1)]
    #[case("mod(5, 3)", 2)]
    #[case("mod(-5, 3)", -2)]
    #[case("fn:mod(6, -2)", 0)]
    fn test_operator_functions(#[case] expr: &str, #[case] expected: i64) {
        assert_eq!(value(expr), Sequence::integer(expected));
    }

    #[test]
    fn test_decimal_mod() {
        assert_eq!(value("op:numeric-mod(4.5, 1.2)"), dec("0.9"));
        assert_eq!(
            eval_str("op:numeric-mod(1, 0)"),
            Err(MetapathError::DivideByZero)
        );
    }

    #[test]
    fn test_idiv_and_mod_by_name() {
        assert_eq!(value("mod(4.5, 1.2)"), dec("0.9"));
        assert_eq!(eval_str("idiv(1, 0)"), Err(MetapathError::DivideByZero));
        assert!(value("idiv((), 3)").is_empty());
        assert!(matches!(eval_str("mod('5', 3)"), Err(MetapathError::TypeError(_))));
        assert_eq!(value("10 => idiv(3)"), Sequence::integer(3));
    }
}
