use indexmap::IndexSet;
use metapath_types::{AtomicItem, Decimal};

use super::{
    FunctionLibrary, argument_or_context, required_atomic, required_integer, rounded_number,
};
use crate::context::{DynamicContext, FUNCTIONS_NS};
use crate::error::MetapathError;
use crate::types::{Item, Sequence};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "count", 1, Some(1), fn_count);
    library.add(FUNCTIONS_NS, "empty", 1, Some(1), fn_empty);
    library.add(FUNCTIONS_NS, "exists", 1, Some(1), fn_exists);
    library.add(FUNCTIONS_NS, "head", 1, Some(1), fn_head);
    library.add(FUNCTIONS_NS, "tail", 1, Some(1), fn_tail);
    library.add(FUNCTIONS_NS, "reverse", 1, Some(1), fn_reverse);
    library.add(FUNCTIONS_NS, "distinct-values", 1, Some(1), fn_distinct_values);
    library.add(FUNCTIONS_NS, "index-of", 2, Some(2), fn_index_of);
    library.add(FUNCTIONS_NS, "insert-before", 3, Some(3), fn_insert_before);
    library.add(FUNCTIONS_NS, "remove", 2, Some(2), fn_remove);
    library.add(FUNCTIONS_NS, "subsequence", 2, Some(3), fn_subsequence);
    library.add(FUNCTIONS_NS, "exactly-one", 1, Some(1), fn_exactly_one);
    library.add(FUNCTIONS_NS, "one-or-more", 1, Some(1), fn_one_or_more);
    library.add(FUNCTIONS_NS, "zero-or-one", 1, Some(1), fn_zero_or_one);
    library.add(FUNCTIONS_NS, "data", 0, Some(1), fn_data);
}

fn fn_count<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::integer(args[0].len() as i64))
}

fn fn_empty<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(args[0].is_empty()))
}

fn fn_exists<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(!args[0].is_empty()))
}

fn fn_head<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(args[0].first().cloned().map(Sequence::from_item).unwrap_or_default())
}

fn fn_tail<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(args[0].iter().skip(1).cloned().collect())
}

fn fn_reverse<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(args[0].iter().rev().cloned().collect())
}

/// First occurrence of each value, compared by key identity so `1` and
/// `1.0` collapse to the first of them.
fn fn_distinct_values<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let distinct: IndexSet<AtomicItem> = args[0].atomize()?.into_iter().collect();
    Ok(Sequence::from_atomics(distinct))
}

fn fn_index_of<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let search = required_atomic(&args[1], "index-of")?;
    let tz = ctx.implicit_timezone();
    let mut positions = Sequence::empty();
    for (index, value) in args[0].atomize()?.iter().enumerate() {
        // values that cannot be compared never match
        if value.value_equals(&search, tz).unwrap_or(false) {
            positions.push(Item::Atomic(AtomicItem::Integer(index as i64 + 1)));
        }
    }
    Ok(positions)
}

fn fn_insert_before<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let inserts = args.remove(2);
    let position = required_integer(&args[1], "insert-before")?;
    let mut items = args.remove(0).into_items();
    let at = usize::try_from(position.saturating_sub(1)).unwrap_or(0).min(items.len());
    let tail = items.split_off(at);
    items.extend(inserts);
    items.extend(tail);
    Ok(Sequence::from_items(items))
}

fn fn_remove<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let position = required_integer(&args[1], "remove")?;
    Ok(args[0]
        .iter()
        .enumerate()
        .filter(|(index, _)| *index as i64 + 1 != position)
        .map(|(_, item)| item.clone())
        .collect())
}

fn fn_subsequence<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let start = rounded_number(&args[1], "subsequence")?;
    let end = match args.get(2) {
        Some(length) => Some(start.saturating_add(rounded_number(length, "subsequence")?)),
        None => None,
    };
    Ok(args[0]
        .iter()
        .enumerate()
        .filter(|(index, _)| {
            let position = Decimal::from(index + 1);
            position >= start && end.is_none_or(|end| position < end)
        })
        .map(|(_, item)| item.clone())
        .collect())
}

fn cardinality_error(function: &str, expected: &str, actual: usize) -> MetapathError {
    MetapathError::function(
        function,
        format!("expected {} item(s), got {}", expected, actual),
    )
}

fn fn_exactly_one<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    match args[0].len() {
        1 => Ok(args.remove(0)),
        n => Err(cardinality_error("exactly-one", "exactly one", n)),
    }
}

fn fn_one_or_more<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    match args[0].len() {
        0 => Err(cardinality_error("one-or-more", "one or more", 0)),
        _ => Ok(args.remove(0)),
    }
}

fn fn_zero_or_one<'t>(
    _ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    match args[0].len() {
        0 | 1 => Ok(args.remove(0)),
        n => Err(cardinality_error("zero-or-one", "at most one", n)),
    }
}

fn fn_data<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let value = argument_or_context(ctx, args)?;
    Ok(Sequence::from_atomics(value.atomize()?))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval_str, value};
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("count((1, 2, 3))", "3")]
    #[case("count(())", "0")]
    #[case("head((4, 5))", "4")]
    #[case("head(())", "()")]
    #[case("tail((4, 5, 6))", "(5, 6)")]
    #[case("reverse((1, 2, 3))", "(3, 2, 1)")]
    #[case("distinct-values((1, 2, 1.0, 'a', 'a'))", "(1, 2, 'a')")]
    #[case("index-of((10, 20, 10), 10)", "(1, 3)")]
    #[case("index-of(('a', 1), 1)", "2")]
    #[case("insert-before(('a', 'b'), 2, 'x')", "('a', 'x', 'b')")]
    #[case("insert-before(('a', 'b'), 0, 'x')", "('x', 'a', 'b')")]
    #[case("insert-before(('a', 'b'), 9, 'x')", "('a', 'b', 'x')")]
    #[case("remove(('a', 'b', 'c'), 2)", "('a', 'c')")]
    #[case("remove(('a', 'b'), 5)", "('a', 'b')")]
    #[case("subsequence((1, 2, 3, 4, 5), 4)", "(4, 5)")]
    #[case("subsequence((1, 2, 3, 4, 5), 3, 2)", "(3, 4)")]
    #[case("subsequence((1, 2, 3, 4, 5), 0, 2)", "1")]
    #[case("subsequence((1, 2, 3), 1.5, 1.4)", "2")]
    #[case("data((1, 'a'))", "(1, 'a')")]
    fn test_sequence_functions(#[case] expr: &str, #[case] expected: &str) {
        assert_eq!(value(expr), value(expected), "{}", expr);
    }

    #[test]
    fn test_empty_and_exists() {
        assert_eq!(value("empty(())"), Sequence::boolean(true));
        assert_eq!(value("exists(())"), Sequence::boolean(false));
        assert_eq!(value("exists((0))"), Sequence::boolean(true));
    }

    #[test]
    fn test_cardinality_checks() {
        assert_eq!(value("exactly-one(1)"), Sequence::integer(1));
        assert_eq!(value("zero-or-one(())"), Sequence::empty());
        assert_eq!(value("one-or-more((1, 2))"), value("(1, 2)"));
        assert!(matches!(eval_str("exactly-one((1, 2))"), Err(MetapathError::Function { .. })));
        assert!(matches!(eval_str("one-or-more(())"), Err(MetapathError::Function { .. })));
        assert!(matches!(eval_str("zero-or-one((1, 2))"), Err(MetapathError::Function { .. })));
    }
}
