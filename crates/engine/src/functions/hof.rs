use metapath_types::AtomicItem;

use super::FunctionLibrary;
use crate::context::{DynamicContext, FUNCTIONS_NS};
use crate::engine::call_item;
use crate::error::MetapathError;
use crate::types::{Item, Sequence};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "for-each", 2, Some(2), fn_for_each);
    library.add(FUNCTIONS_NS, "filter", 2, Some(2), fn_filter);
    library.add(FUNCTIONS_NS, "fold-left", 3, Some(3), fn_fold_left);
    library.add(FUNCTIONS_NS, "function-arity", 1, Some(1), fn_function_arity);
}

/// The single function-like item in `value`.
fn function_arg<'a, 't>(
    value: &'a Sequence<'t>,
    function: &str,
) -> Result<&'a Item<'t>, MetapathError> {
    let item = value.exactly_one(function)?;
    match item {
        Item::Function(_) | Item::Map(_) | Item::Array(_) => Ok(item),
        other => Err(MetapathError::type_error(format!(
            "{} requires a function, got {}",
            function,
            other.type_name()
        ))),
    }
}

fn fn_for_each<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let action = function_arg(&args[1], "for-each")?;
    let mut result = Sequence::empty();
    for item in args[0].iter() {
        result.extend(call_item(action, vec![Sequence::from_item(item.clone())], ctx)?);
    }
    Ok(result)
}

fn fn_filter<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let predicate = function_arg(&args[1], "filter")?;
    let mut result = Sequence::empty();
    for item in args[0].iter() {
        let verdict = call_item(predicate, vec![Sequence::from_item(item.clone())], ctx)?;
        match verdict.items() {
            [Item::Atomic(AtomicItem::Boolean(true))] => result.push(item.clone()),
            [Item::Atomic(AtomicItem::Boolean(false))] => {}
            _ => {
                return Err(MetapathError::type_error(format!(
                    "filter predicate must return a single boolean, got {}",
                    verdict
                )));
            }
        }
    }
    Ok(result)
}

fn fn_fold_left<'t>(
    ctx: &DynamicContext<'t>,
    mut args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let action = args.remove(2);
    let action = function_arg(&action, "fold-left")?;
    let zero = args.remove(1);
    args[0].iter().try_fold(zero, |accumulated, item| {
        call_item(action, vec![accumulated, Sequence::from_item(item.clone())], ctx)
    })
}

fn fn_function_arity<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let arity = match function_arg(&args[0], "function-arity")? {
        Item::Function(function) => function.arity(),
        _ => 1,
    };
    Ok(Sequence::integer(arity as i64))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval_str, value};
    use super::*;

    #[test]
    fn test_for_each_and_filter() {
        assert_eq!(value("for-each(1 to 3, function($n) { $n * $n })"), value("(1, 4, 9)"));
        assert_eq!(
            value("filter(1 to 6, function($n) { $n mod 2 = 0 })"),
            value("(2, 4, 6)")
        );
        assert_eq!(value("for-each(('a', 'b'), upper-case#1)"), value("('A', 'B')"));
    }

    #[test]
    fn test_filter_requires_boolean() {
        assert!(matches!(
            eval_str("filter(1 to 3, function($n) { $n })"),
            Err(MetapathError::TypeError(_))
        ));
    }

    #[test]
    fn test_fold_left() {
        assert_eq!(
            value("fold-left(1 to 5, 0, function($sum, $n) { $sum + $n })"),
            Sequence::integer(15)
        );
        assert_eq!(
            value("fold-left(('a', 'b', 'c'), '', concat#2)"),
            Sequence::string("abc")
        );
        assert_eq!(value("fold-left((), 7, concat#2)"), Sequence::integer(7));
    }

    #[test]
    fn test_function_arity() {
        assert_eq!(value("function-arity(substring#3)"), Sequence::integer(3));
        assert_eq!(value("function-arity(function($a, $b) { () })"), Sequence::integer(2));
        assert_eq!(value("function-arity(map { 1: 2 })"), Sequence::integer(1));
        assert!(matches!(eval_str("function-arity(1)"), Err(MetapathError::TypeError(_))));
    }

    #[test]
    fn test_maps_and_arrays_as_functions() {
        assert_eq!(value("for-each((1, 2), map { 1: 'x', 2: 'y' })"), value("('x', 'y')"));
        assert_eq!(value("for-each((2, 1), ['p', 'q'])"), value("('q', 'p')"));
    }
}
