use super::FunctionLibrary;
use crate::context::{DynamicContext, FUNCTIONS_NS};
use crate::error::MetapathError;
use crate::types::Sequence;

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "true", 0, Some(0), fn_true);
    library.add(FUNCTIONS_NS, "false", 0, Some(0), fn_false);
    library.add(FUNCTIONS_NS, "not", 1, Some(1), fn_not);
    library.add(FUNCTIONS_NS, "boolean", 1, Some(1), fn_boolean);
}

fn fn_true<'t>(
    _ctx: &DynamicContext<'t>,
    _args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(true))
}

fn fn_false<'t>(
    _ctx: &DynamicContext<'t>,
    _args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(false))
}

fn fn_not<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(!args[0].effective_boolean_value()?))
}

fn fn_boolean<'t>(
    _ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(Sequence::boolean(args[0].effective_boolean_value()?))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{eval_str, value};
    use crate::error::MetapathError;
    use crate::types::Sequence;
    use rstest::rstest;

    #[rstest]
    #[case("true()", true)]
    #[case("false()", false)]
    #[case("not(())", true)]
    #[case("not(0)", true)]
    #[case("not('a')", false)]
    #[case("boolean(0.0)", false)]
    #[case("boolean('false')", true)]
    #[case("boolean((1, 2)[. > 5])", false)]
    fn test_boolean_functions(#[case] expr: &str, #[case] expected: bool) {
        assert_eq!(value(expr), Sequence::boolean(expected));
    }

    #[test]
    fn test_boolean_of_multiple_atomics() {
        assert!(matches!(eval_str("boolean((1, 2))"), Err(MetapathError::TypeError(_))));
    }
}
