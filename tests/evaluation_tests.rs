mod common;

use common::{TestResult, eval_at, eval_free, init_logging, simple_tree};
use metapath::{
    AtomicItem, DynamicContext, EvaluationConfig, Item, MetapathError, MetapathExpression,
    NodeItem, Sequence, StaticContext,
};
use rstest::rstest;

fn at<'t>(node: NodeItem<'t>, text: &str) -> Result<Sequence<'t>, MetapathError> {
    let expr = MetapathExpression::compile(text, &StaticContext::default())?;
    expr.evaluate(
        Some(Item::Node(node)),
        &DynamicContext::new(StaticContext::default()),
    )
}

fn child<'t>(node: NodeItem<'t>, name: &str) -> NodeItem<'t> {
    node.children()
        .find(|c| c.name() == name)
        .unwrap_or_else(|| panic!("no child {}", name))
}

#[test]
fn test_axis_navigation() -> TestResult {
    init_logging();
    let tree = simple_tree();
    let document = tree.root();
    let root = child(document, "root");
    let field1 = child(root, "field1");
    let field2 = child(root, "field2");
    let flag = field2.get_flag("flag").ok_or("flag missing")?;

    assert_eq!(at(field1, "../field2")?, Sequence::from_nodes([field2]));
    assert_eq!(at(field1, "parent::root")?, Sequence::from_nodes([root]));
    assert!(at(field1, "parent::other")?.is_empty());
    assert_eq!(at(document, "./root")?, Sequence::from_nodes([root]));
    assert_eq!(at(field2, "./@flag")?, Sequence::from_nodes([flag]));
    assert_eq!(at(root, "child::*")?, Sequence::from_nodes([field1, field2]));
    Ok(())
}

#[rstest]
#[case("10 idiv 3", 3)]
#[case("3 idiv -2", -1)]
#[case("-3 idiv 2", -1)]
#[case("-3 idiv -2", 1)]
#[case("9.0 idiv 3", 3)]
#[case("-3.5 idiv 3", -1)]
#[case("5 mod 3", 2)]
#[case("6 mod -2", 0)]
#[case("123 mod 6", 3)]
fn test_integer_division_and_modulo(#[case] text: &str, #[case] expected: i64) {
    assert_eq!(eval_free(text).unwrap(), Sequence::integer(expected));
}

#[test]
fn test_decimal_modulo() {
    assert_eq!(eval_free("4.5 mod 1.2").unwrap(), eval_free("0.9").unwrap());
}

#[test]
fn test_division_identity_over_signed_operands() {
    let holds = eval_free(
        "every $a in -12 to 12, $b in (-5, -3, -2, -1, 1, 2, 3, 5) \
         satisfies $a = $b * ($a idiv $b) + ($a mod $b)",
    )
    .unwrap();
    assert_eq!(holds, Sequence::boolean(true));
}

#[rstest]
fn test_or_is_total_and_commutative(
    #[values(true, false)] left: bool,
    #[values(true, false)] right: bool,
) {
    let text = format!("{}() or {}()", left, right);
    let swapped = format!("{}() or {}()", right, left);
    assert_eq!(eval_free(&text).unwrap(), Sequence::boolean(left || right));
    assert_eq!(eval_free(&text).unwrap(), eval_free(&swapped).unwrap());
}

#[test]
fn test_boundaries() {
    assert!(eval_free("5 to 3").unwrap().is_empty());
    assert!(eval_free("(1, 2, 3)[0]").unwrap().is_empty());
    assert_eq!(eval_free("() = 1").unwrap(), Sequence::boolean(false));
    assert_eq!(eval_free("1 = ()").unwrap(), Sequence::boolean(false));
    assert!(eval_free("() eq 1").unwrap().is_empty());
}

#[test]
fn test_error_scenarios() {
    init_logging();
    assert!(matches!(
        MetapathExpression::compile("@flag +", &StaticContext::default()),
        Err(MetapathError::SyntaxError { .. })
    ));
    assert_eq!(eval_free("1 idiv 0"), Err(MetapathError::DivideByZero));
    assert!(matches!(eval_free("(1, 2) eq 1"), Err(MetapathError::TypeError(_))));
    assert!(matches!(eval_free("'abc' cast as integer"), Err(MetapathError::InvalidValue(_))));
    assert!(matches!(
        eval_free("no-such-function(1)"),
        Err(MetapathError::UndefinedFunction { arity: 1, .. })
    ));
    assert!(matches!(
        eval_free("$missing"),
        Err(MetapathError::UndefinedVariable { .. })
    ));
}

#[test]
fn test_error_codes() {
    assert_eq!(eval_free("1 idiv 0").unwrap_err().code(), "FOAR0001");
    assert_eq!(
        MetapathExpression::compile("1 +", &StaticContext::default())
            .unwrap_err()
            .code(),
        "XPST0003"
    );
}

#[test]
fn test_evaluation_is_repeatable() -> TestResult {
    let tree = simple_tree();
    let expr = MetapathExpression::compile(
        "for $n in //* return (name($n), string-length(string($n)))",
        &StaticContext::default(),
    )?;
    let ctx = DynamicContext::new(StaticContext::default());
    let first = expr.evaluate(Some(Item::Node(tree.root())), &ctx)?;
    let second = expr.evaluate(Some(Item::Node(tree.root())), &ctx)?;
    assert_eq!(first, second);
    assert!(!first.is_empty());
    Ok(())
}

#[test]
fn test_variables_from_the_caller() -> TestResult {
    let tree = simple_tree();
    let expr =
        MetapathExpression::compile("//*[string() = $wanted] ! name()", &StaticContext::default())?;
    let ctx = DynamicContext::new(StaticContext::default())
        .with_variable("wanted", Sequence::string("two"));
    let result = expr.evaluate(Some(Item::Node(tree.root())), &ctx)?;
    assert_eq!(result, Sequence::string("field2"));
    Ok(())
}

#[test]
fn test_implicit_timezone_from_config() -> TestResult {
    let expr = MetapathExpression::compile(
        "('2024-01-01T12:00:00' cast as date-time) eq ('2024-01-01T10:00:00Z' cast as date-time)",
        &StaticContext::default(),
    )?;
    let utc = expr.dynamic_context(EvaluationConfig::default());
    assert!(!expr.evaluate_as_boolean(None, &utc)?);

    let plus_two = expr.dynamic_context(EvaluationConfig {
        implicit_timezone_minutes: 120,
        ..EvaluationConfig::default()
    });
    assert!(expr.evaluate_as_boolean(None, &plus_two)?);
    Ok(())
}

#[test]
fn test_range_limit_from_config() {
    let expr = MetapathExpression::compile("count(1 to 1000)", &StaticContext::default()).unwrap();
    let ctx = expr.dynamic_context(EvaluationConfig {
        max_range_length: 100,
        ..EvaluationConfig::default()
    });
    assert!(matches!(
        expr.evaluate(None, &ctx),
        Err(MetapathError::Function { ref function, .. }) if function == "to"
    ));
}

#[test]
fn test_atomize_fields_and_flags() {
    let tree = simple_tree();
    let static_context = StaticContext::default();
    assert_eq!(
        eval_at(&tree, &static_context, "data(/root/field2/@flag)").unwrap(),
        Sequence::from_atomics([AtomicItem::string("yes")])
    );
    assert!(matches!(
        eval_at(&tree, &static_context, "/root + 1"),
        Err(MetapathError::TypeError(_))
    ));
}
