mod common;

use std::sync::Arc;

use common::{CATALOG_NS, TestResult, catalog_context, catalog_tree, eval_at, init_logging};
use metapath::{
    DynamicContext, FunctionDefinition, FunctionLibrary, Item, MetapathError, MetapathExpression,
    Sequence, StaticContext,
};
use rstest::rstest;

fn strings(values: &[&str]) -> Sequence<'static> {
    values.iter().map(|v| Item::from(metapath::AtomicItem::string(*v))).collect()
}

#[rstest]
#[case("count(//control)", Sequence::integer(3))]
#[case("count(/catalog/group)", Sequence::integer(2))]
#[case("//control[@id = 'ac-2']/title/string()", Sequence::string("Account Management"))]
#[case("/catalog/group[2]/control/@id/string()", Sequence::string("au-1"))]
#[case("(//control)[last()]/@id/string()", Sequence::string("au-1"))]
#[case("//title[. = 'Policy']/../@id/string()", Sequence::string("ac-1"))]
#[case("sum(//prop[@name = 'priority']/@value)", Sequence::integer(4))]
#[case("max(//prop/@value) - min(//prop/@value)", Sequence::integer(2))]
#[case("(//prop/@value)[1] * 2", Sequence::integer(6))]
#[case("string-join(//control/@id, ', ')", Sequence::string("ac-1, ac-2, au-1"))]
#[case("oscal:catalog/oscal:metadata/oscal:version = '1.2'", Sequence::boolean(true))]
#[case("exists(//control[not(prop)])", Sequence::boolean(true))]
#[case("every $c in //control satisfies starts-with($c/@id, $c/../@id)", Sequence::boolean(true))]
#[case("map { 'groups': count(//group) }?groups", Sequence::integer(2))]
#[case("/catalog/@id || '-' || count(//control)", Sequence::string("cat-3"))]
fn test_catalog_query(#[case] text: &str, #[case] expected: Sequence<'static>) {
    init_logging();
    let tree = catalog_tree();
    let result = eval_at(&tree, &catalog_context(), text).unwrap();
    assert_eq!(result, expected, "{}", text);
}

#[rstest]
#[case("//control[last()]/@id ! string()", &["ac-2", "au-1"])]
#[case("//control[prop]/@id ! string()", &["ac-2", "au-1"])]
#[case("//control[@id = 'au-1']/ancestor::* ! local-name()", &["catalog", "group"])]
#[case("//control/following-sibling::control/@id ! string()", &["ac-2"])]
#[case("reverse(//group/@id) ! string()", &["au", "ac"])]
#[case("for-each(//group, function($g) { string(count($g/control)) })", &["2", "1"])]
#[case("//control ! path()", &[
    "/catalog/group[1]/control[1]",
    "/catalog/group[1]/control[2]",
    "/catalog/group[2]/control",
])]
fn test_catalog_query_strings(#[case] text: &str, #[case] expected: &[&str]) {
    let tree = catalog_tree();
    let result = eval_at(&tree, &catalog_context(), text).unwrap();
    assert_eq!(result, strings(expected), "{}", text);
}

#[test]
fn test_unprefixed_names_without_default_namespace() -> TestResult {
    let tree = catalog_tree();
    let result = eval_at(&tree, &StaticContext::default(), "count(/catalog/group/control)")?;
    assert_eq!(result, Sequence::integer(3));
    Ok(())
}

#[test]
fn test_namespace_mismatch_selects_nothing() -> TestResult {
    let tree = catalog_tree();
    let static_context = StaticContext::builder()
        .default_model_namespace("urn:elsewhere")
        .build();
    assert!(eval_at(&tree, &static_context, "/catalog")?.is_empty());
    assert_eq!(
        eval_at(&tree, &static_context, "count(/Q{http://csrc.nist.gov/ns/oscal/1.0}catalog)")?,
        Sequence::integer(1)
    );
    Ok(())
}

#[test]
fn test_typed_flags_are_not_promoted_in_comparisons() -> TestResult {
    let tree = catalog_tree();
    let static_context = catalog_context();
    assert!(matches!(
        eval_at(&tree, &static_context, "//prop[@value = '3']"),
        Err(MetapathError::TypeError(_))
    ));
    assert_eq!(
        eval_at(&tree, &static_context, "count(//prop[@value = 3])")?,
        Sequence::integer(1)
    );
    assert_eq!(
        eval_at(&tree, &static_context, "count(//prop[string(@value) = '3'])")?,
        Sequence::integer(1)
    );
    Ok(())
}

#[test]
fn test_unbound_prefix() {
    let tree = catalog_tree();
    assert!(matches!(
        eval_at(&tree, &StaticContext::default(), "/nope:catalog"),
        Err(MetapathError::InvalidValue(_))
    ));
}

#[test]
fn test_typed_results() -> TestResult {
    let tree = catalog_tree();
    let static_context = catalog_context();
    let focus = || Some(Item::Node(tree.root()));

    let controls = MetapathExpression::compile("//control", &static_context)?;
    let ctx = controls.dynamic_context(Default::default());
    let nodes = controls.evaluate_as_nodes(focus(), &ctx)?;
    assert_eq!(nodes.len(), 3);
    assert!(nodes.windows(2).all(|pair| pair[0] < pair[1]));

    let title = MetapathExpression::compile("/catalog/metadata/title", &static_context)?;
    assert_eq!(title.evaluate_as_string(focus(), &ctx)?, "Sample");

    let has_audit = MetapathExpression::compile("//group[@id = 'au']", &static_context)?;
    assert!(has_audit.evaluate_as_boolean(focus(), &ctx)?);
    Ok(())
}

fn namespace_of<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let node = match args.first() {
        Some(arg) => arg.exactly_one("namespace-of")?.clone(),
        None => ctx.context_item()?.clone(),
    };
    match node {
        Item::Node(node) => Ok(Sequence::string(
            node.qualified_name().namespace.clone().unwrap_or_default(),
        )),
        other => Err(MetapathError::type_error(format!(
            "namespace-of requires a node, got {}",
            other.type_name()
        ))),
    }
}

#[test]
fn test_user_registered_function() -> TestResult {
    let tree = catalog_tree();
    let mut library = FunctionLibrary::builtin();
    library.register(FunctionDefinition::new(
        "urn:example:ext",
        "namespace-of",
        0,
        Some(1),
        namespace_of,
    ));
    let static_context = StaticContext::builder()
        .namespace("ext", "urn:example:ext")
        .build();

    let expr = MetapathExpression::compile("/catalog ! ext:namespace-of()", &static_context)?;
    let ctx = expr
        .dynamic_context(Default::default())
        .with_functions(Arc::new(library));
    assert_eq!(
        expr.evaluate(Some(Item::Node(tree.root())), &ctx)?,
        Sequence::string(CATALOG_NS)
    );

    // the standard library does not know the extension
    let plain = DynamicContext::new(static_context);
    assert!(matches!(
        expr.evaluate(Some(Item::Node(tree.root())), &plain),
        Err(MetapathError::UndefinedFunction { .. })
    ));
    Ok(())
}
