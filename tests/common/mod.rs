#![allow(dead_code)]

use metapath::{
    AtomicItem, DynamicContext, EvaluationConfig, Item, MetapathExpression, NodeItemTree, QName,
    Sequence, StaticContext, TreeBuilder,
};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const CATALOG_NS: &str = "http://csrc.nist.gov/ns/oscal/1.0";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A document with root `root` holding `field1` and `field2`, where `field2`
/// carries the flag `flag`.
pub fn simple_tree() -> NodeItemTree {
    let mut builder = TreeBuilder::document("root");
    let root = builder.root();
    builder
        .add_field(root, "field1", AtomicItem::string("one"))
        .expect("field1");
    let field2 = builder
        .add_field(root, "field2", AtomicItem::string("two"))
        .expect("field2");
    builder
        .add_flag(field2, "flag", AtomicItem::string("yes"))
        .expect("flag");
    builder.build()
}

/// A namespaced catalog:
///
/// ```text
/// catalog @id=cat
///   metadata { title "Sample", version "1.2" }
///   group @id=ac
///     control @id=ac-1 { title "Policy" }
///     control @id=ac-2 { title "Account Management", prop @name=priority @value=3 }
///   group @id=au
///     control @id=au-1 { title "Audit Policy", prop @name=priority @value=1 }
/// ```
pub fn catalog_tree() -> NodeItemTree {
    let name = |local: &str| QName::new(Some(CATALOG_NS), local);
    let mut builder = TreeBuilder::document(name("catalog"));
    let catalog = builder.root();
    builder.add_flag(catalog, "id", AtomicItem::string("cat")).expect("id");

    let metadata = builder.add_assembly(catalog, name("metadata")).expect("metadata");
    builder
        .add_field(metadata, name("title"), AtomicItem::string("Sample"))
        .expect("title");
    builder
        .add_field(metadata, name("version"), AtomicItem::string("1.2"))
        .expect("version");

    let groups: [(&str, &[(&str, &str, Option<i64>)]); 2] = [
        (
            "ac",
            &[
                ("ac-1", "Policy", None),
                ("ac-2", "Account Management", Some(3)),
            ],
        ),
        ("au", &[("au-1", "Audit Policy", Some(1))]),
    ];
    for (group_id, controls) in groups {
        let group = builder.add_assembly(catalog, name("group")).expect("group");
        builder.add_flag(group, "id", AtomicItem::string(group_id)).expect("id");
        for (id, title, priority) in controls {
            let control = builder.add_assembly(group, name("control")).expect("control");
            builder.add_flag(control, "id", AtomicItem::string(*id)).expect("id");
            builder
                .add_field(control, name("title"), AtomicItem::string(*title))
                .expect("title");
            if let Some(priority) = priority {
                let prop = builder.add_assembly(control, name("prop")).expect("prop");
                builder.add_flag(prop, "name", AtomicItem::string("priority")).expect("name");
                builder
                    .add_flag(prop, "value", AtomicItem::Integer(*priority))
                    .expect("value");
            }
        }
    }
    builder.build()
}

/// Static context binding `oscal` to the catalog namespace and making it the
/// default for unprefixed names.
pub fn catalog_context() -> StaticContext {
    StaticContext::builder()
        .namespace("oscal", CATALOG_NS)
        .default_model_namespace(CATALOG_NS)
        .build()
}

/// A `count` wide tree of `item` fields under `root`, each with an `n` flag.
pub fn wide_tree(count: i64) -> NodeItemTree {
    let mut builder = TreeBuilder::document("root");
    let root = builder.root();
    for n in 1..=count {
        let item = builder
            .add_assembly(root, "item")
            .expect("item");
        builder.add_flag(item, "n", AtomicItem::Integer(n)).expect("n");
        builder
            .add_field(item, "label", AtomicItem::string(format!("item {}", n)))
            .expect("label");
    }
    builder.build()
}

/// Compiles and evaluates `text` with the document node of `tree` as focus.
pub fn eval_at<'t>(
    tree: &'t NodeItemTree,
    static_context: &StaticContext,
    text: &str,
) -> Result<Sequence<'t>, metapath::MetapathError> {
    let expr = MetapathExpression::compile(text, static_context)?;
    let ctx = expr.dynamic_context(EvaluationConfig::default());
    expr.evaluate(Some(Item::Node(tree.root())), &ctx)
}

/// Evaluates `text` without a focus.
pub fn eval_free(text: &str) -> Result<Sequence<'static>, metapath::MetapathError> {
    let expr = MetapathExpression::compile(text, &StaticContext::default())?;
    expr.evaluate(None, &DynamicContext::new(StaticContext::default()))
}
