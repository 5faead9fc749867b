use metapath_nodeitem::{MetapathPathFormatter, NodeItem};

use super::{FunctionLibrary, argument_or_context, optional_node};
use crate::context::{DynamicContext, FUNCTIONS_NS};
use crate::error::MetapathError;
use crate::types::{Item, Sequence};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.add(FUNCTIONS_NS, "position", 0, Some(0), fn_position);
    library.add(FUNCTIONS_NS, "last", 0, Some(0), fn_last);
    library.add(FUNCTIONS_NS, "name", 0, Some(1), fn_name);
    library.add(FUNCTIONS_NS, "local-name", 0, Some(1), fn_local_name);
    library.add(FUNCTIONS_NS, "root", 0, Some(1), fn_root);
    library.add(FUNCTIONS_NS, "path", 0, Some(1), fn_path);
    library.add(FUNCTIONS_NS, "has-children", 0, Some(1), fn_has_children);
}

fn fn_position<'t>(
    ctx: &DynamicContext<'t>,
    _args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let focus = ctx.focus().ok_or(MetapathError::NoContextItem)?;
    Ok(Sequence::integer(focus.position as i64))
}

fn fn_last<'t>(
    ctx: &DynamicContext<'t>,
    _args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let focus = ctx.focus().ok_or(MetapathError::NoContextItem)?;
    Ok(Sequence::integer(focus.size as i64))
}

/// The node named by the argument, or the context node.
fn node_or_context<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
    function: &str,
) -> Result<Option<NodeItem<'t>>, MetapathError> {
    let value = argument_or_context(ctx, args)?;
    optional_node(&value, function)
}

fn fn_name<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let name = node_or_context(ctx, args, "name")?
        .map(|node| node.name().to_string())
        .unwrap_or_default();
    Ok(Sequence::string(name))
}

fn fn_local_name<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let name = node_or_context(ctx, args, "local-name")?
        .map(|node| node.qualified_name().local_name.clone())
        .unwrap_or_default();
    Ok(Sequence::string(name))
}

fn fn_root<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(node_or_context(ctx, args, "root")?
        .map(|node| Sequence::from_item(Item::Node(node.document())))
        .unwrap_or_default())
}

fn fn_path<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    Ok(node_or_context(ctx, args, "path")?
        .map(|node| Sequence::string(node.path(&MetapathPathFormatter)))
        .unwrap_or_default())
}

fn fn_has_children<'t>(
    ctx: &DynamicContext<'t>,
    args: Vec<Sequence<'t>>,
) -> Result<Sequence<'t>, MetapathError> {
    let node = node_or_context(ctx, args, "has-children")?;
    Ok(Sequence::boolean(node.is_some_and(|node| node.has_children())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::engine::evaluate;
    use crate::parser::parse;
    use metapath_nodeitem::{NodeItemTree, QName, TreeBuilder};

    /// catalog { title, group { control @id=ac-1, control @id=ac-2 } }
    fn catalog() -> NodeItemTree {
        let ns = "http://example.com/catalog";
        let mut builder = TreeBuilder::document(QName::new(Some(ns), "catalog"));
        let root = builder.root();
        builder
            .add_field(root, QName::new(Some(ns), "title"), "Controls".into())
            .unwrap();
        let group = builder.add_assembly(root, QName::new(Some(ns), "group")).unwrap();
        for id in ["ac-1", "ac-2"] {
            let control = builder.add_assembly(group, QName::new(Some(ns), "control")).unwrap();
            builder.add_flag(control, "id", id.into()).unwrap();
        }
        builder.build()
    }

    fn run<'t>(tree: &'t NodeItemTree, text: &str) -> Result<Sequence<'t>, MetapathError> {
        let expr = build(&parse(text).unwrap()).unwrap();
        evaluate(&expr, &DynamicContext::default(), Some(Item::Node(tree.root())))
    }

    #[test]
    fn test_position_and_last() {
        let tree = catalog();
        assert_eq!(
            run(&tree, "//control[position() = last()]/@id/string()").unwrap(),
            Sequence::string("ac-2")
        );
        assert_eq!(
            run(&tree, "(//control)[1] ! (position(), last())").unwrap(),
            Sequence::from_atomics([1, 1].map(metapath_types::AtomicItem::Integer))
        );
    }

    #[test]
    fn test_position_without_focus() {
        let expr = build(&parse("position()").unwrap()).unwrap();
        let err = evaluate(&expr, &DynamicContext::default(), None).unwrap_err();
        assert_eq!(err, MetapathError::NoContextItem);
    }

    #[test]
    fn test_names() {
        let tree = catalog();
        assert_eq!(run(&tree, "/catalog/title/local-name()").unwrap(), Sequence::string("title"));
        assert_eq!(run(&tree, "local-name((//@id)[1])").unwrap(), Sequence::string("id"));
        assert_eq!(run(&tree, "/catalog/name()").unwrap(), Sequence::string("catalog"));
        assert_eq!(run(&tree, "name(())").unwrap(), Sequence::string(""));
        assert!(matches!(run(&tree, "name(1)"), Err(MetapathError::TypeError(_))));
    }

    #[test]
    fn test_root_and_has_children() {
        let tree = catalog();
        assert_eq!(
            run(&tree, "//control[1]/root()").unwrap(),
            Sequence::from_item(Item::Node(tree.root()))
        );
        assert_eq!(run(&tree, "/catalog/has-children()").unwrap(), Sequence::boolean(true));
        assert_eq!(run(&tree, "/catalog/title/has-children()").unwrap(), Sequence::boolean(false));
    }

    #[test]
    fn test_path() {
        let tree = catalog();
        assert_eq!(
            run(&tree, "//control[2]/@id/path()").unwrap(),
            Sequence::string("/catalog/group/control[2]/@id")
        );
        assert_eq!(run(&tree, "path(/catalog/title)").unwrap(), Sequence::string("/catalog/title"));
    }
}
