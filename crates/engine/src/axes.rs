//! Axis navigation and node tests over the node-item tree.
//!
//! [`select`] returns the nodes reachable along an axis in axis order:
//! document order for forward axes, nearest-first for reverse axes. Flags are
//! only reachable through the attribute axis (and `self`/`parent` from a
//! flag); they have no siblings and are never descendants.

use metapath_nodeitem::{NodeItem, NodeKind};

use crate::ast::{Axis, EQName, KindTest, NameTest, NodeTest};
use crate::context::StaticContext;
use crate::error::MetapathError;

pub fn select<'t>(axis: Axis, node: NodeItem<'t>) -> Vec<NodeItem<'t>> {
    match axis {
        Axis::Child => node.children().collect(),
        Axis::Descendant => node.descendants(),
        Axis::Attribute => node.flags().collect(),
        Axis::SelfAxis => vec![node],
        Axis::DescendantOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(node.descendants());
            nodes
        }
        Axis::FollowingSibling => siblings(node)
            .into_iter()
            .filter(|sibling| sibling.document_order() > node.document_order())
            .collect(),
        Axis::PrecedingSibling => siblings(node)
            .into_iter()
            .rev()
            .filter(|sibling| sibling.document_order() < node.document_order())
            .collect(),
        Axis::Following => {
            let last = last_descendant_order(node);
            node.tree()
                .iter()
                .filter(|other| other.kind() != NodeKind::Flag && other.document_order() > last)
                .collect()
        }
        Axis::Preceding => {
            let ancestors = node.ancestors();
            let mut nodes: Vec<NodeItem<'t>> = node
                .tree()
                .iter()
                .filter(|other| {
                    other.kind() != NodeKind::Flag
                        && other.document_order() < node.document_order()
                        && !ancestors.contains(other)
                })
                .collect();
            nodes.reverse();
            nodes
        }
        Axis::Parent => node.parent().into_iter().collect(),
        Axis::Ancestor => node.ancestors(),
        Axis::AncestorOrSelf => {
            let mut nodes = vec![node];
            nodes.extend(node.ancestors());
            nodes
        }
    }
}

/// Model-item siblings including `node`, in document order.
fn siblings<'t>(node: NodeItem<'t>) -> Vec<NodeItem<'t>> {
    if node.kind() == NodeKind::Flag {
        return Vec::new();
    }
    match node.parent() {
        Some(parent) => parent.children().collect(),
        None => Vec::new(),
    }
}

fn last_descendant_order(node: NodeItem<'_>) -> usize {
    node.descendants()
        .last()
        .map_or(node.document_order(), |last| last.document_order())
        .max(
            node.flags()
                .map(|flag| flag.document_order())
                .max()
                .unwrap_or(0),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindFilter {
    Any,
    Document,
    /// Assemblies, fields and the metaschema root.
    ModelItem,
    Assembly,
    Field,
    Flag,
}

impl KindFilter {
    fn accepts(self, kind: NodeKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::Document => kind == NodeKind::Document,
            KindFilter::ModelItem => matches!(
                kind,
                NodeKind::Metaschema | NodeKind::RootAssembly | NodeKind::Assembly | NodeKind::Field
            ),
            KindFilter::Assembly => kind.is_assembly(),
            KindFilter::Field => kind == NodeKind::Field,
            KindFilter::Flag => kind == NodeKind::Flag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NamespaceFilter {
    Any,
    Exactly(Option<String>),
}

/// A node test with its names resolved against a static context, ready to be
/// applied to many nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMatcher {
    kind: KindFilter,
    namespace: NamespaceFilter,
    local: Option<String>,
}

impl NodeMatcher {
    pub fn new(test: &NodeTest, axis: Axis, ctx: &StaticContext) -> Result<Self, MetapathError> {
        let principal = if axis == Axis::Attribute {
            KindFilter::Flag
        } else {
            KindFilter::ModelItem
        };

        let matcher = match test {
            NodeTest::Name(NameTest::Wildcard) => Self::kind_only(principal),
            NodeTest::Name(NameTest::Name(name)) => Self::named(principal, name, ctx)?,
            NodeTest::Name(NameTest::PrefixWildcard(prefix)) => Self {
                kind: principal,
                namespace: NamespaceFilter::Exactly(Some(ctx.prefix_namespace(prefix)?.to_string())),
                local: None,
            },
            NodeTest::Name(NameTest::LocalWildcard(local)) => Self {
                kind: principal,
                namespace: NamespaceFilter::Any,
                local: Some(local.clone()),
            },
            NodeTest::Kind(kind) => {
                let (filter, name) = match kind {
                    KindTest::AnyNode => (KindFilter::Any, None),
                    KindTest::Document => (KindFilter::Document, None),
                    KindTest::Element(name) => (KindFilter::ModelItem, name.as_ref()),
                    KindTest::Assembly(name) => (KindFilter::Assembly, name.as_ref()),
                    KindTest::Field(name) => (KindFilter::Field, name.as_ref()),
                    KindTest::Attribute(name) | KindTest::Flag(name) => {
                        (KindFilter::Flag, name.as_ref())
                    }
                };
                match name {
                    Some(name) => Self::named(filter, name, ctx)?,
                    None => Self::kind_only(filter),
                }
            }
        };
        Ok(matcher)
    }

    fn kind_only(kind: KindFilter) -> Self {
        Self {
            kind,
            namespace: NamespaceFilter::Any,
            local: None,
        }
    }

    fn named(kind: KindFilter, name: &EQName, ctx: &StaticContext) -> Result<Self, MetapathError> {
        let unprefixed = name.prefix.is_none() && name.namespace.is_none();
        let namespace = if unprefixed && kind == KindFilter::Flag {
            NamespaceFilter::Any
        } else {
            match ctx.element_namespace(name)? {
                Some(namespace) => NamespaceFilter::Exactly(Some(namespace)),
                None => NamespaceFilter::Any,
            }
        };
        Ok(Self {
            kind,
            namespace,
            local: Some(name.local.clone()),
        })
    }

    pub fn matches(&self, node: &NodeItem<'_>) -> bool {
        if !self.kind.accepts(node.kind()) {
            return false;
        }
        if let Some(local) = &self.local
            && node.name() != local
        {
            return false;
        }
        match &self.namespace {
            NamespaceFilter::Any => true,
            NamespaceFilter::Exactly(namespace) => {
                node.qualified_name().namespace.as_deref() == namespace.as_deref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metapath_nodeitem::{NodeItemTree, QName, TreeBuilder};

    /// root { a @id, b, a, group { c } }
    fn sample() -> NodeItemTree {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        let a1 = builder.add_field(root, "a", "a1".into()).unwrap();
        builder.add_flag(a1, "id", "x".into()).unwrap();
        builder.add_field(root, "b", "b1".into()).unwrap();
        builder.add_field(root, "a", "a2".into()).unwrap();
        let group = builder.add_assembly(root, "group").unwrap();
        builder.add_field(group, "c", "c1".into()).unwrap();
        builder.build()
    }

    fn find<'t>(tree: &'t NodeItemTree, name: &str, value: &str) -> NodeItem<'t> {
        tree.iter()
            .find(|n| n.name() == name && n.string_value() == value)
            .unwrap()
    }

    fn values(nodes: &[NodeItem<'_>]) -> Vec<String> {
        nodes.iter().map(|n| n.string_value()).collect()
    }

    #[test]
    fn test_child_axis_in_document_order() {
        let tree = sample();
        let root = tree.root().children().next().unwrap();
        let names: Vec<&str> = select(Axis::Child, root).iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a", "a", "b", "group"]);
    }

    #[test]
    fn test_sibling_axes() {
        let tree = sample();
        let b = find(&tree, "b", "b1");
        // model items are grouped by name, so both `a` instances precede `b`
        assert_eq!(values(&select(Axis::PrecedingSibling, b)), vec!["a2", "a1"]);
        assert_eq!(values(&select(Axis::FollowingSibling, b)), vec!["c1"]);
    }

    #[test]
    fn test_flags_have_no_siblings() {
        let tree = sample();
        let a1 = find(&tree, "a", "a1");
        let flag = a1.get_flag("id").unwrap();
        assert!(select(Axis::FollowingSibling, flag).is_empty());
        assert_eq!(select(Axis::Parent, flag), vec![a1]);
    }

    #[test]
    fn test_reverse_axes_are_nearest_first() {
        let tree = sample();
        let c = find(&tree, "c", "c1");
        let names: Vec<&str> = select(Axis::AncestorOrSelf, c).iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["c", "group", "root", ""]);
    }

    #[test]
    fn test_following_and_preceding_exclude_flags() {
        let tree = sample();
        let a1 = find(&tree, "a", "a1");
        let following = select(Axis::Following, a1);
        assert!(following.iter().all(|n| n.kind() != NodeKind::Flag));
        assert_eq!(following.first().map(|n| n.string_value()), Some("a2".to_string()));

        let c = find(&tree, "c", "c1");
        assert_eq!(values(&select(Axis::Preceding, c))[..3], ["b1", "a2", "a1"]);
    }

    #[test]
    fn test_name_and_kind_tests() {
        let tree = sample();
        let ctx = StaticContext::default();
        let a1 = find(&tree, "a", "a1");
        let flag = a1.get_flag("id").unwrap();

        let by_name =
            NodeMatcher::new(&NodeTest::Name(NameTest::Name(EQName::local("a"))), Axis::Child, &ctx)
                .unwrap();
        assert!(by_name.matches(&a1));
        assert!(!by_name.matches(&flag));

        let any_flag = NodeMatcher::new(&NodeTest::Name(NameTest::Wildcard), Axis::Attribute, &ctx)
            .unwrap();
        assert!(any_flag.matches(&flag));
        assert!(!any_flag.matches(&a1));

        let fields = NodeMatcher::new(&NodeTest::Kind(KindTest::Field(None)), Axis::Child, &ctx)
            .unwrap();
        assert!(fields.matches(&a1));
        assert!(!fields.matches(&tree.root()));

        let documents =
            NodeMatcher::new(&NodeTest::Kind(KindTest::Document), Axis::SelfAxis, &ctx).unwrap();
        assert!(documents.matches(&tree.root()));
    }

    #[test]
    fn test_namespaced_name_test() {
        let ns = "http://example.com/ns";
        let mut builder = TreeBuilder::document(QName::new(Some(ns), "root"));
        let root = builder.root();
        builder.add_field(root, QName::new(Some(ns), "title"), "t".into()).unwrap();
        let tree = builder.build();
        let title = find(&tree, "title", "t");

        let ctx = StaticContext::builder().namespace("ex", ns).build();
        let prefixed = NodeTest::Name(NameTest::Name(EQName::prefixed("ex", "title")));
        assert!(NodeMatcher::new(&prefixed, Axis::Child, &ctx).unwrap().matches(&title));

        let other = NodeTest::Name(NameTest::Name(EQName::uri_qualified("urn:other", "title")));
        assert!(!NodeMatcher::new(&other, Axis::Child, &ctx).unwrap().matches(&title));

        let unbound = NodeTest::Name(NameTest::PrefixWildcard("nope".to_string()));
        assert!(NodeMatcher::new(&unbound, Axis::Child, &ctx).is_err());
    }
}
