//! The node-item tree: an arena of nodes addressed by [`NodeId`] handles.
//!
//! Parents own their children through handle lists and every node keeps a
//! handle back to its parent, so navigation in both directions never needs
//! shared ownership. Positions and document order are fixed when the tree is
//! built and never recomputed during queries.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use metapath_types::AtomicItem;

use crate::path::PathFormatter;

/// Stable handle of a node inside its [`NodeItemTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Metaschema,
    RootAssembly,
    Assembly,
    Field,
    Flag,
}

impl NodeKind {
    /// Kinds that may hold model items.
    pub fn has_model(&self) -> bool {
        matches!(
            self,
            NodeKind::Metaschema | NodeKind::RootAssembly | NodeKind::Assembly
        )
    }

    /// Kinds that may hold flags.
    pub fn has_flags(&self) -> bool {
        matches!(
            self,
            NodeKind::RootAssembly | NodeKind::Assembly | NodeKind::Field
        )
    }

    pub fn is_assembly(&self) -> bool {
        matches!(self, NodeKind::RootAssembly | NodeKind::Assembly)
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local_name: local_name.into(),
        }
    }

    pub fn local(local_name: impl Into<String>) -> Self {
        Self::new(None, local_name)
    }
}

impl From<&str> for QName {
    fn from(value: &str) -> Self {
        QName::local(value)
    }
}

impl From<String> for QName {
    fn from(value: String) -> Self {
        QName::local(value)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) name: QName,
    pub(crate) parent: Option<NodeId>,
    pub(crate) value: Option<AtomicItem>,
    pub(crate) flags: IndexMap<QName, NodeId>,
    pub(crate) model: IndexMap<QName, Vec<NodeId>>,
    pub(crate) position: usize,
    pub(crate) order: usize,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, name: QName, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            name,
            parent,
            value: None,
            flags: IndexMap::new(),
            model: IndexMap::new(),
            position: 1,
            order: 0,
        }
    }
}

/// A read-only tree of node items, produced by
/// [`TreeBuilder`](crate::builder::TreeBuilder).
#[derive(Debug, Clone)]
pub struct NodeItemTree {
    pub(crate) nodes: Vec<NodeData>,
    pub(crate) root: NodeId,
}

impl NodeItemTree {
    /// The tree root: a document, or a metaschema root for module trees.
    pub fn root(&self) -> NodeItem<'_> {
        NodeItem {
            tree: self,
            id: self.root,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeItem<'_>> {
        (id.index() < self.nodes.len()).then_some(NodeItem { tree: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = NodeItem<'_>> + '_ {
        let mut ids: Vec<NodeId> = (0..self.nodes.len()).map(|i| NodeId(i as u32)).collect();
        ids.sort_by_key(|id| self.nodes[id.index()].order);
        ids.into_iter().map(move |id| NodeItem { tree: self, id })
    }

    fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }
}

/// A positioned reference into a [`NodeItemTree`].
///
/// Identity is the tree plus the handle: two `NodeItem`s are equal only when
/// they refer to the same node of the same tree.
#[derive(Clone, Copy)]
pub struct NodeItem<'t> {
    tree: &'t NodeItemTree,
    id: NodeId,
}

impl<'t> NodeItem<'t> {
    fn data(&self) -> &'t NodeData {
        self.tree.data(self.id)
    }

    fn at(&self, id: NodeId) -> NodeItem<'t> {
        NodeItem {
            tree: self.tree,
            id,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t NodeItemTree {
        self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.data().kind
    }

    /// The effective (local) name. Documents answer with the empty string.
    pub fn name(&self) -> &'t str {
        &self.data().name.local_name
    }

    pub fn qualified_name(&self) -> &'t QName {
        &self.data().name
    }

    /// The atomic value bound to a field or flag.
    pub fn value(&self) -> Option<&'t AtomicItem> {
        self.data().value.as_ref()
    }

    /// 1-based index among siblings with the same qualified name.
    pub fn position(&self) -> usize {
        self.data().position
    }

    /// Number of siblings sharing this node's qualified name, including
    /// itself.
    pub fn same_name_count(&self) -> usize {
        match (self.kind(), self.parent()) {
            (NodeKind::Flag, _) | (_, None) => 1,
            (_, Some(parent)) => parent
                .data()
                .model
                .get(self.qualified_name())
                .map_or(1, Vec::len),
        }
    }

    /// Position in document order, unique within the tree.
    pub fn document_order(&self) -> usize {
        self.data().order
    }

    pub fn parent(&self) -> Option<NodeItem<'t>> {
        self.data().parent.map(|id| self.at(id))
    }

    /// The tree root this node belongs to.
    pub fn document(&self) -> NodeItem<'t> {
        self.tree.root()
    }

    pub fn flags(self) -> impl Iterator<Item = NodeItem<'t>> + 't {
        let tree = self.tree;
        self.data()
            .flags
            .values()
            .map(move |&id| NodeItem { tree, id })
    }

    /// The first flag with local name `name`, in any namespace.
    pub fn get_flag(&self, name: &str) -> Option<NodeItem<'t>> {
        self.data()
            .flags
            .iter()
            .find(|(qname, _)| qname.local_name == name)
            .map(|(_, &id)| self.at(id))
    }

    pub fn get_qualified_flag(&self, name: &QName) -> Option<NodeItem<'t>> {
        self.data().flags.get(name).map(|&id| self.at(id))
    }

    /// Model items grouped by qualified instance name, in model order.
    pub fn model_items(self) -> impl Iterator<Item = (&'t QName, Vec<NodeItem<'t>>)> + 't {
        let tree = self.tree;
        self.data().model.iter().map(move |(name, ids)| {
            let items = ids.iter().map(|&id| NodeItem { tree, id }).collect();
            (name, items)
        })
    }

    pub fn model_items_named(&self, name: &QName) -> Vec<NodeItem<'t>> {
        self.data()
            .model
            .get(name)
            .map(|ids| ids.iter().map(|&id| self.at(id)).collect())
            .unwrap_or_default()
    }

    /// All model items in document order.
    pub fn children(self) -> impl Iterator<Item = NodeItem<'t>> + 't {
        let tree = self.tree;
        self.data()
            .model
            .values()
            .flat_map(|ids| ids.iter())
            .map(move |&id| NodeItem { tree, id })
    }

    pub fn has_children(&self) -> bool {
        self.data().model.values().any(|ids| !ids.is_empty())
    }

    /// Descendants in document order, excluding flags and `self`.
    pub fn descendants(&self) -> Vec<NodeItem<'t>> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeItem<'t>> = self.children().collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            result.push(node);
            let mut children: Vec<NodeItem<'t>> = node.children().collect();
            children.reverse();
            stack.extend(children);
        }
        result
    }

    /// Ancestors from the parent up to the root.
    pub fn ancestors(&self) -> Vec<NodeItem<'t>> {
        let mut result = Vec::new();
        let mut current = self.parent();
        while let Some(node) = current {
            result.push(node);
            current = node.parent();
        }
        result
    }

    /// The string value: a field or flag renders its value, other nodes the
    /// concatenated values of their descendant fields.
    pub fn string_value(&self) -> String {
        match self.value() {
            Some(value) => value.as_string(),
            None => self
                .descendants()
                .into_iter()
                .filter_map(|node| node.value().map(AtomicItem::as_string))
                .collect(),
        }
    }

    pub fn is_same_node(&self, other: &NodeItem<'_>) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }

    /// Renders the path from the root to this node with `formatter`.
    pub fn path(&self, formatter: &dyn PathFormatter) -> String {
        let mut segments: Vec<String> = self
            .ancestors()
            .into_iter()
            .rev()
            .map(|node| formatter.format_segment(node))
            .collect();
        segments.push(formatter.format_segment(*self));
        let path = segments.join("/");
        if path.is_empty() { "/".to_string() } else { path }
    }
}

impl PartialEq for NodeItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.is_same_node(other)
    }
}

impl Eq for NodeItem<'_> {}

impl Hash for NodeItem<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.tree, state);
        self.id.hash(state);
    }
}

impl PartialOrd for NodeItem<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Document order. Nodes of different trees order by tree address, which is
/// stable for the lifetime of both trees.
impl Ord for NodeItem<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.tree as *const NodeItemTree as usize;
        let right = other.tree as *const NodeItemTree as usize;
        left.cmp(&right)
            .then_with(|| self.document_order().cmp(&other.document_order()))
    }
}

impl fmt::Debug for NodeItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeItem")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("position", &self.position())
            .finish()
    }
}
