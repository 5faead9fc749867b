use metapath_types::AtomicItem;

use crate::error::TreeError;
use crate::tree::{NodeData, NodeId, NodeItemTree, NodeKind, QName};

/// Incrementally assembles a [`NodeItemTree`].
///
/// A document tree starts with a document node and its single root assembly;
/// a module tree starts with a metaschema root. Positions among same-named
/// siblings and document order are assigned once in [`TreeBuilder::build`].
///
/// ```
/// use metapath_nodeitem::TreeBuilder;
///
/// let mut builder = TreeBuilder::document("catalog");
/// let root = builder.root();
/// let group = builder.add_assembly(root, "group").unwrap();
/// builder.add_flag(group, "id", "g1".into()).unwrap();
/// let tree = builder.build();
/// assert_eq!(tree.len(), 4);
/// ```
#[derive(Debug)]
pub struct TreeBuilder {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl TreeBuilder {
    /// Starts a document whose root assembly is named `root_name`.
    pub fn document(root_name: impl Into<QName>) -> Self {
        let document = NodeData::new(NodeKind::Document, QName::default(), None);
        let mut root = NodeData::new(NodeKind::RootAssembly, root_name.into(), Some(NodeId(0)));
        root.position = 1;
        let mut builder = Self {
            nodes: vec![document, root],
            root: NodeId(0),
        };
        let root_name = builder.nodes[1].name.clone();
        builder.nodes[0].model.insert(root_name, vec![NodeId(1)]);
        builder
    }

    /// Starts a module tree rooted at a metaschema node.
    pub fn metaschema(short_name: impl Into<QName>) -> Self {
        Self {
            nodes: vec![NodeData::new(NodeKind::Metaschema, short_name.into(), None)],
            root: NodeId(0),
        }
    }

    /// The node new top-level content is added under: the root assembly of a
    /// document, or the metaschema root of a module.
    pub fn root(&self) -> NodeId {
        match self.nodes[self.root.index()].kind {
            NodeKind::Document => NodeId(1),
            _ => self.root,
        }
    }

    pub fn add_assembly(
        &mut self,
        parent: NodeId,
        name: impl Into<QName>,
    ) -> Result<NodeId, TreeError> {
        self.add_model_item(parent, NodeKind::Assembly, name.into(), None)
    }

    pub fn add_field(
        &mut self,
        parent: NodeId,
        name: impl Into<QName>,
        value: AtomicItem,
    ) -> Result<NodeId, TreeError> {
        self.add_model_item(parent, NodeKind::Field, name.into(), Some(value))
    }

    pub fn add_flag(
        &mut self,
        owner: NodeId,
        name: impl Into<QName>,
        value: AtomicItem,
    ) -> Result<NodeId, TreeError> {
        let name = name.into();
        let owner_kind = self.kind_of(owner)?;
        if !owner_kind.has_flags() {
            return Err(TreeError::InvalidParent {
                parent: owner_kind,
                child: NodeKind::Flag,
                name: name.local_name,
            });
        }
        if self.nodes[owner.index()].flags.contains_key(&name) {
            return Err(TreeError::DuplicateFlag {
                name: name.to_string(),
            });
        }

        let id = self.next_id();
        let key = name.clone();
        let mut data = NodeData::new(NodeKind::Flag, name, Some(owner));
        data.value = Some(value);
        self.nodes.push(data);
        self.nodes[owner.index()].flags.insert(key, id);
        Ok(id)
    }

    fn add_model_item(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: QName,
        value: Option<AtomicItem>,
    ) -> Result<NodeId, TreeError> {
        let parent_kind = self.kind_of(parent)?;
        if !parent_kind.has_model() {
            return Err(TreeError::InvalidParent {
                parent: parent_kind,
                child: kind,
                name: name.local_name,
            });
        }

        let id = self.next_id();
        let key = name.clone();
        let mut data = NodeData::new(kind, name, Some(parent));
        data.value = value;
        self.nodes.push(data);
        self.nodes[parent.index()]
            .model
            .entry(key)
            .or_default()
            .push(id);
        Ok(id)
    }

    fn kind_of(&self, id: NodeId) -> Result<NodeKind, TreeError> {
        self.nodes
            .get(id.index())
            .map(|n| n.kind)
            .ok_or(TreeError::UnknownNode(id))
    }

    fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len() as u32)
    }

    /// Freezes the tree, assigning positions and document order. Positions
    /// count siblings with the same qualified name.
    pub fn build(mut self) -> NodeItemTree {
        let mut order = 0usize;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            self.nodes[id.index()].order = order;
            order += 1;

            let flags: Vec<NodeId> = self.nodes[id.index()].flags.values().copied().collect();
            for flag in flags {
                self.nodes[flag.index()].order = order;
                self.nodes[flag.index()].position = 1;
                order += 1;
            }

            let groups: Vec<Vec<NodeId>> = self.nodes[id.index()].model.values().cloned().collect();
            for group in &groups {
                for (index, child) in group.iter().enumerate() {
                    self.nodes[child.index()].position = index + 1;
                }
            }
            stack.extend(groups.into_iter().flatten().rev());
        }

        log::trace!("built node-item tree with {} nodes", self.nodes.len());
        NodeItemTree {
            nodes: self.nodes,
            root: self.root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// root { a "1", b "x", a "2", a "3" }
    fn repeated() -> NodeItemTree {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        for (name, value) in [("a", "1"), ("b", "x"), ("a", "2"), ("a", "3")] {
            builder.add_field(root, name, value.into()).unwrap();
        }
        builder.build()
    }

    #[rstest]
    #[case("a", "1", 1, 3)]
    #[case("a", "2", 2, 3)]
    #[case("a", "3", 3, 3)]
    #[case("b", "x", 1, 1)]
    #[case("root", "", 1, 1)]
    fn test_positions_follow_same_name_siblings(
        #[case] name: &str,
        #[case] value: &str,
        #[case] position: usize,
        #[case] count: usize,
    ) {
        let tree = repeated();
        let node = tree
            .iter()
            .find(|n| {
                n.name() == name && n.value().map(AtomicItem::as_string).unwrap_or_default() == value
            })
            .unwrap();
        assert_eq!(node.position(), position);
        assert_eq!(node.same_name_count(), count);
    }

    #[test]
    fn test_document_order_groups_model_items() {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        let a1 = builder.add_assembly(root, "a").unwrap();
        let b1 = builder.add_field(root, "b", "x".into()).unwrap();
        let a2 = builder.add_assembly(root, "a").unwrap();
        let flag = builder.add_flag(a1, "id", "f".into()).unwrap();
        let tree = builder.build();

        let names: Vec<NodeId> = tree.iter().map(|n| n.id()).collect();
        assert_eq!(names, vec![NodeId(0), NodeId(1), a1, flag, a2, b1]);
    }

    #[test]
    fn test_namespaces_keep_same_local_names_apart() {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        let plain = builder.add_field(root, "title", "plain".into()).unwrap();
        let other = builder
            .add_field(root, QName::new(Some("urn:other"), "title"), "other".into())
            .unwrap();
        let again = builder.add_field(root, "title", "again".into()).unwrap();
        builder.add_flag(plain, "lang", "en".into()).unwrap();
        builder
            .add_flag(plain, QName::new(Some("urn:other"), "lang"), "de".into())
            .unwrap();
        let tree = builder.build();

        let other = tree.node(other).unwrap();
        assert_eq!(other.position(), 1);
        assert_eq!(other.same_name_count(), 1);
        assert_eq!(tree.node(again).unwrap().position(), 2);

        let plain = tree.node(plain).unwrap();
        assert_eq!(plain.flags().count(), 2);
        let qualified = plain
            .get_qualified_flag(&QName::new(Some("urn:other"), "lang"))
            .unwrap();
        assert_eq!(qualified.string_value(), "de");
        assert_eq!(plain.get_flag("lang").unwrap().string_value(), "en");
        assert_eq!(
            tree.node(NodeId(1))
                .unwrap()
                .model_items_named(&QName::local("title"))
                .len(),
            2
        );
    }

    #[test]
    fn test_invalid_parents_rejected() {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        let field = builder.add_field(root, "f", "v".into()).unwrap();
        let flag = builder.add_flag(field, "x", "1".into()).unwrap();

        assert!(matches!(
            builder.add_field(field, "nested", "v".into()),
            Err(TreeError::InvalidParent { .. })
        ));
        assert!(matches!(
            builder.add_flag(flag, "y", "1".into()),
            Err(TreeError::InvalidParent { .. })
        ));
        assert!(matches!(
            builder.add_flag(field, "x", "2".into()),
            Err(TreeError::DuplicateFlag { .. })
        ));
        assert!(matches!(
            builder.add_assembly(NodeId(99), "a"),
            Err(TreeError::UnknownNode(_))
        ));
    }

    #[test]
    fn test_document_and_root_assembly() {
        let tree = TreeBuilder::document("root").build();
        let document = tree.root();
        assert_eq!(document.kind(), NodeKind::Document);
        let children: Vec<_> = document.children().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].kind(), NodeKind::RootAssembly);
        assert_eq!(children[0].parent(), Some(document));
    }

    #[test]
    fn test_metaschema_tree() {
        let mut builder = TreeBuilder::metaschema("oscal-catalog");
        let root = builder.root();
        builder.add_assembly(root, "catalog").unwrap();
        let tree = builder.build();
        assert_eq!(tree.root().kind(), NodeKind::Metaschema);
        assert_eq!(tree.root().children().count(), 1);
    }
}
