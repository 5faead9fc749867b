//! Path rendering for node items.
//!
//! A [`PathFormatter`] produces one segment per node kind;
//! [`NodeItem::path`](crate::NodeItem::path) joins the segments from the root
//! down with `/`.

use crate::tree::{NodeItem, NodeKind};

pub trait PathFormatter: Send + Sync {
    fn format_document(&self, node: NodeItem<'_>) -> String;
    fn format_metaschema(&self, node: NodeItem<'_>) -> String;
    fn format_root_assembly(&self, node: NodeItem<'_>) -> String;
    fn format_assembly(&self, node: NodeItem<'_>) -> String;
    fn format_field(&self, node: NodeItem<'_>) -> String;
    fn format_flag(&self, node: NodeItem<'_>) -> String;

    fn format_segment(&self, node: NodeItem<'_>) -> String {
        match node.kind() {
            NodeKind::Document => self.format_document(node),
            NodeKind::Metaschema => self.format_metaschema(node),
            NodeKind::RootAssembly => self.format_root_assembly(node),
            NodeKind::Assembly => self.format_assembly(node),
            NodeKind::Field => self.format_field(node),
            NodeKind::Flag => self.format_flag(node),
        }
    }
}

/// Canonical Metapath paths: `/root/group[2]/title/@id`.
///
/// A `[position]` suffix is only rendered when the parent holds more than
/// one model item with the same name.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetapathPathFormatter;

impl MetapathPathFormatter {
    fn model_segment(node: NodeItem<'_>) -> String {
        if node.same_name_count() > 1 {
            format!("{}[{}]", node.name(), node.position())
        } else {
            node.name().to_string()
        }
    }
}

impl PathFormatter for MetapathPathFormatter {
    fn format_document(&self, _node: NodeItem<'_>) -> String {
        String::new()
    }

    fn format_metaschema(&self, _node: NodeItem<'_>) -> String {
        String::new()
    }

    fn format_root_assembly(&self, node: NodeItem<'_>) -> String {
        node.name().to_string()
    }

    fn format_assembly(&self, node: NodeItem<'_>) -> String {
        Self::model_segment(node)
    }

    fn format_field(&self, node: NodeItem<'_>) -> String {
        Self::model_segment(node)
    }

    fn format_flag(&self, node: NodeItem<'_>) -> String {
        format!("@{}", node.name())
    }
}

/// Like [`MetapathPathFormatter`] but every assembly and field carries its
/// position, so paths stay unambiguous when siblings are added later.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedPathFormatter;

impl PathFormatter for IndexedPathFormatter {
    fn format_document(&self, _node: NodeItem<'_>) -> String {
        String::new()
    }

    fn format_metaschema(&self, _node: NodeItem<'_>) -> String {
        String::new()
    }

    fn format_root_assembly(&self, node: NodeItem<'_>) -> String {
        node.name().to_string()
    }

    fn format_assembly(&self, node: NodeItem<'_>) -> String {
        format!("{}[{}]", node.name(), node.position())
    }

    fn format_field(&self, node: NodeItem<'_>) -> String {
        format!("{}[{}]", node.name(), node.position())
    }

    fn format_flag(&self, node: NodeItem<'_>) -> String {
        format!("@{}", node.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TreeBuilder;
    use crate::tree::NodeItemTree;
    use rstest::rstest;

    fn sample() -> (NodeItemTree, Vec<crate::NodeId>) {
        let mut builder = TreeBuilder::document("root");
        let root = builder.root();
        let field1 = builder.add_field(root, "field1", "a".into()).unwrap();
        let group1 = builder.add_assembly(root, "group").unwrap();
        let group2 = builder.add_assembly(root, "group").unwrap();
        let title = builder.add_field(group2, "title", "t".into()).unwrap();
        let flag = builder.add_flag(title, "lang", "en".into()).unwrap();
        (builder.build(), vec![field1, group1, group2, title, flag])
    }

    #[rstest]
    #[case(0, "/root/field1", "/root/field1[1]")]
    #[case(1, "/root/group[1]", "/root/group[1]")]
    #[case(2, "/root/group[2]", "/root/group[2]")]
    #[case(3, "/root/group[2]/title", "/root/group[2]/title[1]")]
    #[case(4, "/root/group[2]/title/@lang", "/root/group[2]/title[1]/@lang")]
    fn test_formatted_paths(#[case] index: usize, #[case] metapath: &str, #[case] indexed: &str) {
        let (tree, ids) = sample();
        let node = tree.node(ids[index]).unwrap();
        assert_eq!(node.path(&MetapathPathFormatter), metapath);
        assert_eq!(node.path(&IndexedPathFormatter), indexed);
    }

    #[test]
    fn test_document_path() {
        let (tree, _) = sample();
        assert_eq!(tree.root().path(&MetapathPathFormatter), "/");
        assert_eq!(tree.root().path(&IndexedPathFormatter), "/");
    }

    #[test]
    fn test_formatter_reused_across_trees() {
        let formatter = MetapathPathFormatter;
        let (first, ids) = sample();
        let second = TreeBuilder::document("other").build();
        assert_eq!(first.node(ids[0]).unwrap().path(&formatter), "/root/field1");
        let other_root = second.root().children().next().unwrap();
        assert_eq!(other_root.path(&formatter), "/other");
    }
}
