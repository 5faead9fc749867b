use std::fmt;

use metapath_nodeitem::{NodeItem, NodeKind};
use metapath_types::AtomicItem;

use super::{ArrayItem, FunctionItem, MapItem};
use crate::error::MetapathError;

/// One member of a [`Sequence`].
#[derive(Debug, Clone, PartialEq)]
pub enum Item<'t> {
    Node(NodeItem<'t>),
    Atomic(AtomicItem),
    Map(MapItem<'t>),
    Array(ArrayItem<'t>),
    Function(FunctionItem<'t>),
}

impl<'t> Item<'t> {
    pub fn is_node(&self) -> bool {
        matches!(self, Item::Node(_))
    }

    pub fn as_node(&self) -> Option<NodeItem<'t>> {
        match self {
            Item::Node(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicItem> {
        match self {
            Item::Atomic(a) => Some(a),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Node(n) => match n.kind() {
                NodeKind::Document => "document-node()",
                NodeKind::Metaschema => "metaschema()",
                NodeKind::RootAssembly | NodeKind::Assembly => "assembly()",
                NodeKind::Field => "field()",
                NodeKind::Flag => "flag()",
            },
            Item::Atomic(a) => a.type_name(),
            Item::Map(_) => "map(*)",
            Item::Array(_) => "array(*)",
            Item::Function(_) => "function(*)",
        }
    }

    /// Appends the typed value of this item to `out`.
    ///
    /// Fields and flags yield their bound value; arrays are flattened.
    /// Documents, assemblies, maps and functions have no typed value.
    pub fn atomize_into(&self, out: &mut Vec<AtomicItem>) -> Result<(), MetapathError> {
        match self {
            Item::Atomic(a) => out.push(a.clone()),
            Item::Node(node) => match node.value() {
                Some(value) => out.push(value.clone()),
                None => {
                    return Err(MetapathError::type_error(format!(
                        "{} '{}' has no atomic value",
                        self.type_name(),
                        node.name()
                    )));
                }
            },
            Item::Array(array) => {
                for member in array.members() {
                    for item in member.iter() {
                        item.atomize_into(out)?;
                    }
                }
            }
            Item::Map(_) | Item::Function(_) => {
                return Err(MetapathError::type_error(format!(
                    "{} cannot be atomized",
                    self.type_name()
                )));
            }
        }
        Ok(())
    }

    /// The string value used by `fn:string`.
    pub fn string_value(&self) -> Result<String, MetapathError> {
        match self {
            Item::Node(node) => Ok(node.string_value()),
            Item::Atomic(a) => Ok(a.as_string()),
            _ => Err(MetapathError::type_error(format!(
                "{} has no string value",
                self.type_name()
            ))),
        }
    }
}

impl From<AtomicItem> for Item<'_> {
    fn from(value: AtomicItem) -> Self {
        Item::Atomic(value)
    }
}

impl<'t> From<NodeItem<'t>> for Item<'t> {
    fn from(node: NodeItem<'t>) -> Self {
        Item::Node(node)
    }
}

impl fmt::Display for Item<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Node(n) => write!(f, "{}({})", self.type_name().trim_end_matches("()"), n.name()),
            Item::Atomic(a) => write!(f, "{}", a),
            Item::Map(m) => write!(f, "map{{{} entries}}", m.len()),
            Item::Array(a) => write!(f, "array{{{} members}}", a.len()),
            Item::Function(func) => write!(f, "{}", func),
        }
    }
}

/// An ordered, flat list of items: the result of every evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sequence<'t> {
    items: Vec<Item<'t>>,
}

impl<'t> Sequence<'t> {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_item(item: impl Into<Item<'t>>) -> Self {
        Self {
            items: vec![item.into()],
        }
    }

    pub fn from_items(items: Vec<Item<'t>>) -> Self {
        Self { items }
    }

    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeItem<'t>>) -> Self {
        nodes.into_iter().map(Item::Node).collect()
    }

    pub fn from_atomics(values: impl IntoIterator<Item = AtomicItem>) -> Self {
        values.into_iter().map(Item::Atomic).collect()
    }

    pub fn boolean(value: bool) -> Self {
        Self::from_item(AtomicItem::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Self::from_item(AtomicItem::Integer(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::from_item(AtomicItem::String(value.into()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Item<'t>] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Item<'t>> {
        self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item<'t>> {
        self.items.iter()
    }

    pub fn first(&self) -> Option<&Item<'t>> {
        self.items.first()
    }

    pub fn push(&mut self, item: Item<'t>) {
        self.items.push(item);
    }

    pub fn extend(&mut self, other: Sequence<'t>) {
        self.items.extend(other.items);
    }

    pub fn concat(mut self, other: Sequence<'t>) -> Self {
        self.extend(other);
        self
    }

    /// The only item, or a type error naming `what` for any other length.
    pub fn exactly_one(&self, what: &str) -> Result<&Item<'t>, MetapathError> {
        match self.items.as_slice() {
            [item] => Ok(item),
            items => Err(MetapathError::type_error(format!(
                "{} requires exactly one item, got {}",
                what,
                items.len()
            ))),
        }
    }

    pub fn zero_or_one(&self, what: &str) -> Result<Option<&Item<'t>>, MetapathError> {
        match self.items.as_slice() {
            [] => Ok(None),
            [item] => Ok(Some(item)),
            items => Err(MetapathError::type_error(format!(
                "{} requires at most one item, got {}",
                what,
                items.len()
            ))),
        }
    }

    /// The effective boolean value.
    ///
    /// Empty is false; a sequence starting with a node is true; a singleton
    /// boolean, number or string follows its own truthiness. Anything else is
    /// a type error.
    pub fn effective_boolean_value(&self) -> Result<bool, MetapathError> {
        match self.items.as_slice() {
            [] => Ok(false),
            [Item::Node(_), ..] => Ok(true),
            [Item::Atomic(value)] => value.effective_boolean_value().ok_or_else(|| {
                MetapathError::type_error(format!(
                    "effective boolean value is not defined for {}",
                    value.type_name()
                ))
            }),
            [item] => Err(MetapathError::type_error(format!(
                "effective boolean value is not defined for {}",
                item.type_name()
            ))),
            items => Err(MetapathError::type_error(format!(
                "effective boolean value is not defined for a sequence of {} items starting with {}",
                items.len(),
                items[0].type_name()
            ))),
        }
    }

    pub fn atomize(&self) -> Result<Vec<AtomicItem>, MetapathError> {
        let mut out = Vec::with_capacity(self.items.len());
        for item in &self.items {
            item.atomize_into(&mut out)?;
        }
        Ok(out)
    }

    /// Atomizes and requires at most one value.
    pub fn atomize_optional(&self, what: &str) -> Result<Option<AtomicItem>, MetapathError> {
        let mut values = self.atomize()?;
        match values.len() {
            0 => Ok(None),
            1 => Ok(values.pop()),
            n => Err(MetapathError::type_error(format!(
                "{} requires at most one atomic value, got {}",
                what, n
            ))),
        }
    }

    pub fn is_all_nodes(&self) -> bool {
        self.items.iter().all(Item::is_node)
    }

    /// The items as nodes, or a type error naming `what`.
    pub fn nodes(&self, what: &str) -> Result<Vec<NodeItem<'t>>, MetapathError> {
        self.items
            .iter()
            .map(|item| {
                item.as_node().ok_or_else(|| {
                    MetapathError::type_error(format!(
                        "{} requires nodes, got {}",
                        what,
                        item.type_name()
                    ))
                })
            })
            .collect()
    }

    /// Builds a node sequence in document order without duplicates.
    pub fn document_order(mut nodes: Vec<NodeItem<'t>>) -> Self {
        nodes.sort();
        nodes.dedup();
        Self::from_nodes(nodes)
    }
}

impl<'t> FromIterator<Item<'t>> for Sequence<'t> {
    fn from_iter<I: IntoIterator<Item = Item<'t>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'t> IntoIterator for Sequence<'t> {
    type Item = Item<'t>;
    type IntoIter = std::vec::IntoIter<Item<'t>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, 't> IntoIterator for &'a Sequence<'t> {
    type Item = &'a Item<'t>;
    type IntoIter = std::slice::Iter<'a, Item<'t>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl From<AtomicItem> for Sequence<'_> {
    fn from(value: AtomicItem) -> Self {
        Self::from_item(value)
    }
}

impl From<bool> for Sequence<'_> {
    fn from(value: bool) -> Self {
        Self::boolean(value)
    }
}

impl From<i64> for Sequence<'_> {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<&str> for Sequence<'_> {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl fmt::Display for Sequence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.items.as_slice() {
            [] => write!(f, "()"),
            [item] => write!(f, "{}", item),
            items => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}
