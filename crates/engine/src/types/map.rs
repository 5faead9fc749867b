use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use metapath_types::AtomicItem;

use super::Sequence;

/// An immutable map from atomic keys to sequences, in insertion order.
///
/// Keys compare by value identity, so `1` and `1.0` address the same entry.
#[derive(Debug, Clone, Default)]
pub struct MapItem<'t> {
    entries: Arc<IndexMap<AtomicItem, Sequence<'t>>>,
}

impl<'t> MapItem<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: IndexMap<AtomicItem, Sequence<'t>>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &AtomicItem) -> Option<&Sequence<'t>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &AtomicItem) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &AtomicItem> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Sequence<'t>> {
        self.entries.values()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&AtomicItem, &Sequence<'t>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for MapItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.entries, &other.entries) {
            return true;
        }
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.entries.get(k).is_some_and(|o| v == o))
    }
}

impl fmt::Display for MapItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "map {{ ")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, " }}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_numeric_keys_share_an_entry() {
        let mut entries = IndexMap::new();
        entries.insert(AtomicItem::Integer(1), Sequence::string("one"));
        let map = MapItem::from_entries(entries);

        assert!(map.contains_key(&AtomicItem::Decimal(Decimal::new(10, 1))));
        assert_eq!(
            map.get(&AtomicItem::Integer(1)),
            Some(&Sequence::string("one"))
        );
        assert!(!map.contains_key(&AtomicItem::string("1")));
    }

    #[test]
    fn test_equality_ignores_order() {
        let mut a = IndexMap::new();
        a.insert(AtomicItem::string("x"), Sequence::integer(1));
        a.insert(AtomicItem::string("y"), Sequence::integer(2));
        let mut b = IndexMap::new();
        b.insert(AtomicItem::string("y"), Sequence::integer(2));
        b.insert(AtomicItem::string("x"), Sequence::integer(1));

        assert_eq!(MapItem::from_entries(a), MapItem::from_entries(b));
    }
}
