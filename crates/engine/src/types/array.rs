use std::fmt;
use std::sync::Arc;

use super::Sequence;
use crate::error::MetapathError;

/// An immutable array. Each member is a sequence in its own right.
#[derive(Debug, Clone, Default)]
pub struct ArrayItem<'t> {
    members: Arc<Vec<Sequence<'t>>>,
}

impl<'t> ArrayItem<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_members(members: Vec<Sequence<'t>>) -> Self {
        Self {
            members: Arc::new(members),
        }
    }

    /// Returns the member at 1-based `index`.
    pub fn get(&self, index: i64) -> Result<&Sequence<'t>, MetapathError> {
        let out_of_bounds = || MetapathError::ArrayIndexOutOfBounds {
            index,
            size: self.members.len(),
        };
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or_else(out_of_bounds)?;
        self.members.get(slot).ok_or_else(out_of_bounds)
    }

    pub fn members(&self) -> &[Sequence<'t>] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl PartialEq for ArrayItem<'_> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.members, &other.members) || self.members == other.members
    }
}

impl fmt::Display for ArrayItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, member) in self.members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", member)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_one_based() {
        let array = ArrayItem::from_members(vec![Sequence::integer(10), Sequence::integer(20)]);
        assert_eq!(array.get(1).unwrap(), &Sequence::integer(10));
        assert_eq!(array.get(2).unwrap(), &Sequence::integer(20));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let array = ArrayItem::from_members(vec![Sequence::integer(10)]);
        for index in [0, 2, -1] {
            assert_eq!(
                array.get(index),
                Err(MetapathError::ArrayIndexOutOfBounds { index, size: 1 })
            );
        }
    }
}
