//! Handles into the value arena.

use std::fmt;

/// Generation-checked handle to a value stored in a [`State`](crate::State).
///
/// Handles are cheap to copy. A handle outlives the value it names: once the
/// slot is released (its container cleared or replaced it) the generation no
/// longer matches and every lookup reports
/// [`StateError::UnknownValue`](crate::StateError::UnknownValue).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl ValueId {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at the time this handle was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Back-link from a value to its owner.
///
/// This is bookkeeping only. Ownership is held by the container's list of
/// child handles (or by the root entry table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// Registered as a top-level entry.
    Root,
    /// Child of another value.
    Value(ValueId),
}

impl Parent {
    /// The parent value, if the parent is not the root.
    pub fn value(&self) -> Option<ValueId> {
        match self {
            Parent::Root => None,
            Parent::Value(id) => Some(*id),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Parent::Root)
    }
}

impl From<ValueId> for Parent {
    fn from(id: ValueId) -> Self {
        Parent::Value(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting() {
        let id = ValueId::new(3, 7);
        assert_eq!(format!("{id:?}"), "ValueId(3v7)");
        assert_eq!(id.to_string(), "#3v7");
    }

    #[test]
    fn parent_value() {
        let id = ValueId::new(1, 0);
        assert_eq!(Parent::from(id).value(), Some(id));
        assert_eq!(Parent::Root.value(), None);
        assert!(Parent::Root.is_root());
    }
}
