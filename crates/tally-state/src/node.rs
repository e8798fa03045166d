//! Node storage: shared bookkeeping plus the variant payload.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handle::{Parent, ValueId};
use crate::schema::{ObjectDef, Schema};

/// The nine value variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    String,
    Number,
    Bool,
    Date,
    Enum,
    Guid,
    Array,
    Hash,
    Object,
}

impl Variant {
    pub fn is_container(&self) -> bool {
        matches!(self, Variant::Array | Variant::Hash | Variant::Object)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::String => "String",
            Variant::Number => "Number",
            Variant::Bool => "Bool",
            Variant::Date => "Date",
            Variant::Enum => "Enum",
            Variant::Guid => "GUID",
            Variant::Array => "Array",
            Variant::Hash => "Hash",
            Variant::Object => "Object",
        };
        f.write_str(name)
    }
}

/// Bookkeeping carried by every node.
#[derive(Debug, Clone, Default)]
pub(crate) struct Meta {
    pub revision: u64,
    pub parent: Option<Parent>,
    pub path: String,
    pub skip_save: bool,
    pub save_needed: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum Kind {
    String(String),
    Number(i64),
    Bool(bool),
    Date(String),
    Enum {
        allowed: Arc<[String]>,
        value: String,
    },
    Guid(String),
    Array {
        element: Option<Arc<Schema>>,
        items: Vec<ValueId>,
    },
    Hash {
        element: Option<Arc<Schema>>,
        identity: bool,
        items: HashMap<String, ValueId>,
    },
    Object {
        def: Arc<ObjectDef>,
        fields: Vec<ValueId>,
        allow_partial_set: bool,
        ignore_extra_data: bool,
    },
}

impl Kind {
    pub fn variant(&self) -> Variant {
        match self {
            Kind::String(_) => Variant::String,
            Kind::Number(_) => Variant::Number,
            Kind::Bool(_) => Variant::Bool,
            Kind::Date(_) => Variant::Date,
            Kind::Enum { .. } => Variant::Enum,
            Kind::Guid(_) => Variant::Guid,
            Kind::Array { .. } => Variant::Array,
            Kind::Hash { .. } => Variant::Hash,
            Kind::Object { .. } => Variant::Object,
        }
    }

    /// Children paired with the path segment each one is reached through.
    pub fn children(&self) -> Vec<(String, ValueId)> {
        match self {
            Kind::Array { items, .. } => items
                .iter()
                .enumerate()
                .map(|(i, id)| (i.to_string(), *id))
                .collect(),
            Kind::Hash { items, .. } => items.iter().map(|(k, id)| (k.clone(), *id)).collect(),
            Kind::Object { def, fields, .. } => def
                .fields
                .iter()
                .zip(fields)
                .map(|(f, id)| (f.name.clone(), *id))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Child handles only.
    pub fn child_ids(&self) -> Vec<ValueId> {
        match self {
            Kind::Array { items, .. } => items.clone(),
            Kind::Hash { items, .. } => items.values().copied().collect(),
            Kind::Object { fields, .. } => fields.clone(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub meta: Meta,
    pub kind: Kind,
}

impl Node {
    pub fn new(kind: Kind) -> Self {
        Self {
            meta: Meta::default(),
            kind,
        }
    }
}

/// Path of a child reached from `parent_path` through `segment`.
pub(crate) fn child_path(parent_path: &str, segment: &str) -> String {
    format!("{parent_path}[{segment}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_format() {
        assert_eq!(child_path("User", "abc"), "User[abc]");
        assert_eq!(child_path("User[abc][Groups]", "0"), "User[abc][Groups][0]");
    }

    #[test]
    fn array_children_are_indexed() {
        let kind = Kind::Array {
            element: None,
            items: vec![ValueId::new(4, 0), ValueId::new(9, 2)],
        };
        let children = kind.children();
        assert_eq!(children[0], ("0".to_string(), ValueId::new(4, 0)));
        assert_eq!(children[1], ("1".to_string(), ValueId::new(9, 2)));
        assert!(Kind::Bool(true).children().is_empty());
    }

    #[test]
    fn variant_names() {
        assert_eq!(Variant::Guid.to_string(), "GUID");
        assert!(Variant::Hash.is_container());
        assert!(!Variant::Enum.is_container());
    }
}
