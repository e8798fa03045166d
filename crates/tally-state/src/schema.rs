//! Value schemas: the factories containers use to build new elements.
//!
//! A [`Schema`] describes the shape of one value. Containers carry the schema
//! of their elements; an [`ObjectDef`] lists the named fields of a record in
//! declaration order. Schemas are immutable once built and shared through
//! `Arc`, so creating thousands of elements never copies a definition.

use std::sync::Arc;

use crate::node::Variant;

/// Shape of a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    String,
    Number,
    Bool,
    Date,
    Guid,
    /// Enum with its fixed set of allowed values, in canonical casing.
    Enum(Arc<[String]>),
    /// Ordered list. `None` means elements cannot be created.
    Array(Option<Arc<Schema>>),
    /// Keyed map. `None` means elements cannot be created.
    Hash(Option<Arc<Schema>>),
    Object(Arc<ObjectDef>),
}

impl Schema {
    /// Enum schema over `values`.
    pub fn enum_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Array whose elements are built from `element`.
    pub fn array_of(element: Schema) -> Self {
        Schema::Array(Some(Arc::new(element)))
    }

    /// Hash whose elements are built from `element`.
    pub fn hash_of(element: Schema) -> Self {
        Schema::Hash(Some(Arc::new(element)))
    }

    /// Object schema from a finished definition.
    pub fn object(def: ObjectDef) -> Self {
        Schema::Object(Arc::new(def))
    }

    pub fn variant(&self) -> Variant {
        match self {
            Schema::String => Variant::String,
            Schema::Number => Variant::Number,
            Schema::Bool => Variant::Bool,
            Schema::Date => Variant::Date,
            Schema::Guid => Variant::Guid,
            Schema::Enum(_) => Variant::Enum,
            Schema::Array(_) => Variant::Array,
            Schema::Hash(_) => Variant::Hash,
            Schema::Object(_) => Variant::Object,
        }
    }

    /// Whether a hash of this schema keys elements by their own `ID` field:
    /// an object whose first declared field is `ID` of type GUID.
    pub fn is_identity_object(&self) -> bool {
        match self {
            Schema::Object(def) => def
                .fields
                .first()
                .is_some_and(|f| f.name == "ID" && f.schema == Schema::Guid),
            _ => false,
        }
    }
}

impl From<ObjectDef> for Schema {
    fn from(def: ObjectDef) -> Self {
        Schema::object(def)
    }
}

/// One named slot of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub schema: Schema,
    /// Created values get `skip_save` set, so the field never reaches disk.
    pub skip_save: bool,
}

/// Fixed record definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDef {
    /// Type name, used in error messages.
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// Default for new objects: accept input that omits some fields.
    pub allow_partial_set: bool,
    /// Default for new objects: ignore input keys that name no field.
    pub ignore_extra_data: bool,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            allow_partial_set: false,
            ignore_extra_data: false,
        }
    }

    /// Append a persisted field.
    pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            schema,
            skip_save: false,
        });
        self
    }

    /// Append a field that is live in memory but omitted from saved files.
    pub fn transient_field(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            schema,
            skip_save: true,
        });
        self
    }

    pub fn allow_partial_set(mut self, allow: bool) -> Self {
        self.allow_partial_set = allow;
        self
    }

    pub fn ignore_extra_data(mut self, ignore: bool) -> Self {
        self.ignore_extra_data = ignore;
        self
    }

    /// Position of the field called `name`.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}
