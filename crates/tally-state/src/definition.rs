//! State definition documents.
//!
//! A definition document is a JSON array of type definitions:
//!
//! ```json
//! [
//!   {"Name": "Users", "Root": "User", "StateType": "Hash", "ChildType": "User"},
//!   {"Name": "User", "StateType": "Object", "Fields": [
//!     {"Name": "ID", "StateType": "GUID"},
//!     {"Name": "Groups", "StateType": "Array", "ChildType": "String"}
//!   ]}
//! ]
//! ```
//!
//! `ChildType` names a primitive state type or another definition. Types
//! with a `Root` are registered as top-level entries, persisted under
//! `SavePath` (default: the lowercased root name).

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use tally_json::Json;
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::schema::{ObjectDef, Schema};
use crate::state::State;

/// The `StateType` of a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateType {
    Array,
    Bool,
    Date,
    Enum,
    Guid,
    Hash,
    Number,
    Object,
    String,
}

impl StateType {
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name {
            "Array" => StateType::Array,
            "Bool" => StateType::Bool,
            "Date" => StateType::Date,
            "Enum" => StateType::Enum,
            "GUID" => StateType::Guid,
            "Hash" => StateType::Hash,
            "Number" => StateType::Number,
            "Object" => StateType::Object,
            "String" => StateType::String,
            _ => return None,
        };
        Some(ty)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StateType::Array => "Array",
            StateType::Bool => "Bool",
            StateType::Date => "Date",
            StateType::Enum => "Enum",
            StateType::Guid => "GUID",
            StateType::Hash => "Hash",
            StateType::Number => "Number",
            StateType::Object => "Object",
            StateType::String => "String",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One type definition (or object field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    /// Top-level entry name, for registered types.
    pub root: Option<String>,
    pub save_path: String,
    pub state_type: StateType,
    pub child_type: Option<String>,
    pub enum_values: Vec<String>,
    pub fields: Vec<TypeDef>,
    /// Accepted for compatibility; has no runtime effect.
    pub init_func: bool,
}

fn definition_error(msg: impl Into<String>) -> StateError {
    StateError::Definition(msg.into())
}

fn take_string(map: &mut HashMap<String, Json>, key: &str, owner: &str) -> StateResult<Option<String>> {
    match map.remove(key) {
        None => Ok(None),
        Some(Json::String(s)) => Ok(Some(s)),
        Some(other) => Err(definition_error(format!(
            "{owner}: {key} must be a string, found {}",
            other.json_type()
        ))),
    }
}

fn take_array(map: &mut HashMap<String, Json>, key: &str, owner: &str) -> StateResult<Vec<Json>> {
    match map.remove(key) {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => Ok(items),
        Some(other) => Err(definition_error(format!(
            "{owner}: {key} must be an array, found {}",
            other.json_type()
        ))),
    }
}

impl TypeDef {
    fn from_json(json: &Json) -> StateResult<Self> {
        let Json::Object(map) = json else {
            return Err(definition_error(format!(
                "type definition must be an object, found {}",
                json.json_type()
            )));
        };
        let mut map = map.clone();

        let name = take_string(&mut map, "Name", "definition")?
            .filter(|n| !n.is_empty())
            .ok_or_else(|| definition_error("definition without a Name"))?;
        let root = take_string(&mut map, "Root", &name)?.filter(|r| !r.is_empty());
        let save_path = take_string(&mut map, "SavePath", &name)?.unwrap_or_default();
        let type_name = take_string(&mut map, "StateType", &name)?
            .ok_or_else(|| definition_error(format!("{name}: missing StateType")))?;
        let state_type = StateType::from_name(&type_name)
            .ok_or_else(|| definition_error(format!("{name}: unknown StateType {type_name:?}")))?;
        let child_type = take_string(&mut map, "ChildType", &name)?.filter(|c| !c.is_empty());

        let init_func = map.remove("InitFunc").is_some_and(|v| v == Json::True);

        let enum_values = take_array(&mut map, "EnumValues", &name)?
            .into_iter()
            .map(|v| match v {
                Json::String(s) => Ok(s),
                other => Err(definition_error(format!(
                    "{name}: enum values must be strings, found {}",
                    other.json_type()
                ))),
            })
            .collect::<StateResult<Vec<_>>>()?;

        let fields = take_array(&mut map, "Fields", &name)?
            .iter()
            .map(TypeDef::from_json)
            .collect::<StateResult<Vec<_>>>()?;

        if !map.is_empty() {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            warn!(definition = %name, keys = ?keys, "unhandled definition keys");
        }

        let save_path = match (&root, save_path.is_empty()) {
            (Some(root), true) => root.to_lowercase(),
            _ => save_path,
        };

        Ok(Self {
            name,
            root,
            save_path,
            state_type,
            child_type,
            enum_values,
            fields,
            init_func,
        })
    }
}

/// Parsed definition document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDefinition {
    types: Vec<TypeDef>,
}

impl StateDefinition {
    pub fn from_json(json: &Json) -> StateResult<Self> {
        let Json::Array(items) = json else {
            return Err(definition_error(format!(
                "definition document must be an array, found {}",
                json.json_type()
            )));
        };
        let types = items
            .iter()
            .map(TypeDef::from_json)
            .collect::<StateResult<Vec<_>>>()?;

        let mut seen = HashMap::new();
        for ty in &types {
            if seen.insert(ty.name.as_str(), ()).is_some() {
                return Err(definition_error(format!("duplicate definition {:?}", ty.name)));
            }
        }
        Ok(Self { types })
    }

    pub fn parse(text: &str) -> StateResult<Self> {
        Self::from_json(&tally_json::decode_str(text)?)
    }

    pub fn from_file(path: &Path) -> StateResult<Self> {
        let data = std::fs::read(path).map_err(|e| StateError::io(path, e))?;
        Self::from_json(&tally_json::decode(&data)?)
    }

    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Definitions that become top-level entries.
    pub fn roots(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter().filter(|t| t.root.is_some())
    }

    /// Build the schema of the definition called `name`.
    pub fn schema_for(&self, name: &str) -> StateResult<Schema> {
        let def = self
            .get(name)
            .ok_or_else(|| definition_error(format!("unknown type {name:?}")))?;
        let mut stack = vec![name.to_string()];
        self.build(def, &mut stack)
    }

    fn build(&self, def: &TypeDef, stack: &mut Vec<String>) -> StateResult<Schema> {
        let schema = match def.state_type {
            StateType::String => Schema::String,
            StateType::Number => Schema::Number,
            StateType::Bool => Schema::Bool,
            StateType::Date => Schema::Date,
            StateType::Guid => Schema::Guid,
            StateType::Enum => Schema::enum_of(def.enum_values.iter().cloned()),
            StateType::Array => match &def.child_type {
                Some(child) => Schema::array_of(self.child(def, child, stack)?),
                None => Schema::Array(None),
            },
            StateType::Hash => match &def.child_type {
                Some(child) => Schema::hash_of(self.child(def, child, stack)?),
                None => Schema::Hash(None),
            },
            StateType::Object => {
                let mut object = ObjectDef::new(def.name.clone());
                for field in &def.fields {
                    object = object.field(field.name.clone(), self.build(field, stack)?);
                }
                Schema::object(object)
            }
        };
        Ok(schema)
    }

    /// Element schema for `child`: a primitive state type or a named
    /// definition.
    fn child(&self, owner: &TypeDef, child: &str, stack: &mut Vec<String>) -> StateResult<Schema> {
        match StateType::from_name(child) {
            Some(StateType::Enum) => return Ok(Schema::enum_of(owner.enum_values.iter().cloned())),
            Some(StateType::String) => return Ok(Schema::String),
            Some(StateType::Number) => return Ok(Schema::Number),
            Some(StateType::Bool) => return Ok(Schema::Bool),
            Some(StateType::Date) => return Ok(Schema::Date),
            Some(StateType::Guid) => return Ok(Schema::Guid),
            _ => {}
        }

        let def = self.get(child).ok_or_else(|| {
            definition_error(format!("{}: unknown ChildType {child:?}", owner.name))
        })?;
        if stack.iter().any(|s| s == child) {
            stack.push(child.to_string());
            return Err(definition_error(format!(
                "recursive type reference: {}",
                stack.join(" -> ")
            )));
        }
        stack.push(child.to_string());
        let schema = self.build(def, stack);
        stack.pop();
        schema
    }

    /// Create and register every rooted type. Returns the entry names.
    pub fn register(&self, state: &mut State) -> StateResult<Vec<String>> {
        let mut names = Vec::new();
        for def in self.roots() {
            let Some(root) = &def.root else { continue };
            let schema = self.schema_for(&def.name)?;
            let id = state.create(&schema);
            if let Err(err) = state.add(root, &def.save_path, id) {
                state.discard(id);
                return Err(err);
            }
            debug!(entry = %root, save_path = %def.save_path, state_type = %def.state_type, "registered state");
            names.push(root.clone());
        }
        Ok(names)
    }
}
