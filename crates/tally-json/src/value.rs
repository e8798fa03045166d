use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::JsonError;
use crate::number::Number;

/// Discriminant of a [`Json`] value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JsonType {
    String,
    Number,
    Object,
    Array,
    True,
    False,
    Null,
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Object => "Object",
            Self::Array => "Array",
            Self::True => "True",
            Self::False => "False",
            Self::Null => "Null",
        };
        f.write_str(name)
    }
}

/// A JSON document.
///
/// Objects are unordered maps; the serializer sorts keys so that output is
/// stable. `true` and `false` are distinct variants, mirroring [`JsonType`].
#[derive(Clone, Debug, PartialEq)]
pub enum Json {
    String(String),
    Number(Number),
    Object(HashMap<String, Json>),
    Array(Vec<Json>),
    True,
    False,
    Null,
}

impl Json {
    /// An empty object.
    pub fn object() -> Self {
        Self::Object(HashMap::new())
    }

    /// An empty array.
    pub fn array() -> Self {
        Self::Array(Vec::new())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn json_type(&self) -> JsonType {
        match self {
            Self::String(_) => JsonType::String,
            Self::Number(_) => JsonType::Number,
            Self::Object(_) => JsonType::Object,
            Self::Array(_) => JsonType::Array,
            Self::True => JsonType::True,
            Self::False => JsonType::False,
            Self::Null => JsonType::Null,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Json>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut HashMap<String, Json>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Json]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Look up a key when this value is an object.
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Insert into an object value. Returns `false` (and does nothing) when
    /// this value is not an object.
    pub fn insert(&mut self, key: impl Into<String>, value: Json) -> bool {
        match self {
            Self::Object(map) => {
                map.insert(key.into(), value);
                true
            }
            _ => false,
        }
    }
}

impl From<bool> for Json {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<&str> for Json {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Json {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Number> for Json {
    fn from(value: Number) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Json {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<u64> for Json {
    fn from(value: u64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<i32> for Json {
    fn from(value: i32) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<Vec<Json>> for Json {
    fn from(items: Vec<Json>) -> Self {
        Self::Array(items)
    }
}

impl From<HashMap<String, Json>> for Json {
    fn from(map: HashMap<String, Json>) -> Self {
        Self::Object(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Json)> for Json {
    fn from_iter<I: IntoIterator<Item = (K, Json)>>(iter: I) -> Self {
        Self::Object(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl FromStr for Json {
    type Err = JsonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::decode::decode_str(s)
    }
}

/// Compact form, identical to `to_json(false)`.
impl fmt::Display for Json {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json(false))
    }
}
