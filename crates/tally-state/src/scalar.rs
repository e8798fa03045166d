//! Scalar variants: String, Number, Bool, Date, Enum and GUID.
//!
//! Every setter compares against the stored value first and does nothing
//! when they are equal, so rewriting a value never bumps a revision or
//! dirties the tree. Decoding is lenient where the wire format is loose:
//! strings accept literals and numbers, numbers and bools accept strings.

use tally_json::{Json, JsonType};
use uuid::Uuid;

use crate::error::{StateError, StateResult};
use crate::handle::ValueId;
use crate::node::{Kind, Variant};
use crate::state::{mismatch, State};

/// Text form of the shapes a string-like value accepts.
fn coerce_text(json: &Json) -> Option<String> {
    match json {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.as_str().to_string()),
        Json::True => Some("true".to_string()),
        Json::False => Some("false".to_string()),
        Json::Null => Some("null".to_string()),
        Json::Object(_) | Json::Array(_) => None,
    }
}

const TEXT_CONVERTIBLE: [JsonType; 4] = [
    JsonType::Number,
    JsonType::True,
    JsonType::False,
    JsonType::Null,
];

impl State {
    /// Apply `update` to the payload of `id` and record a change if it
    /// reports one.
    fn update_scalar(
        &mut self,
        id: ValueId,
        expected: Variant,
        update: impl FnOnce(&mut Kind) -> bool,
    ) -> StateResult<()> {
        self.expect_variant(id, expected)?;
        if update(&mut self.node_mut(id)?.kind) {
            self.changed_value(id);
        }
        Ok(())
    }

    // ---- String ----

    pub fn string(&self, id: ValueId) -> StateResult<&str> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::String(s) => Ok(s.as_str()),
            _ => Err(mismatch(node, Variant::String)),
        }
    }

    pub fn set_string(&mut self, id: ValueId, value: impl Into<String>) -> StateResult<()> {
        let value = value.into();
        self.update_scalar(id, Variant::String, |kind| match kind {
            Kind::String(current) if *current != value => {
                *current = value;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn string_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let text = coerce_text(json)
            .ok_or_else(|| StateError::wrong_type(json, &[JsonType::String], &TEXT_CONVERTIBLE))?;
        self.set_string(id, text)
    }

    // ---- Number ----

    pub fn number(&self, id: ValueId) -> StateResult<i64> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Number(n) => Ok(*n),
            _ => Err(mismatch(node, Variant::Number)),
        }
    }

    pub fn set_number(&mut self, id: ValueId, value: i64) -> StateResult<()> {
        self.update_scalar(id, Variant::Number, |kind| match kind {
            Kind::Number(current) if *current != value => {
                *current = value;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn number_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let value = match json {
            Json::String(s) => s
                .parse::<i64>()
                .map_err(|e| StateError::invalid_value(json, e))?,
            Json::Number(n) => n.as_i64().map_err(|e| StateError::invalid_value(json, e))?,
            _ => return Err(StateError::wrong_type(json, &[JsonType::Number], &[JsonType::String])),
        };
        self.set_number(id, value)
    }

    // ---- Bool ----

    pub fn boolean(&self, id: ValueId) -> StateResult<bool> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Bool(b) => Ok(*b),
            _ => Err(mismatch(node, Variant::Bool)),
        }
    }

    pub fn set_bool(&mut self, id: ValueId, value: bool) -> StateResult<()> {
        self.update_scalar(id, Variant::Bool, |kind| match kind {
            Kind::Bool(current) if *current != value => {
                *current = value;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn bool_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let value = match json {
            Json::True => true,
            Json::False => false,
            Json::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => match s.parse::<i64>() {
                    Ok(n) => n != 0,
                    Err(_) => return Err(StateError::invalid_value(json, "not a bool string")),
                },
            },
            Json::Number(n) => n.as_i64().map_err(|e| StateError::invalid_value(json, e))? != 0,
            _ => {
                return Err(StateError::wrong_type(
                    json,
                    &[JsonType::True, JsonType::False],
                    &[JsonType::String, JsonType::Number],
                ))
            }
        };
        self.set_bool(id, value)
    }

    // ---- Date ----

    /// Stored date text. No calendar validation is applied.
    pub fn date(&self, id: ValueId) -> StateResult<&str> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Date(s) => Ok(s.as_str()),
            _ => Err(mismatch(node, Variant::Date)),
        }
    }

    pub fn set_date(&mut self, id: ValueId, value: impl Into<String>) -> StateResult<()> {
        let value = value.into();
        self.update_scalar(id, Variant::Date, |kind| match kind {
            Kind::Date(current) if *current != value => {
                *current = value;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn date_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        match json {
            Json::String(s) => self.set_date(id, s.as_str()),
            _ => Err(StateError::wrong_type(json, &[JsonType::String], &[])),
        }
    }

    // ---- Enum ----

    pub fn enum_value(&self, id: ValueId) -> StateResult<&str> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Enum { value, .. } => Ok(value.as_str()),
            _ => Err(mismatch(node, Variant::Enum)),
        }
    }

    pub fn enum_allowed(&self, id: ValueId) -> StateResult<&[String]> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Enum { allowed, .. } => Ok(&allowed[..]),
            _ => Err(mismatch(node, Variant::Enum)),
        }
    }

    /// Set the enum by case-insensitive match; the allowed value's own
    /// casing is stored. The empty string clears the value.
    pub fn set_enum(&mut self, id: ValueId, value: &str) -> StateResult<()> {
        let allowed = self.enum_allowed(id)?;
        let canonical = if value.is_empty() {
            String::new()
        } else {
            let wanted = value.to_lowercase();
            allowed
                .iter()
                .find(|candidate| candidate.to_lowercase() == wanted)
                .cloned()
                .ok_or_else(|| StateError::InvalidEnum {
                    value: value.to_string(),
                    allowed: allowed.to_vec(),
                })?
        };
        self.update_scalar(id, Variant::Enum, |kind| match kind {
            Kind::Enum { value, .. } if *value != canonical => {
                *value = canonical;
                true
            }
            _ => false,
        })
    }

    pub(crate) fn enum_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let text = coerce_text(json)
            .ok_or_else(|| StateError::wrong_type(json, &[JsonType::String], &TEXT_CONVERTIBLE))?;
        self.set_enum(id, &text)
    }

    // ---- GUID ----

    /// Canonical GUID text, or empty when unset.
    pub fn guid(&self, id: ValueId) -> StateResult<&str> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Guid(s) => Ok(s.as_str()),
            _ => Err(mismatch(node, Variant::Guid)),
        }
    }

    /// Parse and store `value` in canonical hyphenated lowercase form. The
    /// empty string unsets the GUID.
    pub fn set_guid(&mut self, id: ValueId, value: &str) -> StateResult<()> {
        self.expect_variant(id, Variant::Guid)?;
        let canonical = if value.is_empty() {
            String::new()
        } else {
            Uuid::parse_str(value)
                .map_err(|e| StateError::InvalidJsonValue {
                    value: tally_json::quote(value),
                    reason: e.to_string(),
                })?
                .hyphenated()
                .to_string()
        };
        self.update_scalar(id, Variant::Guid, |kind| match kind {
            Kind::Guid(current) if *current != canonical => {
                *current = canonical;
                true
            }
            _ => false,
        })
    }

    /// Store a freshly generated GUID and return it.
    pub fn set_new_guid(&mut self, id: ValueId) -> StateResult<String> {
        let value = Uuid::new_v4().hyphenated().to_string();
        self.set_guid(id, &value)?;
        Ok(value)
    }

    pub(crate) fn guid_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        match json {
            Json::String(s) => self.set_guid(id, s),
            _ => Err(StateError::wrong_type(json, &[JsonType::String], &[])),
        }
    }
}
