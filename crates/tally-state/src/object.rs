//! Object: fixed record of named fields.
//!
//! Fields are created with the object and never replaced; decoding writes
//! into them in place. Decoding is strict unless the object allows partial
//! input or ignores unknown keys.

use tally_json::{Json, JsonType};

use crate::error::{StateError, StateResult};
use crate::handle::ValueId;
use crate::node::{Kind, Variant};
use crate::schema::ObjectDef;
use crate::state::{mismatch, State};

impl State {
    fn object_parts(&self, id: ValueId) -> StateResult<(&ObjectDef, &[ValueId])> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Object { def, fields, .. } => Ok((def.as_ref(), fields.as_slice())),
            _ => Err(mismatch(node, Variant::Object)),
        }
    }

    /// Field called `name`, if the definition has one.
    pub fn object_get(&self, id: ValueId, name: &str) -> StateResult<Option<ValueId>> {
        let (def, fields) = self.object_parts(id)?;
        Ok(def.field_index(name).map(|i| fields[i]))
    }

    /// Field at declaration position `index`.
    pub fn object_field_at(&self, id: ValueId, index: usize) -> StateResult<Option<ValueId>> {
        Ok(self.object_parts(id)?.1.get(index).copied())
    }

    /// Field names in declaration order.
    pub fn object_field_names(&self, id: ValueId) -> StateResult<Vec<String>> {
        let (def, _) = self.object_parts(id)?;
        Ok(def.fields.iter().map(|f| f.name.clone()).collect())
    }

    pub fn object_def(&self, id: ValueId) -> StateResult<&ObjectDef> {
        Ok(self.object_parts(id)?.0)
    }

    pub fn allow_partial_set(&self, id: ValueId) -> StateResult<bool> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Object {
                allow_partial_set, ..
            } => Ok(*allow_partial_set),
            _ => Err(mismatch(node, Variant::Object)),
        }
    }

    pub fn set_allow_partial_set(&mut self, id: ValueId, allow: bool) -> StateResult<()> {
        let node = self.node_mut(id)?;
        match node.kind {
            Kind::Object {
                ref mut allow_partial_set,
                ..
            } => {
                *allow_partial_set = allow;
                Ok(())
            }
            _ => Err(mismatch(node, Variant::Object)),
        }
    }

    pub fn ignore_extra_data(&self, id: ValueId) -> StateResult<bool> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Object {
                ignore_extra_data, ..
            } => Ok(*ignore_extra_data),
            _ => Err(mismatch(node, Variant::Object)),
        }
    }

    pub fn set_ignore_extra_data(&mut self, id: ValueId, ignore: bool) -> StateResult<()> {
        let node = self.node_mut(id)?;
        match node.kind {
            Kind::Object {
                ref mut ignore_extra_data,
                ..
            } => {
                *ignore_extra_data = ignore;
                Ok(())
            }
            _ => Err(mismatch(node, Variant::Object)),
        }
    }

    /// Validate the key set of `json` first; only if it passes are the
    /// fields decoded, in declaration order.
    pub(crate) fn object_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let Json::Object(input) = json else {
            return Err(StateError::wrong_type(json, &[JsonType::Object], &[]));
        };
        let partial = self.allow_partial_set(id)?;
        let ignore_extra = self.ignore_extra_data(id)?;
        let (def, fields) = self.object_parts(id)?;

        let mut missing: Vec<String> = if partial {
            Vec::new()
        } else {
            def.fields
                .iter()
                .filter(|f| !input.contains_key(&f.name))
                .map(|f| f.name.clone())
                .collect()
        };
        let mut extra: Vec<String> = if ignore_extra {
            Vec::new()
        } else {
            input
                .keys()
                .filter(|key| def.field_index(key).is_none())
                .cloned()
                .collect()
        };
        if !missing.is_empty() || !extra.is_empty() {
            missing.sort();
            extra.sort();
            return Err(StateError::ObjectKeyMismatch {
                object: def.name.clone(),
                missing,
                extra,
            });
        }

        let updates: Vec<(ValueId, &Json)> = def
            .fields
            .iter()
            .zip(fields)
            .filter_map(|(field, child)| input.get(&field.name).map(|value| (*child, value)))
            .collect();
        for (child, value) in updates {
            self.set_json(child, value)?;
        }
        self.changed_value(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use tally_json::decode_str;

    fn pair(def: ObjectDef) -> (State, ValueId) {
        let mut state = State::new();
        state.begin_batch();
        let id = state.create(&def.into());
        state.add("Pair", "pair", id).unwrap();
        (state, id)
    }

    fn ab() -> ObjectDef {
        ObjectDef::new("Pair")
            .field("A", Schema::Number)
            .field("B", Schema::Number)
    }

    #[test]
    fn strict_decode_names_missing_keys() {
        let (mut state, id) = pair(ab());
        let b = state.object_get(id, "B").unwrap().unwrap();
        state.set_number(b, 9).unwrap();

        let err = state.set_json(id, &decode_str(r#"{"A": 1}"#).unwrap()).unwrap_err();
        match err {
            StateError::ObjectKeyMismatch {
                object,
                missing,
                extra,
            } => {
                assert_eq!(object, "Pair");
                assert_eq!(missing, ["B"]);
                assert!(extra.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        let a = state.object_get(id, "A").unwrap().unwrap();
        assert_eq!(state.number(a).unwrap(), 0);
    }

    #[test]
    fn partial_set_leaves_other_fields() {
        let (mut state, id) = pair(ab().allow_partial_set(true));
        let b = state.object_get(id, "B").unwrap().unwrap();
        state.set_number(b, 9).unwrap();

        state.set_json(id, &decode_str(r#"{"A": 1}"#).unwrap()).unwrap();
        let a = state.object_get(id, "A").unwrap().unwrap();
        assert_eq!(state.number(a).unwrap(), 1);
        assert_eq!(state.number(b).unwrap(), 9);
    }

    #[test]
    fn extra_keys_rejected_unless_ignored() {
        let (mut state, id) = pair(ab());
        let doc = decode_str(r#"{"A": 1, "B": 2, "Z": 3, "C": 4}"#).unwrap();
        assert!(matches!(
            state.set_json(id, &doc),
            Err(StateError::ObjectKeyMismatch { ref extra, ref missing, .. })
                if extra == &["C", "Z"] && missing.is_empty()
        ));

        state.set_ignore_extra_data(id, true).unwrap();
        assert!(state.ignore_extra_data(id).unwrap());
        state.set_json(id, &doc).unwrap();
        assert_eq!(state.to_json(id, false).unwrap().to_json(false), r#"{"A": 1, "B": 2}"#);
    }

    #[test]
    fn per_instance_flags_start_from_definition() {
        let (mut state, id) = pair(ab().allow_partial_set(true));
        assert!(state.allow_partial_set(id).unwrap());
        assert!(!state.ignore_extra_data(id).unwrap());
        state.set_allow_partial_set(id, false).unwrap();
        assert!(matches!(
            state.set_json(id, &decode_str("{}").unwrap()),
            Err(StateError::ObjectKeyMismatch { .. })
        ));
    }

    #[test]
    fn decode_marks_object_changed() {
        let (mut state, id) = pair(ab());
        state.end_batch();
        state.mark_clean(id).unwrap();

        // Same values: only the object-level notification fires.
        state.begin_batch();
        state.set_json(id, &decode_str(r#"{"A": 0, "B": 0}"#).unwrap()).unwrap();
        let a = state.object_get(id, "A").unwrap().unwrap();
        assert!(state.save_needed(id).unwrap());
        assert!(!state.save_needed(a).unwrap());
    }

    #[test]
    fn field_lookup() {
        let (state, id) = pair(ab());
        assert_eq!(state.object_field_names(id).unwrap(), ["A", "B"]);
        assert_eq!(state.object_get(id, "Q").unwrap(), None);
        assert_eq!(state.object_field_at(id, 1).unwrap(), state.object_get(id, "B").unwrap());
        assert_eq!(state.object_def(id).unwrap().name, "Pair");
        let b = state.object_get(id, "B").unwrap().unwrap();
        assert_eq!(state.path(b).unwrap(), "Pair[B]");
    }

    #[test]
    fn rejects_non_object() {
        let (mut state, id) = pair(ab());
        assert!(matches!(
            state.set_json(id, &Json::from(1i64)),
            Err(StateError::InvalidJsonType { found: JsonType::Number, .. })
        ));
    }
}
