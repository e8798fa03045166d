//! Array: ordered list of values built from one element schema.

use tally_json::{Json, JsonType};

use crate::error::{StateError, StateResult};
use crate::handle::{Parent, ValueId};
use crate::node::{child_path, Kind, Variant};
use crate::state::{mismatch, State};

impl State {
    fn array_items_mut(&mut self, id: ValueId) -> StateResult<&mut Vec<ValueId>> {
        let node = self.node_mut(id)?;
        match node.kind {
            Kind::Array { ref mut items, .. } => Ok(items),
            _ => Err(mismatch(node, Variant::Array)),
        }
    }

    /// Element handles in order.
    pub fn array_values(&self, id: ValueId) -> StateResult<&[ValueId]> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Array { items, .. } => Ok(items.as_slice()),
            _ => Err(mismatch(node, Variant::Array)),
        }
    }

    pub fn array_len(&self, id: ValueId) -> StateResult<usize> {
        Ok(self.array_values(id)?.len())
    }

    pub fn array_get(&self, id: ValueId, index: usize) -> StateResult<Option<ValueId>> {
        Ok(self.array_values(id)?.get(index).copied())
    }

    /// Append an element decoded from `json`.
    pub fn array_new_element(&mut self, id: ValueId, json: &Json) -> StateResult<ValueId> {
        self.array_push(id, Some(json))
    }

    /// Append an element with default contents.
    pub fn array_new_empty_element(&mut self, id: ValueId) -> StateResult<ValueId> {
        self.array_push(id, None)
    }

    fn array_push(&mut self, id: ValueId, json: Option<&Json>) -> StateResult<ValueId> {
        let node = self.node(id)?;
        let Kind::Array { element, items } = &node.kind else {
            return Err(mismatch(node, Variant::Array));
        };
        let Some(schema) = element.clone() else {
            return Err(StateError::NoInitializer {
                path: node.meta.path.clone(),
            });
        };
        let attached = node.meta.parent.is_some();
        let path = child_path(&node.meta.path, &items.len().to_string());

        let elem = self.create(&schema);
        if let Some(json) = json {
            if let Err(err) = self.set_json(elem, json) {
                self.release(elem);
                return Err(err);
            }
        }

        if attached {
            self.set_parent_and_path(elem, Some(Parent::Value(id)), path)?;
        }
        self.array_items_mut(id)?.push(elem);
        self.changed_value(id);
        Ok(elem)
    }

    /// Remove every element. Removed handles become stale.
    pub fn array_clear(&mut self, id: ValueId) -> StateResult<()> {
        let items = std::mem::take(self.array_items_mut(id)?);
        for item in items {
            self.drop_child(item)?;
        }
        self.changed_value(id);
        Ok(())
    }

    pub(crate) fn array_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let Json::Array(entries) = json else {
            return Err(StateError::wrong_type(json, &[JsonType::Array], &[]));
        };
        self.array_clear(id)?;
        for entry in entries {
            self.array_push(id, Some(entry))?;
        }
        self.changed_value(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectDef, Schema};
    use tally_json::decode_str;

    fn scores() -> (State, ValueId) {
        let mut state = State::new();
        state.begin_batch();
        let id = state.create(&Schema::array_of(Schema::Number));
        state.add("Scores", "scores", id).unwrap();
        (state, id)
    }

    #[test]
    fn set_json_replaces_elements() {
        let (mut state, id) = scores();
        state.set_json(id, &decode_str("[1, 2, 3]").unwrap()).unwrap();
        let first = state.array_values(id).unwrap().to_vec();
        assert_eq!(first.len(), 3);

        state.set_json(id, &decode_str(r#"["10", 20]"#).unwrap()).unwrap();
        assert_eq!(state.array_len(id).unwrap(), 2);
        assert!(!state.contains(first[2]));

        let values: Vec<i64> = state
            .array_values(id)
            .unwrap()
            .iter()
            .map(|v| state.number(*v).unwrap())
            .collect();
        assert_eq!(values, [10, 20]);
        assert_eq!(state.to_json(id, false).unwrap().to_json(false), "[10, 20]");
    }

    #[test]
    fn elements_get_indexed_paths() {
        let (mut state, id) = scores();
        let a = state.array_new_empty_element(id).unwrap();
        let b = state.array_new_element(id, &Json::from(5i64)).unwrap();
        assert_eq!(state.path(a).unwrap(), "Scores[0]");
        assert_eq!(state.path(b).unwrap(), "Scores[1]");
        assert_eq!(state.parent(b).unwrap(), Some(Parent::Value(id)));
        assert_eq!(state.array_get(id, 1).unwrap(), Some(b));
        assert_eq!(state.array_get(id, 2).unwrap(), None);
    }

    #[test]
    fn failed_element_is_released() {
        let (mut state, id) = scores();
        state.array_new_element(id, &Json::from(1i64)).unwrap();
        let live = state.len();

        let err = state.array_new_element(id, &Json::from("x")).unwrap_err();
        assert!(matches!(err, StateError::InvalidJsonValue { .. }));
        assert_eq!(state.len(), live);
        assert_eq!(state.array_len(id).unwrap(), 1);
    }

    #[test]
    fn missing_element_schema() {
        let mut state = State::new();
        let id = state.create(&Schema::Array(None));
        assert!(matches!(
            state.array_new_empty_element(id),
            Err(StateError::NoInitializer { .. })
        ));
        // An empty document needs no elements, so it still decodes.
        state.set_json(id, &Json::array()).unwrap();
    }

    #[test]
    fn rejects_non_array() {
        let (mut state, id) = scores();
        state.set_json(id, &decode_str("[7]").unwrap()).unwrap();
        assert!(matches!(
            state.set_json(id, &decode_str("{}").unwrap()),
            Err(StateError::InvalidJsonType { found: JsonType::Object, .. })
        ));
        assert_eq!(state.array_len(id).unwrap(), 1);
    }

    #[test]
    fn clear_detaches_and_dirties() {
        let (mut state, id) = scores();
        let a = state.array_new_empty_element(id).unwrap();
        state.end_batch();
        state.mark_clean(id).unwrap();

        state.begin_batch();
        state.array_clear(id).unwrap();
        assert!(!state.contains(a));
        assert!(state.save_needed(id).unwrap());
        assert_eq!(state.to_json(id, false).unwrap(), Json::array());
    }

    #[test]
    fn nested_objects_in_array() {
        let mut state = State::new();
        state.begin_batch();
        let player = ObjectDef::new("Player")
            .field("Name", Schema::String)
            .field("Number", Schema::Number);
        let id = state.create(&Schema::array_of(player.into()));
        state.add("Roster", "roster", id).unwrap();

        let doc = decode_str(r#"[{"Name": "A", "Number": 1}, {"Name": "B", "Number": 2}]"#).unwrap();
        state.set_json(id, &doc).unwrap();
        let second = state.array_get(id, 1).unwrap().unwrap();
        let name = state.object_get(second, "Name").unwrap().unwrap();
        assert_eq!(state.path(name).unwrap(), "Roster[1][Name]");
        assert_eq!(state.string(name).unwrap(), "B");
        assert_eq!(state.to_json(id, false).unwrap(), doc);
    }

    #[test]
    fn variant_checked() {
        let mut state = State::new();
        let id = state.create(&Schema::String);
        assert!(matches!(
            state.array_clear(id),
            Err(StateError::VariantMismatch { .. })
        ));
    }
}
