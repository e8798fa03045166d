//! Hash: string-keyed map of values built from one element schema.
//!
//! A hash whose elements are objects with a leading `ID: GUID` field is an
//! identity hash. Its keys and element IDs always agree: an explicit key is
//! written into the element's `ID`, and when no usable key is given the
//! element's own ID (or a freshly generated one) becomes the key.

use std::collections::HashMap;

use tally_json::{Json, JsonType};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::handle::{Parent, ValueId};
use crate::node::{child_path, Kind, Variant};
use crate::state::{mismatch, State};

impl State {
    fn hash_items(&self, id: ValueId) -> StateResult<&HashMap<String, ValueId>> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Hash { items, .. } => Ok(items),
            _ => Err(mismatch(node, Variant::Hash)),
        }
    }

    fn hash_items_mut(&mut self, id: ValueId) -> StateResult<&mut HashMap<String, ValueId>> {
        let node = self.node_mut(id)?;
        match node.kind {
            Kind::Hash { ref mut items, .. } => Ok(items),
            _ => Err(mismatch(node, Variant::Hash)),
        }
    }

    pub fn hash_get(&self, id: ValueId, key: &str) -> StateResult<Option<ValueId>> {
        Ok(self.hash_items(id)?.get(key).copied())
    }

    /// Keys in sorted order.
    pub fn hash_keys(&self, id: ValueId) -> StateResult<Vec<String>> {
        let mut keys: Vec<String> = self.hash_items(id)?.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    /// Element handles, ordered by key.
    pub fn hash_values(&self, id: ValueId) -> StateResult<Vec<ValueId>> {
        let items = self.hash_items(id)?;
        let mut entries: Vec<(&String, &ValueId)> = items.iter().collect();
        entries.sort();
        Ok(entries.into_iter().map(|(_, v)| *v).collect())
    }

    pub fn hash_len(&self, id: ValueId) -> StateResult<usize> {
        Ok(self.hash_items(id)?.len())
    }

    pub fn hash_is_identity(&self, id: ValueId) -> StateResult<bool> {
        let node = self.node(id)?;
        match &node.kind {
            Kind::Hash { identity, .. } => Ok(*identity),
            _ => Err(mismatch(node, Variant::Hash)),
        }
    }

    /// Insert an element decoded from `json` under `key`, replacing any
    /// element already stored there.
    ///
    /// For identity hashes the key may be empty; the element's `ID` is the
    /// key actually used.
    pub fn hash_new_element(&mut self, id: ValueId, key: &str, json: &Json) -> StateResult<ValueId> {
        self.hash_insert(id, key, Some(json))
    }

    /// Insert an element with default contents under `key`.
    pub fn hash_new_empty_element(&mut self, id: ValueId, key: &str) -> StateResult<ValueId> {
        self.hash_insert(id, key, None)
    }

    fn hash_insert(&mut self, id: ValueId, key: &str, json: Option<&Json>) -> StateResult<ValueId> {
        let node = self.node(id)?;
        let Kind::Hash {
            element, identity, ..
        } = &node.kind
        else {
            return Err(mismatch(node, Variant::Hash));
        };
        let Some(schema) = element.clone() else {
            return Err(StateError::NoInitializer {
                path: node.meta.path.clone(),
            });
        };
        let identity = *identity;
        if key.is_empty() && !identity {
            return Err(StateError::NoKey);
        }
        let attached = node.meta.parent.is_some();
        let hash_path = node.meta.path.clone();

        let elem = self.create(&schema);
        let key = match self.prepare_element(elem, key, json, identity) {
            Ok(key) => key,
            Err(err) => {
                self.release(elem);
                return Err(err);
            }
        };

        if attached {
            self.set_parent_and_path(elem, Some(Parent::Value(id)), child_path(&hash_path, &key))?;
        }
        if let Some(old) = self.hash_items_mut(id)?.insert(key, elem) {
            self.drop_child(old)?;
        }
        self.changed_value(id);
        Ok(elem)
    }

    /// Decode the unattached `elem` and settle the key it is stored under.
    fn prepare_element(
        &mut self,
        elem: ValueId,
        key: &str,
        json: Option<&Json>,
        identity: bool,
    ) -> StateResult<String> {
        if let Some(json) = json {
            self.set_json(elem, json)?;
        }
        if !identity {
            return Ok(key.to_string());
        }

        let id_field = self
            .object_field_at(elem, 0)?
            .ok_or_else(|| StateError::NoInitializer {
                path: key.to_string(),
            })?;
        if !key.is_empty() {
            if let Err(err) = self.set_guid(id_field, key) {
                debug!(key, error = %err, "hash key is not a GUID, keeping element ID");
            }
        }
        let current = self.guid(id_field)?.to_string();
        if current.is_empty() {
            return self.set_new_guid(id_field);
        }
        Ok(current)
    }

    /// Remove every element. Removed handles become stale.
    pub fn hash_clear(&mut self, id: ValueId) -> StateResult<()> {
        let items = std::mem::take(self.hash_items_mut(id)?);
        for item in items.into_values() {
            self.drop_child(item)?;
        }
        self.changed_value(id);
        Ok(())
    }

    /// Per key: decode into the existing element in place, or insert a new
    /// one. Keys absent from `json` are left alone.
    pub(crate) fn hash_set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        let Json::Object(map) = json else {
            return Err(StateError::wrong_type(json, &[JsonType::Object], &[]));
        };
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            match self.hash_get(id, key)? {
                Some(existing) => self.set_json(existing, &map[key])?,
                None => {
                    self.hash_insert(id, key, Some(&map[key]))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectDef, Schema};
    use tally_json::decode_str;
    use uuid::Uuid;

    fn users() -> (State, ValueId) {
        let mut state = State::new();
        state.begin_batch();
        let user = ObjectDef::new("User")
            .field("ID", Schema::Guid)
            .field("Name", Schema::String);
        let id = state.create(&Schema::hash_of(user.into()));
        state.add("Users", "users", id).unwrap();
        (state, id)
    }

    fn settings() -> (State, ValueId) {
        let mut state = State::new();
        state.begin_batch();
        let id = state.create(&Schema::hash_of(Schema::String));
        state.add("Settings", "settings", id).unwrap();
        (state, id)
    }

    fn id_of(state: &State, elem: ValueId) -> String {
        let field = state.object_get(elem, "ID").unwrap().unwrap();
        state.guid(field).unwrap().to_string()
    }

    // ---- identity hashes ----

    #[test]
    fn new_with_empty_key_generates_guid() {
        let (mut state, id) = users();
        assert!(state.hash_is_identity(id).unwrap());

        let elem = state.hash_new_empty_element(id, "").unwrap();
        let guid = id_of(&state, elem);
        assert!(!guid.is_empty());
        assert_eq!(Uuid::parse_str(&guid).unwrap().hyphenated().to_string(), guid);
        assert_eq!(state.hash_keys(id).unwrap(), [guid.clone()]);
        assert_eq!(state.hash_get(id, &guid).unwrap(), Some(elem));
        assert_eq!(state.path(elem).unwrap(), format!("Users[{guid}]"));
    }

    #[test]
    fn unusable_key_falls_back_to_generated_id() {
        let (mut state, id) = users();
        let elem = state
            .hash_new_element(id, "K", &decode_str(r#"{"ID": "", "Name": "kay"}"#).unwrap())
            .unwrap();
        let guid = id_of(&state, elem);
        assert_ne!(guid, "K");
        assert!(Uuid::parse_str(&guid).is_ok());
        assert_eq!(state.hash_get(id, "K").unwrap(), None);
        assert_eq!(state.hash_get(id, &guid).unwrap(), Some(elem));
    }

    #[test]
    fn unusable_key_keeps_payload_id() {
        let (mut state, id) = users();
        let payload = r#"{"ID": "0f8fad5b-d9cb-469f-a165-70867728950e", "Name": "x"}"#;
        let elem = state
            .hash_new_element(id, "K", &decode_str(payload).unwrap())
            .unwrap();
        assert_eq!(id_of(&state, elem), "0f8fad5b-d9cb-469f-a165-70867728950e");
        assert_eq!(
            state.hash_keys(id).unwrap(),
            ["0f8fad5b-d9cb-469f-a165-70867728950e"]
        );
    }

    #[test]
    fn explicit_key_is_written_to_id_in_canonical_form() {
        let (mut state, id) = users();
        let payload = r#"{"ID": "0f8fad5b-d9cb-469f-a165-70867728950e", "Name": "x"}"#;
        let elem = state
            .hash_new_element(
                id,
                "7C9E6679-7425-40DE-944B-E07FC1F90AE7",
                &decode_str(payload).unwrap(),
            )
            .unwrap();
        let key = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
        assert_eq!(id_of(&state, elem), key);
        assert_eq!(state.hash_keys(id).unwrap(), [key]);
    }

    #[test]
    fn empty_key_uses_payload_id() {
        let (mut state, id) = users();
        let payload = r#"{"ID": "0f8fad5b-d9cb-469f-a165-70867728950e", "Name": "x"}"#;
        state
            .hash_new_element(id, "", &decode_str(payload).unwrap())
            .unwrap();
        assert_eq!(
            state.hash_keys(id).unwrap(),
            ["0f8fad5b-d9cb-469f-a165-70867728950e"]
        );
    }

    // ---- plain hashes ----

    #[test]
    fn plain_hash_requires_key() {
        let (mut state, id) = settings();
        assert!(!state.hash_is_identity(id).unwrap());
        assert!(matches!(
            state.hash_new_element(id, "", &Json::from("v")),
            Err(StateError::NoKey)
        ));
    }

    #[test]
    fn insert_replaces_and_detaches_old_element() {
        let (mut state, id) = settings();
        let first = state.hash_new_element(id, "theme", &Json::from("dark")).unwrap();
        let second = state.hash_new_element(id, "theme", &Json::from("light")).unwrap();
        assert!(!state.contains(first));
        assert_eq!(state.hash_len(id).unwrap(), 1);
        assert_eq!(state.path(second).unwrap(), "Settings[theme]");
        assert_eq!(state.string(second).unwrap(), "light");
    }

    #[test]
    fn set_json_updates_in_place_and_adds() {
        let (mut state, id) = settings();
        let theme = state.hash_new_element(id, "theme", &Json::from("dark")).unwrap();
        state
            .set_json(id, &decode_str(r#"{"theme": "light", "lang": "en"}"#).unwrap())
            .unwrap();
        assert_eq!(state.hash_get(id, "theme").unwrap(), Some(theme));
        assert_eq!(state.string(theme).unwrap(), "light");
        assert_eq!(state.hash_keys(id).unwrap(), ["lang", "theme"]);

        let values = state.hash_values(id).unwrap();
        assert_eq!(state.string(values[0]).unwrap(), "en");
    }

    #[test]
    fn set_json_rejects_non_object() {
        let (mut state, id) = settings();
        assert!(matches!(
            state.set_json(id, &Json::array()),
            Err(StateError::InvalidJsonType { found: JsonType::Array, .. })
        ));
    }

    #[test]
    fn clear_releases_elements() {
        let (mut state, id) = settings();
        let a = state.hash_new_element(id, "a", &Json::from("1")).unwrap();
        state.hash_clear(id).unwrap();
        assert!(!state.contains(a));
        assert_eq!(state.hash_len(id).unwrap(), 0);
    }

    #[test]
    fn missing_element_schema() {
        let mut state = State::new();
        let id = state.create(&Schema::Hash(None));
        assert!(matches!(
            state.hash_new_empty_element(id, "k"),
            Err(StateError::NoInitializer { .. })
        ));
    }

    #[test]
    fn failed_decode_leaves_hash_untouched() {
        let (mut state, id) = users();
        let live = state.len();
        assert!(matches!(
            state.hash_new_element(id, "", &decode_str(r#"{"Name": "x"}"#).unwrap()),
            Err(StateError::ObjectKeyMismatch { .. })
        ));
        assert_eq!(state.len(), live);
        assert_eq!(state.hash_len(id).unwrap(), 0);
    }
}
