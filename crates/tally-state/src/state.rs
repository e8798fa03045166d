//! The value arena and the bookkeeping shared by every variant.
//!
//! [`State`] owns every node of the tree in a slot vector. Containers hold
//! the handles of their children and each node keeps a back-link to its
//! parent, so paths and dirty flags can be computed without shared
//! pointers. Slots freed when a container drops a child are reused with a
//! bumped generation, which turns any leftover handle into
//! [`StateError::UnknownValue`].
//!
//! A `State` is normally reached through [`Root::lock`](crate::Root::lock),
//! which opens a mutation batch. A standalone `State::new()` works too, but
//! since it is never locked every attached mutation is reported as a lock
//! violation.

use std::backtrace::Backtrace;
use std::collections::{BTreeMap, HashMap};

use tally_json::Json;
use tracing::{debug, error};

use crate::error::{StateError, StateResult};
use crate::handle::{Parent, ValueId};
use crate::node::{child_path, Kind, Node, Variant};
use crate::schema::Schema;

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// A registered top-level value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    /// Backing file name (or directory, for hashes) under the config
    /// directory. Empty means the entry is never persisted.
    pub backing: String,
    pub value: ValueId,
}

/// Arena of values plus the root entry table and revision counter.
#[derive(Debug, Default)]
pub struct State {
    slots: Vec<Slot>,
    free: Vec<u32>,
    entries: BTreeMap<String, RootEntry>,
    revision: u64,
    changed: bool,
    locked: bool,
    lock_violations: u64,
}

impl State {
    /// Create an empty, unlocked state.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- batches ----

    pub(crate) fn begin_batch(&mut self) {
        self.locked = true;
    }

    /// Close the batch; bump the revision once if anything changed.
    pub(crate) fn end_batch(&mut self) -> u64 {
        if self.changed {
            self.revision += 1;
            self.changed = false;
            debug!(revision = self.revision, "state revision committed");
        }
        self.locked = false;
        self.revision
    }

    /// Global revision counter.
    pub fn global_revision(&self) -> u64 {
        self.revision
    }

    /// Whether any mutation happened since the batch began.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of attached mutations made outside a batch.
    pub fn lock_violations(&self) -> u64 {
        self.lock_violations
    }

    // ---- arena ----

    fn alloc(&mut self, node: Node) -> ValueId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ValueId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ValueId::new(index, 0)
        }
    }

    pub(crate) fn node(&self, id: ValueId) -> StateResult<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(StateError::UnknownValue(id))
    }

    pub(crate) fn node_mut(&mut self, id: ValueId) -> StateResult<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(StateError::UnknownValue(id))
    }

    /// Free `id` and its whole subtree.
    pub(crate) fn release(&mut self, id: ValueId) {
        let Ok(node) = self.node(id) else {
            return;
        };
        for child in node.kind.child_ids() {
            self.release(child);
        }
        let slot = &mut self.slots[id.index as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
    }

    /// Detach `id` from the tree and free it.
    pub(crate) fn drop_child(&mut self, id: ValueId) -> StateResult<()> {
        self.set_parent_and_path(id, None, "")?;
        self.release(id);
        Ok(())
    }

    /// Whether `id` refers to a live value.
    pub fn contains(&self, id: ValueId) -> bool {
        self.node(id).is_ok()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build an unattached value from `schema`. Object fields are created
    /// eagerly; containers start empty.
    pub fn create(&mut self, schema: &Schema) -> ValueId {
        let kind = match schema {
            Schema::String => Kind::String(String::new()),
            Schema::Number => Kind::Number(0),
            Schema::Bool => Kind::Bool(false),
            Schema::Date => Kind::Date(String::new()),
            Schema::Guid => Kind::Guid(String::new()),
            Schema::Enum(allowed) => Kind::Enum {
                allowed: allowed.clone(),
                value: String::new(),
            },
            Schema::Array(element) => Kind::Array {
                element: element.clone(),
                items: Vec::new(),
            },
            Schema::Hash(element) => Kind::Hash {
                identity: element.as_deref().is_some_and(Schema::is_identity_object),
                element: element.clone(),
                items: HashMap::new(),
            },
            Schema::Object(def) => {
                let mut fields = Vec::with_capacity(def.fields.len());
                for field in &def.fields {
                    let id = self.create(&field.schema);
                    if field.skip_save {
                        if let Ok(node) = self.node_mut(id) {
                            node.meta.skip_save = true;
                        }
                    }
                    fields.push(id);
                }
                Kind::Object {
                    def: def.clone(),
                    fields,
                    allow_partial_set: def.allow_partial_set,
                    ignore_extra_data: def.ignore_extra_data,
                }
            }
        };
        self.alloc(Node::new(kind))
    }

    /// Release an unattached value the caller no longer needs.
    ///
    /// Returns `false` (and keeps the value) if it is attached or unknown.
    pub fn discard(&mut self, id: ValueId) -> bool {
        let attached = match self.node(id) {
            Ok(node) => node.meta.parent.is_some(),
            Err(_) => return false,
        };
        if attached {
            return false;
        }
        self.release(id);
        true
    }

    // ---- shared bookkeeping ----

    pub fn variant(&self, id: ValueId) -> StateResult<Variant> {
        Ok(self.node(id)?.kind.variant())
    }

    /// Revision at which `id` last changed.
    pub fn revision(&self, id: ValueId) -> StateResult<u64> {
        Ok(self.node(id)?.meta.revision)
    }

    pub fn set_revision(&mut self, id: ValueId, revision: u64) -> StateResult<()> {
        self.node_mut(id)?.meta.revision = revision;
        Ok(())
    }

    pub fn parent(&self, id: ValueId) -> StateResult<Option<Parent>> {
        Ok(self.node(id)?.meta.parent)
    }

    pub fn path(&self, id: ValueId) -> StateResult<&str> {
        Ok(self.node(id)?.meta.path.as_str())
    }

    pub fn skip_save(&self, id: ValueId) -> StateResult<bool> {
        Ok(self.node(id)?.meta.skip_save)
    }

    pub fn set_skip_save(&mut self, id: ValueId, skip: bool) -> StateResult<()> {
        self.node_mut(id)?.meta.skip_save = skip;
        Ok(())
    }

    pub fn save_needed(&self, id: ValueId) -> StateResult<bool> {
        Ok(self.node(id)?.meta.save_needed)
    }

    pub fn set_save_needed(&mut self, id: ValueId, needed: bool) -> StateResult<()> {
        self.node_mut(id)?.meta.save_needed = needed;
        Ok(())
    }

    /// Clear the dirty flag on `id` and everything below it.
    pub fn mark_clean(&mut self, id: ValueId) -> StateResult<()> {
        let node = self.node_mut(id)?;
        node.meta.save_needed = false;
        for child in node.kind.child_ids() {
            self.mark_clean(child)?;
        }
        Ok(())
    }

    /// Reassign the owner and path of `id`, cascading to its children.
    ///
    /// A `None` parent detaches the whole subtree (empty paths). Always
    /// reported as a change, even if nothing moved.
    pub fn set_parent_and_path(
        &mut self,
        id: ValueId,
        parent: Option<Parent>,
        path: impl Into<String>,
    ) -> StateResult<()> {
        let path = path.into();
        let node = self.node_mut(id)?;
        node.meta.parent = parent;
        node.meta.path = path.clone();
        let children = node.kind.children();

        for (segment, child) in children {
            match parent {
                Some(_) => self.set_parent_and_path(
                    child,
                    Some(Parent::Value(id)),
                    child_path(&path, &segment),
                )?,
                None => self.set_parent_and_path(child, None, "")?,
            }
        }
        self.changed_value(id);
        Ok(())
    }

    /// Record a change to `id`: stamp its revision, flag the batch as
    /// changed and mark `id` plus every value ancestor dirty.
    ///
    /// Unattached values are ignored. An attached change outside a batch is
    /// logged as critical but still recorded.
    pub(crate) fn changed_value(&mut self, id: ValueId) {
        match self.node(id) {
            Ok(node) if node.meta.parent.is_some() => {}
            _ => return,
        }

        if !self.locked {
            self.lock_violations += 1;
            let path = self.node(id).map(|n| n.meta.path.as_str()).unwrap_or_default();
            error!(
                critical = true,
                path = %path,
                backtrace = %Backtrace::force_capture(),
                "changing the state without holding the lock"
            );
        }

        let revision = self.revision;
        self.changed = true;

        let mut cursor = Some(id);
        let mut leaf = true;
        while let Some(current) = cursor {
            let Ok(node) = self.node_mut(current) else {
                break;
            };
            if leaf {
                node.meta.revision = revision;
                leaf = false;
            }
            node.meta.save_needed = true;
            cursor = node.meta.parent.and_then(|p| p.value());
        }
    }

    // ---- root entries ----

    /// Register `id` as the top-level entry `name`, persisted under
    /// `backing` (empty for none).
    pub fn add(&mut self, name: &str, backing: &str, id: ValueId) -> StateResult<()> {
        if self.entries.contains_key(name) {
            return Err(StateError::ExistingKey(name.to_string()));
        }
        self.node(id)?;
        self.entries.insert(
            name.to_string(),
            RootEntry {
                backing: backing.to_string(),
                value: id,
            },
        );
        self.set_parent_and_path(id, Some(Parent::Root), name)
    }

    /// Value registered under `name`.
    pub fn get(&self, name: &str) -> Option<ValueId> {
        self.entries.get(name).map(|e| e.value)
    }

    pub fn entry(&self, name: &str) -> Option<&RootEntry> {
        self.entries.get(name)
    }

    /// Registered entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &RootEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// All top-level entries as one JSON object.
    pub fn root_json(&self, skip_save: bool) -> StateResult<Json> {
        let mut out = HashMap::with_capacity(self.entries.len());
        for (name, entry) in &self.entries {
            if skip_save && self.node(entry.value)?.meta.skip_save {
                continue;
            }
            out.insert(name.clone(), self.to_json(entry.value, skip_save)?);
        }
        Ok(Json::Object(out))
    }

    // ---- JSON ----

    /// Serialize `id`. With `skip_save`, children flagged skip-save are
    /// left out.
    pub fn to_json(&self, id: ValueId, skip_save: bool) -> StateResult<Json> {
        let node = self.node(id)?;
        let json = match &node.kind {
            Kind::String(s) | Kind::Date(s) | Kind::Guid(s) => Json::String(s.clone()),
            Kind::Enum { value, .. } => Json::String(value.clone()),
            Kind::Number(n) => Json::from(*n),
            Kind::Bool(b) => Json::from(*b),
            Kind::Array { items, .. } => {
                let mut out = Vec::with_capacity(items.len());
                for child in items {
                    if !self.omitted(*child, skip_save)? {
                        out.push(self.to_json(*child, skip_save)?);
                    }
                }
                Json::Array(out)
            }
            Kind::Hash { items, .. } => {
                let mut out = HashMap::with_capacity(items.len());
                for (key, child) in items {
                    if !self.omitted(*child, skip_save)? {
                        out.insert(key.clone(), self.to_json(*child, skip_save)?);
                    }
                }
                Json::Object(out)
            }
            Kind::Object { def, fields, .. } => {
                let mut out = HashMap::with_capacity(fields.len());
                for (field, child) in def.fields.iter().zip(fields) {
                    if !self.omitted(*child, skip_save)? {
                        out.insert(field.name.clone(), self.to_json(*child, skip_save)?);
                    }
                }
                Json::Object(out)
            }
        };
        Ok(json)
    }

    fn omitted(&self, id: ValueId, skip_save: bool) -> StateResult<bool> {
        Ok(skip_save && self.node(id)?.meta.skip_save)
    }

    /// Decode `json` into `id`, dispatching on its variant.
    pub fn set_json(&mut self, id: ValueId, json: &Json) -> StateResult<()> {
        match self.variant(id)? {
            Variant::String => self.string_set_json(id, json),
            Variant::Number => self.number_set_json(id, json),
            Variant::Bool => self.bool_set_json(id, json),
            Variant::Date => self.date_set_json(id, json),
            Variant::Enum => self.enum_set_json(id, json),
            Variant::Guid => self.guid_set_json(id, json),
            Variant::Array => self.array_set_json(id, json),
            Variant::Hash => self.hash_set_json(id, json),
            Variant::Object => self.object_set_json(id, json),
        }
    }

    /// Human-readable rendering: quoted strings, bare numbers and bools,
    /// `[a, b]` arrays and `{k: v}` maps.
    pub fn display(&self, id: ValueId) -> StateResult<String> {
        let node = self.node(id)?;
        let text = match &node.kind {
            Kind::String(s) | Kind::Date(s) | Kind::Guid(s) => tally_json::quote(s),
            Kind::Enum { value, .. } => tally_json::quote(value),
            Kind::Number(n) => n.to_string(),
            Kind::Bool(b) => b.to_string(),
            Kind::Array { items, .. } => {
                let parts = items
                    .iter()
                    .map(|child| self.display(*child))
                    .collect::<StateResult<Vec<_>>>()?;
                format!("[{}]", parts.join(", "))
            }
            Kind::Hash { items, .. } => {
                let mut keys: Vec<&String> = items.keys().collect();
                keys.sort();
                let parts = keys
                    .into_iter()
                    .map(|key| -> StateResult<String> {
                        Ok(format!("{key}: {}", self.display(items[key])?))
                    })
                    .collect::<StateResult<Vec<_>>>()?;
                format!("{{{}}}", parts.join(", "))
            }
            Kind::Object { def, fields, .. } => {
                let parts = def
                    .fields
                    .iter()
                    .zip(fields)
                    .map(|(field, child)| -> StateResult<String> {
                        Ok(format!("{}: {}", field.name, self.display(*child)?))
                    })
                    .collect::<StateResult<Vec<_>>>()?;
                format!("{{{}}}", parts.join(", "))
            }
        };
        Ok(text)
    }

    /// Fail with `VariantMismatch` unless `id` is a `expected`.
    pub(crate) fn expect_variant(&self, id: ValueId, expected: Variant) -> StateResult<&Node> {
        let node = self.node(id)?;
        if node.kind.variant() != expected {
            return Err(mismatch(node, expected));
        }
        Ok(node)
    }
}

pub(crate) fn mismatch(node: &Node, expected: Variant) -> StateError {
    StateError::VariantMismatch {
        path: node.meta.path.clone(),
        expected,
        found: node.kind.variant(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ObjectDef;

    fn locked() -> State {
        let mut state = State::new();
        state.begin_batch();
        state
    }

    fn team() -> Schema {
        ObjectDef::new("Team")
            .field("Name", Schema::String)
            .field("Players", Schema::array_of(Schema::String))
            .transient_field("Score", Schema::Number)
            .into()
    }

    // ---- arena ----

    #[test]
    fn released_slots_are_reused_with_new_generation() {
        let mut state = State::new();
        let a = state.create(&Schema::String);
        assert!(state.discard(a));
        assert!(!state.contains(a));

        let b = state.create(&Schema::Number);
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(matches!(state.variant(a), Err(StateError::UnknownValue(id)) if id == a));
        assert_eq!(state.variant(b).unwrap(), Variant::Number);
    }

    #[test]
    fn discard_keeps_attached_values() {
        let mut state = locked();
        let v = state.create(&Schema::Bool);
        state.add("Flag", "", v).unwrap();
        assert!(!state.discard(v));
        assert!(state.contains(v));
    }

    #[test]
    fn create_object_builds_fields() {
        let mut state = State::new();
        let team = state.create(&team());
        assert_eq!(state.len(), 4);
        let score = state.object_get(team, "Score").unwrap().unwrap();
        assert!(state.skip_save(score).unwrap());
        let name = state.object_get(team, "Name").unwrap().unwrap();
        assert!(!state.skip_save(name).unwrap());
        assert_eq!(state.parent(name).unwrap(), None);
    }

    // ---- batches ----

    #[test]
    fn batch_bumps_revision_once() {
        let mut state = locked();
        let team_id = state.create(&team());
        state.add("Team", "team", team_id).unwrap();
        assert_eq!(state.end_batch(), 1);

        state.begin_batch();
        let name = state.object_get(team_id, "Name").unwrap().unwrap();
        state.set_string(name, "A").unwrap();
        state.set_string(name, "B").unwrap();
        state.set_string(name, "C").unwrap();
        assert_eq!(state.end_batch(), 2);

        state.begin_batch();
        assert_eq!(state.end_batch(), 2);
        assert_eq!(state.lock_violations(), 0);
    }

    #[test]
    fn unlocked_change_is_counted_but_applied() {
        let mut state = State::new();
        let v = state.create(&Schema::String);
        state.add("Motd", "motd", v).unwrap();
        assert_eq!(state.lock_violations(), 1);

        state.set_string(v, "hello").unwrap();
        assert_eq!(state.lock_violations(), 2);
        assert_eq!(state.string(v).unwrap(), "hello");
        assert!(state.is_changed());
    }

    #[test]
    fn unattached_changes_are_silent() {
        let mut state = State::new();
        let v = state.create(&Schema::String);
        state.set_string(v, "x").unwrap();
        assert_eq!(state.lock_violations(), 0);
        assert!(!state.is_changed());
        assert!(!state.save_needed(v).unwrap());
    }

    // ---- root entries ----

    #[test]
    fn add_rejects_duplicates() {
        let mut state = locked();
        let a = state.create(&Schema::String);
        let b = state.create(&Schema::String);
        state.add("Motd", "motd", a).unwrap();
        assert!(matches!(
            state.add("Motd", "other", b),
            Err(StateError::ExistingKey(name)) if name == "Motd"
        ));
        assert_eq!(state.get("Motd"), Some(a));
        assert_eq!(state.entry("Motd").unwrap().backing, "motd");
        assert_eq!(state.parent(a).unwrap(), Some(Parent::Root));
        assert_eq!(state.path(a).unwrap(), "Motd");
    }

    #[test]
    fn attach_cascades_paths() {
        let mut state = locked();
        let team_id = state.create(&team());
        let players = state.object_get(team_id, "Players").unwrap().unwrap();
        let p0 = state.array_new_element(players, &Json::from("ann")).unwrap();
        assert_eq!(state.parent(p0).unwrap(), None);
        assert_eq!(state.path(p0).unwrap(), "");

        state.add("Team", "team", team_id).unwrap();
        assert_eq!(state.path(players).unwrap(), "Team[Players]");
        assert_eq!(state.path(p0).unwrap(), "Team[Players][0]");
        assert_eq!(state.parent(p0).unwrap(), Some(Parent::Value(players)));

        state.set_parent_and_path(team_id, None, "").unwrap();
        assert_eq!(state.path(p0).unwrap(), "");
        assert_eq!(state.parent(players).unwrap(), None);
    }

    #[test]
    fn reattach_in_place_counts_as_change() {
        let mut state = locked();
        let team_id = state.create(&team());
        state.add("Team", "team", team_id).unwrap();
        assert_eq!(state.end_batch(), 1);
        state.mark_clean(team_id).unwrap();

        state.begin_batch();
        assert!(!state.is_changed());
        state.set_parent_and_path(team_id, Some(Parent::Root), "Team").unwrap();
        assert!(state.is_changed());
        assert!(state.save_needed(team_id).unwrap());
        assert_eq!(state.path(team_id).unwrap(), "Team");
        assert_eq!(state.end_batch(), 2);
    }

    #[test]
    fn mark_clean_clears_subtree() {
        let mut state = locked();
        let team_id = state.create(&team());
        state.add("Team", "team", team_id).unwrap();
        let name = state.object_get(team_id, "Name").unwrap().unwrap();
        assert!(state.save_needed(name).unwrap());
        state.mark_clean(team_id).unwrap();
        assert!(!state.save_needed(team_id).unwrap());
        assert!(!state.save_needed(name).unwrap());
    }

    // ---- JSON ----

    #[test]
    fn skip_save_filters_children() {
        let mut state = locked();
        let team_id = state.create(&team());
        state
            .set_json(
                team_id,
                &tally_json::decode_str(r#"{"Name": "Reds", "Players": ["a"], "Score": 7}"#).unwrap(),
            )
            .unwrap();

        let live = state.to_json(team_id, false).unwrap();
        assert_eq!(live.get("Score"), Some(&Json::from(7i64)));

        let saved = state.to_json(team_id, true).unwrap();
        assert_eq!(saved.get("Score"), None);
        assert_eq!(saved.to_json(false), r#"{"Name": "Reds", "Players": ["a"]}"#);
    }

    #[test]
    fn root_json_collects_entries() {
        let mut state = locked();
        let motd = state.create(&Schema::String);
        let secret = state.create(&Schema::String);
        state.set_skip_save(secret, true).unwrap();
        state.add("Motd", "motd", motd).unwrap();
        state.add("Secret", "", secret).unwrap();
        state.set_string(motd, "hi").unwrap();

        assert_eq!(
            state.root_json(false).unwrap().to_json(false),
            r#"{"Motd": "hi", "Secret": ""}"#
        );
        assert_eq!(state.root_json(true).unwrap().to_json(false), r#"{"Motd": "hi"}"#);
    }

    #[test]
    fn display_renders_tree() {
        let mut state = locked();
        let team_id = state.create(&team());
        state
            .set_json(
                team_id,
                &tally_json::decode_str(r#"{"Name": "Reds", "Players": ["a", "b"], "Score": 3}"#)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(
            state.display(team_id).unwrap(),
            r#"{Name: "Reds", Players: ["a", "b"], Score: 3}"#
        );
    }

    #[test]
    fn typed_access_checks_variant() {
        let mut state = State::new();
        let v = state.create(&Schema::Number);
        assert!(matches!(
            state.string(v),
            Err(StateError::VariantMismatch {
                expected: Variant::String,
                found: Variant::Number,
                ..
            })
        ));
    }
}
