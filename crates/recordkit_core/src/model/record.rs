//! Observable record.
//!
//! # Responsibility
//! - Hold attribute overrides on top of schema defaults.
//! - Detect value changes and notify listeners synchronously.
//!
//! # Invariants
//! - Reads fall back to the schema default, then to absent.
//! - A `set` whose values all equal the current ones emits nothing.
//! - Each `set` call emits one `change:<name>` per changed attribute and
//!   then exactly one `change`, after every key has been applied.
//! - No `RefCell` borrow is held while listeners run, so listeners may
//!   mutate the record; the nested call keeps its own `ChangeSet`.

use crate::events::registry::{dispatch, EventRegistry, ListenerId, Notification};
use crate::events::topic::Topic;
use crate::model::attrs::{
    attributes_from_json, json_kind, validate_attribute_name, AttrValue, Attributes,
};
use crate::model::error::RecordError;
use crate::model::schema::RecordSchema;
use log::{debug, warn};
use serde::{Deserialize, Serialize, Serializer};
use std::cell::RefCell;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use uuid::Uuid;

/// Client id assigned at creation; always present, never reused.
pub type Cid = Uuid;

/// Caller-visible identity parsed from the schema id attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Parses an identity value. `null` means "no identity".
    ///
    /// # Errors
    /// - `InvalidIdentity` for floats, booleans, composites and empty strings.
    pub fn from_value(value: &AttrValue) -> Result<Option<Self>, RecordError> {
        match value {
            AttrValue::Null => Ok(None),
            AttrValue::Number(number) => number
                .as_i64()
                .map(|id| Some(Self::Int(id)))
                .ok_or_else(|| RecordError::InvalidIdentity(value.to_string())),
            AttrValue::String(text) if !text.is_empty() => Ok(Some(Self::Text(text.clone()))),
            other => Err(RecordError::InvalidIdentity(format!(
                "{other} ({})",
                json_kind(other)
            ))),
        }
    }

    pub fn to_value(&self) -> AttrValue {
        match self {
            Self::Int(id) => AttrValue::from(*id),
            Self::Text(id) => AttrValue::from(id.as_str()),
        }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One attribute transition inside a single `set`/`unset` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrChange {
    pub name: String,
    /// Value visible before the call (`None` when absent).
    pub previous: Option<AttrValue>,
    /// Value visible after the call (`None` when absent).
    pub current: Option<AttrValue>,
}

/// Attributes changed by one mutating call, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: Vec<AttrChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&AttrChange> {
        self.entries.iter().find(|change| change.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|change| change.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttrChange> {
        self.entries.iter()
    }

    fn push(&mut self, change: AttrChange) {
        self.entries.push(change);
    }
}

struct RecordState {
    cid: Cid,
    id: Option<RecordId>,
    schema: Rc<RecordSchema>,
    /// Explicit values; defaults live in the schema.
    overrides: Attributes,
    /// Changes applied by the most recent call that changed anything.
    last_change: ChangeSet,
}

impl RecordState {
    fn effective(&self, name: &str) -> Option<AttrValue> {
        self.overrides
            .get(name)
            .or_else(|| self.schema.default_value(name))
            .cloned()
    }

    fn snapshot(&self) -> Attributes {
        let mut attributes = self.schema.defaults().clone();
        attributes.extend(
            self.overrides
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        attributes
    }

    fn check_writable(&self, name: &str) -> Result<(), RecordError> {
        validate_attribute_name(name)?;
        if name == self.schema.id_attribute() {
            return Err(RecordError::ProtectedFieldWrite(name.to_string()));
        }
        self.schema.check_allowed(name)
    }
}

struct RecordShared {
    state: RefCell<RecordState>,
    events: RefCell<EventRegistry>,
    /// Collection relays, kept apart from caller listeners and called after
    /// them for every event.
    relays: RefCell<EventRegistry>,
}

/// Shared handle to one observable record.
///
/// Cloning the handle shares state and listeners; use [`Record::ptr_eq`]
/// for reference equality.
#[derive(Clone)]
pub struct Record {
    shared: Rc<RecordShared>,
}

impl Record {
    /// Creates a record from `initial` merged over the schema defaults.
    ///
    /// The id attribute may only be supplied here.
    ///
    /// # Errors
    /// - `InvalidAttributeName` / `UnknownAttribute` for rejected keys.
    /// - `InvalidIdentity` when the id attribute is not a usable identity.
    pub fn new(schema: Rc<RecordSchema>, initial: Attributes) -> Result<Self, RecordError> {
        let mut id = None;
        for (name, value) in &initial {
            validate_attribute_name(name)?;
            schema.check_allowed(name)?;
            if name == schema.id_attribute() {
                id = RecordId::from_value(value)?;
            }
        }

        let cid = Uuid::new_v4();
        debug!(
            "event=record_create module=record status=ok schema={} cid={} id={}",
            schema.name(),
            cid,
            id.as_ref().map(ToString::to_string).unwrap_or_default()
        );

        Ok(Self {
            shared: Rc::new(RecordShared {
                state: RefCell::new(RecordState {
                    cid,
                    id,
                    schema,
                    overrides: initial,
                    last_change: ChangeSet::default(),
                }),
                events: RefCell::new(EventRegistry::new()),
                relays: RefCell::new(EventRegistry::new()),
            }),
        })
    }

    /// Creates a record from a JSON object.
    pub fn from_json(schema: Rc<RecordSchema>, initial: AttrValue) -> Result<Self, RecordError> {
        Self::new(schema, attributes_from_json(initial)?)
    }

    pub fn cid(&self) -> Cid {
        self.shared.state.borrow().cid
    }

    pub fn id(&self) -> Option<RecordId> {
        self.shared.state.borrow().id.clone()
    }

    pub fn schema(&self) -> Rc<RecordSchema> {
        Rc::clone(&self.shared.state.borrow().schema)
    }

    /// Returns whether both handles point at the same record.
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Current value, else the schema default, else `None`.
    pub fn get(&self, name: &str) -> Option<AttrValue> {
        self.shared.state.borrow().effective(name)
    }

    /// Returns whether `name` holds a non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some_and(|value| !value.is_null())
    }

    /// Sets one attribute. See [`Record::set_many`].
    pub fn set(&self, name: &str, value: impl Into<AttrValue>) -> Result<ChangeSet, RecordError> {
        let mut changes = Attributes::new();
        changes.insert(name.to_string(), value.into());
        self.set_many(changes)
    }

    /// Applies a batch of attribute writes.
    ///
    /// The whole batch is validated before anything is applied; on error the
    /// record is unchanged and no event fires. Values are compared
    /// structurally, so writing an equal value is a no-op.
    ///
    /// # Errors
    /// - `InvalidAttributeName`, `ProtectedFieldWrite`, `UnknownAttribute`.
    pub fn set_many(&self, changes: Attributes) -> Result<ChangeSet, RecordError> {
        let change_set = {
            let mut state = self.shared.state.borrow_mut();
            if let Some(err) = changes
                .keys()
                .find_map(|name| state.check_writable(name).err())
            {
                warn!(
                    "event=record_set module=record status=rejected cid={} error={}",
                    state.cid, err
                );
                return Err(err);
            }

            let mut change_set = ChangeSet::default();
            for (name, value) in changes {
                let previous = state.effective(&name);
                if previous.as_ref() == Some(&value) {
                    continue;
                }
                state.overrides.insert(name.clone(), value.clone());
                change_set.push(AttrChange {
                    name,
                    previous,
                    current: Some(value),
                });
            }
            if !change_set.is_empty() {
                state.last_change = change_set.clone();
                debug!(
                    "event=record_set module=record status=ok cid={} changed={}",
                    state.cid,
                    change_set.len()
                );
            }
            change_set
        };

        self.emit_changes(&change_set);
        Ok(change_set)
    }

    /// Sets attributes from a JSON object.
    pub fn set_json(&self, changes: AttrValue) -> Result<ChangeSet, RecordError> {
        self.set_many(attributes_from_json(changes)?)
    }

    /// Drops the explicit value of `name`, reverting reads to the default.
    ///
    /// Emits `change:<name>` (value = new effective value, `Null` if absent)
    /// and `change` only when the visible value actually changed.
    pub fn unset(&self, name: &str) -> Result<ChangeSet, RecordError> {
        let change_set = {
            let mut state = self.shared.state.borrow_mut();
            state.check_writable(name)?;

            let mut change_set = ChangeSet::default();
            let previous = state.effective(name);
            if state.overrides.remove(name).is_some() {
                let current = state.effective(name);
                if current != previous {
                    change_set.push(AttrChange {
                        name: name.to_string(),
                        previous,
                        current,
                    });
                    state.last_change = change_set.clone();
                }
            }
            change_set
        };

        self.emit_changes(&change_set);
        Ok(change_set)
    }

    /// Value before the most recent change, or the current value when the
    /// attribute was not part of it.
    pub fn previous(&self, name: &str) -> Option<AttrValue> {
        let state = self.shared.state.borrow();
        match state.last_change.get(name) {
            Some(change) => change.previous.clone(),
            None => state.effective(name),
        }
    }

    /// Snapshot as it was before the most recent change.
    pub fn previous_attributes(&self) -> Attributes {
        let state = self.shared.state.borrow();
        let mut attributes = state.snapshot();
        for change in state.last_change.iter() {
            match &change.previous {
                Some(value) => attributes.insert(change.name.clone(), value.clone()),
                None => attributes.remove(&change.name),
            };
        }
        attributes
    }

    /// Attributes touched by the most recent change, with their new values.
    pub fn changed(&self) -> Attributes {
        self.shared
            .state
            .borrow()
            .last_change
            .iter()
            .map(|change| {
                (
                    change.name.clone(),
                    change.current.clone().unwrap_or(AttrValue::Null),
                )
            })
            .collect()
    }

    pub fn has_changed(&self, name: &str) -> bool {
        self.shared.state.borrow().last_change.contains(name)
    }

    /// Independent copy of defaults plus explicit values.
    pub fn snapshot(&self) -> Attributes {
        self.shared.state.borrow().snapshot()
    }

    /// Snapshot as a JSON object, for template rendering.
    pub fn to_json(&self) -> AttrValue {
        AttrValue::Object(self.snapshot().into_iter().collect())
    }

    /// Subscribes `callback` to `topic` on this record.
    pub fn on(
        &self,
        topic: Topic,
        callback: impl Fn(&Notification<'_>) + 'static,
    ) -> ListenerId {
        self.shared.events.borrow_mut().on(topic, Rc::new(callback))
    }

    /// Unsubscribes one listener. The removed closure is dropped only after
    /// the registry borrow ends, so its captures may detach from this record.
    pub fn off(&self, topic: &Topic, listener: ListenerId) -> bool {
        let removed = self.shared.events.borrow_mut().off(topic, listener);
        removed.is_some()
    }

    pub fn off_all(&self, topic: &Topic) -> usize {
        let removed = self.shared.events.borrow_mut().off_all(topic);
        removed.len()
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.shared.events.borrow().listener_count(topic)
    }

    pub(crate) fn attach_relay(&self, relay: impl Fn(&Notification<'_>) + 'static) -> ListenerId {
        self.shared
            .relays
            .borrow_mut()
            .on(Topic::All, Rc::new(relay))
    }

    pub(crate) fn detach_relay(&self, relay: ListenerId) -> bool {
        let removed = self.shared.relays.borrow_mut().off(&Topic::All, relay);
        removed.is_some()
    }

    #[cfg(test)]
    pub(crate) fn relay_count(&self) -> usize {
        self.shared.relays.borrow().listener_count(&Topic::All)
    }

    fn emit_changes(&self, change_set: &ChangeSet) {
        if change_set.is_empty() {
            return;
        }
        for change in change_set.iter() {
            let value = change.current.clone().unwrap_or(AttrValue::Null);
            self.emit(&Topic::change_of(change.name.as_str()), Some(&value));
        }
        self.emit(&Topic::Change, None);
    }

    fn emit(&self, topic: &Topic, value: Option<&AttrValue>) {
        let mut listeners = self.shared.events.borrow().snapshot(topic);
        listeners.extend(self.shared.relays.borrow().snapshot(&Topic::All));
        dispatch(
            &listeners,
            &Notification {
                topic,
                record: self,
                value,
                collection: None,
            },
        );
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Record")
            .field("schema", &state.schema.name())
            .field("cid", &state.cid)
            .field("id", &state.id)
            .field("attributes", &state.snapshot())
            .finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}
