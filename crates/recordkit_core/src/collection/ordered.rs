//! Insertion-ordered, id-indexed record collection.
//!
//! # Invariants
//! - No two members share an id, and no record handle appears twice.
//! - `len()` always equals the member sequence length.
//! - Additions go to the end; removals keep the order of the rest.
//! - A failed batch leaves the collection unchanged and emits nothing.
//! - Relay listeners on members hold only weak references to the collection.

use crate::events::registry::{dispatch, EventRegistry, ListenerId, Notification};
use crate::events::topic::Topic;
use crate::model::attrs::{attributes_from_json, AttrValue, Attributes};
use crate::model::error::RecordError;
use crate::model::record::{Cid, Record, RecordId};
use crate::model::schema::RecordSchema;
use log::{debug, warn};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::rc::{Rc, Weak};

/// Collection membership errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    /// Another member (or an earlier record of the batch) has this id.
    DuplicateIdentity(RecordId),
    /// The same id-less record handle is already a member or repeats in the
    /// batch. Handles with an id report `DuplicateIdentity` instead.
    DuplicateMember(Cid),
    /// Record construction failed in `add_attributes`.
    Record(RecordError),
}

impl Display for CollectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateIdentity(id) => write!(f, "record id already present: {id}"),
            Self::DuplicateMember(cid) => write!(f, "record already a member: {cid}"),
            Self::Record(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CollectionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Record(err) => Some(err),
            Self::DuplicateIdentity(_) | Self::DuplicateMember(_) => None,
        }
    }
}

impl From<RecordError> for CollectionError {
    fn from(value: RecordError) -> Self {
        Self::Record(value)
    }
}

pub type CollectionResult<T> = Result<T, CollectionError>;

struct Member {
    record: Record,
    cid: Cid,
    id: Option<RecordId>,
    relay: ListenerId,
}

struct CollectionState {
    schema: Rc<RecordSchema>,
    members: Vec<Member>,
    by_id: HashMap<RecordId, Record>,
}

impl CollectionState {
    /// Matches by handle identity first, then by id.
    fn position_of(&self, target: &Record) -> Option<usize> {
        let cid = target.cid();
        self.members
            .iter()
            .position(|member| member.cid == cid)
            .or_else(|| {
                let id = target.id()?;
                self.members
                    .iter()
                    .position(|member| member.id.as_ref() == Some(&id))
            })
    }

    fn check_insertable(&self, records: &[Record]) -> CollectionResult<()> {
        let mut seen_cids: HashSet<Cid> = self.members.iter().map(|member| member.cid).collect();
        let mut seen_ids: HashSet<RecordId> = self.by_id.keys().cloned().collect();
        for record in records {
            if let Some(id) = record.id() {
                if !seen_ids.insert(id.clone()) {
                    return Err(CollectionError::DuplicateIdentity(id));
                }
            }
            if !seen_cids.insert(record.cid()) {
                return Err(CollectionError::DuplicateMember(record.cid()));
            }
        }
        Ok(())
    }
}

struct CollectionShared {
    state: RefCell<CollectionState>,
    events: RefCell<EventRegistry>,
}

impl Drop for CollectionShared {
    fn drop(&mut self) {
        for member in self.state.get_mut().members.drain(..) {
            member.record.detach_relay(member.relay);
        }
    }
}

/// Shared handle to an ordered record collection.
#[derive(Clone)]
pub struct Collection {
    shared: Rc<CollectionShared>,
}

impl Collection {
    /// Empty collection typed to `schema`.
    pub fn empty(schema: Rc<RecordSchema>) -> Self {
        Self {
            shared: Rc::new(CollectionShared {
                state: RefCell::new(CollectionState {
                    schema,
                    members: Vec::new(),
                    by_id: HashMap::new(),
                }),
                events: RefCell::new(EventRegistry::new()),
            }),
        }
    }

    /// Builds a collection from `records` in order. Emits no events.
    ///
    /// # Errors
    /// - `DuplicateIdentity` when two records share an id.
    /// - `DuplicateMember` when a record handle repeats.
    pub fn new(
        schema: Rc<RecordSchema>,
        records: impl IntoIterator<Item = Record>,
    ) -> CollectionResult<Self> {
        let collection = Self::empty(schema);
        collection.insert_batch(records.into_iter().collect())?;
        Ok(collection)
    }

    pub fn schema(&self) -> Rc<RecordSchema> {
        Rc::clone(&self.shared.state.borrow().schema)
    }

    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Appends one record and emits `add`.
    pub fn add(&self, record: Record) -> CollectionResult<()> {
        self.add_many(vec![record])
    }

    /// Appends `records` in call order, then emits one `add` per record.
    ///
    /// # Errors
    /// - `DuplicateIdentity` / `DuplicateMember`; the collection is unchanged.
    pub fn add_many(&self, records: Vec<Record>) -> CollectionResult<()> {
        let added = self.insert_batch(records)?;
        debug!(
            "event=collection_add module=collection status=ok added={} len={}",
            added.len(),
            self.len()
        );
        for record in &added {
            self.emit(&Topic::Add, record, None);
        }
        Ok(())
    }

    /// Creates a record of the collection schema and appends it.
    pub fn add_attributes(&self, attributes: Attributes) -> CollectionResult<Record> {
        let record = Record::new(self.schema(), attributes)?;
        self.add(record.clone())?;
        Ok(record)
    }

    /// Same as [`Collection::add_attributes`] from a JSON object.
    pub fn add_json(&self, attributes: AttrValue) -> CollectionResult<Record> {
        self.add_attributes(attributes_from_json(attributes)?)
    }

    /// Removes one record; `None` when it was not a member.
    pub fn remove(&self, record: &Record) -> Option<Record> {
        self.remove_many(std::slice::from_ref(record)).pop()
    }

    /// Removes matching members, then emits one `remove` per removed record.
    ///
    /// Non-members are skipped without error or event.
    pub fn remove_many(&self, records: &[Record]) -> Vec<Record> {
        let removed = {
            let mut state = self.shared.state.borrow_mut();
            let mut removed = Vec::new();
            for target in records {
                let Some(position) = state.position_of(target) else {
                    continue;
                };
                let member = state.members.remove(position);
                if let Some(id) = &member.id {
                    state.by_id.remove(id);
                }
                removed.push(member);
            }
            removed
        };

        for member in &removed {
            member.record.detach_relay(member.relay);
        }
        if !removed.is_empty() {
            debug!(
                "event=collection_remove module=collection status=ok removed={} len={}",
                removed.len(),
                self.len()
            );
        }
        for member in &removed {
            self.emit(&Topic::Remove, &member.record, None);
        }
        removed.into_iter().map(|member| member.record).collect()
    }

    /// Removes the member with `id`, if any.
    pub fn remove_id(&self, id: &RecordId) -> Option<Record> {
        let record = self.get(id)?;
        self.remove(&record)
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        self.shared.state.borrow().by_id.get(id).cloned()
    }

    pub fn get_by_cid(&self, cid: Cid) -> Option<Record> {
        self.shared
            .state
            .borrow()
            .members
            .iter()
            .find(|member| member.cid == cid)
            .map(|member| member.record.clone())
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.index_of(record).is_some()
    }

    pub fn index_of(&self, record: &Record) -> Option<usize> {
        self.shared.state.borrow().position_of(record)
    }

    pub fn at(&self, index: usize) -> Option<Record> {
        self.shared
            .state
            .borrow()
            .members
            .get(index)
            .map(|member| member.record.clone())
    }

    pub fn len(&self) -> usize {
        self.shared.state.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Member handles in order.
    pub fn records(&self) -> Vec<Record> {
        self.shared
            .state
            .borrow()
            .members
            .iter()
            .map(|member| member.record.clone())
            .collect()
    }

    /// Ids of members that have one, in order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.shared
            .state
            .borrow()
            .members
            .iter()
            .filter_map(|member| member.id.clone())
            .collect()
    }

    /// Value of `name` for every member, in order.
    pub fn pluck(&self, name: &str) -> Vec<Option<AttrValue>> {
        self.records()
            .iter()
            .map(|record| record.get(name))
            .collect()
    }

    /// Members whose attributes equal every entry of `attributes`.
    pub fn where_attrs(&self, attributes: &Attributes) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| {
                attributes
                    .iter()
                    .all(|(name, value)| record.get(name).as_ref() == Some(value))
            })
            .collect()
    }

    /// Array of member snapshots.
    pub fn to_json(&self) -> AttrValue {
        AttrValue::Array(self.records().iter().map(Record::to_json).collect())
    }

    /// Subscribes to collection events, including relayed member changes.
    pub fn on(
        &self,
        topic: Topic,
        callback: impl Fn(&Notification<'_>) + 'static,
    ) -> ListenerId {
        self.shared.events.borrow_mut().on(topic, Rc::new(callback))
    }

    /// Unsubscribes one listener, dropping it after the registry borrow ends.
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

    /// Validates then inserts `records`, wiring relays. Emits nothing.
    fn insert_batch(&self, records: Vec<Record>) -> CollectionResult<Vec<Record>> {
        let mut state = self.shared.state.borrow_mut();
        if let Err(err) = state.check_insertable(&records) {
            warn!(
                "event=collection_add module=collection status=rejected schema={} error={}",
                state.schema.name(),
                err
            );
            return Err(err);
        }

        for record in &records {
            let relay = record.attach_relay(relay_listener(Rc::downgrade(&self.shared)));
            let id = record.id();
            if let Some(id) = &id {
                state.by_id.insert(id.clone(), record.clone());
            }
            state.members.push(Member {
                record: record.clone(),
                cid: record.cid(),
                id,
                relay,
            });
        }
        Ok(records)
    }

    fn emit(&self, topic: &Topic, record: &Record, value: Option<&AttrValue>) {
        let listeners = self.shared.events.borrow().snapshot(topic);
        dispatch(
            &listeners,
            &Notification {
                topic,
                record,
                value,
                collection: Some(self),
            },
        );
    }
}

/// Re-emits a member's change events on the owning collection.
fn relay_listener(collection: Weak<CollectionShared>) -> impl Fn(&Notification<'_>) + 'static {
    move |notification: &Notification<'_>| {
        if !notification.topic.is_change() {
            return;
        }
        let Some(shared) = collection.upgrade() else {
            return;
        };
        Collection { shared }.emit(notification.topic, notification.record, notification.value);
    }
}

impl Debug for Collection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Collection")
            .field("schema", &state.schema.name())
            .field("len", &state.members.len())
            .field("ids", &state.by_id.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let records = self.records();
        let mut seq = serializer.serialize_seq(Some(records.len()))?;
        for record in &records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}
