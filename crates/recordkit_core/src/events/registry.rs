//! Observer registry and notification payload.

use crate::collection::Collection;
use crate::events::topic::Topic;
use crate::model::attrs::AttrValue;
use crate::model::record::Record;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by `on`, accepted by `off`.
///
/// Ids are unique process-wide, so a handle from one entity never removes
/// a listener registered on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Payload passed to listeners.
pub struct Notification<'a> {
    /// Topic being emitted (the specific one, also for `All` listeners).
    pub topic: &'a Topic,
    /// Record the event is about. For relayed events, the originating member.
    pub record: &'a Record,
    /// New value for `change:<name>`; `Null` when the attribute was unset.
    pub value: Option<&'a AttrValue>,
    /// Set for `add`, `remove` and events relayed through a collection.
    pub collection: Option<&'a Collection>,
}

/// Subscriber callback.
pub type Listener = Rc<dyn Fn(&Notification<'_>)>;

/// Ordered listener lists keyed by topic.
#[derive(Default)]
pub struct EventRegistry {
    listeners: BTreeMap<Topic, Vec<(ListenerId, Listener)>>,
}

impl Debug for EventRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<String, usize> = self
            .listeners
            .iter()
            .map(|(topic, entries)| (topic.to_string(), entries.len()))
            .collect();
        f.debug_struct("EventRegistry")
            .field("listeners", &counts)
            .finish()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` to the list for `topic`.
    pub fn on(&mut self, topic: Topic, listener: Listener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.entry(topic).or_default().push((id, listener));
        id
    }

    /// Removes one listener and hands it back.
    ///
    /// The caller drops the returned listener after releasing any borrow of
    /// this registry: dropping a closure can drop the last handle of a
    /// collection, whose teardown detaches from this same entity.
    pub fn off(&mut self, topic: &Topic, id: ListenerId) -> Option<Listener> {
        let entries = self.listeners.get_mut(topic)?;
        let position = entries.iter().position(|(entry_id, _)| *entry_id == id)?;
        let (_, listener) = entries.remove(position);
        if entries.is_empty() {
            self.listeners.remove(topic);
        }
        Some(listener)
    }

    /// Removes every listener of `topic` and hands them back, in order.
    pub fn off_all(&mut self, topic: &Topic) -> Vec<Listener> {
        self.listeners
            .remove(topic)
            .map(|entries| entries.into_iter().map(|(_, listener)| listener).collect())
            .unwrap_or_default()
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.listeners.get(topic).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Listeners to call for `topic`: its own, then `All` listeners.
    ///
    /// Callers take this snapshot before dispatch so listeners may call
    /// `on`/`off` on the same entity. A listener removed mid-dispatch still
    /// receives the event being dispatched.
    pub fn snapshot(&self, topic: &Topic) -> Vec<Listener> {
        let own = self.listeners.get(topic).into_iter().flatten();
        let all = match topic {
            Topic::All => None,
            _ => self.listeners.get(&Topic::All),
        };
        own.chain(all.into_iter().flatten())
            .map(|(_, listener)| Rc::clone(listener))
            .collect()
    }
}

/// Calls `listeners` in order with `notification`.
pub fn dispatch(listeners: &[Listener], notification: &Notification<'_>) {
    for listener in listeners {
        listener(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::{dispatch, EventRegistry, Listener, Notification};
    use crate::events::topic::Topic;
    use crate::model::record::Record;
    use crate::model::schema::RecordSchema;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_listener(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> Listener {
        let log = Rc::clone(log);
        let tag = tag.to_string();
        Rc::new(move |n: &Notification<'_>| {
            log.borrow_mut().push(format!("{tag}:{}", n.topic));
        })
    }

    #[test]
    fn snapshot_orders_topic_listeners_before_all() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        registry.on(Topic::All, recording_listener(&log, "all"));
        registry.on(Topic::Change, recording_listener(&log, "first"));
        registry.on(Topic::Change, recording_listener(&log, "second"));

        let record = Record::new(RecordSchema::untyped("note"), Default::default())
            .expect("record should build");
        let listeners = registry.snapshot(&Topic::Change);
        dispatch(
            &listeners,
            &Notification {
                topic: &Topic::Change,
                record: &record,
                value: None,
                collection: None,
            },
        );

        assert_eq!(
            *log.borrow(),
            vec!["first:change", "second:change", "all:change"]
        );
    }

    #[test]
    fn off_removes_only_the_given_listener() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        let first = registry.on(Topic::Add, recording_listener(&log, "a"));
        registry.on(Topic::Add, recording_listener(&log, "b"));

        assert!(registry.off(&Topic::Add, first).is_some());
        assert!(registry.off(&Topic::Add, first).is_none());
        assert!(registry.off(&Topic::Remove, first).is_none());
        assert_eq!(registry.listener_count(&Topic::Add), 1);
    }

    #[test]
    fn off_all_clears_topic() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        registry.on(Topic::change_of("title"), recording_listener(&log, "a"));
        registry.on(Topic::change_of("title"), recording_listener(&log, "b"));

        assert_eq!(registry.off_all(&Topic::change_of("title")).len(), 2);
        assert!(registry.off_all(&Topic::change_of("title")).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn listener_ids_are_unique_across_registries() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut left = EventRegistry::new();
        let mut right = EventRegistry::new();
        let left_id = left.on(Topic::Add, recording_listener(&log, "l"));
        right.on(Topic::Add, recording_listener(&log, "r"));

        assert!(right.off(&Topic::Add, left_id).is_none());
        assert_eq!(right.listener_count(&Topic::Add), 1);
    }
}
