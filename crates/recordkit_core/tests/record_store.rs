use recordkit_core::{
    attributes_from_json, Attributes, Record, RecordError, RecordId, RecordSchema, Topic,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn todo_schema() -> Rc<RecordSchema> {
    RecordSchema::builder("todo")
        .default_value("title", "")
        .default_value("completed", false)
        .build()
        .expect("todo schema should build")
}

fn attrs(value: Value) -> Attributes {
    attributes_from_json(value).expect("test attributes should be an object")
}

/// Records `topic` and payload value for every event on `record`.
fn capture(record: &Record) -> Rc<RefCell<Vec<(String, Option<Value>)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    record.on(Topic::All, move |n| {
        sink.borrow_mut().push((n.topic.to_string(), n.value.cloned()));
    });
    log
}

#[test]
fn unset_attributes_read_as_defaults() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");

    assert_eq!(record.get("title"), Some(json!("")));
    assert_eq!(record.get("completed"), Some(json!(false)));
    assert_eq!(record.get("due"), None);
    assert!(!record.has("due"));
    assert_eq!(record.id(), None);
}

#[test]
fn creation_merges_initial_over_defaults() {
    let record = Record::new(
        todo_schema(),
        attrs(json!({"id": 2, "title": "Read the whole book"})),
    )
    .expect("record");

    assert_eq!(record.id(), Some(RecordId::Int(2)));
    assert_eq!(
        record.to_json(),
        json!({"id": 2, "title": "Read the whole book", "completed": false})
    );
}

#[test]
fn set_emits_attribute_events_then_one_change() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");
    let log = capture(&record);

    let changes = record
        .set_many(attrs(json!({"title": "Go", "completed": true})))
        .expect("batch set");

    assert_eq!(changes.len(), 2);
    assert_eq!(
        *log.borrow(),
        vec![
            ("change:completed".to_string(), Some(json!(true))),
            ("change:title".to_string(), Some(json!("Go"))),
            ("change".to_string(), None),
        ]
    );
}

#[test]
fn setting_current_value_emits_nothing() {
    let record = Record::new(todo_schema(), attrs(json!({"title": "Go"}))).expect("record");
    let log = capture(&record);

    assert!(record.set("title", "Go").expect("same value").is_empty());
    assert!(record.set("completed", false).expect("same as default").is_empty());
    record
        .set("tags", json!(["a", "b"]))
        .expect("first composite write");
    log.borrow_mut().clear();
    assert!(record
        .set("tags", json!(["a", "b"]))
        .expect("equal composite")
        .is_empty());

    assert!(log.borrow().is_empty());
}

#[test]
fn batch_with_only_partial_change_reports_only_changed_keys() {
    let record = Record::new(todo_schema(), attrs(json!({"title": "Go"}))).expect("record");
    let log = capture(&record);

    let changes = record
        .set_many(attrs(json!({"title": "Go", "completed": true})))
        .expect("batch");

    assert_eq!(changes.names().collect::<Vec<_>>(), vec!["completed"]);
    assert_eq!(log.borrow().len(), 2);
}

#[test]
fn invalid_batch_is_rejected_atomically() {
    let record = Record::new(todo_schema(), attrs(json!({"id": 1}))).expect("record");
    let log = capture(&record);

    let err = record
        .set_many(attrs(json!({"title": "New", "id": 9})))
        .expect_err("identity write must fail");
    assert_eq!(err, RecordError::ProtectedFieldWrite("id".to_string()));

    let err = record.set("", 1).expect_err("empty name must fail");
    assert!(matches!(err, RecordError::InvalidAttributeName(_)));

    assert_eq!(record.get("title"), Some(json!("")));
    assert!(log.borrow().is_empty());
}

#[test]
fn attribute_names_are_case_sensitive() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");
    record.set("Title", "upper").expect("distinct attribute");

    assert_eq!(record.get("title"), Some(json!("")));
    assert_eq!(record.get("Title"), Some(json!("upper")));
}

#[test]
fn allow_list_rejects_undeclared_attributes() {
    let schema = RecordSchema::builder("todo")
        .default_value("title", "")
        .allow_only(["notes"])
        .build()
        .expect("schema");

    let err = Record::new(Rc::clone(&schema), attrs(json!({"color": "red"})))
        .expect_err("undeclared attribute on create");
    assert!(matches!(err, RecordError::UnknownAttribute { .. }));

    let record = Record::new(schema, attrs(json!({"notes": "n"}))).expect("record");
    assert!(matches!(
        record.set("color", "red"),
        Err(RecordError::UnknownAttribute { .. })
    ));
    record.set("title", "ok").expect("declared default is writable");
}

#[test]
fn invalid_identity_is_rejected_on_create() {
    let err = Record::new(todo_schema(), attrs(json!({"id": true})))
        .expect_err("bool id must fail");
    assert!(matches!(err, RecordError::InvalidIdentity(_)));
}

#[test]
fn snapshot_does_not_alias_live_state() {
    let record = Record::new(todo_schema(), attrs(json!({"title": "a"}))).expect("record");
    let mut snapshot = record.snapshot();
    let json = record.to_json();

    record.set("title", "b").expect("set");
    snapshot.insert("title".to_string(), json!("mutated"));

    assert_eq!(json["title"], json!("a"));
    assert_eq!(record.get("title"), Some(json!("b")));
}

#[test]
fn unset_reports_new_effective_value() {
    let record = Record::new(todo_schema(), attrs(json!({"title": "a", "due": 5})))
        .expect("record");
    let log = capture(&record);

    record.unset("title").expect("unset title");
    record.unset("due").expect("unset due");
    record.unset("never").expect("unset absent");

    assert_eq!(
        *log.borrow(),
        vec![
            ("change:title".to_string(), Some(json!(""))),
            ("change".to_string(), None),
            ("change:due".to_string(), Some(Value::Null)),
            ("change".to_string(), None),
        ]
    );
    assert_eq!(record.get("due"), None);
}

#[test]
fn reentrant_set_keeps_outer_accounting() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");
    let log = capture(&record);

    record.on(Topic::change_of("title"), |n| {
        n.record
            .set("completed", true)
            .expect("nested set from listener");
    });

    let changes = record.set("title", "outer").expect("outer set");

    assert_eq!(changes.names().collect::<Vec<_>>(), vec!["title"]);
    assert_eq!(record.get("completed"), Some(json!(true)));
    let topics: Vec<String> = log.borrow().iter().map(|(t, _)| t.clone()).collect();
    let expected = vec!["change:completed", "change", "change:title", "change"];
    assert_eq!(topics, expected);
}

#[test]
fn clones_share_state_and_listeners() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");
    let alias = record.clone();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    record.on(Topic::Change, move |_| *sink.borrow_mut() += 1);

    alias.set("title", "via alias").expect("set through alias");

    assert!(alias.ptr_eq(&record));
    assert_eq!(record.get("title"), Some(json!("via alias")));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn off_stops_delivery() {
    let record = Record::new(todo_schema(), Attributes::new()).expect("record");
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let id = record.on(Topic::change_of("title"), move |_| *sink.borrow_mut() += 1);

    record.set("title", "one").expect("set");
    assert!(record.off(&Topic::change_of("title"), id));
    record.set("title", "two").expect("set");

    assert_eq!(*count.borrow(), 1);
}
