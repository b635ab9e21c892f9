//! CLI walkthrough for `recordkit_core`.
//!
//! # Responsibility
//! - Verify `recordkit_core` linkage and logging bootstrap.
//! - Walk a todo list through add/remove/change and print what listeners see.

use log::info;
use recordkit_core::{
    core_version, init_logging, render_collection, AttrValue, Attributes, Collection,
    LoggingConfig, Record, RecordId, RecordSchema, RenderError, Topic,
};
use serde_json::json;
use std::error::Error;
use std::rc::Rc;

const TODO_TEMPLATE: &str = "todo-line";

fn main() {
    println!("recordkit_core version={}", core_version());

    match LoggingConfig::from_env().and_then(|config| init_logging(&config).map(|()| config)) {
        Ok(config) => println!(
            "logging level={} dir={}",
            config.level(),
            config.log_dir().display()
        ),
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    if let Err(err) = run_walkthrough() {
        eprintln!("walkthrough failed: {err}");
        std::process::exit(1);
    }
}

fn run_walkthrough() -> Result<(), Box<dyn Error>> {
    let schema = RecordSchema::builder("todo")
        .default_value("title", "")
        .default_value("completed", false)
        .build()?;

    let my_todo = Record::from_json(
        Rc::clone(&schema),
        json!({"title": "Read the whole book", "id": 2}),
    )?;
    let todos = Collection::new(Rc::clone(&schema), vec![my_todo.clone()])?;
    watch(&todos);
    println!("todos.len={}", todos.len());

    let a = Record::from_json(Rc::clone(&schema), json!({"title": "Go to Jamaica."}))?;
    let b = Record::from_json(Rc::clone(&schema), json!({"title": "Go to Iceland."}))?;
    let c = Record::from_json(Rc::clone(&schema), json!({"title": "Go to Disneyland."}))?;

    let trips = Collection::new(Rc::clone(&schema), vec![a.clone(), b.clone()])?;
    watch(&trips);
    println!("trips.len={}", trips.len());
    trips.add(c.clone())?;
    println!("trips.len={}", trips.len());
    for line in render_collection(&todo_line, TODO_TEMPLATE, &trips)? {
        println!("{line}");
    }

    trips.remove_many(&[a, b]);
    println!("trips.len={}", trips.len());
    trips.remove(&c);
    println!("trips.len={}", trips.len());

    my_todo.set("title", "Read half the book")?;
    my_todo.set("title", "Read half the book")?;

    let todo2 = todos.get(&RecordId::Int(2));
    println!(
        "todos.get(2) is my_todo: {}",
        todo2.is_some_and(|found| found.ptr_eq(&my_todo))
    );
    info!("event=walkthrough module=cli status=ok");
    Ok(())
}

/// Registers the console listeners shared by every todo collection.
fn watch(collection: &Collection) {
    collection.on(Topic::Add, |n| {
        let done = n
            .record
            .get("completed")
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        println!(
            "I should {}. Have I done it before? {}",
            title_of(n.record),
            if done { "Yeah!" } else { "No." }
        );
    });
    collection.on(Topic::Remove, |n| {
        println!("Dropped: {}", title_of(n.record));
    });
    collection.on(Topic::change_of("title"), |n| {
        println!("Changed my mind! I should {}", title_of(n.record));
    });
}

fn title_of(record: &Record) -> String {
    record
        .get("title")
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn todo_line(template_id: &str, attributes: &Attributes) -> Result<String, RenderError> {
    if template_id != TODO_TEMPLATE {
        return Err(RenderError::UnknownTemplate(template_id.to_string()));
    }
    let title = attributes
        .get("title")
        .and_then(AttrValue::as_str)
        .unwrap_or_default();
    let mark = match attributes.get("completed") {
        Some(AttrValue::Bool(true)) => 'x',
        _ => ' ',
    };
    Ok(format!("[{mark}] {title}"))
}
