//! Observable records and ordered record collections.
//! Everything here is single-threaded and synchronous.

pub mod collection;
pub mod events;
pub mod logging;
pub mod model;
pub mod render;

pub use collection::{Collection, CollectionError, CollectionResult};
pub use events::{EventRegistry, ListenerId, Notification, Topic, TopicParseError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::attrs::{
    attributes_from_json, attributes_from_serializable, AttrValue, Attributes,
};
pub use model::error::RecordError;
pub use model::record::{AttrChange, ChangeSet, Cid, Record, RecordId};
pub use model::schema::{RecordSchema, RecordSchemaBuilder};
pub use render::{render_collection, render_record, RenderError, TemplateRenderer};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
