//! Ordered record collections.
//!
//! # Responsibility
//! - Keep an insertion-ordered set of records reachable by id.
//! - Emit `add`/`remove` and relay member `change` events to collection
//!   listeners.
//!
//! # Invariants
//! - Records may belong to several collections at once; membership never
//!   changes the record itself beyond the relay listener it installs.

pub mod ordered;

pub use ordered::{Collection, CollectionError, CollectionResult};
