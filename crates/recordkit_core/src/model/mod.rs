//! Observable record model.
//!
//! # Responsibility
//! - Define attribute values, record schemas and the observable `Record`.
//! - Keep change detection and change notification in one place.
//!
//! # Invariants
//! - Every record carries a client id (`Cid`) that is never reused.
//! - The id attribute is fixed at creation and cannot be written afterwards.
//! - A mutation finishes updating state before any listener runs.

pub mod attrs;
pub mod error;
pub mod record;
pub mod schema;
