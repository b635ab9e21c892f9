//! Per-entity event subscription.
//!
//! Records and collections each own an [`EventRegistry`]; there is no
//! global bus. Dispatch is synchronous: listeners run in registration order
//! on the calling thread before the mutating call returns.

pub mod registry;
pub mod topic;

pub use registry::{EventRegistry, Listener, ListenerId, Notification};
pub use topic::{Topic, TopicParseError};
