//! Event topic names.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const TOPIC_ADD: &str = "add";
const TOPIC_REMOVE: &str = "remove";
const TOPIC_CHANGE: &str = "change";
const TOPIC_ALL: &str = "all";
const CHANGE_ATTR_PREFIX: &str = "change:";

/// Subscribable event.
///
/// `All` listeners receive every event emitted on the entity, after the
/// listeners of the specific topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    Add,
    Remove,
    Change,
    ChangeAttr(String),
    All,
}

impl Topic {
    /// `change:<name>` topic.
    pub fn change_of(name: impl Into<String>) -> Self {
        Self::ChangeAttr(name.into())
    }

    /// Attribute carried by a `change:<name>` topic.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::ChangeAttr(name) => Some(name.as_str()),
            _ => None,
        }
    }

    /// Returns `true` for `change` and `change:<name>`.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Change | Self::ChangeAttr(_))
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => f.write_str(TOPIC_ADD),
            Self::Remove => f.write_str(TOPIC_REMOVE),
            Self::Change => f.write_str(TOPIC_CHANGE),
            Self::ChangeAttr(name) => write!(f, "{CHANGE_ATTR_PREFIX}{name}"),
            Self::All => f.write_str(TOPIC_ALL),
        }
    }
}

impl FromStr for Topic {
    type Err = TopicParseError;

    /// Parses `add|remove|change|change:<name>|all`. Matching is
    /// case-sensitive; only surrounding whitespace is ignored.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(TopicParseError::Empty);
        }

        match normalized {
            TOPIC_ADD => Ok(Self::Add),
            TOPIC_REMOVE => Ok(Self::Remove),
            TOPIC_CHANGE => Ok(Self::Change),
            TOPIC_ALL => Ok(Self::All),
            other => match other.strip_prefix(CHANGE_ATTR_PREFIX) {
                Some(name) if !name.is_empty() => Ok(Self::ChangeAttr(name.to_string())),
                Some(_) => Err(TopicParseError::EmptyAttribute),
                None => Err(TopicParseError::Unsupported(other.to_string())),
            },
        }
    }
}

/// Topic parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicParseError {
    Empty,
    EmptyAttribute,
    Unsupported(String),
}

impl Display for TopicParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "event topic must not be empty"),
            Self::EmptyAttribute => write!(f, "change topic must name an attribute"),
            Self::Unsupported(value) => write!(f, "event topic is unsupported: {value}"),
        }
    }
}

impl Error for TopicParseError {}
