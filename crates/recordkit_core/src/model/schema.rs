//! Record type descriptors.
//!
//! # Responsibility
//! - Describe a kind of record: name, declared defaults, identity attribute
//!   and an optional attribute allow-list.
//!
//! # Invariants
//! - Every declared default and allow-list entry has a valid attribute name.
//! - The identity attribute never carries a default.

use crate::model::attrs::{validate_attribute_name, AttrValue, Attributes};
use crate::model::error::RecordError;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Identity attribute used when a schema does not override it.
pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Immutable descriptor shared by every record of one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    name: String,
    defaults: Attributes,
    id_attribute: String,
    allowed: Option<BTreeSet<String>>,
}

impl RecordSchema {
    /// Starts a descriptor for records named `name`.
    pub fn builder(name: impl Into<String>) -> RecordSchemaBuilder {
        RecordSchemaBuilder {
            name: name.into(),
            defaults: Vec::new(),
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            allowed: None,
        }
    }

    /// Schema without defaults or allow-list.
    pub fn untyped(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            defaults: Attributes::new(),
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            allowed: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Attributes {
        &self.defaults
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    pub fn default_value(&self, name: &str) -> Option<&AttrValue> {
        self.defaults.get(name)
    }

    /// Returns whether `name` may be written on records of this kind.
    ///
    /// Without an allow-list every name is accepted. With one, declared
    /// defaults and the identity attribute are implicitly allowed.
    pub fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(allowed) => {
                allowed.contains(name)
                    || self.defaults.contains_key(name)
                    || name == self.id_attribute
            }
        }
    }

    pub(crate) fn check_allowed(&self, name: &str) -> Result<(), RecordError> {
        if self.is_allowed(name) {
            return Ok(());
        }
        Err(RecordError::UnknownAttribute {
            schema: self.name.clone(),
            name: name.to_string(),
        })
    }
}

/// Builder for [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct RecordSchemaBuilder {
    name: String,
    defaults: Vec<(String, AttrValue)>,
    id_attribute: String,
    allowed: Option<Vec<String>>,
}

impl RecordSchemaBuilder {
    /// Declares a default value; later declarations of the same name win.
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    /// Overrides the identity attribute name.
    pub fn id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = name.into();
        self
    }

    /// Restricts writable attributes to `names` plus defaults and identity.
    pub fn allow_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Validates declarations and freezes the descriptor.
    ///
    /// # Errors
    /// - `InvalidAttributeName` for an empty default, allow-list entry or
    ///   identity attribute.
    /// - `ProtectedFieldWrite` when a default is declared for the identity
    ///   attribute.
    pub fn build(self) -> Result<Rc<RecordSchema>, RecordError> {
        validate_attribute_name(&self.id_attribute)?;

        let mut defaults = Attributes::new();
        for (name, value) in self.defaults {
            validate_attribute_name(&name)?;
            if name == self.id_attribute {
                return Err(RecordError::ProtectedFieldWrite(name));
            }
            defaults.insert(name, value);
        }

        let allowed = match self.allowed {
            Some(names) => {
                let mut set = BTreeSet::new();
                for name in names {
                    validate_attribute_name(&name)?;
                    set.insert(name);
                }
                Some(set)
            }
            None => None,
        };

        Ok(Rc::new(RecordSchema {
            name: self.name,
            defaults,
            id_attribute: self.id_attribute,
            allowed,
        }))
    }
}
