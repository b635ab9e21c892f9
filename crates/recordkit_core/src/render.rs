//! Template rendering seam.
//!
//! The engine itself lives outside this crate; callers plug one in through
//! [`TemplateRenderer`] and feed it record snapshots.

use crate::collection::Collection;
use crate::model::attrs::Attributes;
use crate::model::record::Record;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Pure function from a template id and attribute snapshot to text.
pub trait TemplateRenderer {
    fn render(&self, template_id: &str, attributes: &Attributes) -> Result<String, RenderError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Attributes) -> Result<String, RenderError>,
{
    fn render(&self, template_id: &str, attributes: &Attributes) -> Result<String, RenderError> {
        self(template_id, attributes)
    }
}

/// Rendering failures reported by a [`TemplateRenderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    UnknownTemplate(String),
    MissingAttribute { template_id: String, name: String },
    Failed(String),
}

impl Display for RenderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTemplate(id) => write!(f, "template not found: {id}"),
            Self::MissingAttribute { template_id, name } => {
                write!(f, "template `{template_id}` needs attribute `{name}`")
            }
            Self::Failed(message) => write!(f, "template rendering failed: {message}"),
        }
    }
}

impl Error for RenderError {}

/// Renders one record's current snapshot.
pub fn render_record(
    renderer: &impl TemplateRenderer,
    template_id: &str,
    record: &Record,
) -> Result<String, RenderError> {
    renderer.render(template_id, &record.snapshot())
}

/// Renders every member in collection order; stops at the first failure.
pub fn render_collection(
    renderer: &impl TemplateRenderer,
    template_id: &str,
    collection: &Collection,
) -> Result<Vec<String>, RenderError> {
    collection
        .records()
        .iter()
        .map(|record| render_record(renderer, template_id, record))
        .collect()
}
