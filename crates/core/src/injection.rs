//! Writing caller-supplied values into workflow template nodes.
//!
//! A [`NodeSelector`] names the node a value belongs to. It is resolved
//! by `class_type` first, then by a fixed node ID. Matching by type
//! survives template authors renumbering nodes in the visual editor;
//! the ID fallback covers templates whose nodes share a generic type.

use crate::error::CoreError;
use crate::workflow::{InputValue, Workflow};

/// How to find the node that plays a given role in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeSelector {
    /// Human-readable role, reported in [`CoreError::RequiredNodeMissing`].
    pub role: &'static str,
    /// Declared `class_type` looked up first.
    pub class_type: &'static str,
    /// Node ID tried when no node of `class_type` exists.
    pub fallback_id: Option<&'static str>,
    /// Whether an unresolved selector aborts injection. Media-load
    /// nodes are required; text and tuning fields are not.
    pub required: bool,
}

impl NodeSelector {
    /// Find the node ID this selector points at in `workflow`.
    pub fn resolve<'a>(&self, workflow: &'a Workflow) -> Option<&'a str> {
        if let Some(id) = workflow.first_of_type(self.class_type) {
            return Some(id);
        }
        self.fallback_id.filter(|id| workflow.contains(id))
    }
}

/// One `(selector, field, value)` update.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub selector: NodeSelector,
    pub field: &'static str,
    pub value: InputValue,
}

impl FieldUpdate {
    pub fn new(selector: NodeSelector, field: &'static str, value: impl Into<InputValue>) -> Self {
        Self {
            selector,
            field,
            value: value.into(),
        }
    }
}

/// Apply `updates` in order to a copy of `template`.
///
/// The template passed in is never modified. An update whose selector
/// resolves to no node is skipped, unless the selector is `required`,
/// in which case the whole injection fails with
/// [`CoreError::RequiredNodeMissing`].
pub fn inject(template: &Workflow, updates: &[FieldUpdate]) -> Result<Workflow, CoreError> {
    let mut workflow = template.clone();

    for update in updates {
        let selector = &update.selector;
        let node_id = match selector.resolve(&workflow) {
            Some(id) => id.to_string(),
            None if selector.required => {
                return Err(CoreError::RequiredNodeMissing {
                    role: selector.role,
                    class_type: selector.class_type,
                    fallback_id: selector.fallback_id,
                });
            }
            None => {
                tracing::debug!(
                    role = selector.role,
                    class_type = selector.class_type,
                    field = update.field,
                    "No node for optional role, skipping update",
                );
                continue;
            }
        };

        workflow.set_input(&node_id, update.field, update.value.clone());
        tracing::trace!(
            role = selector.role,
            node_id = %node_id,
            field = update.field,
            "Injected workflow input",
        );
    }

    Ok(workflow)
}
