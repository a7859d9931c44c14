//! Property paths: resolved segment chains and path-string algebra.
//!
//! A path string such as `Settings[2]->Color->R` resolves to an ordered
//! chain of [`PathSegment`]s, root to leaf. The string algebra in this
//! module (parent derivation, ancestor/descendant tests) operates on the
//! textual form and is what the container's precedence rules are built on.

pub mod locator;
pub mod parser;

use std::sync::Arc;

use crate::constants::{INDEX_CLOSE, INDEX_OPEN, PATH_SEPARATOR};
use crate::schema::field::{FieldDef, FieldHandle};

/// One resolved step of a property path.
#[derive(Debug, Clone)]
pub struct PathSegment {
    /// The field this step addresses, weakly referencing its schema.
    pub field: FieldHandle,
    /// Sequence element index; `None` addresses the whole field.
    pub array_index: Option<u32>,
}

impl PathSegment {
    #[must_use]
    pub fn new(field: FieldHandle, array_index: Option<u32>) -> Self {
        Self { field, array_index }
    }

    /// The definition whose type governs a value stored at this segment:
    /// the element descriptor when a sequence is indexed, the field itself
    /// otherwise.
    #[must_use]
    pub fn leaf_def(&self) -> Option<Arc<FieldDef>> {
        let def = self.field.get()?;
        match self.array_index {
            Some(_) if def.is_sequence() => def.element().cloned(),
            _ => Some(def),
        }
    }

    /// Identity equality: same field definition, same index.
    #[must_use]
    pub fn same_segment(&self, other: &PathSegment) -> bool {
        self.field.same_field(&other.field) && self.array_index == other.array_index
    }
}

/// Rebuilds the canonical path string from a resolved chain.
///
/// Returns `None` if any segment's schema has been dropped.
#[must_use]
pub fn build_path(segments: &[PathSegment]) -> Option<String> {
    let mut path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let def = segment.field.get()?;
        if i > 0 {
            path.push_str(PATH_SEPARATOR);
        }
        path.push_str(def.name());
        if let Some(index) = segment.array_index {
            path.push(INDEX_OPEN);
            path.push_str(&index.to_string());
            path.push(INDEX_CLOSE);
        }
    }
    Some(path)
}

/// Derives the parent path by truncating at the last segment separator or
/// index opener. Root paths have no parent and yield `""`.
#[must_use]
pub fn parent_path(path: &str) -> &str {
    let last_sep = path.rfind(PATH_SEPARATOR);
    let last_open = path.rfind(INDEX_OPEN);
    match (last_sep, last_open) {
        (Some(sep), Some(open)) if open > sep => &path[..open],
        (Some(sep), _) => &path[..sep],
        (None, Some(open)) => &path[..open],
        (None, None) => "",
    }
}

/// True when `child` extends `parent` with one or more further segments
/// or indices.
#[must_use]
pub fn is_child_path_of(child: &str, parent: &str) -> bool {
    if parent.is_empty() || child.len() <= parent.len() || !child.starts_with(parent) {
        return false;
    }
    // The extension must begin at a segment boundary, otherwise "A->BB"
    // would count as a child of "A->B".
    let rest = &child[parent.len()..];
    rest.starts_with(PATH_SEPARATOR) || rest.starts_with(INDEX_OPEN)
}
