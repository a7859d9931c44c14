//! Value locator: walks a resolved segment chain over a live instance.
//!
//! The walk either reaches the addressed leaf or returns `None`; a partial
//! result is never handed out. Sequence growth happens only when
//! explicitly requested, so read-side callers pass `grow = false` and are
//! guaranteed the subject is left untouched.

use serde_json::Value;

use crate::path::PathSegment;

/// Read-only resolution of `chain` against `root`. Never mutates.
#[must_use]
pub fn resolve<'a>(chain: &[PathSegment], root: &'a Value) -> Option<&'a Value> {
    if chain.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in chain {
        let def = segment.field.get()?;
        current = current.as_object()?.get(def.name())?;
        if let Some(index) = segment.array_index {
            current = current.as_array()?.get(index as usize)?;
        }
    }
    Some(current)
}

/// Mutable resolution of `chain` against `root`.
///
/// With `grow`, an out-of-range sequence index extends the sequence with
/// zero-initialized elements until the index is valid; without it, the
/// walk stops and yields `None`. Missing fields are never inserted.
#[must_use]
pub fn resolve_mut<'a>(
    chain: &[PathSegment],
    root: &'a mut Value,
    grow: bool,
) -> Option<&'a mut Value> {
    if chain.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in chain {
        let def = segment.field.get()?;
        current = current.as_object_mut()?.get_mut(def.name())?;
        if let Some(index) = segment.array_index {
            let index = index as usize;
            let element_zero = def.element().map(|e| e.zero_value());
            let array = current.as_array_mut()?;
            if index >= array.len() {
                if !grow {
                    return None;
                }
                let zero = element_zero?;
                array.resize(index + 1, zero);
            }
            current = array.get_mut(index)?;
        }
    }
    Some(current)
}
