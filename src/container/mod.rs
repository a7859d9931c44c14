//! Override containers: ordered override sets with hashed lookup and
//! hierarchical precedence.
//!
//! A container preserves insertion order for iteration and export, keeps
//! two hash indices for lookup (`(path, subject)` and per-subject), and
//! enforces the precedence invariant: for any subject, no two stored paths
//! may be in an ancestor/descendant relationship. A broader override
//! supersedes and deletes narrower ones; a narrower one is rejected while
//! a broader one exists.
//!
//! Containers are single-threaded by design: no internal locking, and all
//! mutating operations must be externally serialized. Concurrent readers
//! are safe only while no writer is active.

pub mod serialize;

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{OverrideError, OverrideResult};
use crate::path::{is_child_path_of, parent_path};
use crate::schema::StructSchema;
use crate::value::{codec, OverrideValue};

/// Index key for a `(path, subject)` pair.
pub(crate) fn path_subject_hash(path: &str, subject: Option<&str>) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(subject.unwrap_or("").as_bytes());
    codec::digest32(hasher)
}

/// Ordered collection of [`OverrideValue`] entries with hashed lookup.
#[derive(Debug, Default)]
pub struct OverrideContainer {
    values: Vec<OverrideValue>,
    uses_subject_key: bool,
    /// Keyed on the 32-bit `(path, subject)` hash alone; lookups re-check
    /// the candidate entry, so a collision degrades to a miss.
    path_index: HashMap<u32, usize>,
    subject_index: HashMap<String, Vec<usize>>,
    parent_cache: RefCell<HashMap<u32, bool>>,
    child_cache: RefCell<HashMap<u32, bool>>,
}

impl OverrideContainer {
    #[must_use]
    pub fn new(uses_subject_key: bool) -> Self {
        Self {
            uses_subject_key,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn uses_subject_key(&self) -> bool {
        self.uses_subject_key
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &OverrideValue> {
        self.values.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OverrideValue> {
        self.values.get(index)
    }

    pub fn get_checked(&self, index: usize) -> OverrideResult<&OverrideValue> {
        self.values.get(index).ok_or(OverrideError::OutOfBounds {
            index,
            len: self.values.len(),
        })
    }

    /// Adds an override, enforcing uniqueness and parent precedence.
    ///
    /// Returns the entry's index, or `None` when the value is invalid, the
    /// `(path, subject)` pair is already present, or an ancestor override
    /// already governs this region. Descendant overrides of the new path
    /// are removed first.
    pub fn add(&mut self, value: OverrideValue) -> Option<usize> {
        if !value.is_valid() {
            debug!("rejecting invalid override");
            return None;
        }
        let path = value.path()?.to_string();
        let subject_owned = self.effective_subject(&value).map(str::to_string);
        let subject = subject_owned.as_deref();

        if self.find_index(&path, subject).is_some() {
            debug!("'{}' is already overridden", path);
            return None;
        }
        if self.contains_parent_path_of(&path, subject) {
            debug!("'{}' is governed by a broader override", path);
            return None;
        }
        if self.contains_child_path_of(&path, subject) {
            let doomed: Vec<usize> = self
                .values
                .iter()
                .enumerate()
                .filter(|(_, entry)| {
                    self.subject_matches(entry, subject)
                        && entry.path().is_some_and(|p| is_child_path_of(p, &path))
                })
                .map(|(index, _)| index)
                .collect();
            info!(
                "override '{}' supersedes {} narrower entries",
                path,
                doomed.len()
            );
            for index in doomed.into_iter().rev() {
                self.values.remove(index);
            }
            self.rebuild_lookup();
        }

        self.values.push(value);
        let index = self.values.len() - 1;
        self.path_index
            .insert(path_subject_hash(&path, subject), index);
        if let Some(key) = self.values[index].subject_key() {
            self.subject_index
                .entry(key.to_string())
                .or_default()
                .push(index);
        }
        self.invalidate_caches();
        info!("added override '{}'", path);
        Some(index)
    }

    /// Adds the override, or replaces the existing entry sharing its
    /// `(path, subject)` pair in place. Returns the stored entry, `None`
    /// when the value is invalid or rejected by parent precedence.
    pub fn find_or_add(&mut self, value: OverrideValue) -> Option<&OverrideValue> {
        if !value.is_valid() {
            return None;
        }
        let path = value.path()?.to_string();
        let subject_owned = self.effective_subject(&value).map(str::to_string);
        if let Some(index) = self.find_index(&path, subject_owned.as_deref()) {
            self.values[index] = value;
            return self.values.get(index);
        }
        let index = self.add(value)?;
        self.values.get(index)
    }

    /// Removes the entry at `(path, subject)`. Returns true if one existed.
    pub fn remove(&mut self, path: &str, subject: Option<&str>) -> bool {
        let subject = self.normalize_subject(subject);
        let Some(index) = self.find_index(path, subject) else {
            return false;
        };
        self.values.remove(index);
        self.rebuild_lookup();
        info!("removed override '{}'", path);
        true
    }

    /// Removes every entry belonging to `subject`; `None` clears the whole
    /// container. Returns true if anything was removed.
    pub fn remove_all(&mut self, subject: Option<&str>) -> bool {
        match subject {
            None => {
                if self.values.is_empty() {
                    return false;
                }
                self.clear();
                true
            }
            Some(key) => {
                let before = self.values.len();
                self.values.retain(|entry| entry.subject_key() != Some(key));
                if self.values.len() == before {
                    return false;
                }
                info!(
                    "removed {} overrides for subject '{}'",
                    before - self.values.len(),
                    key
                );
                self.rebuild_lookup();
                true
            }
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.path_index.clear();
        self.subject_index.clear();
        self.invalidate_caches();
    }

    #[must_use]
    pub fn find(&self, path: &str, subject: Option<&str>) -> Option<&OverrideValue> {
        let subject = self.normalize_subject(subject);
        self.find_index(path, subject)
            .and_then(|index| self.values.get(index))
    }

    /// Lookup that treats absence as an error.
    pub fn find_checked(&self, path: &str, subject: Option<&str>) -> OverrideResult<&OverrideValue> {
        self.find(path, subject).ok_or_else(|| {
            OverrideError::Path(format!("no override recorded at '{}'", path))
        })
    }

    #[must_use]
    pub fn contains(&self, path: &str, subject: Option<&str>) -> bool {
        let subject = self.normalize_subject(subject);
        self.find_index(path, subject).is_some()
    }

    /// True when an override exists at an ancestor of `path` for this
    /// subject. Memoized per queried `(path, subject)` until the next
    /// structural mutation.
    #[must_use]
    pub fn contains_parent_path_of(&self, path: &str, subject: Option<&str>) -> bool {
        let subject = self.normalize_subject(subject);
        let key = path_subject_hash(path, subject);
        if let Some(&cached) = self.parent_cache.borrow().get(&key) {
            return cached;
        }
        let mut found = false;
        let mut parent = parent_path(path);
        while !parent.is_empty() {
            if self.find_index(parent, subject).is_some() {
                found = true;
                break;
            }
            parent = parent_path(parent);
        }
        self.parent_cache.borrow_mut().insert(key, found);
        found
    }

    /// True when an override exists at a descendant of `path` for this
    /// subject. Memoized like [`Self::contains_parent_path_of`].
    #[must_use]
    pub fn contains_child_path_of(&self, path: &str, subject: Option<&str>) -> bool {
        let subject = self.normalize_subject(subject);
        let key = path_subject_hash(path, subject);
        if let Some(&cached) = self.child_cache.borrow().get(&key) {
            return cached;
        }
        let found = self.values.iter().any(|entry| {
            self.subject_matches(entry, subject)
                && entry.path().is_some_and(|p| is_child_path_of(p, path))
        });
        self.child_cache.borrow_mut().insert(key, found);
        found
    }

    /// Applies every matching override onto a live subject instance.
    /// Returns true when all of them applied.
    pub fn copy_to_subject(
        &self,
        subject: &mut Value,
        schema: Option<&Arc<StructSchema>>,
        subject_key: Option<&str>,
    ) -> bool {
        let mut all_applied = true;
        for entry in &self.values {
            if self.uses_subject_key && entry.subject_key() != subject_key {
                continue;
            }
            if !entry.copy_to_subject(subject, schema) {
                debug!(
                    "override '{}' did not apply",
                    entry.path().unwrap_or_default()
                );
                all_applied = false;
            }
        }
        all_applied
    }

    /// Re-snapshots every matching override from a live subject instance.
    /// Returns true when all of them captured.
    pub fn set_from_subject(
        &mut self,
        subject: &Value,
        schema: Option<&Arc<StructSchema>>,
        subject_key: Option<&str>,
    ) -> bool {
        let uses_subject_key = self.uses_subject_key;
        let mut all_captured = true;
        for entry in &mut self.values {
            if uses_subject_key && entry.subject_key() != subject_key {
                continue;
            }
            if !entry.set_from_subject(subject, schema) {
                all_captured = false;
            }
        }
        all_captured
    }

    /// Every subject key with at least one entry, sorted for determinism.
    #[must_use]
    pub fn generate_subject_array(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self.subject_index.keys().cloned().collect();
        subjects.sort();
        subjects
    }

    fn effective_subject<'a>(&self, value: &'a OverrideValue) -> Option<&'a str> {
        if self.uses_subject_key {
            value.subject_key()
        } else {
            None
        }
    }

    fn normalize_subject<'a>(&self, subject: Option<&'a str>) -> Option<&'a str> {
        if self.uses_subject_key {
            subject
        } else {
            None
        }
    }

    fn subject_matches(&self, entry: &OverrideValue, subject: Option<&str>) -> bool {
        !self.uses_subject_key || entry.subject_key() == subject
    }

    fn find_index(&self, path: &str, subject: Option<&str>) -> Option<usize> {
        let key = path_subject_hash(path, subject);
        let index = *self.path_index.get(&key)?;
        let entry = self.values.get(index)?;
        let matches = entry.path() == Some(path)
            && (!self.uses_subject_key || entry.subject_key() == subject);
        matches.then_some(index)
    }

    fn rebuild_lookup(&mut self) {
        self.path_index.clear();
        self.subject_index.clear();
        for (index, entry) in self.values.iter().enumerate() {
            let Some(path) = entry.path() else { continue };
            let subject = if self.uses_subject_key {
                entry.subject_key()
            } else {
                None
            };
            self.path_index.insert(path_subject_hash(path, subject), index);
            if let Some(key) = entry.subject_key() {
                self.subject_index
                    .entry(key.to_string())
                    .or_default()
                    .push(index);
            }
        }
        self.invalidate_caches();
    }

    fn invalidate_caches(&self) {
        self.parent_cache.borrow_mut().clear();
        self.child_cache.borrow_mut().clear();
    }
}
