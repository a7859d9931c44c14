//! Override values: one recorded field override.
//!
//! An [`OverrideValue`] owns a parsed property path, an optional subject
//! key scoping it to one external instance, and a type-erased snapshot of
//! the addressed leaf value. The snapshot is always a copy; an override
//! never aliases the live memory of the subject it was captured from.

pub mod codec;
pub mod legacy;

use std::sync::Arc;

use log::debug;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::constants::{ARRAY_INDEX_NONE, MAX_LEGACY_IMPORT_ATTEMPTS};
use crate::error::{OverrideError, OverrideResult};
use crate::path::{self, locator, parser, PathSegment};
use crate::reporting::{DiagnosticsSink, Severity};
use crate::schema::field::{FieldDef, FieldKind};
use crate::schema::{Schema, StructSchema};

/// A single recorded override of one field inside a structured value.
///
/// Construction never raises: every entry point leaves the value in the
/// invalid state on failure, and callers check [`OverrideValue::is_valid`].
/// The content hash stays consistent with the subject key, the segment
/// chain, and the cached string across every mutation.
#[derive(Debug, Clone, Default)]
pub struct OverrideValue {
    path: Option<String>,
    subject_key: Option<String>,
    properties: Vec<PathSegment>,
    data: Vec<u8>,
    cached_string: Option<String>,
    hash: u32,
}

impl OverrideValue {
    /// An empty, invalid override.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an override by parsing `path_text` and snapshotting the
    /// current value from a live `subject` instance.
    #[must_use]
    pub fn from_subject(
        path_text: &str,
        schema: &Arc<StructSchema>,
        subject: &Value,
        subject_key: Option<&str>,
    ) -> Self {
        Self::from_value(path_text, schema, subject, subject_key)
    }

    /// Builds an override by parsing `path_text` against `schema` and
    /// snapshotting from `source`.
    #[must_use]
    pub fn from_value(
        path_text: &str,
        schema: &Arc<StructSchema>,
        source: &Value,
        subject_key: Option<&str>,
    ) -> Self {
        let mut value = Self::with_identity(path_text, schema, subject_key);
        if !value.properties.is_empty() {
            value.set_from_subject(source, Some(schema));
        }
        value
    }

    /// Builds an override by parsing `path_text` and importing the value
    /// from its textual form.
    #[must_use]
    pub fn from_string(
        path_text: &str,
        schema: &Arc<StructSchema>,
        text: &str,
        subject_key: Option<&str>,
        sink: &dyn DiagnosticsSink,
    ) -> Self {
        let mut value = Self::with_identity(path_text, schema, subject_key);
        if !value.properties.is_empty() {
            value.set_from_string(text, sink);
        }
        value
    }

    fn with_identity(
        path_text: &str,
        schema: &Arc<StructSchema>,
        subject_key: Option<&str>,
    ) -> Self {
        let mut value = Self {
            subject_key: subject_key.map(str::to_string),
            ..Self::default()
        };
        match parser::parse(path_text, schema) {
            Ok(properties) => {
                value.path = path::build_path(&properties);
                value.properties = properties;
            }
            Err(e) => debug!("override path '{}' rejected: {}", path_text, e),
        }
        value
    }

    pub(crate) fn from_parts(
        path: Option<String>,
        subject_key: Option<String>,
        properties: Vec<PathSegment>,
        data: Vec<u8>,
        cached_string: Option<String>,
    ) -> Self {
        let mut value = Self {
            path,
            subject_key,
            properties,
            data,
            cached_string,
            hash: 0,
        };
        value.update_hash();
        value
    }

    /// A valid override has a path, a cached string, a non-empty snapshot,
    /// and a still-resolvable leaf field.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.path.is_some()
            && self.cached_string.is_some()
            && !self.data.is_empty()
            && self.leaf_def().is_some()
    }

    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn subject_key(&self) -> Option<&str> {
        self.subject_key.as_deref()
    }

    #[must_use]
    pub fn properties(&self) -> &[PathSegment] {
        &self.properties
    }

    #[must_use]
    pub const fn hash(&self) -> u32 {
        self.hash
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    /// The cached canonical string, empty while invalid.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.cached_string.as_deref().unwrap_or("")
    }

    /// The definition governing the snapshot's type: the element type when
    /// the leaf segment indexes a sequence, the leaf field itself otherwise.
    #[must_use]
    pub fn leaf_def(&self) -> Option<Arc<FieldDef>> {
        self.properties.last()?.leaf_def()
    }

    /// Rebuilds the canonical path string from the resolved chain.
    pub fn rebuild_path(&mut self) -> bool {
        match path::build_path(&self.properties) {
            Some(rebuilt) => {
                self.path = Some(rebuilt);
                true
            }
            None => false,
        }
    }

    /// Clears everything, releasing the snapshot buffer.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Imports `text` into the snapshot, strictly first, then through the
    /// bounded legacy rewrite for the math kinds. On success the snapshot,
    /// the cached string (re-exported canonical form), and the hash are
    /// replaced atomically; on failure nothing changes and the failure is
    /// reported through `sink`.
    pub fn set_from_string(&mut self, text: &str, sink: &dyn DiagnosticsSink) -> bool {
        let Some(def) = self.leaf_def() else {
            sink.report(
                Severity::Error,
                &format!(
                    "override '{}' has no resolvable leaf field",
                    self.path().unwrap_or_default()
                ),
            );
            return false;
        };

        let imported = match codec::import_string(&def, text) {
            Ok(value) => Some(value),
            Err(strict_error) => {
                let mut recovered = None;
                for candidate in legacy::rewrite_candidates(def.kind(), text)
                    .into_iter()
                    .take(MAX_LEGACY_IMPORT_ATTEMPTS)
                {
                    if let Ok(value) = codec::import_string(&def, &candidate) {
                        debug!(
                            "field '{}': accepted legacy form '{}'",
                            def.name(),
                            text
                        );
                        recovered = Some(value);
                        break;
                    }
                }
                if recovered.is_none() {
                    sink.report(Severity::Error, &strict_error.to_string());
                }
                recovered
            }
        };
        let Some(value) = imported else {
            return false;
        };

        let mut scratch = Vec::new();
        let exported = match codec::encode(&def, &value, &mut scratch)
            .and_then(|()| codec::export_string(&def, &value))
        {
            Ok(text) => text,
            Err(e) => {
                sink.report(Severity::Error, &e.to_string());
                return false;
            }
        };

        self.data = scratch;
        self.cached_string = Some(exported);
        self.update_hash();
        true
    }

    /// Writes the snapshot onto a live `subject`, growing sequences as
    /// needed to make the path reachable. Sequence snapshots are copied
    /// element by element after resizing the destination; every other kind
    /// is one structural copy. Returns false, without copying, when the
    /// override is invalid, the root check fails, or the path does not
    /// resolve.
    pub fn copy_to_subject(
        &self,
        subject: &mut Value,
        schema: Option<&Arc<StructSchema>>,
    ) -> bool {
        if !self.is_valid() {
            return false;
        }
        if let Err(e) = self.ensure_root_owned(schema) {
            debug!("{}", e);
            return false;
        }
        let Some(def) = self.leaf_def() else {
            return false;
        };
        let decoded = match codec::decode_all(&def, &self.data) {
            Ok(value) => value,
            Err(e) => {
                debug!("override '{}' snapshot unreadable: {}", self.as_str(), e);
                return false;
            }
        };
        let Some(slot) = locator::resolve_mut(&self.properties, subject, true) else {
            return false;
        };

        if def.kind() == FieldKind::Sequence {
            let Some(source) = decoded.as_array() else {
                return false;
            };
            let Some(element) = def.element() else {
                return false;
            };
            let Some(destination) = slot.as_array_mut() else {
                return false;
            };
            destination.resize(source.len(), element.zero_value());
            for (dst, src) in destination.iter_mut().zip(source) {
                *dst = src.clone();
            }
        } else {
            *slot = decoded;
        }
        true
    }

    /// Replaces the snapshot with the subject's current value, re-exports
    /// the cached string, and recomputes the hash. Read-only on the
    /// subject. Returns false, leaving prior state untouched, when the
    /// path does not resolve.
    pub fn set_from_subject(
        &mut self,
        subject: &Value,
        schema: Option<&Arc<StructSchema>>,
    ) -> bool {
        if self.properties.is_empty() {
            return false;
        }
        if let Err(e) = self.ensure_root_owned(schema) {
            debug!("{}", e);
            return false;
        }
        let Some(def) = self.leaf_def() else {
            return false;
        };
        let Some(live) = locator::resolve(&self.properties, subject) else {
            return false;
        };

        let mut scratch = Vec::new();
        let exported = match codec::encode(&def, live, &mut scratch)
            .and_then(|()| codec::export_string(&def, live))
        {
            Ok(text) => text,
            Err(e) => {
                debug!("override '{}' snapshot failed: {}", self.as_str(), e);
                return false;
            }
        };

        self.data = scratch;
        self.cached_string = Some(exported);
        self.update_hash();
        true
    }

    /// Deep equality: the hash is a short-circuit only, never the verdict.
    #[must_use]
    pub fn identical(&self, other: &OverrideValue) -> bool {
        if self.hash != other.hash {
            return false;
        }
        if self.subject_key != other.subject_key
            || self.properties.len() != other.properties.len()
        {
            return false;
        }
        let segments_match = self
            .properties
            .iter()
            .zip(&other.properties)
            .all(|(a, b)| a.same_segment(b));
        segments_match && self.data == other.data
    }

    /// True when a live value of the leaf type equals the snapshot.
    #[must_use]
    pub fn identical_value(&self, live: &Value) -> bool {
        let Some(def) = self.leaf_def() else {
            return false;
        };
        let mut scratch = Vec::new();
        if codec::encode(&def, live, &mut scratch).is_err() {
            return false;
        }
        scratch == self.data
    }

    fn ensure_root_owned(&self, schema: Option<&Arc<StructSchema>>) -> OverrideResult<()> {
        let Some(schema) = schema else {
            return Ok(());
        };
        if self.root_owned_by(schema) {
            Ok(())
        } else {
            Err(OverrideError::SchemaMismatch(format!(
                "override '{}' does not start at a field of '{}'",
                self.path().unwrap_or_default(),
                schema.name(),
            )))
        }
    }

    /// True when this override's root field belongs to `schema`.
    #[must_use]
    pub fn root_owned_by(&self, schema: &StructSchema) -> bool {
        let Some(segment) = self.properties.first() else {
            return false;
        };
        let Some(def) = segment.field.get() else {
            return false;
        };
        schema
            .find_field(def.name())
            .and_then(|handle| handle.get())
            .is_some_and(|found| Arc::ptr_eq(&found, &def))
    }

    fn update_hash(&mut self) {
        let mut hasher = Sha256::new();
        if let Some(key) = &self.subject_key {
            hasher.update(key.as_bytes());
        }
        for segment in &self.properties {
            if let Some(def) = segment.field.get() {
                hasher.update(def.owner().as_bytes());
                hasher.update(def.name().as_bytes());
            }
            let index = segment.array_index.map_or(ARRAY_INDEX_NONE, |i| i as i32);
            hasher.update(index.to_le_bytes());
        }
        if let Some(text) = &self.cached_string {
            hasher.update(text.as_bytes());
        }
        self.hash = codec::digest32(hasher);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::{LogSink, MemorySink};
    use crate::schema::field::FieldDef;
    use serde_json::json;

    fn rig_schema() -> Arc<StructSchema> {
        let color = StructSchema::new("Color")
            .with_field(FieldDef::float("R"))
            .with_field(FieldDef::float("G"))
            .with_field(FieldDef::float("B"))
            .into_shared();
        StructSchema::new("Rig")
            .with_field(FieldDef::sequence_of("Offsets", FieldDef::float("Offsets[]")))
            .with_field(FieldDef::struct_of("Tint", color))
            .with_field(FieldDef::vec2("UV"))
            .with_field(FieldDef::float("Scale"))
            .into_shared()
    }

    fn rig_instance() -> Value {
        json!({
            "Offsets": [0.0, 0.0, 0.0],
            "Tint": {"R": 0.0, "G": 0.0, "B": 0.0},
            "UV": {"X": 0.0, "Y": 0.0},
            "Scale": 1.0,
        })
    }

    #[test]
    fn import_into_sequence_element() {
        let schema = rig_schema();
        let value =
            OverrideValue::from_string("Offsets[1]", &schema, "2.5", None, &LogSink);
        assert!(value.is_valid());
        assert_eq!(value.as_str(), "2.5");

        let mut subject = rig_instance();
        assert!(value.copy_to_subject(&mut subject, Some(&schema)));
        assert_eq!(subject["Offsets"], json!([0.0, 2.5, 0.0]));
    }

    #[test]
    fn bad_path_leaves_value_invalid() {
        let schema = rig_schema();
        let value =
            OverrideValue::from_string("Missing->Field", &schema, "1.0", None, &LogSink);
        assert!(!value.is_valid());
        assert!(value.properties().is_empty());
        assert_eq!(value.as_str(), "");
    }

    #[test]
    fn bad_value_text_reports_through_sink() {
        let schema = rig_schema();
        let sink = MemorySink::new();
        let value = OverrideValue::from_string("Scale", &schema, "not a number", None, &sink);
        assert!(!value.is_valid());
        assert!(!sink.is_empty());
    }

    #[test]
    fn legacy_comma_form_imports_into_vec2() {
        let schema = rig_schema();
        let sink = MemorySink::new();
        let value = OverrideValue::from_string("UV", &schema, "1.0,2.0", None, &sink);
        assert!(value.is_valid());
        // The fallback is not canonical: the cached form is keyed.
        assert_eq!(value.as_str(), "(X=1,Y=2)");
        assert!(sink.is_empty());
    }

    #[test]
    fn snapshot_and_apply_are_inverse() {
        let schema = rig_schema();
        let mut original = rig_instance();
        original["Tint"] = json!({"R": 0.25, "G": 0.5, "B": 0.75});

        let value = OverrideValue::from_subject("Tint", &schema, &original, None);
        assert!(value.is_valid());

        let mut target = rig_instance();
        assert!(value.copy_to_subject(&mut target, Some(&schema)));
        assert_eq!(target["Tint"], original["Tint"]);
    }

    #[test]
    fn whole_sequence_copy_resizes_destination() {
        let schema = rig_schema();
        let mut source = rig_instance();
        source["Offsets"] = json!([1.0, 2.0]);

        let value = OverrideValue::from_subject("Offsets", &schema, &source, None);
        let mut target = rig_instance();
        target["Offsets"] = json!([9.0, 9.0, 9.0, 9.0]);
        assert!(value.copy_to_subject(&mut target, Some(&schema)));
        assert_eq!(target["Offsets"], json!([1.0, 2.0]));
    }

    #[test]
    fn hash_tracks_value_mutations() {
        let schema = rig_schema();
        let mut value =
            OverrideValue::from_string("Scale", &schema, "1.5", None, &LogSink);
        let before = value.hash();

        assert!(value.set_from_string("2.5", &LogSink));
        assert_ne!(value.hash(), before);

        // Re-importing the same text restores the same hash.
        assert!(value.set_from_string("1.5", &LogSink));
        assert_eq!(value.hash(), before);
    }

    #[test]
    fn identical_requires_matching_bytes() {
        let schema = rig_schema();
        let a = OverrideValue::from_string("Scale", &schema, "1.5", None, &LogSink);
        let b = OverrideValue::from_string("Scale", &schema, "1.5", None, &LogSink);
        let c = OverrideValue::from_string("Scale", &schema, "2.0", None, &LogSink);
        assert!(a.identical(&b));
        assert!(!a.identical(&c));

        assert!(a.identical_value(&json!(1.5)));
        assert!(!a.identical_value(&json!(2.0)));
    }

    #[test]
    fn subject_key_distinguishes_hashes() {
        let schema = rig_schema();
        let a = OverrideValue::from_string("Scale", &schema, "1.5", Some("left"), &LogSink);
        let b = OverrideValue::from_string("Scale", &schema, "1.5", Some("right"), &LogSink);
        assert_ne!(a.hash(), b.hash());
        assert!(!a.identical(&b));
    }

    #[test]
    fn schema_mismatch_blocks_apply_and_snapshot() {
        let schema = rig_schema();
        let other = StructSchema::new("Other")
            .with_field(FieldDef::float("Scale"))
            .into_shared();

        let mut value = OverrideValue::from_string("Scale", &schema, "1.5", None, &LogSink);
        let mut subject = rig_instance();
        assert!(!value.copy_to_subject(&mut subject, Some(&other)));
        assert_eq!(subject, rig_instance());
        assert!(!value.set_from_subject(&rig_instance(), Some(&other)));
    }

    #[test]
    fn reset_releases_the_snapshot() {
        let schema = rig_schema();
        let mut value = OverrideValue::from_string("Scale", &schema, "1.5", None, &LogSink);
        assert!(value.is_valid());
        value.reset();
        assert!(!value.is_valid());
        assert_eq!(value.hash(), 0);
        assert!(value.path().is_none());
    }

    #[test]
    fn path_is_rebuildable_from_the_chain() {
        let schema = rig_schema();
        let mut value =
            OverrideValue::from_string("Offsets[junk]", &schema, "1.0", None, &LogSink);
        // The canonical path carries the coerced index.
        assert_eq!(value.path(), Some("Offsets[0]"));
        assert!(value.rebuild_path());
        assert_eq!(value.path(), Some("Offsets[0]"));
    }
}
