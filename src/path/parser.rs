//! Path string parser.
//!
//! Parsing walks the string a character at a time, alternating between a
//! field-name state and an index state, and resolves each pending name
//! against a moving schema cursor the moment a separator is reached. The
//! cursor advances through struct layouts and sequence element types, so
//! resolution failure anywhere aborts the whole parse: a path either
//! resolves completely or not at all.

use std::sync::Arc;

use log::debug;

use crate::constants::{INDEX_CLOSE, INDEX_OPEN, PATH_SEPARATOR};
use crate::error::{OverrideError, OverrideResult};
use crate::path::PathSegment;
use crate::schema::{Schema, StructSchema};

/// Parses `path` against `root`, returning the resolved segment chain.
pub fn parse(path: &str, root: &Arc<StructSchema>) -> OverrideResult<Vec<PathSegment>> {
    if path.is_empty() {
        return Err(OverrideError::Path("empty path".to_string()));
    }

    let chars: Vec<char> = path.chars().collect();
    let mut state = ParseState::new(root.clone());
    let mut segments = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if state.in_index {
            if c == INDEX_CLOSE {
                state.close_index();
            } else {
                state.index_text.push(c);
            }
            i += 1;
        } else if c == INDEX_OPEN {
            state.in_index = true;
            state.index_text.clear();
            i += 1;
        } else if c == '-' && chars.get(i + 1) == Some(&'>') {
            state.flush(path, &mut segments).map_err(|e| {
                debug!("path parse failed: {}", e);
                e
            })?;
            i += PATH_SEPARATOR.len();
        } else {
            state.name.push(c);
            i += 1;
        }
    }

    // Trailing content has no separator behind it; it goes through the
    // same resolution as every other segment.
    if state.in_index {
        state.close_index();
    }
    state.flush(path, &mut segments).map_err(|e| {
        debug!("path parse failed: {}", e);
        e
    })?;

    Ok(segments)
}

struct ParseState {
    cursor: Option<Arc<StructSchema>>,
    name: String,
    in_index: bool,
    index_text: String,
    pending_index: Option<u32>,
}

impl ParseState {
    fn new(root: Arc<StructSchema>) -> Self {
        Self {
            cursor: Some(root),
            name: String::new(),
            in_index: false,
            index_text: String::new(),
            pending_index: None,
        }
    }

    fn close_index(&mut self) {
        // Non-numeric index text coerces to 0 rather than failing; legacy
        // serialized paths rely on this leniency.
        let index = self.index_text.trim().parse::<u32>().unwrap_or(0);
        self.pending_index = Some(index);
        self.in_index = false;
    }

    fn flush(&mut self, path: &str, segments: &mut Vec<PathSegment>) -> OverrideResult<()> {
        if self.name.is_empty() {
            return Err(OverrideError::Path(format!(
                "missing field name in path '{}'",
                path
            )));
        }
        let schema = self.cursor.as_ref().ok_or_else(|| {
            OverrideError::Path(format!(
                "'{}' is not addressable beyond its leaf in path '{}'",
                self.name, path
            ))
        })?;
        let handle = schema
            .find_field(&self.name)
            .or_else(|| schema.find_field_by_display_name(&self.name))
            .ok_or_else(|| {
                OverrideError::Path(format!(
                    "unknown field '{}' on '{}' in path '{}'",
                    self.name,
                    schema.name(),
                    path
                ))
            })?;
        let def = handle.get().ok_or_else(|| {
            OverrideError::Path(format!("schema for '{}' is gone", self.name))
        })?;

        segments.push(PathSegment::new(handle, self.pending_index.take()));
        self.cursor = StructSchema::advance_through(&def);
        self.name.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use crate::schema::field::{FieldDef, FieldKind};

    fn settings_schema() -> Arc<StructSchema> {
        let color = StructSchema::new("Color")
            .with_field(FieldDef::float("R"))
            .with_field(FieldDef::float("G"))
            .with_field(FieldDef::float("B"))
            .into_shared();
        let entry = StructSchema::new("SettingsEntry")
            .with_field(FieldDef::struct_of("Color", color))
            .with_field(FieldDef::float("Weight").with_display_name("Blend Weight"))
            .into_shared();
        StructSchema::new("Rig")
            .with_field(FieldDef::sequence_of(
                "Settings",
                FieldDef::struct_of("Settings[]", entry),
            ))
            .with_field(FieldDef::sequence_of("Offsets", FieldDef::float("Offsets[]")))
            .with_field(FieldDef::float("Scale"))
            .into_shared()
    }

    #[test]
    fn parses_nested_indexed_chain() {
        let schema = settings_schema();
        let segments = parse("Settings[2]->Color->R", &schema).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].array_index, Some(2));
        assert_eq!(segments[1].array_index, None);
        assert_eq!(segments[2].leaf_def().unwrap().kind(), FieldKind::Float);
        assert_eq!(
            path::build_path(&segments).unwrap(),
            "Settings[2]->Color->R"
        );
    }

    #[test]
    fn whole_sequence_segment_keeps_no_index() {
        let schema = settings_schema();
        let segments = parse("Offsets", &schema).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].array_index, None);
        assert_eq!(segments[0].leaf_def().unwrap().kind(), FieldKind::Sequence);
    }

    #[test]
    fn indexed_sequence_leaf_is_element_typed() {
        let schema = settings_schema();
        let segments = parse("Offsets[1]", &schema).unwrap();
        assert_eq!(segments[0].array_index, Some(1));
        assert_eq!(segments[0].leaf_def().unwrap().kind(), FieldKind::Float);
    }

    #[test]
    fn unknown_field_fails_whole_parse() {
        let schema = settings_schema();
        assert!(parse("Settings[0]->Missing", &schema).is_err());
        assert!(parse("Missing->Scale", &schema).is_err());
    }

    #[test]
    fn empty_and_degenerate_paths_fail() {
        let schema = settings_schema();
        assert!(parse("", &schema).is_err());
        assert!(parse("->Scale", &schema).is_err());
        assert!(parse("Scale->", &schema).is_err());
        // Scale is a float; nothing is addressable below it.
        assert!(parse("Scale->X", &schema).is_err());
    }

    #[test]
    fn non_numeric_index_coerces_to_zero() {
        let schema = settings_schema();
        let segments = parse("Offsets[junk]", &schema).unwrap();
        assert_eq!(segments[0].array_index, Some(0));
    }

    #[test]
    fn display_name_resolves_when_field_name_misses() {
        let schema = settings_schema();
        let segments = parse("Settings[0]->Blend Weight", &schema).unwrap();
        assert_eq!(segments.len(), 2);
        let def = segments[1].leaf_def().unwrap();
        assert_eq!(def.name(), "Weight");
    }
}
