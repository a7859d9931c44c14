//! Binary container format.
//!
//! Little-endian, stream-oriented, with field identities written as
//! `(owner, name)` string pairs rather than textual paths. The value blob
//! of each entry is length-prefixed, so a reader that cannot resolve an
//! entry's field chain against the load-time schema skips the blob and
//! keeps reading; a renamed or removed field costs one entry, never the
//! stream.
//!
//! ```text
//! Container := uses_subject_key:u8, count:i32, Value[count]
//! Value     := subject_key:Str, num_props:i32, PropRef[num_props],
//!              data_len:i64, data:bytes(data_len)
//! PropRef   := owner:Str, field:Str, array_index:i32   (-1 = whole field)
//! Str       := len:i32, utf8 bytes
//! ```

use std::io::{Read, Write};
use std::sync::Arc;

use log::warn;

use crate::constants::ARRAY_INDEX_NONE;
use crate::container::OverrideContainer;
use crate::error::{OverrideError, OverrideResult};
use crate::path::{self, PathSegment};
use crate::schema::{Schema, StructSchema};
use crate::value::{codec, OverrideValue};

impl OverrideContainer {
    /// Writes the whole container to `writer`.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> OverrideResult<()> {
        write_u8(writer, u8::from(self.uses_subject_key))?;
        write_i32(writer, int_len(self.values.len())?)?;
        for entry in &self.values {
            write_entry(writer, entry)?;
        }
        Ok(())
    }

    /// Reads a container from `reader`, resolving field identities against
    /// `schema`. Entries whose chain no longer resolves are skipped.
    pub fn deserialize<R: Read>(
        reader: &mut R,
        schema: &Arc<StructSchema>,
    ) -> OverrideResult<Self> {
        let uses_subject_key = read_u8(reader)? != 0;
        let count = read_i32(reader)?;
        if count < 0 {
            return Err(OverrideError::Serialization(format!(
                "negative entry count {}",
                count
            )));
        }

        let mut container = Self::new(uses_subject_key);
        for _ in 0..count {
            if let Some(entry) = read_entry(reader, schema)? {
                let description = entry.path().unwrap_or_default().to_string();
                if container.add(entry).is_none() {
                    warn!("dropped override '{}' during load", description);
                }
            }
        }
        Ok(container)
    }
}

fn write_entry<W: Write>(writer: &mut W, entry: &OverrideValue) -> OverrideResult<()> {
    write_string(writer, entry.subject_key().unwrap_or(""))?;
    let segments = entry.properties();
    write_i32(writer, int_len(segments.len())?)?;
    for segment in segments {
        // A dead handle serializes as empty identity and will be skipped
        // on load.
        let (owner, name) = segment
            .field
            .get()
            .map(|def| (def.owner().to_string(), def.name().to_string()))
            .unwrap_or_default();
        write_string(writer, &owner)?;
        write_string(writer, &name)?;
        let index = segment.array_index.map_or(ARRAY_INDEX_NONE, |i| i as i32);
        write_i32(writer, index)?;
    }
    write_i64(writer, entry.data().len() as i64)?;
    writer.write_all(entry.data())?;
    Ok(())
}

fn read_entry<R: Read>(
    reader: &mut R,
    schema: &Arc<StructSchema>,
) -> OverrideResult<Option<OverrideValue>> {
    let subject_raw = read_string(reader)?;
    let subject_key = (!subject_raw.is_empty()).then_some(subject_raw);

    let num_props = read_i32(reader)?;
    if num_props < 0 {
        return Err(OverrideError::Serialization(format!(
            "negative segment count {}",
            num_props
        )));
    }
    let mut refs = Vec::with_capacity(num_props as usize);
    for _ in 0..num_props {
        let owner = read_string(reader)?;
        let name = read_string(reader)?;
        let index = read_i32(reader)?;
        refs.push((owner, name, index));
    }

    let data_len = read_i64(reader)?;
    if data_len < 0 {
        return Err(OverrideError::Serialization(format!(
            "negative value length {}",
            data_len
        )));
    }

    let Some(segments) = resolve_refs(schema, &refs) else {
        warn!(
            "skipping override '{}': field chain no longer resolves",
            described(&refs)
        );
        skip_bytes(reader, data_len as u64)?;
        return Ok(None);
    };

    let mut data = vec![0u8; data_len as usize];
    reader.read_exact(&mut data)?;

    let Some(leaf) = segments.last().and_then(PathSegment::leaf_def) else {
        warn!("skipping override '{}': no leaf type", described(&refs));
        return Ok(None);
    };
    let cached = match codec::decode_all(&leaf, &data)
        .and_then(|value| codec::export_string(&leaf, &value))
    {
        Ok(text) => text,
        Err(e) => {
            warn!(
                "skipping override '{}': unreadable value ({})",
                described(&refs),
                e
            );
            return Ok(None);
        }
    };

    let rebuilt_path = path::build_path(&segments);
    Ok(Some(OverrideValue::from_parts(
        rebuilt_path,
        subject_key,
        segments,
        data,
        Some(cached),
    )))
}

/// Walks the stored identities through the schema the way the parser
/// walks names. `None` when any step fails to resolve.
fn resolve_refs(
    schema: &Arc<StructSchema>,
    refs: &[(String, String, i32)],
) -> Option<Vec<PathSegment>> {
    let mut cursor = Some(schema.clone());
    let mut segments = Vec::with_capacity(refs.len());
    for (_, name, index) in refs {
        let current = cursor.as_ref()?;
        let handle = current.find_field(name)?;
        let def = handle.get()?;
        let array_index = (*index != ARRAY_INDEX_NONE).then_some(*index as u32);
        segments.push(PathSegment::new(handle, array_index));
        cursor = StructSchema::advance_through(&def);
    }
    Some(segments)
}

/// Best-effort textual form of an unresolvable chain, for diagnostics.
fn described(refs: &[(String, String, i32)]) -> String {
    refs.iter()
        .map(|(_, name, index)| {
            if *index == ARRAY_INDEX_NONE {
                name.clone()
            } else {
                format!("{}[{}]", name, index)
            }
        })
        .collect::<Vec<_>>()
        .join(crate::constants::PATH_SEPARATOR)
}

fn int_len(len: usize) -> OverrideResult<i32> {
    i32::try_from(len)
        .map_err(|_| OverrideError::Serialization(format!("length {} exceeds i32", len)))
}

fn skip_bytes<R: Read>(reader: &mut R, len: u64) -> OverrideResult<()> {
    let copied = std::io::copy(&mut reader.by_ref().take(len), &mut std::io::sink())?;
    if copied != len {
        return Err(OverrideError::Serialization(format!(
            "truncated stream: expected {} skipped bytes, found {}",
            len, copied
        )));
    }
    Ok(())
}

fn write_u8<W: Write>(writer: &mut W, value: u8) -> OverrideResult<()> {
    writer.write_all(&[value])?;
    Ok(())
}

fn write_i32<W: Write>(writer: &mut W, value: i32) -> OverrideResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_i64<W: Write>(writer: &mut W, value: i64) -> OverrideResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> OverrideResult<()> {
    write_i32(writer, int_len(value.len())?)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> OverrideResult<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_i32<R: Read>(reader: &mut R) -> OverrideResult<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> OverrideResult<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_string<R: Read>(reader: &mut R) -> OverrideResult<String> {
    let len = read_i32(reader)?;
    if len < 0 {
        return Err(OverrideError::Serialization(format!(
            "negative string length {}",
            len
        )));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| OverrideError::Serialization(format!("invalid utf8 in stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::LogSink;
    use crate::schema::field::FieldDef;
    use std::io::Cursor;

    fn rig_schema() -> Arc<StructSchema> {
        let color = StructSchema::new("Color")
            .with_field(FieldDef::float("R"))
            .with_field(FieldDef::float("G"))
            .with_field(FieldDef::float("B"))
            .into_shared();
        StructSchema::new("Rig")
            .with_field(FieldDef::sequence_of("Offsets", FieldDef::float("Offsets[]")))
            .with_field(FieldDef::struct_of("Tint", color))
            .with_field(FieldDef::float("Scale"))
            .into_shared()
    }

    fn round_trip(container: &OverrideContainer, schema: &Arc<StructSchema>) -> OverrideContainer {
        let mut bytes = Vec::new();
        container.serialize(&mut bytes).unwrap();
        OverrideContainer::deserialize(&mut Cursor::new(bytes), schema).unwrap()
    }

    #[test]
    fn container_round_trip_preserves_entries() {
        let schema = rig_schema();
        let mut container = OverrideContainer::new(true);
        container.add(OverrideValue::from_string(
            "Offsets[1]",
            &schema,
            "2.5",
            Some("left"),
            &LogSink,
        ));
        container.add(OverrideValue::from_string(
            "Tint->R",
            &schema,
            "0.75",
            Some("right"),
            &LogSink,
        ));

        let loaded = round_trip(&container, &schema);
        assert_eq!(loaded.len(), 2);
        assert!(loaded.uses_subject_key());

        for entry in container.values() {
            let found = loaded
                .find(entry.path().unwrap(), entry.subject_key())
                .unwrap();
            assert!(entry.identical(found));
        }
    }

    #[test]
    fn whole_sequence_entry_round_trips() {
        let schema = rig_schema();
        let mut container = OverrideContainer::new(false);
        container.add(OverrideValue::from_string(
            "Offsets",
            &schema,
            "(1,2.5,3)",
            None,
            &LogSink,
        ));

        let loaded = round_trip(&container, &schema);
        let entry = loaded.find("Offsets", None).unwrap();
        assert_eq!(entry.as_str(), "(1,2.5,3)");
    }

    #[test]
    fn removed_field_skips_entry_but_loads_rest() {
        let schema = rig_schema();
        let mut container = OverrideContainer::new(false);
        container.add(OverrideValue::from_string(
            "Scale", &schema, "2.0", None, &LogSink,
        ));
        container.add(OverrideValue::from_string(
            "Offsets[0]",
            &schema,
            "1.5",
            None,
            &LogSink,
        ));

        let mut bytes = Vec::new();
        container.serialize(&mut bytes).unwrap();

        // The load-time schema no longer has "Scale".
        let renamed = StructSchema::new("Rig")
            .with_field(FieldDef::sequence_of("Offsets", FieldDef::float("Offsets[]")))
            .with_field(FieldDef::float("UniformScale"))
            .into_shared();
        let loaded = OverrideContainer::deserialize(&mut Cursor::new(bytes), &renamed).unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(loaded.find("Scale", None).is_none());
        assert_eq!(loaded.find("Offsets[0]", None).unwrap().as_str(), "1.5");
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let schema = rig_schema();
        let mut container = OverrideContainer::new(false);
        container.add(OverrideValue::from_string(
            "Scale", &schema, "2.0", None, &LogSink,
        ));

        let mut bytes = Vec::new();
        container.serialize(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 4);

        assert!(OverrideContainer::deserialize(&mut Cursor::new(bytes), &schema).is_err());
    }

    #[test]
    fn empty_container_round_trips() {
        let schema = rig_schema();
        let container = OverrideContainer::new(true);
        let loaded = round_trip(&container, &schema);
        assert!(loaded.is_empty());
        assert!(loaded.uses_subject_key());
    }
}
