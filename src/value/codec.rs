//! Per-kind leaf value codec.
//!
//! Snapshots travel in three forms: the owned little-endian byte buffer
//! held by an override, the live `serde_json::Value` shape, and the
//! canonical text form. All three conversions are driven by the leaf's
//! [`FieldDef`], so a buffer is never reinterpreted without its type.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{OverrideError, OverrideResult};
use crate::schema::field::{FieldDef, FieldKind};

/// Truncates a finished sha256 digest to the 32-bit content-hash width.
pub(crate) fn digest32(hasher: Sha256) -> u32 {
    let digest = hasher.finalize();
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

fn shape_error(def: &FieldDef, expected: &str, value: &Value) -> OverrideError {
    OverrideError::Import(format!(
        "field '{}': expected {}, found {}",
        def.name(),
        expected,
        value
    ))
}

fn component(def: &FieldDef, value: &Value, key: &str) -> OverrideResult<f64> {
    value
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| shape_error(def, &format!("numeric component '{}'", key), value))
}

/// Encodes `value` into `out` according to `def`'s layout.
pub fn encode(def: &FieldDef, value: &Value, out: &mut Vec<u8>) -> OverrideResult<()> {
    match def.kind() {
        FieldKind::Bool => {
            let b = value
                .as_bool()
                .ok_or_else(|| shape_error(def, "boolean", value))?;
            out.push(u8::from(b));
        }
        FieldKind::Int => {
            let v = value
                .as_i64()
                .ok_or_else(|| shape_error(def, "integer", value))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::Float => {
            let v = value
                .as_f64()
                .ok_or_else(|| shape_error(def, "number", value))?;
            out.extend_from_slice(&v.to_le_bytes());
        }
        FieldKind::String => {
            let s = value
                .as_str()
                .ok_or_else(|| shape_error(def, "string", value))?;
            write_len(out, s.len())?;
            out.extend_from_slice(s.as_bytes());
        }
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
            for key in def.kind().component_keys() {
                out.extend_from_slice(&component(def, value, key)?.to_le_bytes());
            }
        }
        FieldKind::Transform => {
            for (part, keys) in transform_parts() {
                let sub = value
                    .get(part)
                    .ok_or_else(|| shape_error(def, &format!("'{}' part", part), value))?;
                for key in keys {
                    out.extend_from_slice(&component(def, sub, key)?.to_le_bytes());
                }
            }
        }
        FieldKind::Struct => {
            let layout = def
                .layout()
                .ok_or_else(|| shape_error(def, "struct layout", value))?;
            for field in layout.field_defs() {
                let sub = value
                    .get(field.name())
                    .ok_or_else(|| shape_error(field.as_ref(), "present field", value))?;
                encode(field.as_ref(), sub, out)?;
            }
        }
        FieldKind::Sequence => {
            let element = def
                .element()
                .ok_or_else(|| shape_error(def, "sequence element type", value))?;
            let items = value
                .as_array()
                .ok_or_else(|| shape_error(def, "sequence", value))?;
            write_len(out, items.len())?;
            for item in items {
                encode(element.as_ref(), item, out)?;
            }
        }
    }
    Ok(())
}

/// Decodes a whole buffer; trailing bytes are treated as corruption.
pub fn decode_all(def: &FieldDef, bytes: &[u8]) -> OverrideResult<Value> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = decode(def, &mut reader)?;
    if reader.pos != bytes.len() {
        return Err(OverrideError::Serialization(format!(
            "field '{}': {} trailing bytes after decode",
            def.name(),
            bytes.len() - reader.pos
        )));
    }
    Ok(value)
}

fn decode(def: &FieldDef, reader: &mut Reader<'_>) -> OverrideResult<Value> {
    let value = match def.kind() {
        FieldKind::Bool => Value::Bool(reader.read_u8()? != 0),
        FieldKind::Int => json!(reader.read_i64()?),
        FieldKind::Float => json!(reader.read_f64()?),
        FieldKind::String => {
            let len = reader.read_u32()? as usize;
            let raw = reader.take(len)?.to_vec();
            Value::String(String::from_utf8(raw).map_err(|e| {
                OverrideError::Serialization(format!("field '{}': {}", def.name(), e))
            })?)
        }
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
            let mut obj = Map::new();
            for key in def.kind().component_keys() {
                obj.insert((*key).to_string(), json!(reader.read_f64()?));
            }
            Value::Object(obj)
        }
        FieldKind::Transform => {
            let mut outer = Map::new();
            for (part, keys) in transform_parts() {
                let mut obj = Map::new();
                for key in keys {
                    obj.insert((*key).to_string(), json!(reader.read_f64()?));
                }
                outer.insert(part.to_string(), Value::Object(obj));
            }
            Value::Object(outer)
        }
        FieldKind::Struct => {
            let layout = def.layout().ok_or_else(|| {
                OverrideError::Serialization(format!("field '{}' has no layout", def.name()))
            })?;
            let mut obj = Map::new();
            for field in layout.field_defs() {
                obj.insert(field.name().to_string(), decode(field.as_ref(), reader)?);
            }
            Value::Object(obj)
        }
        FieldKind::Sequence => {
            let element = def.element().ok_or_else(|| {
                OverrideError::Serialization(format!("field '{}' has no element type", def.name()))
            })?;
            let count = reader.read_u32()? as usize;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                items.push(decode(element.as_ref(), reader)?);
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

/// Canonical text form of a value of `def`'s type.
pub fn export_string(def: &FieldDef, value: &Value) -> OverrideResult<String> {
    let text = match def.kind() {
        FieldKind::Bool => value
            .as_bool()
            .ok_or_else(|| shape_error(def, "boolean", value))?
            .to_string(),
        FieldKind::Int => value
            .as_i64()
            .ok_or_else(|| shape_error(def, "integer", value))?
            .to_string(),
        FieldKind::Float => fmt_float(
            value
                .as_f64()
                .ok_or_else(|| shape_error(def, "number", value))?,
        ),
        FieldKind::String => value
            .as_str()
            .ok_or_else(|| shape_error(def, "string", value))?
            .to_string(),
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
            export_components(def, value, def.kind().component_keys())?
        }
        FieldKind::Transform => {
            let mut parts = Vec::with_capacity(3);
            for (part, keys) in transform_parts() {
                let sub = value
                    .get(part)
                    .ok_or_else(|| shape_error(def, &format!("'{}' part", part), value))?;
                parts.push(format!("{}={}", part, export_components(def, sub, keys)?));
            }
            format!("({})", parts.join(","))
        }
        FieldKind::Struct => {
            let layout = def
                .layout()
                .ok_or_else(|| shape_error(def, "struct layout", value))?;
            let mut parts = Vec::with_capacity(layout.field_count());
            for field in layout.field_defs() {
                let sub = value
                    .get(field.name())
                    .ok_or_else(|| shape_error(field.as_ref(), "present field", value))?;
                parts.push(format!(
                    "{}={}",
                    field.name(),
                    export_string(field.as_ref(), sub)?
                ));
            }
            format!("({})", parts.join(","))
        }
        FieldKind::Sequence => {
            let element = def
                .element()
                .ok_or_else(|| shape_error(def, "sequence element type", value))?;
            let items = value
                .as_array()
                .ok_or_else(|| shape_error(def, "sequence", value))?;
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                parts.push(export_string(element.as_ref(), item)?);
            }
            format!("({})", parts.join(","))
        }
    };
    Ok(text)
}

/// Strict type-directed import of `text` into a value of `def`'s type.
///
/// Legacy comma forms are not accepted here; the rewrite fallback lives in
/// [`crate::value::legacy`] and feeds its candidates back through this
/// entry point.
pub fn import_string(def: &FieldDef, text: &str) -> OverrideResult<Value> {
    let value = match def.kind() {
        FieldKind::Bool => {
            let trimmed = text.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(parse_error(def, text));
            }
        }
        FieldKind::Int => json!(text
            .trim()
            .parse::<i64>()
            .map_err(|_| parse_error(def, text))?),
        FieldKind::Float => json!(text
            .trim()
            .parse::<f64>()
            .map_err(|_| parse_error(def, text))?),
        FieldKind::String => Value::String(text.to_string()),
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
            import_components(def, text, def.kind().component_keys())?
        }
        FieldKind::Transform => {
            let entries = parse_keyed(def, text)?;
            let mut outer = Map::new();
            for (part, keys) in transform_parts() {
                let sub = keyed_lookup(&entries, part)
                    .ok_or_else(|| parse_error(def, text))?;
                let Value::Object(components) = import_components(def, sub, keys)? else {
                    return Err(parse_error(def, text));
                };
                outer.insert(part.to_string(), Value::Object(components));
            }
            Value::Object(outer)
        }
        FieldKind::Struct => {
            let layout = def
                .layout()
                .ok_or_else(|| parse_error(def, text))?;
            let entries = parse_keyed(def, text)?;
            let mut obj = Map::new();
            for field in layout.field_defs() {
                let sub = keyed_lookup(&entries, field.name())
                    .ok_or_else(|| parse_error(field.as_ref(), text))?;
                obj.insert(
                    field.name().to_string(),
                    import_string(field.as_ref(), sub)?,
                );
            }
            Value::Object(obj)
        }
        FieldKind::Sequence => {
            let element = def
                .element()
                .ok_or_else(|| parse_error(def, text))?;
            let inner = strip_parens(text).ok_or_else(|| parse_error(def, text))?;
            let mut items = Vec::new();
            if !inner.trim().is_empty() {
                for part in split_top_level(inner) {
                    items.push(import_string(element.as_ref(), part.trim())?);
                }
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

fn parse_error(def: &FieldDef, text: &str) -> OverrideError {
    OverrideError::Import(format!(
        "cannot parse '{}' as {:?} for field '{}'",
        text,
        def.kind(),
        def.name()
    ))
}

fn export_components(
    def: &FieldDef,
    value: &Value,
    keys: &[&str],
) -> OverrideResult<String> {
    let mut parts = Vec::with_capacity(keys.len());
    for key in keys {
        parts.push(format!("{}={}", key, fmt_float(component(def, value, key)?)));
    }
    Ok(format!("({})", parts.join(",")))
}

fn import_components(def: &FieldDef, text: &str, keys: &[&str]) -> OverrideResult<Value> {
    let entries = parse_keyed(def, text)?;
    let mut obj = Map::new();
    for key in keys {
        let raw = keyed_lookup(&entries, key).ok_or_else(|| parse_error(def, text))?;
        let parsed: f64 = raw.trim().parse().map_err(|_| parse_error(def, text))?;
        obj.insert((*key).to_string(), json!(parsed));
    }
    Ok(Value::Object(obj))
}

/// Splits a `(Key=Value,Key=Value)` form into its top-level entries.
fn parse_keyed<'a>(def: &FieldDef, text: &'a str) -> OverrideResult<Vec<(&'a str, &'a str)>> {
    let inner = strip_parens(text).ok_or_else(|| parse_error(def, text))?;
    let mut entries = Vec::new();
    if inner.trim().is_empty() {
        return Ok(entries);
    }
    for part in split_top_level(inner) {
        let mut depth = 0usize;
        let mut split_at = None;
        for (i, c) in part.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                '=' if depth == 0 => {
                    split_at = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let at = split_at.ok_or_else(|| parse_error(def, text))?;
        entries.push((part[..at].trim(), part[at + 1..].trim()));
    }
    Ok(entries)
}

fn keyed_lookup<'a>(entries: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    entries
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

fn strip_parens(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix('(')?.strip_suffix(')')?;
    Some(inner)
}

/// Splits on commas outside any nested parenthesis.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn fmt_float(v: f64) -> String {
    format!("{}", v)
}

const fn transform_parts() -> [(&'static str, &'static [&'static str]); 3] {
    [
        ("Translation", &["X", "Y", "Z"]),
        ("Rotation", &["X", "Y", "Z", "W"]),
        ("Scale", &["X", "Y", "Z"]),
    ]
}

fn write_len(out: &mut Vec<u8>, len: usize) -> OverrideResult<()> {
    let len = u32::try_from(len)
        .map_err(|_| OverrideError::Serialization(format!("length {} exceeds u32", len)))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> OverrideResult<&'a [u8]> {
        if self.pos + n > self.bytes.len() {
            return Err(OverrideError::Serialization(format!(
                "buffer underflow: need {} bytes at offset {}, have {}",
                n,
                self.pos,
                self.bytes.len() - self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> OverrideResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> OverrideResult<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_i64(&mut self) -> OverrideResult<i64> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(i64::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> OverrideResult<f64> {
        let raw = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(f64::from_le_bytes(buf))
    }
}
