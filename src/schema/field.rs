use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

use crate::schema::StructSchema;

/// Runtime type tag of a field.
///
/// The tag decides the byte layout of stored snapshots, the JSON shape of
/// live values, and the canonical textual form. The math kinds additionally
/// participate in the legacy text-import fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    String,
    Vec2,
    Vec3,
    Rotator,
    Quat,
    Transform,
    Struct,
    Sequence,
}

impl FieldKind {
    /// True for the fixed set of math kinds covered by the legacy
    /// comma-form import fallback.
    #[must_use]
    pub const fn is_math(self) -> bool {
        matches!(
            self,
            Self::Vec2 | Self::Vec3 | Self::Rotator | Self::Quat | Self::Transform
        )
    }

    /// Encoded size in bytes for kinds with a fixed layout.
    ///
    /// `String`, `Struct`, and `Sequence` snapshots are length-prefixed and
    /// have no fixed size.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int | Self::Float => Some(8),
            Self::Vec2 => Some(16),
            Self::Vec3 | Self::Rotator => Some(24),
            Self::Quat => Some(32),
            Self::Transform => Some(80),
            Self::String | Self::Struct | Self::Sequence => None,
        }
    }

    /// Component keys of the flat math kinds, in canonical order.
    #[must_use]
    pub const fn component_keys(self) -> &'static [&'static str] {
        match self {
            Self::Vec2 => &["X", "Y"],
            Self::Vec3 => &["X", "Y", "Z"],
            Self::Rotator => &["Pitch", "Yaw", "Roll"],
            Self::Quat => &["X", "Y", "Z", "W"],
            _ => &[],
        }
    }
}

/// Descriptor for one field of a [`StructSchema`].
///
/// Sequence fields carry their element descriptor; struct fields carry the
/// nested layout. Definitions are owned by their schema behind `Arc`, and
/// addressed elsewhere only through weak [`FieldHandle`]s.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    display_name: Option<String>,
    kind: FieldKind,
    owner: String,
    element: Option<Arc<FieldDef>>,
    layout: Option<Arc<StructSchema>>,
}

impl FieldDef {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            kind,
            owner: String::new(),
            element: None,
            layout: None,
        }
    }

    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Bool)
    }

    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Int)
    }

    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Float)
    }

    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::String)
    }

    #[must_use]
    pub fn vec2(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Vec2)
    }

    #[must_use]
    pub fn vec3(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Vec3)
    }

    #[must_use]
    pub fn rotator(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Rotator)
    }

    #[must_use]
    pub fn quat(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Quat)
    }

    #[must_use]
    pub fn transform(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Transform)
    }

    /// A field whose value is a nested structure described by `layout`.
    #[must_use]
    pub fn struct_of(name: impl Into<String>, layout: Arc<StructSchema>) -> Self {
        let mut def = Self::with_kind(name, FieldKind::Struct);
        def.layout = Some(layout);
        def
    }

    /// A dynamically-sized sequence whose elements are described by
    /// `element`.
    #[must_use]
    pub fn sequence_of(name: impl Into<String>, element: FieldDef) -> Self {
        let mut def = Self::with_kind(name, FieldKind::Sequence);
        def.element = Some(Arc::new(element));
        def
    }

    /// Attaches an editor-facing display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Name of the structured type this field belongs to. Empty for
    /// element descriptors, which are reachable only through their
    /// sequence field.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub const fn is_sequence(&self) -> bool {
        matches!(self.kind, FieldKind::Sequence)
    }

    /// Element descriptor of a sequence field.
    #[must_use]
    pub fn element(&self) -> Option<&Arc<FieldDef>> {
        self.element.as_ref()
    }

    /// Nested layout of a struct field.
    #[must_use]
    pub fn layout(&self) -> Option<&Arc<StructSchema>> {
        self.layout.as_ref()
    }

    /// Encoded size in bytes, when every part of the layout is fixed.
    #[must_use]
    pub fn byte_size(&self) -> Option<usize> {
        match self.kind {
            FieldKind::Struct => {
                let layout = self.layout.as_ref()?;
                let mut total = 0;
                for field in layout.field_defs() {
                    total += field.byte_size()?;
                }
                Some(total)
            }
            kind => kind.fixed_size(),
        }
    }

    /// The zero-initialized live value of this field's type.
    #[must_use]
    pub fn zero_value(&self) -> Value {
        match self.kind {
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Int => json!(0),
            FieldKind::Float => json!(0.0),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
                let mut obj = serde_json::Map::new();
                for key in self.kind.component_keys() {
                    obj.insert((*key).to_string(), json!(0.0));
                }
                Value::Object(obj)
            }
            FieldKind::Transform => json!({
                "Translation": {"X": 0.0, "Y": 0.0, "Z": 0.0},
                "Rotation": {"X": 0.0, "Y": 0.0, "Z": 0.0, "W": 0.0},
                "Scale": {"X": 0.0, "Y": 0.0, "Z": 0.0},
            }),
            FieldKind::Struct => self
                .layout
                .as_ref()
                .map_or_else(|| Value::Object(serde_json::Map::new()), |l| l.zero_instance()),
            FieldKind::Sequence => Value::Array(Vec::new()),
        }
    }
}

/// Weak reference to a schema-owned [`FieldDef`].
///
/// Handles never own field lifetime: once the owning schema is dropped,
/// every accessor resolves to `None` and dependent operations fail
/// gracefully. Equality is identity of the referenced definition, not
/// structural comparison.
#[derive(Debug, Clone)]
pub struct FieldHandle {
    def: Weak<FieldDef>,
}

impl FieldHandle {
    pub(crate) fn new(def: &Arc<FieldDef>) -> Self {
        Self {
            def: Arc::downgrade(def),
        }
    }

    /// Upgrades to the referenced definition, `None` if the schema is gone.
    #[must_use]
    pub fn get(&self) -> Option<Arc<FieldDef>> {
        self.def.upgrade()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.def.strong_count() > 0
    }

    /// Identity comparison of the referenced definitions.
    #[must_use]
    pub fn same_field(&self, other: &FieldHandle) -> bool {
        self.def.ptr_eq(&other.def)
    }
}
