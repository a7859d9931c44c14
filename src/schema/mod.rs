//! Schema capability interface.
//!
//! The override store never talks to a reflection engine; it depends on
//! the small [`Schema`] capability trait, and on [`StructSchema`] as the
//! concrete descriptor for one structured type. Live instances described
//! by a schema are `serde_json::Value` object trees.

pub mod field;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::info;
use serde_json::Value;

use self::field::{FieldDef, FieldHandle, FieldKind};

/// Field-resolution capability of one structured type.
pub trait Schema {
    /// Name of the structured type this schema describes.
    fn name(&self) -> &str;

    /// Resolves a field by its name.
    fn find_field(&self, name: &str) -> Option<FieldHandle>;

    /// Resolves a field by its editor-facing display name.
    fn find_field_by_display_name(&self, name: &str) -> Option<FieldHandle>;

    /// Handles to every field, in declaration order.
    fn field_handles(&self) -> Vec<FieldHandle>;
}

/// Descriptor of one structured type: an ordered set of named fields.
///
/// Built with the consuming `with_field` builder and then shared behind
/// `Arc`; [`FieldHandle`]s handed out by lookups are weak, so dropping the
/// schema invalidates them rather than leaving them dangling.
#[derive(Debug, Default)]
pub struct StructSchema {
    name: String,
    fields: Vec<Arc<FieldDef>>,
    by_name: HashMap<String, usize>,
    by_display: HashMap<String, usize>,
}

impl StructSchema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_name: HashMap::new(),
            by_display: HashMap::new(),
        }
    }

    /// Adds a field, stamping this schema as its owner.
    #[must_use]
    pub fn with_field(mut self, mut field: FieldDef) -> Self {
        field.set_owner(&self.name);
        let index = self.fields.len();
        self.by_name.insert(field.name().to_string(), index);
        if let Some(display) = field.display_name() {
            self.by_display.insert(display.to_string(), index);
        }
        self.fields.push(Arc::new(field));
        self
    }

    #[must_use]
    pub fn into_shared(self) -> Arc<StructSchema> {
        Arc::new(self)
    }

    /// Field definitions in declaration order.
    pub fn field_defs(&self) -> impl Iterator<Item = &Arc<FieldDef>> {
        self.fields.iter()
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// A zero-initialized live instance of this type.
    #[must_use]
    pub fn zero_instance(&self) -> Value {
        let mut obj = serde_json::Map::new();
        for field in &self.fields {
            obj.insert(field.name().to_string(), field.zero_value());
        }
        Value::Object(obj)
    }

    /// Schema to resolve the *next* path segment against, after stepping
    /// through `field`: struct fields expose their layout, sequence fields
    /// expose their element's layout.
    #[must_use]
    pub fn advance_through(field: &FieldDef) -> Option<Arc<StructSchema>> {
        match field.kind() {
            FieldKind::Struct => field.layout().cloned(),
            FieldKind::Sequence => {
                let element = field.element()?;
                match element.kind() {
                    FieldKind::Struct => element.layout().cloned(),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Schema for StructSchema {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_field(&self, name: &str) -> Option<FieldHandle> {
        self.by_name
            .get(name)
            .map(|&index| FieldHandle::new(&self.fields[index]))
    }

    fn find_field_by_display_name(&self, name: &str) -> Option<FieldHandle> {
        self.by_display
            .get(name)
            .map(|&index| FieldHandle::new(&self.fields[index]))
    }

    fn field_handles(&self) -> Vec<FieldHandle> {
        self.fields.iter().map(FieldHandle::new).collect()
    }
}

/// Thread-safe registry of named schemas.
///
/// Binary deserialization and callers that address subject types by name
/// resolve root schemas through a registry instead of holding them all
/// individually.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<StructSchema>>>,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema under its own name, replacing any previous
    /// registration.
    pub fn register(&self, schema: Arc<StructSchema>) {
        let mut schemas = match self.schemas.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!("registering schema '{}'", Schema::name(schema.as_ref()));
        schemas.insert(Schema::name(schema.as_ref()).to_string(), schema);
    }

    /// Removes a schema. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let mut schemas = match self.schemas.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        schemas.remove(name).is_some()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<StructSchema>> {
        let schemas = match self.schemas.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        schemas.get(name).cloned()
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        let schemas = match self.schemas.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        schemas.contains_key(name)
    }
}
