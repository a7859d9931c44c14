//! # field_overlay
//!
//! A property-path override store: records, indexes, and re-applies
//! sparse overrides of individual fields inside externally-owned
//! structured values, addressed by textual paths such as
//! `Settings[2]->Color->R`.
//!
//! ## Core Components
//!
//! * `schema` - Schema capability trait, concrete struct descriptors, and
//!   the named registry
//! * `path` - Path parsing, resolved segment chains, and the value
//!   locator that walks them over live instances
//! * `value` - Type-erased override snapshots with import/export,
//!   comparison, and apply operations
//! * `container` - Ordered override sets with hashed lookup, hierarchical
//!   precedence, and binary serialization
//! * `toggle` - Injected feature switch with change broadcast
//! * `reporting` - Pluggable diagnostics sink for import failures
//! * `error` - Error types and handling
//!
//! ## Architecture
//!
//! Live instances are `serde_json::Value` object trees described by a
//! [`StructSchema`]. An override is built from a path plus a value (taken
//! from a live subject, a caller-held value, or text), carries an owned
//! snapshot of the leaf bytes, and can be re-applied to any instance of
//! the same shape. Containers deduplicate entries by `(path, subject)`
//! and keep a single invariant: a broader override always supersedes
//! narrower ones below it.
//!
//! Containers are not safe for concurrent writers; callers serialize all
//! mutating access externally.

pub mod constants;
pub mod container;
pub mod error;
pub mod path;
pub mod reporting;
pub mod schema;
pub mod toggle;
pub mod value;

// Re-export main types for convenience
pub use container::OverrideContainer;
pub use error::{OverrideError, OverrideResult};
pub use path::{locator, parser, PathSegment};
pub use reporting::{DiagnosticsSink, LogSink, MemorySink, Severity};
pub use schema::field::{FieldDef, FieldHandle, FieldKind};
pub use schema::{Schema, SchemaRegistry, StructSchema};
pub use toggle::OverrideFeatureToggle;
pub use value::OverrideValue;
