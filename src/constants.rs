/// Common constants used across the field_overlay crate.
///
/// These cover the path grammar tokens and the fixed limits of the
/// import fallback and binary encoding.

/// Token separating field segments in a textual path, e.g. `A->B->C`.
pub const PATH_SEPARATOR: &str = "->";

/// Opens a sequence index inside a path segment, e.g. `Settings[2]`.
pub const INDEX_OPEN: char = '[';

/// Closes a sequence index inside a path segment.
pub const INDEX_CLOSE: char = ']';

/// Sentinel written to the binary stream for a segment that addresses a
/// whole field rather than one sequence element.
pub const ARRAY_INDEX_NONE: i32 = -1;

/// Upper bound on rewrite attempts when importing legacy math-value text.
pub const MAX_LEGACY_IMPORT_ATTEMPTS: usize = 3;
