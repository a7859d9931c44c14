//! Legacy math-value text ingestion.
//!
//! Older serialized data carried bare comma-separated number lists for the
//! math kinds (`"1.0,2.0"` instead of `"(X=1.0,Y=2.0)"`). Import rewrites
//! such text into the keyed parenthetical form and feeds it back through
//! the strict importer. The keyed form is the only canonical one; bare
//! forms are accepted on import exclusively.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::schema::field::FieldKind;

static NUMBER_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-+0-9eE.\s]+(,[-+0-9eE.\s]+)*$").expect("legacy number-list pattern")
});

/// Rewrite candidates for `text` as a value of `kind`, best first.
///
/// Returns an empty list when `text` is not a bare number list or its
/// arity does not match the kind.
pub(crate) fn rewrite_candidates(kind: FieldKind, text: &str) -> Vec<String> {
    if !kind.is_math() {
        return Vec::new();
    }

    let trimmed = text.trim();
    let bare = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    if !NUMBER_LIST_RE.is_match(bare) {
        return Vec::new();
    }

    let numbers: Vec<&str> = bare.split(',').map(str::trim).collect();
    let mut candidates = Vec::new();
    match kind {
        FieldKind::Vec2 | FieldKind::Vec3 | FieldKind::Rotator | FieldKind::Quat => {
            let keys = kind.component_keys();
            if numbers.len() == keys.len() {
                candidates.push(keyed(keys, &numbers));
            }
        }
        FieldKind::Transform => {
            // translation, rotation, scale flattened to ten numbers
            if numbers.len() == 10 {
                candidates.push(format!(
                    "(Translation={},Rotation={},Scale={})",
                    keyed(&["X", "Y", "Z"], &numbers[0..3]),
                    keyed(&["X", "Y", "Z", "W"], &numbers[3..7]),
                    keyed(&["X", "Y", "Z"], &numbers[7..10]),
                ));
            }
        }
        _ => {}
    }
    candidates
}

fn keyed(keys: &[&str], numbers: &[&str]) -> String {
    let parts: Vec<String> = keys
        .iter()
        .zip(numbers)
        .map(|(k, n)| format!("{}={}", k, n))
        .collect();
    format!("({})", parts.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec2_bare_form_rewrites_to_keyed() {
        let candidates = rewrite_candidates(FieldKind::Vec2, "1.0,2.0");
        assert_eq!(candidates, vec!["(X=1.0,Y=2.0)".to_string()]);
    }

    #[test]
    fn rotator_uses_its_own_keys() {
        let candidates = rewrite_candidates(FieldKind::Rotator, "(10, 20, 30)");
        assert_eq!(candidates, vec!["(Pitch=10,Yaw=20,Roll=30)".to_string()]);
    }

    #[test]
    fn transform_takes_ten_numbers() {
        let candidates =
            rewrite_candidates(FieldKind::Transform, "1,2,3,0,0,0,1,1,1,1");
        assert_eq!(
            candidates,
            vec![
                "(Translation=(X=1,Y=2,Z=3),Rotation=(X=0,Y=0,Z=0,W=1),Scale=(X=1,Y=1,Z=1))"
                    .to_string()
            ]
        );
    }

    #[test]
    fn arity_mismatch_and_non_numeric_yield_nothing() {
        assert!(rewrite_candidates(FieldKind::Vec2, "1,2,3").is_empty());
        assert!(rewrite_candidates(FieldKind::Vec3, "a,b,c").is_empty());
        assert!(rewrite_candidates(FieldKind::Float, "1,2").is_empty());
        assert!(rewrite_candidates(FieldKind::Quat, "(X=1,Y=2,Z=3,W=4)").is_empty());
    }
}
