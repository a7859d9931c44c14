//! End-to-end behavior of the override store: precedence, lookup,
//! apply/snapshot, and containment across the public API.

use std::sync::Arc;

use field_overlay::{
    path, FieldDef, LogSink, OverrideContainer, OverrideValue, Schema, StructSchema,
};
use serde_json::{json, Value};

fn character_schema() -> Arc<StructSchema> {
    let color = StructSchema::new("Color")
        .with_field(FieldDef::float("R"))
        .with_field(FieldDef::float("G"))
        .with_field(FieldDef::float("B"))
        .into_shared();
    let entry = StructSchema::new("SettingsEntry")
        .with_field(FieldDef::struct_of("Color", color))
        .with_field(FieldDef::float("Weight"))
        .into_shared();
    StructSchema::new("Character")
        .with_field(FieldDef::sequence_of(
            "Settings",
            FieldDef::struct_of("Settings[]", entry),
        ))
        .with_field(FieldDef::sequence_of("Offsets", FieldDef::float("Offsets[]")))
        .with_field(FieldDef::transform("RootTransform"))
        .with_field(FieldDef::string("Label"))
        .with_field(FieldDef::boolean("Enabled"))
        .into_shared()
}

fn character_instance(schema: &Arc<StructSchema>) -> Value {
    let mut instance = schema.zero_instance();
    instance["Offsets"] = json!([0.0, 0.0, 0.0]);
    instance["Settings"] = json!([
        {"Color": {"R": 0.0, "G": 0.0, "B": 0.0}, "Weight": 1.0},
    ]);
    instance
}

fn over(
    schema: &Arc<StructSchema>,
    path: &str,
    text: &str,
    subject: Option<&str>,
) -> OverrideValue {
    let value = OverrideValue::from_string(path, schema, text, subject, &LogSink);
    assert!(value.is_valid(), "override at '{}' should build", path);
    value
}

#[test]
fn parent_override_rejects_and_supersedes_descendants() {
    let schema = character_schema();
    let mut container = OverrideContainer::new(true);
    let baseline = container.len();

    // A mid-level override governs everything below it.
    assert!(container
        .add(over(&schema, "Settings[0]->Color", "(R=1,G=0,B=0)", Some("s")))
        .is_some());
    assert!(container
        .add(over(&schema, "Settings[0]->Color->R", "0.5", Some("s")))
        .is_none());
    assert_eq!(container.len(), baseline + 1);

    // A broader override replaces the narrower one.
    assert!(container
        .add(over(
            &schema,
            "Settings[0]",
            "(Color=(R=0,G=1,B=0),Weight=2)",
            Some("s"),
        ))
        .is_some());
    assert_eq!(container.len(), baseline + 1);
    assert!(container.contains("Settings[0]", Some("s")));
    assert!(!container.contains("Settings[0]->Color", Some("s")));
}

#[test]
fn sibling_element_overrides_collapse_under_whole_sequence() {
    let schema = character_schema();
    let mut container = OverrideContainer::new(true);

    container.add(over(&schema, "Offsets[0]", "1.0", Some("s")));
    container.add(over(&schema, "Offsets[1]", "2.0", Some("s")));
    assert_eq!(container.len(), 2);

    container.add(over(&schema, "Offsets", "(5,6,7)", Some("s")));
    assert_eq!(container.len(), 1);
    assert_eq!(container.find("Offsets", Some("s")).unwrap().as_str(), "(5,6,7)");
}

#[test]
fn find_or_add_is_idempotent_and_keeps_the_newest_value() {
    let schema = character_schema();
    let mut container = OverrideContainer::new(true);

    container.find_or_add(over(&schema, "Settings[0]->Weight", "1.5", Some("s")));
    container.find_or_add(over(&schema, "Settings[0]->Weight", "3.25", Some("s")));

    assert_eq!(container.len(), 1);
    assert_eq!(
        container
            .find("Settings[0]->Weight", Some("s"))
            .unwrap()
            .as_str(),
        "3.25"
    );
}

#[test]
fn containment_symmetry() {
    let parent = "Settings[0]->Color";
    let child = format!("{}->B", parent);
    assert!(path::is_child_path_of(&child, parent));
    assert_eq!(path::parent_path(&child), parent);
}

#[test]
fn snapshot_then_apply_reproduces_the_source_on_another_subject() {
    let schema = character_schema();
    let mut source = character_instance(&schema);
    source["RootTransform"] = json!({
        "Translation": {"X": 1.0, "Y": 2.0, "Z": 3.0},
        "Rotation": {"X": 0.0, "Y": 0.0, "Z": 0.0, "W": 1.0},
        "Scale": {"X": 1.0, "Y": 1.0, "Z": 1.0},
    });

    let value = OverrideValue::from_subject("RootTransform", &schema, &source, None);
    assert!(value.is_valid());

    let mut target = character_instance(&schema);
    assert!(value.copy_to_subject(&mut target, Some(&schema)));
    assert_eq!(target["RootTransform"], source["RootTransform"]);
}

#[test]
fn sequence_element_override_grows_and_writes_only_its_slot() {
    let schema = character_schema();
    let value = over(&schema, "Offsets[1]", "2.5", None);
    assert!(value.is_valid());
    assert_eq!(value.as_str(), "2.5");

    let mut instance = character_instance(&schema);
    assert!(value.copy_to_subject(&mut instance, Some(&schema)));
    assert_eq!(instance["Offsets"], json!([0.0, 2.5, 0.0]));
}

#[test]
fn import_changes_hash_only_with_the_value() {
    let schema = character_schema();
    let mut value = over(&schema, "Label", "walk_cycle", None);
    let original = value.hash();

    assert!(value.set_from_string("run_cycle", &LogSink));
    assert_ne!(value.hash(), original);

    assert!(value.set_from_string("walk_cycle", &LogSink));
    assert_eq!(value.hash(), original);
}

#[test]
fn overrides_for_other_subjects_do_not_leak_on_apply() {
    let schema = character_schema();
    let mut container = OverrideContainer::new(true);
    container.add(over(&schema, "Enabled", "true", Some("hero")));
    container.add(over(&schema, "Offsets[2]", "9.0", Some("extra")));

    let mut hero = character_instance(&schema);
    assert!(container.copy_to_subject(&mut hero, Some(&schema), Some("hero")));
    assert_eq!(hero["Enabled"], json!(true));
    assert_eq!(hero["Offsets"], json!([0.0, 0.0, 0.0]));

    assert_eq!(
        container.generate_subject_array(),
        vec!["extra".to_string(), "hero".to_string()]
    );
}

#[test]
fn schema_teardown_invalidates_dependent_overrides() {
    let schema = character_schema();
    let value = over(&schema, "Label", "idle", None);
    assert!(value.is_valid());

    drop(schema);
    assert!(!value.is_valid());

    let rebuilt = character_schema();
    let mut instance = character_instance(&rebuilt);
    let before = instance.clone();
    assert!(!value.copy_to_subject(&mut instance, Some(&rebuilt)));
    assert_eq!(instance, before);
}

#[test]
fn schema_name_resolution_is_exercised_end_to_end() {
    let schema = character_schema();
    assert_eq!(schema.name(), "Character");
    assert!(schema.find_field("Offsets").is_some());
    assert!(schema.find_field("Missing").is_none());
}
