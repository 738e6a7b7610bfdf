//! Library resolution against the shared fixture library.

use camino::{Utf8Path, Utf8PathBuf};
use machfile_matlib::{MaterialRegistry, Partition, load_library, resolve_dir};
use machfile_store::{json_files, load, save};
use machfile_types::{ErrorKind, Instance, SchemaRegistry, Value};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn fixture_library() -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../tests/fixtures/matlib")
}

/// Copies the fixture library so tests may write next to it.
fn library_copy() -> (TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    for path in json_files(&fixture_library()).unwrap() {
        fs::copy(&path, dir.join(path.file_name().unwrap())).unwrap();
    }
    (temp, dir)
}

fn snapshot(dir: &Utf8Path) -> Vec<(String, Vec<u8>)> {
    json_files(dir)
        .unwrap()
        .into_iter()
        .map(|p| (p.file_name().unwrap().to_string(), fs::read(&p).unwrap()))
        .collect()
}

fn material_name<'a>(machine: &'a Instance, path: &str) -> Option<&'a str> {
    machine.find(&format!("{path}.name")).and_then(Value::as_str)
}

#[test]
fn library_skips_machine_documents() {
    let library = load_library(&fixture_library()).unwrap();
    let names: Vec<&str> = library.iter().filter_map(|m| m.str("name")).collect();
    assert_eq!(names, vec!["Copper1", "Insulator1", "M400-50A", "MagnetPrius"]);
    assert!(library.iter().all(|m| m.str("path").is_some_and(|p| p.ends_with(".json"))));
}

#[test]
fn divergent_magnet_becomes_a_machine_material_and_library_is_untouched() {
    let (_temp, dir) = library_copy();
    let before = snapshot(&dir);

    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let registry = resolve_dir(&mut machine, &dir).unwrap();

    assert_eq!(
        registry.names(),
        vec!["Copper1", "Insulator1", "M400-50A", "MagnetPrius", "Air", "MagnetPrius_old"]
    );
    assert_eq!(registry.partition_of("MagnetPrius_old"), Some(Partition::Machine));
    assert_eq!(
        registry
            .get("MagnetPrius")
            .and_then(|m| m.find("struct.rho"))
            .and_then(Value::as_f64),
        Some(7500.0)
    );
    assert_eq!(
        registry
            .get("MagnetPrius_old")
            .and_then(|m| m.find("struct.rho"))
            .and_then(Value::as_f64),
        Some(7600.0)
    );

    assert_eq!(material_name(&machine, "rotor.hole[0].magnet_0.mat_type"), Some("MagnetPrius_old"));
    assert_eq!(material_name(&machine, "rotor.hole[0].magnet_1.mat_type"), Some("MagnetPrius"));
    assert!(
        machine
            .find("rotor.hole[0].magnet_1.mat_type.path")
            .and_then(Value::as_str)
            .is_some_and(|p| p.ends_with("MagnetPrius.json"))
    );
    assert_eq!(material_name(&machine, "rotor.hole[0].mat_void"), Some("Air"));
    assert_eq!(material_name(&machine, "stator.mat_type"), Some("M400-50A"));
    assert!(
        machine
            .find("stator.mat_type.path")
            .and_then(Value::as_str)
            .is_some_and(|p| p.ends_with("M400-50A.json"))
    );

    assert!(registry.check(&machine).is_empty());
    assert_eq!(snapshot(&dir), before);
}

#[test]
fn resolved_machine_resolves_to_the_same_registry_after_a_save() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let first = resolve_dir(&mut machine, &dir).unwrap();

    let out = dir.join("out").join("Toyota_Prius.json");
    save(&machine, &out).unwrap();
    let mut reloaded = load(&out).unwrap();
    let second = resolve_dir(&mut reloaded, &dir).unwrap();

    assert_eq!(first.names(), second.names());
    assert_eq!(reloaded, machine);
}

#[test]
fn renamed_library_material_moves_its_file() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();

    registry.rename(&mut machine, "Copper1", "Copper_annealed").unwrap();
    let written = registry.persist_library_entry("Copper_annealed", &dir).unwrap();

    assert_eq!(written, dir.join("Copper_annealed.json"));
    assert!(!dir.join("Copper1.json").exists());
    assert_eq!(
        material_name(&machine, "stator.winding.conductor.cond_mat"),
        Some("Copper_annealed")
    );
    let reloaded = load_library(&dir).unwrap();
    assert!(reloaded.iter().any(|m| m.str("name") == Some("Copper_annealed")));
    assert!(registry.check(&machine).is_empty());
}

#[test]
fn deleting_a_used_material_is_refused() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();
    let names: Vec<String> = registry.names().into_iter().map(String::from).collect();

    let err = registry.delete(&machine, "M400-50A").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaterialInUse);
    assert_eq!(err.exit_code(), 6);
    assert!(err.to_string().contains("M400-50A"));
    assert!(dir.join("M400-50A.json").exists());

    let err = registry.delete(&machine, "MagnetPrius_old").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MaterialInUse);
    assert_eq!(registry.names(), names);

    let err = registry.delete(&machine, "Unobtainium").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn unused_library_material_is_deleted_with_its_file() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();

    let copy = registry.duplicate("Copper1").unwrap();
    let written = registry.persist_library_entry(&copy, &dir).unwrap();
    assert!(written.exists());

    let removed = registry.delete(&machine, &copy).unwrap();
    assert_eq!(removed.str("name"), Some("Copper1_copy"));
    assert!(!written.exists());
    assert!(!registry.contains(&copy));
    assert!(dir.join("Copper1.json").exists());
    assert!(registry.check(&machine).is_empty());
}

#[test]
fn library_material_moves_to_the_machine() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();

    registry.move_to_machine(&mut machine, "M400-50A").unwrap();

    assert!(!dir.join("M400-50A.json").exists());
    assert_eq!(registry.partition_of("M400-50A"), Some(Partition::Machine));
    assert_eq!(
        registry.names(),
        vec!["Copper1", "Insulator1", "MagnetPrius", "Air", "MagnetPrius_old", "M400-50A"]
    );
    assert_eq!(machine.find("stator.mat_type.path").and_then(Value::as_str), Some(""));
    assert_eq!(machine.find("rotor.mat_type.path").and_then(Value::as_str), Some(""));
    assert!(registry.check(&machine).is_empty());

    // Without its file the material stays machine-local on the next resolution.
    let again = resolve_dir(&mut machine, &dir).unwrap();
    assert_eq!(again.partition_of("M400-50A"), Some(Partition::Machine));
    assert_eq!(material_name(&machine, "stator.mat_type"), Some("M400-50A"));
}

#[test]
fn machine_material_moves_to_the_library() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();

    registry.rename(&mut machine, "MagnetPrius_old", "MagnetPriusV1").unwrap();
    let mut edited = registry.get("MagnetPriusV1").cloned().unwrap();
    edited.find_node_mut("struct").unwrap().set("rho", 1234.0);
    registry.update(&mut machine, edited).unwrap();

    let written = registry.move_to_library(&mut machine, "MagnetPriusV1", &dir).unwrap();

    assert_eq!(written, dir.join("MagnetPriusV1.json"));
    assert_eq!(registry.partition_of("MagnetPriusV1"), Some(Partition::Library));
    assert_eq!(
        registry.names(),
        vec!["Copper1", "Insulator1", "M400-50A", "MagnetPrius", "MagnetPriusV1", "Air"]
    );
    assert_eq!(material_name(&machine, "rotor.hole[0].magnet_0.mat_type"), Some("MagnetPriusV1"));
    assert_eq!(
        machine
            .find("rotor.hole[0].magnet_0.mat_type.path")
            .and_then(Value::as_str),
        Some(written.as_str())
    );
    assert!(registry.check(&machine).is_empty());

    let saved = load(&written).unwrap();
    assert_eq!(saved.find("struct.rho").and_then(Value::as_f64), Some(1234.0));
    let library = load_library(&dir).unwrap();
    assert!(library.iter().any(|m| m.str("name") == Some("MagnetPriusV1")));
}

#[test]
fn moving_onto_an_existing_file_is_refused() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();
    fs::write(dir.join("Air.json"), "{}").unwrap();

    let err = registry.move_to_library(&mut machine, "Air", &dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NameCollision);
    assert_eq!(fs::read_to_string(dir.join("Air.json")).unwrap(), "{}");
    assert_eq!(registry.partition_of("Air"), Some(Partition::Machine));

    let err = registry.move_to_library(&mut machine, "Copper1", &dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn persisting_a_machine_material_is_refused() {
    let (_temp, dir) = library_copy();
    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let mut registry = resolve_dir(&mut machine, &dir).unwrap();
    let err = registry.persist_library_entry("Air", &dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}

#[test]
fn empty_library_keeps_every_material_local() {
    let temp = tempfile::tempdir().unwrap();
    let empty = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let mut machine = load(&fixture_library().join("Toyota_Prius.json")).unwrap();
    let registry: MaterialRegistry = resolve_dir(&mut machine, &empty).unwrap();

    assert!(registry.library().is_empty());
    assert_eq!(
        registry.names(),
        vec!["M400-50A", "Copper1", "Insulator1", "Air", "MagnetPrius", "MagnetPrius_old"]
    );
    assert!(registry.check(&machine).is_empty());
}

#[test]
fn broken_material_documents_fail_the_load() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    fs::write(dir.join("Bad.json"), r#"{"__class__": "Material", "name": 3}"#).unwrap();
    let err = load_library(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);

    // A default material is a valid library entry.
    let default = SchemaRegistry::builtin().instantiate("Material").unwrap();
    fs::remove_file(dir.join("Bad.json")).unwrap();
    save(&default, &dir.join("Default.json")).unwrap();
    assert_eq!(load_library(&dir).unwrap().len(), 1);
}

#[test]
fn truncated_library_file_fails_the_load() {
    let (_temp, dir) = library_copy();
    let full = fs::read_to_string(dir.join("M400-50A.json")).unwrap();
    fs::write(dir.join("M400-50A.json"), &full[..full.len() / 2]).unwrap();

    let err = load_library(&dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.to_string().contains("M400-50A.json"), "{err}");

    let mut machine = load(&dir.join("Toyota_Prius.json")).unwrap();
    let err = resolve_dir(&mut machine, &dir).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
}
