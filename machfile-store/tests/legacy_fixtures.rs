//! Legacy machine documents load to the same objects as their current references.

use camino::Utf8PathBuf;
use machfile_store::{load, read_document, save};
use machfile_types::{Comparator, Instance, Matrix, Value};
use pretty_assertions::assert_eq;

fn fixture(rel: &str) -> Utf8PathBuf {
    Utf8PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../tests/fixtures/machines")
        .join(rel)
}

fn winding(machine: &Instance) -> &Instance {
    machine.find_node("stator.winding").expect("stator winding")
}

const RETRO: [(&str, &str); 6] = [
    ("v1", "SPMSM_001"),
    ("v1", "SPMSM_002"),
    ("v1", "SPMSM_015"),
    ("v2", "SPMSM_015"),
    ("v2", "SPMSM_020"),
    ("v2", "Toyota_Prius"),
];

#[test]
fn every_legacy_fixture_matches_its_current_reference() {
    for (version, name) in RETRO {
        let legacy = load(&fixture(&format!("{version}/{name}.json")))
            .unwrap_or_else(|err| panic!("{version}/{name}: {err}"));
        let current = load(&fixture(&format!("current/{name}.json"))).unwrap();
        assert_eq!(
            Comparator::builtin().first_difference(&legacy, &current),
            None,
            "{version}/{name}"
        );
    }
}

#[test]
fn current_references_survive_a_save() {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    for name in ["SPMSM_001", "SPMSM_002", "SPMSM_015", "SPMSM_020", "Toyota_Prius"] {
        let original = load(&fixture(&format!("current/{name}.json"))).unwrap();
        let out = dir.join(format!("{name}.json"));
        save(&original, &out).unwrap();
        assert_eq!(load(&out).unwrap(), original, "{name}");
    }
}

#[test]
fn magnets_are_hoisted_out_of_legacy_slots() {
    let machine = load(&fixture("v1/SPMSM_001.json")).unwrap();
    let rotor = machine.object("rotor").unwrap();

    let slot = rotor.object("slot").unwrap();
    assert_eq!(slot.type_name(), "SlotM11");
    assert_eq!(slot.f64("W1"), Some(0.6));
    assert_eq!(slot.f64("H1"), Some(0.005));
    assert!(!slot.contains("magnet"));

    let magnet = rotor.object("magnet").unwrap();
    assert_eq!(magnet.type_name(), "Magnet");
    assert_eq!(magnet.f64("Lmag"), Some(0.08));
    assert_eq!(magnet.i64("type_magnetization"), Some(1));
    assert_eq!(
        magnet.find("mat_type.mag.Brm20").and_then(Value::as_f64),
        Some(1.24)
    );
    assert_eq!(
        magnet.find_node("mat_type.mag").map(Instance::type_name),
        Some("MatMagnetics")
    );
}

#[test]
fn rounded_magnets_keep_their_top_radius_on_the_slot() {
    let machine = load(&fixture("v1/SPMSM_015.json")).unwrap();
    let slot = machine.find_node("rotor.slot").unwrap();
    assert_eq!(slot.type_name(), "SlotM13");
    assert_eq!(slot.f64("Rtopm"), Some(0.03));
    assert!(!machine.find_node("rotor.magnet").unwrap().contains("Rtopm"));
}

#[test]
fn generic_windings_are_promoted_to_their_layout() {
    let cases = [
        ("v1/SPMSM_001.json", "WindingDW1L"),
        ("v1/SPMSM_002.json", "WindingCW1L"),
        ("v1/SPMSM_015.json", "WindingCW2LT"),
        ("v2/SPMSM_015.json", "WindingCW2LT"),
        ("v2/SPMSM_020.json", "WindingUD"),
        ("v2/Toyota_Prius.json", "WindingDW1L"),
    ];
    for (rel, expected) in cases {
        let machine = load(&fixture(rel)).unwrap();
        assert_eq!(winding(&machine).type_name(), expected, "{rel}");
    }

    let concentrated = load(&fixture("v1/SPMSM_002.json")).unwrap();
    assert!(!winding(&concentrated).contains("coil_pitch"));
    assert!(!winding(&concentrated).contains("Nlayer"));

    let prius = load(&fixture("v2/Toyota_Prius.json")).unwrap();
    assert_eq!(winding(&prius).i64("coil_pitch"), Some(6));
    assert_eq!(winding(&prius).i64("Npcp"), Some(1));
}

#[test]
fn user_defined_winding_keeps_its_electrical_meaning() {
    let legacy = load(&fixture("v2/SPMSM_020.json")).unwrap();
    let current = load(&fixture("current/SPMSM_020.json")).unwrap();
    let (old, new) = (winding(&legacy), winding(&current));

    for field in ["p", "qs", "Ntcoil"] {
        assert_eq!(old.i64(field), new.i64(field), "{field}");
    }

    let wind_mat = |w: &Instance| -> Matrix {
        w.get("wind_mat")
            .and_then(Value::as_matrix)
            .cloned()
            .expect("connection matrix")
    };
    let (old_mat, new_mat) = (wind_mat(old), wind_mat(new));
    assert_eq!(old_mat.shape(), &[2, 1, 12, 3]);
    assert!(old_mat == new_mat || old_mat.negated() == new_mat);
}

#[test]
fn unversioned_documents_are_read_as_the_oldest_layout() {
    let raw = read_document(&fixture("v1/SPMSM_001.json")).unwrap();
    assert!(raw.get("__version__").is_none());
    assert!(load(&fixture("v1/SPMSM_001.json")).is_ok());
}
