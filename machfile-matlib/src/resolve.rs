use camino::Utf8Path;
use machfile_types::{Instance, NodePath, PersistError, PersistResult};
use tracing::{debug, info};

use crate::library::load_library;
use crate::registry::{
    MaterialRegistry, material_name, material_paths, same_material, same_properties,
};

/// Reconciles the materials embedded in `machine` with `library`.
///
/// Material nodes are visited in schema order. Copies equal to a library
/// material (ignoring `path`) become that library material. Divergent copies
/// become machine-local entries, renamed `<name>_old`, `<name>_old_2`, ... when
/// their name is taken, unless an equal machine-local entry already exists.
pub fn resolve(machine: &mut Instance, library: Vec<Instance>) -> PersistResult<MaterialRegistry> {
    let mut registry = MaterialRegistry::new(library);
    for path in material_paths(machine) {
        let node = machine.find_node_mut(path.as_str()).ok_or_else(|| {
            PersistError::Runtime(anyhow::anyhow!("material node vanished at {path}"))
        })?;
        registry.absorb(node, &path)?;
    }
    machine.link_parents();
    Ok(registry)
}

/// [`load_library`] then [`resolve`].
pub fn resolve_dir(machine: &mut Instance, library_dir: &Utf8Path) -> PersistResult<MaterialRegistry> {
    let library = load_library(library_dir)?;
    debug!(dir = %library_dir, materials = library.len(), "loaded material library");
    resolve(machine, library)
}

impl MaterialRegistry {
    fn absorb(&mut self, node: &mut Instance, path: &NodePath) -> PersistResult<()> {
        let name = material_name(node).to_string();

        if let Some(shared) = self.library.iter().find(|m| material_name(m) == name) {
            if same_material(shared, node) {
                *node = shared.clone();
                return Ok(());
            }
            return self.keep_divergent(node, &name, path);
        }

        match self.machine.iter().find(|m| material_name(m) == name) {
            Some(local) if same_material(local, node) => {
                *node = local.clone();
                Ok(())
            }
            Some(_) => self.keep_divergent(node, &name, path),
            None => {
                self.machine.push(node.clone());
                Ok(())
            }
        }
    }

    /// `node` differs from the registered material named `name`.
    fn keep_divergent(&mut self, node: &mut Instance, name: &str, path: &NodePath) -> PersistResult<()> {
        let reusable = self
            .machine
            .iter()
            .find(|m| derives_from(material_name(m), name) && same_properties(m, node));
        if let Some(existing) = reusable {
            debug!(path = %path, name, reused = material_name(existing), "reusing machine material");
            *node = existing.clone();
            return Ok(());
        }

        let new_name = self.free_name(name, "_old")?;
        info!(path = %path, name, renamed = %new_name, "material differs from registered copy");
        node.set("name", new_name);
        node.set("path", "");
        self.machine.push(node.clone());
        Ok(())
    }
}

/// `candidate` is `name` itself or one of the names [`MaterialRegistry::free_name`]
/// generates for it: `<name>_old`, `<name>_old_<n>` with `n >= 2`.
fn derives_from(candidate: &str, name: &str) -> bool {
    let Some(rest) = candidate.strip_prefix(name) else {
        return false;
    };
    match rest.strip_prefix("_old") {
        Some("") => true,
        Some(counter) => counter
            .strip_prefix('_')
            .filter(|n| n.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|n| n.parse::<usize>().ok())
            .is_some_and(|n| n >= 2),
        None => rest.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machfile_types::SchemaRegistry;
    use pretty_assertions::assert_eq;

    fn material(name: &str, rho: f64) -> Instance {
        let mut mat = SchemaRegistry::builtin().instantiate("Material").unwrap();
        mat.set("name", name);
        if let Some(structural) = mat.object_mut("struct") {
            structural.set("rho", rho);
        }
        mat
    }

    fn with_path(mut mat: Instance, path: &str) -> Instance {
        mat.set("path", path);
        mat
    }

    fn hole_machine(materials: Vec<Instance>) -> Instance {
        let holes = materials
            .into_iter()
            .map(|m| Instance::new("VentilationCirc").with("mat_void", m))
            .collect::<Vec<_>>();
        Instance::new("MachineIPMSM").with("rotor", Instance::new("LamHole").with("hole", holes))
    }

    fn names_at(machine: &Instance) -> Vec<String> {
        material_paths(machine)
            .iter()
            .map(|p| material_name(machine.find_node(p.as_str()).unwrap()).to_string())
            .collect()
    }

    #[test]
    fn equal_copies_become_the_library_material() {
        let lib = vec![with_path(material("Air", 1.2), "/lib/Air.json")];
        let mut machine = hole_machine(vec![material("Air", 1.2)]);
        let reg = resolve(&mut machine, lib).unwrap();

        assert!(reg.machine().is_empty());
        assert_eq!(machine.find("rotor.hole[0].mat_void.path").and_then(|v| v.as_str()), Some("/lib/Air.json"));
        assert!(reg.check(&machine).is_empty());
    }

    #[test]
    fn divergent_copies_are_renamed_and_library_is_untouched() {
        let lib = vec![with_path(material("Air", 1.2), "/lib/Air.json")];
        let mut machine = hole_machine(vec![material("Air", 1.3), material("Air", 1.4), material("Air", 1.3)]);
        let reg = resolve(&mut machine, lib).unwrap();

        assert_eq!(reg.names(), vec!["Air", "Air_old", "Air_old_2"]);
        assert_eq!(names_at(&machine), vec!["Air_old", "Air_old_2", "Air_old"]);
        assert_eq!(reg.library()[0].find("struct.rho").and_then(|v| v.as_f64()), Some(1.2));
        assert!(reg.check(&machine).is_empty());
    }

    #[test]
    fn machine_local_materials_are_deduplicated_in_first_appearance_order() {
        let mut machine = hole_machine(vec![material("Zinc", 7.1), material("Brass", 8.5), material("Zinc", 7.1)]);
        let reg = resolve(&mut machine, Vec::new()).unwrap();
        assert_eq!(reg.names(), vec!["Zinc", "Brass"]);

        let mut machine = hole_machine(vec![material("Zinc", 7.1), material("Zinc", 7.2)]);
        let reg = resolve(&mut machine, Vec::new()).unwrap();
        assert_eq!(reg.names(), vec!["Zinc", "Zinc_old"]);
        assert!(reg.check(&machine).is_empty());
    }

    #[test]
    fn already_disambiguated_copies_are_reused() {
        // A machine saved after an earlier resolution already carries `Air_old`.
        let lib = vec![material("Air", 1.2)];
        let mut machine = hole_machine(vec![material("Air_old", 1.3), material("Air", 1.3)]);
        let reg = resolve(&mut machine, lib).unwrap();
        assert_eq!(reg.names(), vec!["Air", "Air_old"]);
        assert_eq!(names_at(&machine), vec!["Air_old", "Air_old"]);
    }

    #[test]
    fn resolving_twice_is_stable() {
        let lib = vec![material("Air", 1.2)];
        let mut machine = hole_machine(vec![material("Air", 1.3), material("Air", 1.2)]);
        let first = resolve(&mut machine, lib.clone()).unwrap();
        let snapshot = machine.clone();
        let second = resolve(&mut machine, lib).unwrap();
        assert_eq!(first.names(), second.names());
        assert_eq!(machine, snapshot);
    }

    #[test]
    fn only_generated_names_are_reused() {
        assert!(derives_from("Air", "Air"));
        assert!(derives_from("Air_old", "Air"));
        assert!(derives_from("Air_old_7", "Air"));
        assert!(!derives_from("Air_older", "Air"));
        assert!(!derives_from("Air_old_1", "Air"));
        assert!(!derives_from("Air_old_x", "Air"));
        assert!(!derives_from("Air_old_+3", "Air"));
        assert!(!derives_from("Airflow", "Air"));

        // An unrelated material that happens to share the prefix keeps its own name.
        let lib = vec![material("Air", 1.2)];
        let mut machine = hole_machine(vec![material("Air_older", 1.3), material("Air", 1.3)]);
        let reg = resolve(&mut machine, lib).unwrap();
        assert_eq!(reg.names(), vec!["Air", "Air_older", "Air_old"]);
        assert_eq!(names_at(&machine), vec!["Air_older", "Air_old"]);
        assert!(reg.check(&machine).is_empty());
    }
}
