use std::collections::BTreeSet;

use anyhow::anyhow;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use machfile_types::{Comparator, Difference, Instance, NodePath, PersistError, PersistResult, SchemaRegistry};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::library::MATERIAL_TYPE;

/// Upper bound on generated name candidates (`_old`, `_old_2`, ...).
pub(crate) const MAX_NAME_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Library,
    Machine,
}

/// One row of [`MaterialRegistry::summary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialSummary {
    pub name: String,
    pub partition: Partition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryViolation {
    #[error("material name `{0}` is registered more than once")]
    DuplicateName(String),

    #[error("material `{name}` at {path} is not registered")]
    Unregistered { path: NodePath, name: String },

    #[error("material `{name}` at {path} differs from its registry entry: {difference}")]
    Diverged {
        path: NodePath,
        name: String,
        difference: Difference,
    },
}

/// Library and machine-local materials of one machine, names unique across both.
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    pub(crate) library: Vec<Instance>,
    pub(crate) machine: Vec<Instance>,
}

pub(crate) fn material_name(material: &Instance) -> &str {
    material.str("name").unwrap_or_default()
}

/// Equality used for deduplication: the file a material was loaded from is irrelevant.
pub(crate) fn same_material(a: &Instance, b: &Instance) -> bool {
    Comparator::builtin().ignore_field("path").is_equal(a, b)
}

/// Equality up to naming, used to reuse an already disambiguated copy.
pub(crate) fn same_properties(a: &Instance, b: &Instance) -> bool {
    Comparator::builtin()
        .ignore_field("path")
        .ignore_field("name")
        .is_equal(a, b)
}

/// Paths of every material node of `root`, in schema order.
pub(crate) fn material_paths(root: &Instance) -> Vec<NodePath> {
    let schemas = SchemaRegistry::builtin();
    let mut paths = Vec::new();
    root.visit(&mut |path, node| {
        if schemas.is_subtype(node.type_name(), MATERIAL_TYPE) {
            paths.push(path.clone());
        }
    });
    paths
}

impl MaterialRegistry {
    pub fn new(library: Vec<Instance>) -> Self {
        Self {
            library,
            machine: Vec::new(),
        }
    }

    pub fn library(&self) -> &[Instance] {
        &self.library
    }

    pub fn machine(&self) -> &[Instance] {
        &self.machine
    }

    /// Library names first, then machine-local names.
    pub fn names(&self) -> Vec<&str> {
        self.library
            .iter()
            .chain(&self.machine)
            .map(material_name)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.library
            .iter()
            .chain(&self.machine)
            .find(|m| material_name(m) == name)
    }

    pub fn partition_of(&self, name: &str) -> Option<Partition> {
        if self.library.iter().any(|m| material_name(m) == name) {
            Some(Partition::Library)
        } else if self.machine.iter().any(|m| material_name(m) == name) {
            Some(Partition::Machine)
        } else {
            None
        }
    }

    pub fn summary(&self) -> Vec<MaterialSummary> {
        let rows = |partition: Partition, materials: &[Instance]| -> Vec<MaterialSummary> {
            materials
                .iter()
                .map(|m| MaterialSummary {
                    name: material_name(m).to_string(),
                    partition,
                    path: m.str("path").filter(|p| !p.is_empty()).map(str::to_string),
                })
                .collect()
        };
        let mut out = rows(Partition::Library, &self.library);
        out.extend(rows(Partition::Machine, &self.machine));
        out
    }

    /// First free name among `<base><suffix>`, `<base><suffix>_2`, `<base><suffix>_3`, ...
    pub fn free_name(&self, base: &str, suffix: &str) -> PersistResult<String> {
        let first = format!("{base}{suffix}");
        std::iter::once(first.clone())
            .chain((2..=MAX_NAME_ATTEMPTS).map(|n| format!("{first}_{n}")))
            .find(|candidate| !self.contains(candidate))
            .ok_or_else(|| PersistError::NameCollision {
                name: base.to_string(),
                attempts: MAX_NAME_ATTEMPTS,
            })
    }

    /// Names unique across partitions, and every material of `machine` equal to
    /// the registry entry of the same name.
    pub fn check(&self, machine: &Instance) -> Vec<RegistryViolation> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for name in self.names() {
            if !seen.insert(name) && reported.insert(name) {
                out.push(RegistryViolation::DuplicateName(name.to_string()));
            }
        }

        let comparator = Comparator::builtin().ignore_field("path");
        for path in material_paths(machine) {
            let Some(node) = machine.find_node(path.as_str()) else {
                continue;
            };
            let name = material_name(node);
            match self.get(name) {
                None => out.push(RegistryViolation::Unregistered {
                    path,
                    name: name.to_string(),
                }),
                Some(entry) => {
                    if let Some(difference) = comparator.first_difference(entry, node) {
                        out.push(RegistryViolation::Diverged {
                            path,
                            name: name.to_string(),
                            difference,
                        });
                    }
                }
            }
        }
        out
    }

    /// Renames a material and every machine reference to it.
    pub fn rename(&mut self, machine: &mut Instance, old: &str, new: &str) -> PersistResult<()> {
        if old == new {
            return Ok(());
        }
        if self.contains(new) {
            return Err(PersistError::NameCollision {
                name: new.to_string(),
                attempts: 1,
            });
        }
        let entry = self
            .entry_mut(old)
            .ok_or_else(|| anyhow!("unknown material `{old}`"))?;
        entry.set("name", new);

        let updated = for_each_material_named(machine, old, |node| {
            node.set("name", new);
        });
        info!(old, new, updated, "renamed material");
        Ok(())
    }

    /// Replaces the entry named like `material` and every machine copy of it.
    ///
    /// A library entry keeps its file path when the new material has none.
    pub fn update(&mut self, machine: &mut Instance, mut material: Instance) -> PersistResult<()> {
        let name = material_name(&material).to_string();
        let entry = self
            .entry_mut(&name)
            .ok_or_else(|| anyhow!("unknown material `{name}`"))?;
        if material.str("path").is_none_or(str::is_empty) {
            if let Some(path) = entry.get("path").cloned() {
                material.set("path", path);
            }
        }
        *entry = material.clone();

        let updated = for_each_material_named(machine, &name, |node| {
            *node = material.clone();
        });
        machine.link_parents();
        info!(name, updated, "updated material");
        Ok(())
    }

    /// Copies a material into the same partition under `<name>_copy`,
    /// `<name>_copy_2`, ... and returns the new name.
    pub fn duplicate(&mut self, name: &str) -> PersistResult<String> {
        let partition = self
            .partition_of(name)
            .ok_or_else(|| anyhow!("unknown material `{name}`"))?;
        let new_name = self.free_name(name, "_copy")?;
        let mut copy = self
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow!("unknown material `{name}`"))?;
        copy.set("name", new_name.as_str());
        copy.set("path", "");
        match partition {
            Partition::Library => self.library.push(copy),
            Partition::Machine => self.machine.push(copy),
        }
        info!(name, copy = %new_name, "duplicated material");
        Ok(new_name)
    }

    /// Saves a library material as `<dir>/<name>.json`.
    ///
    /// When the material was loaded from another file (it was renamed), the old
    /// file is removed once the new one is written.
    pub fn persist_library_entry(&mut self, name: &str, dir: &Utf8Path) -> PersistResult<Utf8PathBuf> {
        let target = dir.join(format!("{name}.json"));
        let entry = self
            .library
            .iter_mut()
            .find(|m| material_name(m) == name)
            .ok_or_else(|| anyhow!("`{name}` is not a library material"))?;

        let previous = entry
            .str("path")
            .filter(|p| !p.is_empty())
            .map(Utf8PathBuf::from);
        entry.set("path", target.as_str());
        machfile_store::save(entry, &target)?;

        if let Some(previous) = previous.filter(|p| *p != target) {
            if previous.exists() {
                fs::remove_file(&previous).map_err(anyhow::Error::from)?;
            }
            info!(name, from = %previous, to = %target, "moved library material");
        }
        Ok(target)
    }

    /// Removes a material that no machine node uses and returns it. Deleting a
    /// library material also deletes its file.
    pub fn delete(&mut self, machine: &Instance, name: &str) -> PersistResult<Instance> {
        let references = count_materials_named(machine, name);
        if references > 0 {
            return Err(PersistError::MaterialInUse {
                name: name.to_string(),
                references,
            });
        }

        let removed = match self.partition_of(name) {
            Some(Partition::Library) => {
                let index = position_of(&self.library, name).ok_or_else(|| anyhow!("unknown material `{name}`"))?;
                if let Some(file) = file_of(&self.library[index]) {
                    if file.exists() {
                        fs::remove_file(&file).map_err(anyhow::Error::from)?;
                    }
                }
                self.library.remove(index)
            }
            Some(Partition::Machine) => {
                let index = position_of(&self.machine, name).ok_or_else(|| anyhow!("unknown material `{name}`"))?;
                self.machine.remove(index)
            }
            None => return Err(anyhow!("unknown material `{name}`").into()),
        };
        info!(name, "deleted material");
        Ok(removed)
    }

    /// Turns a library material into a machine-local one. Its file is deleted
    /// and the machine copies lose their library path.
    pub fn move_to_machine(&mut self, machine: &mut Instance, name: &str) -> PersistResult<()> {
        let index = position_of(&self.library, name)
            .ok_or_else(|| anyhow!("`{name}` is not a library material"))?;
        let previous = file_of(&self.library[index]);
        if let Some(file) = &previous {
            if file.exists() {
                fs::remove_file(file).map_err(anyhow::Error::from)?;
            }
        }

        let mut material = self.library.remove(index);
        material.set("path", "");
        let updated = for_each_material_named(machine, name, |node| {
            *node = material.clone();
        });
        machine.link_parents();
        self.machine.push(material);
        info!(name, updated, removed = ?previous, "moved material to the machine");
        Ok(())
    }

    /// Saves a machine-local material as `<dir>/<name>.json` and makes it a
    /// library material. The machine copies take the new file path.
    ///
    /// An existing file of that name is never overwritten.
    pub fn move_to_library(
        &mut self,
        machine: &mut Instance,
        name: &str,
        dir: &Utf8Path,
    ) -> PersistResult<Utf8PathBuf> {
        let index = position_of(&self.machine, name)
            .ok_or_else(|| anyhow!("`{name}` is not a machine material"))?;
        let target = dir.join(format!("{name}.json"));
        if target.exists() {
            return Err(PersistError::NameCollision {
                name: name.to_string(),
                attempts: 1,
            });
        }

        let mut material = self.machine[index].clone();
        material.set("path", target.as_str());
        machfile_store::save(&material, &target)?;
        self.machine.remove(index);

        let updated = for_each_material_named(machine, name, |node| {
            *node = material.clone();
        });
        machine.link_parents();

        // The library partition stays sorted by file path.
        let at = self
            .library
            .iter()
            .position(|m| m.str("path").unwrap_or_default() > target.as_str())
            .unwrap_or(self.library.len());
        self.library.insert(at, material);
        info!(name, updated, to = %target, "moved material to the library");
        Ok(target)
    }

    fn entry_mut(&mut self, name: &str) -> Option<&mut Instance> {
        self.library
            .iter_mut()
            .chain(self.machine.iter_mut())
            .find(|m| material_name(m) == name)
    }
}

fn position_of(materials: &[Instance], name: &str) -> Option<usize> {
    materials.iter().position(|m| material_name(m) == name)
}

/// File a material was loaded from or saved to, if any.
fn file_of(material: &Instance) -> Option<Utf8PathBuf> {
    material
        .str("path")
        .filter(|p| !p.is_empty())
        .map(Utf8PathBuf::from)
}

fn count_materials_named(root: &Instance, name: &str) -> usize {
    material_paths(root)
        .iter()
        .filter_map(|path| root.find_node(path.as_str()))
        .filter(|node| material_name(node) == name)
        .count()
}

/// Applies `f` to every material of `root` named `name`; returns how many matched.
fn for_each_material_named(root: &mut Instance, name: &str, mut f: impl FnMut(&mut Instance)) -> usize {
    let mut count = 0;
    for path in material_paths(root) {
        if let Some(node) = root.find_node_mut(path.as_str()) {
            if material_name(node) == name {
                f(node);
                count += 1;
            }
        }
    }
    count
}
