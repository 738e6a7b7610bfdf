use machfile_types::{NodePath, PersistError, PersistResult, SchemaVersion, VERSION_TAG, is_reserved_key};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::rules::{JsonMap, MigrationRegistry, as_integral, type_tag};

/// Reads a `__version__` tag. Absent or unrecognizable tags mean the oldest
/// layout; versions newer than this build are rejected. Integral floats
/// (`3.0`) count as integers.
pub fn read_version(tag: Option<&JsonValue>) -> PersistResult<SchemaVersion> {
    let Some(found) = tag
        .and_then(as_integral)
        .and_then(|v| u64::try_from(v).ok())
    else {
        return Ok(SchemaVersion::OLDEST);
    };
    if found > u64::from(SchemaVersion::CURRENT.get()) {
        return Err(PersistError::UnsupportedVersion {
            found,
            current: SchemaVersion::CURRENT,
        });
    }
    match u32::try_from(found) {
        Ok(v) if v >= SchemaVersion::OLDEST.get() => Ok(SchemaVersion::new(v)),
        _ => Ok(SchemaVersion::OLDEST),
    }
}

/// Drives a [`MigrationRegistry`] over a document tree.
///
/// Each node is migrated before its children, from its own `__version__` when
/// it carries one and from its owner's starting version otherwise.
#[derive(Clone, Copy)]
pub struct Migrator<'r> {
    rules: &'r MigrationRegistry,
}

impl Default for Migrator<'static> {
    fn default() -> Self {
        Self::new(MigrationRegistry::builtin())
    }
}

impl<'r> Migrator<'r> {
    pub fn new(rules: &'r MigrationRegistry) -> Self {
        Self { rules }
    }

    /// Brings `fragment`, written at `declared` (or the oldest version when
    /// `None`), to the current layout. Nested version tags are removed.
    pub fn migrate(&self, mut fragment: JsonValue, declared: Option<SchemaVersion>) -> PersistResult<JsonValue> {
        let start = declared.unwrap_or(SchemaVersion::OLDEST);
        if start > SchemaVersion::CURRENT {
            return Err(PersistError::UnsupportedVersion {
                found: u64::from(start.get()),
                current: SchemaVersion::CURRENT,
            });
        }
        self.migrate_value(&mut fragment, start, &NodePath::root())?;
        Ok(fragment)
    }

    /// Migrates a whole document from its root `__version__` and stamps the
    /// current version on the result.
    pub fn migrate_document(&self, document: JsonValue) -> PersistResult<JsonValue> {
        let declared = read_version(document.get(VERSION_TAG))?;
        let mut migrated = self.migrate(document, Some(declared))?;
        if let Some(root) = migrated.as_object_mut() {
            root.insert(
                VERSION_TAG.to_string(),
                JsonValue::from(SchemaVersion::CURRENT.get()),
            );
        }
        Ok(migrated)
    }

    fn migrate_value(&self, value: &mut JsonValue, inherited: SchemaVersion, path: &NodePath) -> PersistResult<()> {
        match value {
            JsonValue::Object(node) => self.migrate_node(node, inherited, path),
            JsonValue::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    if item.is_object() {
                        self.migrate_value(item, inherited, &path.index(i))?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn migrate_node(&self, node: &mut JsonMap, inherited: SchemaVersion, path: &NodePath) -> PersistResult<()> {
        let start = match node.remove(VERSION_TAG) {
            Some(tag) => read_version(Some(&tag))?,
            None => inherited,
        };

        for version in start.steps_to_current() {
            let Some(type_name) = type_tag(node).map(str::to_string) else {
                break;
            };
            for rule in self.rules.rules_for(&type_name, version) {
                if !rule.applies(node) {
                    continue;
                }
                debug!(rule = rule.id(), path = %path, from = %version, "applying migration rule");
                rule.apply(node, path)?;
            }
        }

        for (key, child) in node.iter_mut() {
            if is_reserved_key(key) {
                continue;
            }
            self.migrate_value(child, start, &path.field(key))?;
        }
        Ok(())
    }
}
