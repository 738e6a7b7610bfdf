use std::collections::BTreeMap;
use std::sync::LazyLock;

use machfile_types::{NodePath, PersistError, PersistResult, SchemaVersion, TYPE_TAG};
use serde_json::Value as JsonValue;

mod magnet_from_slot;
mod magnetics_rename;
mod promote_winding;

pub type JsonMap = serde_json::Map<String, JsonValue>;

/// Transform of one node of type [`type_name`](MigrationRule::type_name) from
/// [`from_version`](MigrationRule::from_version) to the next version.
///
/// `applies` must reject already-migrated shapes, so that running a rule twice
/// is a no-op.
pub trait MigrationRule: Send + Sync {
    fn id(&self) -> &'static str;

    fn type_name(&self) -> &'static str;

    fn from_version(&self) -> SchemaVersion;

    fn applies(&self, node: &JsonMap) -> bool;

    fn apply(&self, node: &mut JsonMap, path: &NodePath) -> PersistResult<()>;
}

pub fn builtin_rules() -> Vec<Box<dyn MigrationRule>> {
    vec![
        Box::new(magnet_from_slot::MagnetFromSlotRule),
        Box::new(magnetics_rename::MagneticsRenameRule),
        Box::new(promote_winding::PromoteWindingRule),
    ]
}

/// Rules grouped by (type, source version), in registration order.
#[derive(Default)]
pub struct MigrationRegistry {
    rules: BTreeMap<(String, SchemaVersion), Vec<Box<dyn MigrationRule>>>,
}

static BUILTIN: LazyLock<MigrationRegistry> =
    LazyLock::new(|| MigrationRegistry::new().with_rules(builtin_rules()));

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> &'static MigrationRegistry {
        &BUILTIN
    }

    pub fn register(&mut self, rule: Box<dyn MigrationRule>) {
        self.rules
            .entry((rule.type_name().to_string(), rule.from_version()))
            .or_default()
            .push(rule);
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Box<dyn MigrationRule>>) -> Self {
        for rule in rules {
            self.register(rule);
        }
        self
    }

    pub fn rules_for(&self, type_name: &str, version: SchemaVersion) -> &[Box<dyn MigrationRule>] {
        self.rules
            .get(&(type_name.to_string(), version))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every rule, ordered by type then source version.
    pub fn rules(&self) -> impl Iterator<Item = &dyn MigrationRule> {
        self.rules.values().flatten().map(|rule| rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub(crate) fn type_tag(node: &JsonMap) -> Option<&str> {
    node.get(TYPE_TAG).and_then(JsonValue::as_str)
}

pub(crate) fn set_type_tag(node: &mut JsonMap, type_name: &str) {
    node.insert(TYPE_TAG.to_string(), JsonValue::String(type_name.to_string()));
}

/// Integer value of a JSON number; integral floats are accepted.
pub(crate) fn as_integral(value: &JsonValue) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

/// Integer value of a field; integral floats are accepted.
pub(crate) fn int_field(node: &JsonMap, field: &str) -> Option<i64> {
    node.get(field).and_then(as_integral)
}

pub(crate) fn child_object<'a>(
    node: &'a mut JsonMap,
    field: &str,
    path: &NodePath,
) -> PersistResult<&'a mut JsonMap> {
    node.get_mut(field)
        .and_then(JsonValue::as_object_mut)
        .ok_or_else(|| PersistError::unmigratable(path.field(field), "expected an object"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_keys_rules_by_type_and_version() {
        let reg = MigrationRegistry::builtin();
        assert_eq!(reg.len(), 3);
        let ids: Vec<&str> = reg
            .rules_for("LamSlotMag", SchemaVersion::new(1))
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(ids, vec!["lamination.magnet-from-slot"]);
        assert!(reg.rules_for("LamSlotMag", SchemaVersion::new(2)).is_empty());
        assert_eq!(reg.rules_for("Winding", SchemaVersion::new(2)).len(), 1);
    }

    #[test]
    fn every_rule_targets_a_version_before_current() {
        for rule in MigrationRegistry::builtin().rules() {
            assert!(rule.from_version() < SchemaVersion::CURRENT, "{}", rule.id());
        }
    }

    #[test]
    fn int_field_accepts_integral_floats() {
        let node: JsonMap = serde_json::from_str(r#"{"a": 2, "b": 2.0, "c": 2.5}"#).unwrap();
        assert_eq!(int_field(&node, "a"), Some(2));
        assert_eq!(int_field(&node, "b"), Some(2));
        assert_eq!(int_field(&node, "c"), None);
        assert_eq!(int_field(&node, "d"), None);
    }
}
