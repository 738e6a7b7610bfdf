use machfile_types::{NodePath, PersistResult, SchemaVersion};

use super::{JsonMap, MigrationRule, set_type_tag, type_tag};

/// The magnetic property bundle of a material was called `MatLamination` in v1.
pub struct MagneticsRenameRule;

impl MagneticsRenameRule {
    const RULE_ID: &'static str = "material.magnetics-rename";
}

impl MigrationRule for MagneticsRenameRule {
    fn id(&self) -> &'static str {
        Self::RULE_ID
    }

    fn type_name(&self) -> &'static str {
        "MatLamination"
    }

    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(1)
    }

    fn applies(&self, node: &JsonMap) -> bool {
        type_tag(node) == Some("MatLamination")
    }

    fn apply(&self, node: &mut JsonMap, _path: &NodePath) -> PersistResult<()> {
        set_type_tag(node, "MatMagnetics");
        Ok(())
    }
}
