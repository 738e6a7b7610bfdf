use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use machfile_migrate::Migrator;
use machfile_types::{
    Instance, NodePath, PersistResult, SAVE_DATE_TAG, SchemaError, SchemaRegistry,
    SchemaVersion, TYPE_TAG, VERSION_TAG,
};
use serde_json::Value as JsonValue;

/// Serializer bound to a schema registry and a migrator.
#[derive(Clone, Copy)]
pub struct Codec<'a> {
    pub(crate) schemas: &'a SchemaRegistry,
    pub(crate) migrator: Migrator<'a>,
}

impl Default for Codec<'static> {
    fn default() -> Self {
        Self::new(SchemaRegistry::builtin(), Migrator::default())
    }
}

impl<'a> Codec<'a> {
    pub fn new(schemas: &'a SchemaRegistry, migrator: Migrator<'a>) -> Self {
        Self { schemas, migrator }
    }

    pub fn schemas(&self) -> &'a SchemaRegistry {
        self.schemas
    }

    /// Root fragment plus the current version and a save timestamp.
    pub fn to_document(&self, instance: &Instance) -> PersistResult<JsonValue> {
        self.to_document_at(instance, Utc::now())
    }

    pub fn to_document_at(&self, instance: &Instance, saved_at: DateTime<Utc>) -> PersistResult<JsonValue> {
        let mut fragment = self.serialize(instance)?;
        let Some(root) = fragment.as_object_mut() else {
            return Err(SchemaError::NotAnObject {
                path: NodePath::root(),
                found: "non-object fragment".to_string(),
            }
            .into());
        };
        root.insert(
            VERSION_TAG.to_string(),
            JsonValue::from(SchemaVersion::CURRENT.get()),
        );
        root.insert(
            SAVE_DATE_TAG.to_string(),
            JsonValue::String(saved_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        Ok(fragment)
    }

    /// Migrates a document from its declared version and deserializes the root.
    pub fn from_document(&self, document: &JsonValue, expected: Option<&str>) -> PersistResult<Instance> {
        if !document.is_object() {
            return Err(SchemaError::NotAnObject {
                path: NodePath::root(),
                found: crate::decode::json_kind(document).to_string(),
            }
            .into());
        }
        let migrated = self.migrator.migrate_document(document.clone())?;
        self.deserialize(&migrated, expected)
    }

    pub fn to_string_pretty(&self, instance: &Instance) -> PersistResult<String> {
        let document = self.to_document(instance)?;
        let mut text = serde_json::to_string_pretty(&document).context("rendering JSON document")?;
        text.push('\n');
        Ok(text)
    }

    pub fn parse_str(&self, text: &str, expected: Option<&str>) -> PersistResult<Instance> {
        let document: JsonValue = serde_json::from_str(text).context("parsing JSON document")?;
        self.from_document(&document, expected)
    }
}

/// Root type tag of a document, without decoding it.
pub fn document_type(document: &JsonValue) -> Option<&str> {
    document.get(TYPE_TAG).and_then(JsonValue::as_str)
}

/// Informational save timestamp of a document, if present and well-formed.
pub fn save_date(document: &JsonValue) -> Option<DateTime<Utc>> {
    let raw = document.get(SAVE_DATE_TAG)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
