use machfile_types::{
    FieldDef, FieldKind, Instance, NodePath, PersistError, PersistResult, SchemaError, TYPE_TAG,
    Value, is_reserved_key,
};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::codec::Codec;
use crate::matrix_json;

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Errors a migration may be able to fix: the fragment names fields or types
/// the current catalog no longer has.
fn is_legacy_shape(err: &SchemaError) -> bool {
    matches!(
        err,
        SchemaError::UnknownField { .. }
            | SchemaError::UnknownType { .. }
            | SchemaError::AbstractType { .. }
    )
}

impl Codec<'_> {
    /// Builds the current-schema instance described by `fragment`.
    ///
    /// `expected` is the base type the root must conform to; it also stands in
    /// for a missing type tag when it is concrete. A fragment that uses fields or
    /// types the current catalog does not know is run through the migrator from
    /// the oldest version and decoded again.
    pub fn deserialize(&self, fragment: &JsonValue, expected: Option<&str>) -> PersistResult<Instance> {
        let root = NodePath::root();
        let mut instance = match self.decode_node(fragment, expected, &root) {
            Ok(instance) => instance,
            Err(err) if is_legacy_shape(&err) => {
                debug!(error = %err, "fragment does not match the current schema, migrating");
                let migrated = self.migrator.migrate(fragment.clone(), None)?;
                self.decode_node(&migrated, expected, &root)
                    .map_err(|err| match err {
                        SchemaError::UnknownField { path, type_name } => PersistError::unmigratable(
                            path,
                            format!("`{type_name}` declares no such field and no migration maps it"),
                        ),
                        other => PersistError::Schema(other),
                    })?
            }
            Err(err) => return Err(err.into()),
        };
        instance.link_parents();
        Ok(instance)
    }

    fn decode_node(&self, value: &JsonValue, expected: Option<&str>, path: &NodePath) -> Result<Instance, SchemaError> {
        let map = value.as_object().ok_or_else(|| SchemaError::NotAnObject {
            path: path.clone(),
            found: json_kind(value).to_string(),
        })?;

        let type_name = match map.get(TYPE_TAG).and_then(JsonValue::as_str) {
            Some(tag) => tag,
            None => match expected {
                Some(base) if self.schemas.get(base).is_some_and(|n| !n.is_abstract()) => base,
                _ => return Err(SchemaError::MissingTypeTag { path: path.clone() }),
            },
        };
        let node = self.schemas.get(type_name).ok_or_else(|| SchemaError::UnknownType {
            path: path.clone(),
            type_name: type_name.to_string(),
        })?;
        if node.is_abstract() {
            return Err(SchemaError::AbstractType {
                path: path.clone(),
                type_name: type_name.to_string(),
            });
        }
        if let Some(base) = expected {
            if !self.schemas.is_subtype(type_name, base) {
                return Err(SchemaError::UnexpectedType {
                    path: path.clone(),
                    expected: base.to_string(),
                    found: type_name.to_string(),
                });
            }
        }

        for key in map.keys().filter(|key| !is_reserved_key(key)) {
            if node.field(key).is_none_or(FieldDef::is_back_ref) {
                return Err(SchemaError::UnknownField {
                    path: path.field(key),
                    type_name: type_name.to_string(),
                });
            }
        }

        let mut instance = Instance::new(node.name());
        for field in node.fields() {
            let value = match map.get(field.name) {
                _ if field.is_back_ref() => Value::Null,
                Some(raw) => self.decode_value(field, raw, &path.field(field.name))?,
                None => self.schemas.default_value(field)?,
            };
            instance.set(field.name, value);
        }
        Ok(instance)
    }

    fn decode_value(&self, field: &FieldDef, raw: &JsonValue, path: &NodePath) -> Result<Value, SchemaError> {
        let wrong_kind = || SchemaError::FieldType {
            path: path.clone(),
            expected: field.kind.describe(),
            found: json_kind(raw).to_string(),
        };

        if raw.is_null() {
            return if field.nullable {
                Ok(Value::Null)
            } else {
                Err(wrong_kind())
            };
        }

        Ok(match field.kind {
            FieldKind::Bool => Value::Bool(raw.as_bool().ok_or_else(wrong_kind)?),
            FieldKind::Int => Value::Int(integral(raw).ok_or_else(wrong_kind)?),
            FieldKind::Float => Value::Float(raw.as_f64().ok_or_else(wrong_kind)?),
            FieldKind::Str => Value::Str(raw.as_str().ok_or_else(wrong_kind)?.to_string()),
            FieldKind::Matrix => Value::Matrix(matrix_json::decode(raw).ok_or_else(wrong_kind)?),
            FieldKind::Object(base) => Value::Object(Box::new(self.decode_node(raw, Some(base), path)?)),
            FieldKind::List(base) => {
                let items = raw.as_array().ok_or_else(wrong_kind)?;
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.decode_node(item, Some(base), &path.index(i))?);
                }
                Value::List(out)
            }
            FieldKind::BackRef => Value::Null,
        })
    }
}

/// Integers, and floats with no fractional part.
fn integral(raw: &JsonValue) -> Option<i64> {
    raw.as_i64().or_else(|| {
        raw.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
            .map(|f| f as i64)
    })
}
