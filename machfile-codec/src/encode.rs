use machfile_types::{FieldDef, FieldKind, Instance, NodePath, SchemaError, TYPE_TAG, Value};
use serde_json::{Map, Value as JsonValue};

use crate::codec::Codec;
use crate::matrix_json;

impl Codec<'_> {
    /// Fragment of `instance` and its owned children, in schema order.
    ///
    /// Fields missing from the instance are written with their schema default.
    pub fn serialize(&self, instance: &Instance) -> Result<JsonValue, SchemaError> {
        self.encode_node(instance, &NodePath::root())
            .map(JsonValue::Object)
    }

    fn encode_node(&self, instance: &Instance, path: &NodePath) -> Result<Map<String, JsonValue>, SchemaError> {
        let node = self
            .schemas
            .get(instance.type_name())
            .ok_or_else(|| SchemaError::UnknownType {
                path: path.clone(),
                type_name: instance.type_name().to_string(),
            })?;
        if node.is_abstract() {
            return Err(SchemaError::AbstractType {
                path: path.clone(),
                type_name: node.name().to_string(),
            });
        }
        if let Some(stray) = instance.field_names().find(|name| node.field(name).is_none()) {
            return Err(SchemaError::UnknownField {
                path: path.field(stray),
                type_name: node.name().to_string(),
            });
        }

        let mut map = Map::new();
        map.insert(TYPE_TAG.to_string(), JsonValue::String(node.name().to_string()));
        for field in node.owned_fields() {
            let here = path.field(field.name);
            let encoded = match instance.get(field.name) {
                Some(value) => self.encode_value(field, value, &here)?,
                None => self.encode_value(field, &self.schemas.default_value(field)?, &here)?,
            };
            map.insert(field.name.to_string(), encoded);
        }
        Ok(map)
    }

    fn encode_value(&self, field: &FieldDef, value: &Value, path: &NodePath) -> Result<JsonValue, SchemaError> {
        let wrong_kind = |found: &str| SchemaError::FieldType {
            path: path.clone(),
            expected: field.kind.describe(),
            found: found.to_string(),
        };

        Ok(match (field.kind, value) {
            (_, Value::Null) if field.nullable => JsonValue::Null,
            (FieldKind::Bool, Value::Bool(b)) => JsonValue::Bool(*b),
            (FieldKind::Int, Value::Int(i)) => JsonValue::from(*i),
            (FieldKind::Float, Value::Int(i)) => JsonValue::from(*i as f64),
            (FieldKind::Float, Value::Float(f)) => {
                if !f.is_finite() {
                    return Err(wrong_kind(&format!("non-finite float {f}")));
                }
                JsonValue::from(*f)
            }
            (FieldKind::Str, Value::Str(s)) => JsonValue::String(s.clone()),
            (FieldKind::Matrix, Value::Matrix(m)) => {
                matrix_json::encode(m).ok_or_else(|| wrong_kind("matrix with non-finite elements"))?
            }
            (FieldKind::Object(base), Value::Object(child)) => {
                self.check_subtype(child, base, path)?;
                JsonValue::Object(self.encode_node(child, path)?)
            }
            (FieldKind::List(base), Value::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let here = path.index(i);
                    self.check_subtype(item, base, &here)?;
                    out.push(JsonValue::Object(self.encode_node(item, &here)?));
                }
                JsonValue::Array(out)
            }
            _ => return Err(wrong_kind(value.kind_name())),
        })
    }

    pub(crate) fn check_subtype(&self, instance: &Instance, base: &str, path: &NodePath) -> Result<(), SchemaError> {
        if self.schemas.is_subtype(instance.type_name(), base) {
            Ok(())
        } else if !self.schemas.contains(instance.type_name()) {
            Err(SchemaError::UnknownType {
                path: path.clone(),
                type_name: instance.type_name().to_string(),
            })
        } else {
            Err(SchemaError::UnexpectedType {
                path: path.clone(),
                expected: base.to_string(),
                found: instance.type_name().to_string(),
            })
        }
    }
}
