//! Schema nodes and the registry that resolves them.
//!
//! A [`SchemaNode`] declares a type, its optional base type and its own fields.
//! [`SchemaRegistryBuilder::build`] flattens inheritance once, validates the
//! catalog and produces an immutable [`SchemaRegistry`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::SchemaError;
use crate::instance::{Instance, PARENT_FIELD};
use crate::path::NodePath;
use crate::value::Value;
use crate::version::SchemaVersion;

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "base", rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Str,
    Matrix,
    /// Owned child whose concrete type is `base` or one of its subtypes.
    Object(&'static str),
    /// Ordered sequence of owned children of type `base`.
    List(&'static str),
    /// Non-owning reference, never serialized nor compared.
    BackRef,
}

impl FieldKind {
    pub fn describe(&self) -> String {
        match self {
            FieldKind::Bool => "bool".to_string(),
            FieldKind::Int => "int".to_string(),
            FieldKind::Float => "float".to_string(),
            FieldKind::Str => "string".to_string(),
            FieldKind::Matrix => "matrix".to_string(),
            FieldKind::Object(base) => format!("object<{base}>"),
            FieldKind::List(base) => format!("list<{base}>"),
            FieldKind::BackRef => "back-reference".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDefault {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    EmptyList,
    /// Fresh default instance of the named concrete type.
    New(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ownership {
    Owned,
    BackRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
    pub nullable: bool,
    pub ownership: Ownership,
}

impl FieldDef {
    const fn owned(name: &'static str, kind: FieldKind, default: FieldDefault) -> Self {
        Self {
            name,
            kind,
            default,
            nullable: false,
            ownership: Ownership::Owned,
        }
    }

    pub const fn bool(name: &'static str, default: bool) -> Self {
        Self::owned(name, FieldKind::Bool, FieldDefault::Bool(default))
    }

    pub const fn int(name: &'static str, default: i64) -> Self {
        Self::owned(name, FieldKind::Int, FieldDefault::Int(default))
    }

    pub const fn float(name: &'static str, default: f64) -> Self {
        Self::owned(name, FieldKind::Float, FieldDefault::Float(default))
    }

    pub const fn str(name: &'static str, default: &'static str) -> Self {
        Self::owned(name, FieldKind::Str, FieldDefault::Str(default))
    }

    pub const fn matrix(name: &'static str) -> Self {
        Self::owned(name, FieldKind::Matrix, FieldDefault::Null).or_null()
    }

    /// Nullable child object, defaulting to a fresh `default` instance.
    pub const fn object(name: &'static str, base: &'static str, default: &'static str) -> Self {
        Self::owned(name, FieldKind::Object(base), FieldDefault::New(default)).nullable()
    }

    /// Nullable child object, defaulting to null.
    pub const fn optional(name: &'static str, base: &'static str) -> Self {
        Self::owned(name, FieldKind::Object(base), FieldDefault::Null).nullable()
    }

    pub const fn list(name: &'static str, base: &'static str) -> Self {
        Self::owned(name, FieldKind::List(base), FieldDefault::EmptyList)
    }

    pub const fn back_ref(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::BackRef,
            default: FieldDefault::Null,
            nullable: true,
            ownership: Ownership::BackRef,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Nullable with a null default.
    pub const fn or_null(mut self) -> Self {
        self.nullable = true;
        self.default = FieldDefault::Null;
        self
    }

    pub fn is_back_ref(&self) -> bool {
        self.ownership == Ownership::BackRef
    }
}

/// Declaration of one record type.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaNode {
    pub name: &'static str,
    pub base: Option<&'static str>,
    pub is_abstract: bool,
    /// Version that introduced the current layout of this type.
    pub since: SchemaVersion,
    pub fields: Vec<FieldDef>,
}

impl SchemaNode {
    pub fn concrete(name: &'static str) -> Self {
        Self {
            name,
            base: None,
            is_abstract: false,
            since: SchemaVersion::OLDEST,
            fields: Vec::new(),
        }
    }

    pub fn abstract_type(name: &'static str) -> Self {
        Self {
            is_abstract: true,
            ..Self::concrete(name)
        }
    }

    pub fn extends(mut self, base: &'static str) -> Self {
        self.base = Some(base);
        self
    }

    pub fn since(mut self, version: u32) -> Self {
        self.since = SchemaVersion::new(version);
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// A schema node with its inheritance chain flattened.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedNode {
    #[serde(flatten)]
    node: SchemaNode,
    /// Base first, root-most last.
    ancestors: Vec<&'static str>,
    /// Inherited fields first, in declaration order, then own fields.
    all_fields: Vec<FieldDef>,
}

impl ResolvedNode {
    pub fn name(&self) -> &'static str {
        self.node.name
    }

    pub fn base(&self) -> Option<&'static str> {
        self.node.base
    }

    pub fn is_abstract(&self) -> bool {
        self.node.is_abstract
    }

    pub fn since(&self) -> SchemaVersion {
        self.node.since
    }

    pub fn ancestors(&self) -> &[&'static str] {
        &self.ancestors
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.all_fields
    }

    /// Fields declared on this node only.
    pub fn declared_fields(&self) -> &[FieldDef] {
        &self.node.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.all_fields.iter().find(|f| f.name == name)
    }

    /// Fields that are serialized and compared.
    pub fn owned_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.all_fields.iter().filter(|f| !f.is_back_ref())
    }
}

/// Immutable catalog of every persisted type, keyed by type tag.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    nodes: BTreeMap<&'static str, ResolvedNode>,
    current: SchemaVersion,
}

static BUILTIN: LazyLock<SchemaRegistry> = LazyLock::new(|| {
    crate::catalog::builtin_registry()
        .unwrap_or_else(|err| panic!("built-in schema catalog is inconsistent: {err}"))
});

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// The machine catalog shipped with this build.
    pub fn builtin() -> &'static SchemaRegistry {
        &BUILTIN
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.current
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.values()
    }

    pub fn concrete_types(&self) -> impl Iterator<Item = &ResolvedNode> {
        self.nodes.values().filter(|n| !n.is_abstract())
    }

    /// True when `name` is `base` or inherits from it.
    pub fn is_subtype(&self, name: &str, base: &str) -> bool {
        name == base
            || self
                .get(name)
                .is_some_and(|n| n.ancestors.iter().any(|a| *a == base))
    }

    pub fn concrete_subtypes(&self, base: &str) -> Vec<&'static str> {
        self.concrete_types()
            .filter(|n| self.is_subtype(n.name(), base))
            .map(ResolvedNode::name)
            .collect()
    }

    /// Default instance of a concrete type, children included.
    pub fn instantiate(&self, name: &str) -> Result<Instance, SchemaError> {
        let node = self.get(name).ok_or_else(|| SchemaError::UnknownType {
            path: NodePath::root(),
            type_name: name.to_string(),
        })?;
        if node.is_abstract() {
            return Err(SchemaError::AbstractType {
                path: NodePath::root(),
                type_name: name.to_string(),
            });
        }

        let mut inst = Instance::new(node.name());
        for field in node.fields() {
            inst.set(field.name, self.default_value(field)?);
        }
        Ok(inst)
    }

    pub fn default_value(&self, field: &FieldDef) -> Result<Value, SchemaError> {
        Ok(match &field.default {
            FieldDefault::Null => Value::Null,
            FieldDefault::Bool(b) => Value::Bool(*b),
            FieldDefault::Int(i) => Value::Int(*i),
            FieldDefault::Float(f) => Value::Float(*f),
            FieldDefault::Str(s) => Value::Str((*s).to_string()),
            FieldDefault::EmptyList => Value::List(Vec::new()),
            FieldDefault::New(type_name) => Value::Object(Box::new(self.instantiate(type_name)?)),
        })
    }
}

#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    nodes: Vec<SchemaNode>,
}

impl SchemaRegistryBuilder {
    pub fn register(mut self, node: SchemaNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn register_all(mut self, nodes: impl IntoIterator<Item = SchemaNode>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    pub fn build(self) -> Result<SchemaRegistry, SchemaError> {
        let mut declared: BTreeMap<&'static str, SchemaNode> = BTreeMap::new();
        for node in self.nodes {
            let name = node.name;
            if declared.insert(name, node).is_some() {
                return Err(SchemaError::DuplicateType(name.to_string()));
            }
        }

        let mut nodes = BTreeMap::new();
        for (name, node) in &declared {
            let ancestors = ancestors_of(&declared, node)?;

            let mut all_fields: Vec<FieldDef> = Vec::new();
            for ancestor in ancestors.iter().rev() {
                all_fields.extend(declared[ancestor].fields.iter().cloned());
            }
            all_fields.extend(node.fields.iter().cloned());
            if !all_fields.iter().any(|f| f.name == PARENT_FIELD) {
                all_fields.push(FieldDef::back_ref(PARENT_FIELD));
            }

            for (i, field) in all_fields.iter().enumerate() {
                if all_fields[..i].iter().any(|f| f.name == field.name) {
                    return Err(SchemaError::DuplicateField {
                        type_name: name.to_string(),
                        field: field.name.to_string(),
                    });
                }
                check_field_targets(&declared, name, field)?;
            }

            nodes.insert(
                *name,
                ResolvedNode {
                    node: node.clone(),
                    ancestors,
                    all_fields,
                },
            );
        }

        Ok(SchemaRegistry {
            nodes,
            current: SchemaVersion::CURRENT,
        })
    }
}

fn ancestors_of(
    declared: &BTreeMap<&'static str, SchemaNode>,
    node: &SchemaNode,
) -> Result<Vec<&'static str>, SchemaError> {
    let mut ancestors = Vec::new();
    let mut cursor = node;
    while let Some(base) = cursor.base {
        if base == node.name || ancestors.contains(&base) {
            return Err(SchemaError::InheritanceCycle(node.name.to_string()));
        }
        cursor = declared.get(base).ok_or_else(|| SchemaError::UnknownBase {
            type_name: cursor.name.to_string(),
            base: base.to_string(),
        })?;
        ancestors.push(base);
    }
    Ok(ancestors)
}

fn check_field_targets(
    declared: &BTreeMap<&'static str, SchemaNode>,
    type_name: &str,
    field: &FieldDef,
) -> Result<(), SchemaError> {
    let unknown = |target: &str| SchemaError::UnknownFieldType {
        type_name: type_name.to_string(),
        field: field.name.to_string(),
        target: target.to_string(),
    };

    if let FieldKind::Object(base) | FieldKind::List(base) = field.kind {
        if !declared.contains_key(base) {
            return Err(unknown(base));
        }
    }
    if let FieldDefault::New(target) = field.default {
        match declared.get(target) {
            None => return Err(unknown(target)),
            Some(node) if node.is_abstract => {
                return Err(SchemaError::AbstractType {
                    path: NodePath::root().field(field.name),
                    type_name: target.to_string(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> SchemaRegistryBuilder {
        SchemaRegistry::builder()
            .register(SchemaNode::abstract_type("Part").field(FieldDef::str("label", "part")))
            .register(
                SchemaNode::concrete("Bolt")
                    .extends("Part")
                    .field(FieldDef::float("d", 0.01)),
            )
            .register(
                SchemaNode::concrete("Assembly").field(FieldDef::list("parts", "Part")),
            )
    }

    #[test]
    fn flattens_inherited_fields_base_first() {
        let reg = tiny().build().unwrap();
        let bolt = reg.get("Bolt").unwrap();
        let names: Vec<&str> = bolt.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["label", "d", PARENT_FIELD]);
        assert!(reg.is_subtype("Bolt", "Part"));
        assert!(!reg.is_subtype("Part", "Bolt"));
        assert_eq!(reg.concrete_subtypes("Part"), vec!["Bolt"]);
    }

    #[test]
    fn rejects_duplicate_fields_across_the_chain() {
        let err = tiny()
            .register(
                SchemaNode::concrete("Nut")
                    .extends("Part")
                    .field(FieldDef::str("label", "nut")),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { ref field, .. } if field == "label"));
    }

    #[test]
    fn rejects_unknown_base_and_field_targets() {
        let err = SchemaRegistry::builder()
            .register(SchemaNode::concrete("A").extends("Missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownBase { .. }));

        let err = SchemaRegistry::builder()
            .register(SchemaNode::concrete("A").field(FieldDef::list("xs", "Missing")))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownFieldType { .. }));
    }

    #[test]
    fn rejects_inheritance_cycles() {
        let err = SchemaRegistry::builder()
            .register(SchemaNode::concrete("A").extends("B"))
            .register(SchemaNode::concrete("B").extends("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InheritanceCycle(_)));
    }

    #[test]
    fn abstract_types_cannot_be_instantiated() {
        let reg = tiny().build().unwrap();
        assert!(matches!(
            reg.instantiate("Part"),
            Err(SchemaError::AbstractType { .. })
        ));
        let bolt = reg.instantiate("Bolt").unwrap();
        assert_eq!(bolt.str("label"), Some("part"));
        assert_eq!(bolt.f64("d"), Some(0.01));
        assert!(bolt.get(PARENT_FIELD).is_some_and(Value::is_null));
    }
}
