//! Text and JSON renderings of command results.

use machfile_matlib::{MaterialSummary, Partition};
use machfile_types::{Difference, FieldDef, FieldDefault, ResolvedNode, SchemaRegistry};
use serde_json::{Value as JsonValue, json};

pub fn differences_text(differences: &[Difference]) -> String {
    if differences.is_empty() {
        return "documents are structurally equal\n".to_string();
    }
    let mut out = String::new();
    for difference in differences {
        out.push_str(&format!("{difference}\n"));
    }
    let plural = if differences.len() == 1 { "" } else { "s" };
    out.push_str(&format!("\n{} difference{plural}\n", differences.len()));
    out
}

pub fn differences_json(differences: &[Difference]) -> JsonValue {
    differences
        .iter()
        .map(|d| {
            json!({
                "path": d.path.as_str(),
                "kind": d.kind.as_str(),
                "left": d.left,
                "right": d.right,
            })
        })
        .collect()
}

pub fn materials_text(rows: &[MaterialSummary]) -> String {
    let mut out = format!("  {:<24} {:<10} PATH\n", "NAME", "PARTITION");
    out.push_str(&format!("  {:<24} {:<10} ----\n", "----", "---------"));
    for row in rows {
        let partition = match row.partition {
            Partition::Library => "library",
            Partition::Machine => "machine",
        };
        out.push_str(&format!(
            "  {:<24} {:<10} {}\n",
            row.name,
            partition,
            row.path.as_deref().unwrap_or("-")
        ));
    }
    out
}

fn kind_label(node: &ResolvedNode) -> &'static str {
    if node.is_abstract() { "abstract" } else { "concrete" }
}

pub fn type_list_text(schemas: &SchemaRegistry) -> String {
    let mut out = format!("  {:<20} {:<9} {:<16} SINCE\n", "TYPE", "KIND", "BASE");
    out.push_str(&format!("  {:<20} {:<9} {:<16} -----\n", "----", "----", "----"));
    for node in schemas.types() {
        out.push_str(&format!(
            "  {:<20} {:<9} {:<16} {}\n",
            node.name(),
            kind_label(node),
            node.base().unwrap_or("-"),
            node.since()
        ));
    }
    out.push_str(&format!(
        "\nSchema version {}. Use 'machfile schema <type>' for fields.\n",
        schemas.current_version()
    ));
    out
}

pub fn type_list_json(schemas: &SchemaRegistry) -> JsonValue {
    schemas.types().map(type_header_json).collect()
}

fn type_header_json(node: &ResolvedNode) -> JsonValue {
    json!({
        "name": node.name(),
        "abstract": node.is_abstract(),
        "base": node.base(),
        "since": node.since(),
        "ancestors": node.ancestors(),
    })
}

fn default_text(field: &FieldDef) -> String {
    match &field.default {
        FieldDefault::Null => "null".to_string(),
        FieldDefault::Bool(b) => b.to_string(),
        FieldDefault::Int(i) => i.to_string(),
        FieldDefault::Float(f) => format!("{f:?}"),
        FieldDefault::Str(s) => format!("{s:?}"),
        FieldDefault::EmptyList => "[]".to_string(),
        FieldDefault::New(name) => format!("new {name}"),
    }
}

pub fn type_text(schemas: &SchemaRegistry, node: &ResolvedNode) -> String {
    let mut out = format!("{} ({})\n", node.name(), kind_label(node));
    if !node.ancestors().is_empty() {
        out.push_str(&format!("extends: {}\n", node.ancestors().join(" -> ")));
    }
    out.push_str(&format!("since:   {}\n\n", node.since()));

    out.push_str(&format!("  {:<20} {:<26} DEFAULT\n", "FIELD", "KIND"));
    out.push_str(&format!("  {:<20} {:<26} -------\n", "-----", "----"));
    for field in node.owned_fields() {
        let mut kind = field.kind.describe();
        if field.nullable {
            kind.push('?');
        }
        out.push_str(&format!("  {:<20} {:<26} {}\n", field.name, kind, default_text(field)));
    }

    let subtypes: Vec<&str> = schemas
        .concrete_subtypes(node.name())
        .into_iter()
        .filter(|name| *name != node.name())
        .collect();
    if !subtypes.is_empty() {
        out.push_str(&format!("\nconcrete subtypes: {}\n", subtypes.join(", ")));
    }
    out
}

pub fn type_json(schemas: &SchemaRegistry, node: &ResolvedNode) -> JsonValue {
    let mut out = type_header_json(node);
    out["fields"] = node
        .owned_fields()
        .map(|f| serde_json::to_value(f).unwrap_or(JsonValue::Null))
        .collect();
    out["concrete_subtypes"] = json!(schemas.concrete_subtypes(node.name()));
    out
}
