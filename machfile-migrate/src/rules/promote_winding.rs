use machfile_types::{NodePath, PersistError, PersistResult, SchemaVersion};
use serde_json::{Number, Value as JsonValue};

use super::{JsonMap, MigrationRule, int_field, set_type_tag, type_tag};

/// Until v2 every winding was a generic `Winding` whose layout was chosen at run
/// time. v3 stores one concrete class per layout, and `WindingUD` keeps its
/// connection matrix under `wind_mat` with the opposite sign convention.
pub struct PromoteWindingRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    ConcentratedSingle,
    ConcentratedTangential,
    ConcentratedRadial,
    DistributedSingle,
    DistributedDouble,
    UserDefined,
    SquirrelCage,
}

impl Layout {
    const ALL: [Layout; 7] = [
        Layout::ConcentratedSingle,
        Layout::ConcentratedTangential,
        Layout::ConcentratedRadial,
        Layout::DistributedSingle,
        Layout::DistributedDouble,
        Layout::UserDefined,
        Layout::SquirrelCage,
    ];

    fn code(self) -> &'static str {
        match self {
            Layout::ConcentratedSingle => "CW1L",
            Layout::ConcentratedTangential => "CW2LT",
            Layout::ConcentratedRadial => "CW2LR",
            Layout::DistributedSingle => "DW1L",
            Layout::DistributedDouble => "DW2L",
            Layout::UserDefined => "UD",
            Layout::SquirrelCage => "SC",
        }
    }

    fn type_name(self) -> String {
        format!("Winding{}", self.code())
    }

    fn is_distributed(self) -> bool {
        matches!(self, Layout::DistributedSingle | Layout::DistributedDouble)
    }

    /// Accepts both the short code (`CW2LT`) and the class name (`WindingCW2LT`).
    fn parse(raw: &str) -> Option<Self> {
        let code = raw.strip_prefix("Winding").unwrap_or(raw);
        Self::ALL.into_iter().find(|layout| layout.code() == code)
    }
}

impl PromoteWindingRule {
    const RULE_ID: &'static str = "winding.promote-generic";

    fn layout(node: &JsonMap, path: &NodePath) -> PersistResult<Layout> {
        if let Some(raw) = node.get("wind_type") {
            let name = raw.as_str().unwrap_or_default();
            return Layout::parse(name).ok_or_else(|| {
                PersistError::unmigratable(
                    path.field("wind_type"),
                    format!("unknown winding type {raw}"),
                )
            });
        }
        if node.get("user_wind_mat").is_some_and(|m| !m.is_null()) {
            return Ok(Layout::UserDefined);
        }

        let nlayer = match int_field(node, "Nlayer") {
            Some(n @ (1 | 2)) => n,
            Some(n) => {
                return Err(PersistError::unmigratable(
                    path.field("Nlayer"),
                    format!("layer count must be 1 or 2, found {n}"),
                ));
            }
            None => {
                return Err(PersistError::unmigratable(
                    path.field("Nlayer"),
                    "missing layer count",
                ));
            }
        };
        let coil_pitch = match int_field(node, "coil_pitch") {
            Some(p) if p >= 1 => p,
            _ => {
                return Err(PersistError::unmigratable(
                    path.field("coil_pitch"),
                    "missing or non-positive coil pitch",
                ));
            }
        };

        Ok(match (coil_pitch == 1, nlayer) {
            (true, 1) => Layout::ConcentratedSingle,
            (true, _) if Self::is_radial(node) => Layout::ConcentratedRadial,
            (true, _) => Layout::ConcentratedTangential,
            (false, 1) => Layout::DistributedSingle,
            (false, _) => Layout::DistributedDouble,
        })
    }

    /// Two-layer concentrated windings stack tangentially unless told otherwise.
    fn is_radial(node: &JsonMap) -> bool {
        node.get("layer_dir")
            .and_then(JsonValue::as_str)
            .is_some_and(|dir| dir.eq_ignore_ascii_case("r") || dir.eq_ignore_ascii_case("radial"))
    }
}

/// Element-wise negation of a nested numeric array. `None` for anything else.
fn negated(value: &JsonValue) -> Option<JsonValue> {
    match value {
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.checked_neg().map(JsonValue::from),
            None => {
                let x = n.as_f64()?;
                Number::from_f64(if x == 0.0 { 0.0 } else { -x }).map(JsonValue::Number)
            }
        },
        JsonValue::Array(items) => items
            .iter()
            .map(negated)
            .collect::<Option<Vec<_>>>()
            .map(JsonValue::Array),
        _ => None,
    }
}

impl MigrationRule for PromoteWindingRule {
    fn id(&self) -> &'static str {
        Self::RULE_ID
    }

    fn type_name(&self) -> &'static str {
        "Winding"
    }

    fn from_version(&self) -> SchemaVersion {
        SchemaVersion::new(2)
    }

    fn applies(&self, node: &JsonMap) -> bool {
        type_tag(node) == Some("Winding")
    }

    fn apply(&self, node: &mut JsonMap, path: &NodePath) -> PersistResult<()> {
        let layout = Self::layout(node, path)?;

        if let Some(npcpp) = node.remove("Npcpp") {
            node.insert("Npcp".to_string(), npcpp);
        }

        // The legacy field disappears here, so the sign flip cannot happen twice.
        let user_wind_mat = node.remove("user_wind_mat");
        if layout == Layout::UserDefined {
            if let Some(matrix) = user_wind_mat {
                let wind_mat = if matrix.is_null() {
                    JsonValue::Null
                } else {
                    negated(&matrix).ok_or_else(|| {
                        PersistError::unmigratable(
                            path.field("user_wind_mat"),
                            "expected a nested numeric array",
                        )
                    })?
                };
                node.insert("wind_mat".to_string(), wind_mat);
            }
        }

        for discriminant in ["wind_type", "Nlayer", "layer_dir"] {
            node.remove(discriminant);
        }
        if !layout.is_distributed() {
            node.remove("coil_pitch");
        }
        set_type_tag(node, &layout.type_name());
        Ok(())
    }
}
