//! Structural comparison of object graphs.
//!
//! Fields are visited in schema order, list items by index. Back-references are
//! never traversed, so comparing two linked graphs terminates and ignores where
//! each one happens to be attached.

use std::collections::BTreeSet;
use std::fmt;

use crate::instance::{Instance, PARENT_FIELD};
use crate::matrix::Matrix;
use crate::path::NodePath;
use crate::schema::SchemaRegistry;
use crate::value::Value;

/// Float comparison tolerance: `|a - b| <= abs` or `|a - b| <= rel * max(|a|, |b|)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerance {
    pub const DEFAULT: Tolerance = Tolerance {
        abs: 1e-12,
        rel: 1e-9,
    };

    pub const EXACT: Tolerance = Tolerance { abs: 0.0, rel: 0.0 };

    pub fn new(abs: f64, rel: f64) -> Self {
        Self { abs, rel }
    }

    pub fn close(&self, a: f64, b: f64) -> bool {
        if a == b || (a.is_nan() && b.is_nan()) {
            return true;
        }
        // Infinities only match themselves, which `a == b` already covered.
        if !a.is_finite() || !b.is_finite() {
            return false;
        }
        let diff = (a - b).abs();
        diff <= self.abs || diff <= self.rel * a.abs().max(b.abs())
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffKind {
    MissingField,
    TypeMismatch,
    ValueMismatch,
    LengthMismatch,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::MissingField => "missing field",
            DiffKind::TypeMismatch => "type mismatch",
            DiffKind::ValueMismatch => "value mismatch",
            DiffKind::LengthMismatch => "length mismatch",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One divergence between two graphs, with renderings of both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: NodePath,
    pub kind: DiffKind,
    pub left: String,
    pub right: String,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} != {})",
            self.path, self.kind, self.left, self.right
        )
    }
}

const ABSENT: &str = "<absent>";

#[derive(Debug, Clone)]
pub struct Comparator<'r> {
    schemas: &'r SchemaRegistry,
    tolerance: Tolerance,
    ignore: BTreeSet<String>,
}

impl Comparator<'static> {
    /// Built-in registry, default tolerance, nothing ignored.
    pub fn builtin() -> Self {
        Comparator::new(SchemaRegistry::builtin())
    }
}

impl<'r> Comparator<'r> {
    pub fn new(schemas: &'r SchemaRegistry) -> Self {
        Self {
            schemas,
            tolerance: Tolerance::DEFAULT,
            ignore: BTreeSet::new(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Skips every field with this name, at any depth.
    pub fn ignore_field(mut self, name: impl Into<String>) -> Self {
        self.ignore.insert(name.into());
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn compare(&self, a: &Instance, b: &Instance, path: &NodePath) -> Vec<Difference> {
        let mut out = Vec::new();
        self.compare_instances(a, b, path, &mut out);
        out
    }

    pub fn compare_values(&self, a: &Value, b: &Value, path: &NodePath) -> Vec<Difference> {
        let mut out = Vec::new();
        self.compare_value(a, b, path, &mut out);
        out
    }

    pub fn first_difference(&self, a: &Instance, b: &Instance) -> Option<Difference> {
        self.compare(a, b, &NodePath::root()).into_iter().next()
    }

    pub fn is_equal(&self, a: &Instance, b: &Instance) -> bool {
        self.first_difference(a, b).is_none()
    }

    fn field_order<'a>(&self, a: &'a Instance, b: &'a Instance) -> Vec<&'a str> {
        let mut names: Vec<&'a str> = Vec::new();
        let mut push = |name: &'a str| {
            if !names.contains(&name) {
                names.push(name);
            }
        };
        if let Some(node) = self.schemas.get(a.type_name()) {
            for field in node.owned_fields() {
                if a.contains(field.name) || b.contains(field.name) {
                    push(field.name);
                }
            }
        }
        a.field_names().for_each(&mut push);
        b.field_names().for_each(&mut push);

        let back_refs: Vec<&str> = self
            .schemas
            .get(a.type_name())
            .map(|node| {
                node.fields()
                    .iter()
                    .filter(|f| f.is_back_ref())
                    .map(|f| f.name)
                    .collect()
            })
            .unwrap_or_default();
        names.retain(|name| {
            *name != PARENT_FIELD && !back_refs.contains(name) && !self.ignore.contains(*name)
        });
        names
    }

    fn compare_instances(
        &self,
        a: &Instance,
        b: &Instance,
        path: &NodePath,
        out: &mut Vec<Difference>,
    ) {
        if a.type_name() != b.type_name() {
            out.push(Difference {
                path: path.clone(),
                kind: DiffKind::TypeMismatch,
                left: a.type_name().to_string(),
                right: b.type_name().to_string(),
            });
            return;
        }

        for name in self.field_order(a, b) {
            let here = path.field(name);
            match (a.get(name), b.get(name)) {
                (Some(va), Some(vb)) => self.compare_value(va, vb, &here, out),
                (Some(va), None) => out.push(Difference {
                    path: here,
                    kind: DiffKind::MissingField,
                    left: va.render(),
                    right: ABSENT.to_string(),
                }),
                (None, Some(vb)) => out.push(Difference {
                    path: here,
                    kind: DiffKind::MissingField,
                    left: ABSENT.to_string(),
                    right: vb.render(),
                }),
                (None, None) => {}
            }
        }
    }

    fn compare_value(&self, a: &Value, b: &Value, path: &NodePath, out: &mut Vec<Difference>) {
        let mismatch = |kind: DiffKind| Difference {
            path: path.clone(),
            kind,
            left: a.render(),
            right: b.render(),
        };

        match (a, b) {
            (Value::Ref(_), _) | (_, Value::Ref(_)) => {}
            (Value::Null, Value::Null) => {}
            (Value::Bool(x), Value::Bool(y)) if x == y => {}
            (Value::Int(x), Value::Int(y)) if x == y => {}
            (Value::Str(x), Value::Str(y)) if x == y => {}
            (Value::Bool(_), Value::Bool(_))
            | (Value::Int(_), Value::Int(_))
            | (Value::Str(_), Value::Str(_)) => out.push(mismatch(DiffKind::ValueMismatch)),
            (Value::Float(_) | Value::Int(_), Value::Float(_) | Value::Int(_)) => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                if !self.tolerance.close(x, y) {
                    out.push(mismatch(DiffKind::ValueMismatch));
                }
            }
            (Value::Matrix(x), Value::Matrix(y)) => self.compare_matrices(x, y, path, out),
            (Value::Object(x), Value::Object(y)) => self.compare_instances(x, y, path, out),
            (Value::List(xs), Value::List(ys)) => {
                if xs.len() != ys.len() {
                    out.push(Difference {
                        path: path.clone(),
                        kind: DiffKind::LengthMismatch,
                        left: xs.len().to_string(),
                        right: ys.len().to_string(),
                    });
                    return;
                }
                for (i, (x, y)) in xs.iter().zip(ys).enumerate() {
                    self.compare_instances(x, y, &path.index(i), out);
                }
            }
            _ => out.push(mismatch(DiffKind::TypeMismatch)),
        }
    }

    fn compare_matrices(&self, a: &Matrix, b: &Matrix, path: &NodePath, out: &mut Vec<Difference>) {
        if a.shape() != b.shape() {
            out.push(Difference {
                path: path.clone(),
                kind: DiffKind::LengthMismatch,
                left: format!("{:?}", a.shape()),
                right: format!("{:?}", b.shape()),
            });
            return;
        }
        let first = a
            .data()
            .iter()
            .zip(b.data())
            .position(|(x, y)| !self.tolerance.close(*x, *y));
        if let Some(flat) = first {
            let at = a
                .unravel(flat)
                .into_iter()
                .fold(path.clone(), |p, i| p.index(i));
            out.push(Difference {
                path: at,
                kind: DiffKind::ValueMismatch,
                left: format!("{:?}", a.data()[flat]),
                right: format!("{:?}", b.data()[flat]),
            });
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Comparator::builtin()
            .compare(self, other, &NodePath::root())
            .is_empty()
    }
}
