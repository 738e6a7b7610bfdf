use std::fmt;

/// Dotted path of a node or field inside an object graph, e.g. `rotor.hole[0].magnet_0`.
///
/// The root path is empty. Paths double as non-owning back-references.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(String);

/// One step of a [`NodePath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

impl NodePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn field(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn index(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    /// Splits the path into field and index steps. `None` if an index is malformed.
    pub fn segments(&self) -> Option<Vec<Segment<'_>>> {
        let mut out = Vec::new();
        for part in self.0.split('.').filter(|p| !p.is_empty()) {
            let (name, mut rest) = match part.find('[') {
                Some(i) => part.split_at(i),
                None => (part, ""),
            };
            if !name.is_empty() {
                out.push(Segment::Field(name));
            }
            while !rest.is_empty() {
                let inner = rest.strip_prefix('[')?;
                let end = inner.find(']')?;
                out.push(Segment::Index(inner[..end].parse().ok()?));
                rest = &inner[end + 1..];
            }
        }
        Some(out)
    }

    /// Last field name of the path, ignoring trailing indices.
    pub fn leaf_field(&self) -> Option<&str> {
        self.0
            .rsplit('.')
            .next()
            .map(|last| last.split('[').next().unwrap_or(last))
            .filter(|name| !name.is_empty())
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
