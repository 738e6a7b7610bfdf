use serde::{Deserialize, Serialize};
use std::fmt;

/// Document key holding the concrete type of a node.
pub const TYPE_TAG: &str = "__class__";

/// Document key holding the schema version a fragment was written with.
pub const VERSION_TAG: &str = "__version__";

/// Informational save timestamp, root node only.
pub const SAVE_DATE_TAG: &str = "__save_date__";

/// Reserved keys are dunder-wrapped and never name a schema field.
pub fn is_reserved_key(key: &str) -> bool {
    key.len() > 4 && key.starts_with("__") && key.ends_with("__")
}

/// Monotonic schema version of the persisted layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    /// Oldest layout this build can still read.
    pub const OLDEST: SchemaVersion = SchemaVersion(1);

    /// Layout written by this build.
    pub const CURRENT: SchemaVersion = SchemaVersion(3);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn is_current(self) -> bool {
        self == Self::CURRENT
    }

    /// Source versions of the migration steps needed to reach [`SchemaVersion::CURRENT`].
    pub fn steps_to_current(self) -> impl Iterator<Item = SchemaVersion> {
        (self.0..Self::CURRENT.0).map(SchemaVersion)
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
