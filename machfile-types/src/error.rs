//! Error types shared by every machfile crate.
//!
//! The taxonomy is closed: callers (GUI, CLI, tests) match on [`ErrorKind`] to
//! pick a user-facing message and never receive a bare string.
//! - Schema errors: unknown type tag, malformed fragment, inconsistent catalog
//! - Unsupported version: document written by a newer schema
//! - Unmigratable fragment: a field the migration chain cannot map
//! - Name collision: no unique disambiguated material name
//! - Material in use: a material the machine still references cannot be deleted
//! - Runtime errors: I/O and JSON syntax

use thiserror::Error;

use crate::path::NodePath;
use crate::version::SchemaVersion;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unknown type `{type_name}` at {path}")]
    UnknownType { path: NodePath, type_name: String },

    #[error("type `{type_name}` at {path} is abstract and cannot be instantiated")]
    AbstractType { path: NodePath, type_name: String },

    #[error("missing `__class__` tag at {path}")]
    MissingTypeTag { path: NodePath },

    #[error("expected an object at {path}, found {found}")]
    NotAnObject { path: NodePath, found: String },

    #[error("type `{found}` at {path} is not a `{expected}`")]
    UnexpectedType {
        path: NodePath,
        expected: String,
        found: String,
    },

    #[error("field {path} expects {expected}, found {found}")]
    FieldType {
        path: NodePath,
        expected: String,
        found: String,
    },

    #[error("field {path} is not declared by type `{type_name}`")]
    UnknownField { path: NodePath, type_name: String },

    #[error("type `{0}` is registered twice")]
    DuplicateType(String),

    #[error("field `{field}` is declared twice in the hierarchy of `{type_name}`")]
    DuplicateField { type_name: String, field: String },

    #[error("type `{type_name}` extends unknown type `{base}`")]
    UnknownBase { type_name: String, base: String },

    #[error("inheritance cycle through `{0}`")]
    InheritanceCycle(String),

    #[error("field `{type_name}.{field}` refers to unknown type `{target}`")]
    UnknownFieldType {
        type_name: String,
        field: String,
        target: String,
    },
}

/// The top-level error type for load, save, migrate and resolve.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("unsupported schema version {found} (newest readable is {current})")]
    UnsupportedVersion { found: u64, current: SchemaVersion },

    #[error("unmigratable fragment at {path}: {reason}")]
    UnmigratableFragment { path: NodePath, reason: String },

    #[error("no free name derived from `{name}` after {attempts} attempts")]
    NameCollision { name: String, attempts: usize },

    #[error("material `{name}` is still used by {references} machine node(s)")]
    MaterialInUse { name: String, references: usize },

    #[error("runtime error: {0}")]
    Runtime(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Schema,
    UnsupportedVersion,
    UnmigratableFragment,
    NameCollision,
    MaterialInUse,
    Runtime,
}

impl PersistError {
    pub fn unmigratable(path: NodePath, reason: impl Into<String>) -> Self {
        PersistError::UnmigratableFragment {
            path,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PersistError::Schema(_) => ErrorKind::Schema,
            PersistError::UnsupportedVersion { .. } => ErrorKind::UnsupportedVersion,
            PersistError::UnmigratableFragment { .. } => ErrorKind::UnmigratableFragment,
            PersistError::NameCollision { .. } => ErrorKind::NameCollision,
            PersistError::MaterialInUse { .. } => ErrorKind::MaterialInUse,
            PersistError::Runtime(_) => ErrorKind::Runtime,
        }
    }

    /// Returns the recommended process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Runtime => 1,
            ErrorKind::Schema => 2,
            ErrorKind::UnsupportedVersion => 3,
            ErrorKind::UnmigratableFragment => 4,
            ErrorKind::NameCollision => 5,
            ErrorKind::MaterialInUse => 6,
        }
    }
}

/// Result type alias using PersistError.
pub type PersistResult<T> = Result<T, PersistError>;
