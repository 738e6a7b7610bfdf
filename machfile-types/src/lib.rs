//! Entity model (schemas-as-code) for persisted machine documents.
//!
//! # Design constraints
//! - Every persisted node carries its concrete type; dispatch happens through the
//!   [`SchemaRegistry`], never through language-level inheritance.
//! - The built-in registry is built once and is read-only afterwards.
//! - Back-references (`parent`) are paths, excluded from serialization and equality.

pub mod catalog;
pub mod compare;
pub mod error;
pub mod instance;
pub mod matrix;
pub mod path;
pub mod schema;
pub mod value;
pub mod version;

pub use compare::{Comparator, DiffKind, Difference, Tolerance};
pub use error::{ErrorKind, PersistError, PersistResult, SchemaError};
pub use instance::{Instance, PARENT_FIELD};
pub use matrix::Matrix;
pub use path::{NodePath, Segment};
pub use schema::{
    FieldDef, FieldDefault, FieldKind, Ownership, ResolvedNode, SchemaNode, SchemaRegistry,
    SchemaRegistryBuilder,
};
pub use value::Value;
pub use version::{SAVE_DATE_TAG, SchemaVersion, TYPE_TAG, VERSION_TAG, is_reserved_key};
