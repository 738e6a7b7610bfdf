//! Schema migrations for machine documents.
//!
//! A document written by an older schema version is brought to
//! [`SchemaVersion::CURRENT`](machfile_types::SchemaVersion::CURRENT) by applying
//! [`MigrationRule`]s keyed by (type tag, source version). Rules work on raw JSON
//! fragments, before any schema validation, so they can describe layouts the
//! current catalog no longer knows.

mod migrator;
pub mod rules;

pub use migrator::{Migrator, read_version};
pub use rules::{JsonMap, MigrationRegistry, MigrationRule, builtin_rules};
