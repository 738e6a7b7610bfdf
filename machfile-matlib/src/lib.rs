//! Material library resolution.
//!
//! A machine embeds full copies of the materials it uses. A material library
//! is a directory of material documents shared between machines. Resolution
//! reconciles the two by name:
//! - an embedded copy equal to the library material is replaced by it
//! - a divergent copy is kept as a machine-local material under a new name
//! - the library itself is never modified by resolution

mod library;
mod registry;
mod resolve;

pub use library::{MATERIAL_TYPE, load_library};
pub use registry::{MaterialRegistry, MaterialSummary, Partition, RegistryViolation};
pub use resolve::{resolve, resolve_dir};
