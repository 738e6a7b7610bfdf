use camino::Utf8Path;
use machfile_codec::{Codec, document_type};
use machfile_store::{json_files, read_document};
use machfile_types::{Instance, PersistResult, SchemaRegistry};
use tracing::{debug, warn};

/// Base type of every material document.
pub const MATERIAL_TYPE: &str = "Material";

/// Loads every material document directly inside `dir`, sorted by path.
///
/// Each material records its file in its `path` field. Documents whose root is
/// not a material are skipped; when two files define the same name the first
/// one wins. A file that cannot be read or parsed fails the whole load.
pub fn load_library(dir: &Utf8Path) -> PersistResult<Vec<Instance>> {
    let codec = Codec::default();
    let schemas = SchemaRegistry::builtin();

    let mut materials: Vec<Instance> = Vec::new();
    for path in json_files(dir)? {
        let document = read_document(&path)?;
        match document_type(&document) {
            Some(tag) if schemas.is_subtype(tag, MATERIAL_TYPE) => {}
            tag => {
                debug!(path = %path, type_name = tag.unwrap_or("<none>"), "skipping non-material document");
                continue;
            }
        }

        let mut material = codec.from_document(&document, Some(MATERIAL_TYPE))?;
        material.set("path", path.as_str());

        let name = material.str("name").unwrap_or_default();
        if let Some(first) = materials.iter().find(|m| m.str("name") == Some(name)) {
            warn!(
                name,
                kept = first.str("path").unwrap_or_default(),
                skipped = %path,
                "duplicate material name in library"
            );
            continue;
        }
        debug!(path = %path, name, "loaded library material");
        materials.push(material);
    }
    Ok(materials)
}
