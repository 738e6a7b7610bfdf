//! Conversion between machine object graphs and their JSON documents.
//!
//! Every object node is written with its concrete `__class__`; the root also
//! carries `__version__` and `__save_date__`. Reading goes through the
//! migrator, so documents from any supported schema version load into the
//! current layout.

mod codec;
mod decode;
mod encode;
mod matrix_json;

pub use codec::{Codec, document_type, save_date};
