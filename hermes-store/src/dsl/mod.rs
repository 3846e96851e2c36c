mod document;
mod schema;

pub use document::{Document, FieldValue, deserialize_document, serialize_document};
pub use schema::{Field, FieldInfo, FieldInfos};
