//! Swagger 2.0 document loading and analysis
//!
//! Loading (`parser`), the typed model (`model`) and the analysis that turns
//! paths into resources and data sources (`analyser`) live in separate modules;
//! the remaining modules hold the building blocks the analyser composes.

use crate::constants;

pub mod analyser;
pub mod backend;
pub mod headers;
pub mod model;
pub mod parser;
pub mod paths;
pub mod resource;
pub mod schema;
pub mod security;

pub use analyser::{Analysis, SpecAnalyser};
pub use parser::{load_document, parse_document};

use model::{Operation, PathItem};

/// A helper type to iterate over the HTTP methods of a `PathItem` the analyser reads
pub type HttpMethodsIter<'a> = [(&'static str, &'a Option<Operation>); 4];

/// Creates an iterator over the HTTP methods and their operations in a `PathItem`
#[must_use]
pub const fn http_methods_iter(item: &PathItem) -> HttpMethodsIter<'_> {
    [
        (constants::HTTP_METHOD_GET, &item.get),
        (constants::HTTP_METHOD_POST, &item.post),
        (constants::HTTP_METHOD_PUT, &item.put),
        (constants::HTTP_METHOD_DELETE, &item.delete),
    ]
}
