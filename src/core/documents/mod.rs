pub mod document_models;
pub mod document_source;

pub use document_models::{
    Document, DocumentListing, DocumentMetadata, DocumentPage, SourceDocument, StructuralElement,
};
pub use document_source::DocumentSource;
