// =============================================================================
// GOOGLE DOCS MODULE
// =============================================================================
//
// Implements `DocumentSource` on top of the Google Drive and Docs APIs.
// This lives in the infra layer because it handles external I/O; the core
// layer only sees listings and structural elements.

pub mod google_docs_client;

pub use google_docs_client::GoogleDocsClient;
