pub mod blob_store;
pub mod content_verifier;
pub mod document_service;
pub mod filename;
pub mod record_store;
