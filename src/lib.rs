//! PDF document store: upload, list, download and delete PDFs over HTTP,
//! with metadata in SQLite and file contents on local disk.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
