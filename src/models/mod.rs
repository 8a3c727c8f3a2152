//! Core data models for the PDF document store.
//!
//! Rows map to the `documents` table via `sqlx::FromRow` and serialize
//! directly as the JSON returned by the listing endpoint.

pub mod document;
