//! Core data models for the file analysis service.
//!
//! `FileRecord` maps to the `files` table via a hand-written `sqlx` row
//! mapping and serializes naturally as JSON via `serde`; `FileMetadata` is
//! the closed tagged union persisted into its JSON column.

pub mod file_record;
pub mod metadata;
