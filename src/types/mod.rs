// bookmark-admin shared type definitions
// Each submodule defines types used across the crate.

pub mod backfill;
pub mod bookmark;
pub mod document;
pub mod errors;
pub mod settings;
