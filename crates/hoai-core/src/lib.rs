//! # hoai-core
//!
//! Core types, traits, and abstractions for the HOAI Planer Pro wiki.
//!
//! This crate provides the data model, the error type, and the trait
//! definitions for every remote collaborator (metadata store, object store,
//! AI search) that the other hoai crates depend on.

pub mod attachments;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod traits;

// Re-export commonly used types at crate root
pub use attachments::{
    attachment_display_name, attachment_path, new_attachment_path, parse_attachment_path,
    sanitize_filename, AttachmentPathParts,
};
pub use error::{Error, Result};
pub use models::*;
pub use notifications::{ErrorEntry, ErrorLog};
pub use traits::*;
