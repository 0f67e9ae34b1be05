//! Core domain types and shared rules for the farm map catalog.
//!
//! This crate defines the data model used across all other crates:
//! - Map records, categories and annotation snapshots
//! - Coordinate parsing, range validation and map links
//! - Object key naming (filename sanitization)
//! - Upload queue status and batch planning
//! - Backend error classification
//! - Application configuration

pub mod backend;
pub mod category;
pub mod config;
pub mod error;
pub mod geo;
pub mod map;
pub mod naming;
pub mod upload;

pub use backend::BackendErrorKind;
pub use category::{Category, CategoryId};
pub use error::{Error, Result};
pub use geo::{Coordinates, CoordinateUpdate, GeolocationError};
pub use map::{Annotation, MapId, MapRecord, NewMap};
pub use naming::{display_name, sanitize_file_name, unique_object_key};
pub use upload::{BatchPlan, UploadStatus};

/// Object storage bucket holding the uploaded PDFs.
pub const DEFAULT_BUCKET: &str = "mapas";

/// Hosted table holding categories.
pub const CATEGORIES_TABLE: &str = "categorias";

/// Hosted table holding map records.
pub const MAPS_TABLE: &str = "maps";
