//! Repository traits for metadata operations.

pub mod categories;
pub mod maps;

pub use categories::CategoryRepo;
pub use maps::MapRepo;
