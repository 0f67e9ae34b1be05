pub mod filesystem;
pub mod hosted;
