// Grid I/O: prompt text, files, and the SQLite store

pub mod csv;
pub mod error;
pub mod json;
pub mod native;
pub mod prompt;
pub mod table_edit;

/// Native store format version
/// Increment when the schema changes in a way old versions can't read
pub const NATIVE_FORMAT_VERSION: u32 = 1;
