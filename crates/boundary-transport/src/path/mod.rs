//! Path table, path entries and path request handling.

pub mod constants;
pub mod path_request;
pub mod table;
pub mod types;

pub use table::PathTable;
pub use types::PathEntry;
