pub mod rename;
pub mod tokens;
pub mod types;
pub mod write;

pub use types::{CanonicalColumn, CanonicalRow, CanonicalTable, PollutantCode};
pub use write::{write_csv, write_table};
