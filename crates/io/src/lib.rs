// File I/O operations

pub mod csv;
pub mod error;
pub mod load;
pub mod xlsx;
mod xlsx_styles;

pub use error::{LoadError, WriteError};
pub use load::{load_pair, load_table, Delimiter, InputSource, LoadOptions};
pub use xlsx::{write_highlighted, WriteOptions, WriteSummary};
