//! Typed access to the KBO monthly CSV bundle.
//!
//! File conventions: comma separator, double-quote text delimiter, header
//! row, UTF-8 (an optional BOM is handled by the `csv` crate), dates as
//! `dd-MM-yyyy`, empty field ⇒ empty string (or absent date). A missing file
//! is not an error — readers yield the empty sequence so incremental bundles
//! can omit files wholesale.

pub mod date;
pub mod error;
pub mod estimate;
pub mod read;
pub mod records;

pub use error::{Error, Result};
pub use estimate::estimate_row_count;
pub use read::{read_keys, read_records, RecordIter};
