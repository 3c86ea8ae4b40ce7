mod convert;
mod extract;
mod path;
mod scan;

pub use convert::{parse_bool, parse_number};
pub use extract::{extract, extract_path};
pub use path::{Path, Segment};
pub use scan::{validate, Token};

/// Error cases surfaced by validation and extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The text is not a well-formed JSON value.
    #[error("text is not well-formed JSON")]
    Format,
    /// The extraction specification failed to parse.
    #[error("malformed extraction specification")]
    BadSpec,
    /// The document has no value at the specified location.
    #[error("no value at the specified location")]
    NotFound,
    /// The extracted value does not fit the caller's buffer.
    /// Retained for wire compatibility; slice-based extraction cannot overflow.
    #[error("value does not fit the output buffer")]
    Overflow,
}
