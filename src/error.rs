//! The error taxonomy for the `cppon` DOM.
//!
//! One variant per failure kind: input encoding, syntax, token,
//! traversal/access, printer, and logic errors. Every public operation
//! in this crate returns [`Result<T>`] rather than panicking.

/// A byte position within the scanned input.
pub type Position = usize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- Input encoding ---
    #[error("input begins with a UTF-32 byte order mark")]
    Utf32Bom,
    #[error("input begins with a UTF-16 byte order mark")]
    Utf16Bom,
    #[error("invalid UTF-8 lead byte 0x{byte:02x} at position {position}")]
    InvalidUtf8 { byte: u8, position: Position },
    #[error("UTF-8 continuation byte 0x{byte:02x} at the start of input")]
    Utf8Continuation { byte: u8 },
    #[error("unexpected end of text at position {position}")]
    UnexpectedEndOfText { position: Position },

    // --- Syntax ---
    #[error("unexpected symbol '{symbol}' at position {position}")]
    UnexpectedSymbol { symbol: char, position: Position },
    #[error("expected '{expected}' at position {position}")]
    ExpectedSymbol {
        expected: char,
        position: Position,
    },

    // --- Tokens ---
    #[error("invalid base64 payload at position {position}")]
    InvalidBase64 { position: Position },
    #[error("blob value has not been realized from its base64 text form")]
    BlobNotRealized,
    #[error("number token has not been converted to a concrete numeric value")]
    NumberNotConverted,
    #[error("invalid path literal {path:?}")]
    InvalidPath { path: String },

    // --- Traversal / access ---
    #[error("value is null")]
    NullValue,
    #[error("expected a value of kind {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("member {member:?} not found")]
    MemberNotFound { member: String },
    #[error("segment {segment:?} is not a valid array index")]
    BadArrayIndex { segment: String },
    #[error("path segment {segment:?} is not valid at this position")]
    InvalidPathSegment { segment: String },
    #[error("array index {index} exceeds size {size} by more than the allowed delta {max_delta}")]
    ExcessiveArrayResize {
        index: usize,
        size: usize,
        max_delta: usize,
    },

    // --- Printer ---
    #[error("bad printer option {key:?}: {reason}")]
    BadOption { key: String, reason: String },
    #[error("integer {value} is outside the JSON-compatible range [-2^53+1, 2^53-1]")]
    JsonCompatibility { value: i64 },

    // --- Logic ---
    #[error("cannot assign a pointer to a node in an indeterminate internal state")]
    UnsafePointerAssignment,
}

impl Error {
    pub fn unexpected_symbol(symbol: u8, position: Position) -> Self {
        Error::UnexpectedSymbol {
            symbol: symbol as char,
            position,
        }
    }

    pub fn expected_symbol(expected: u8, position: Position) -> Self {
        Error::ExpectedSymbol {
            expected: expected as char,
            position,
        }
    }

    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Error::TypeMismatch { expected, found }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A tiny helper trait so call sites can attach a byte position to an
/// `Option` the way the parser frequently needs to.
pub(crate) trait OptionExt<T> {
    fn ok_or_eot(self, position: Position) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_eot(self, position: Position) -> Result<T> {
        self.ok_or(Error::UnexpectedEndOfText { position })
    }
}
