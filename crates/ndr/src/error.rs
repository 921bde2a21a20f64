//! NDR error types
//!
//! Two kinds of failure exist. [`NdrError`] stops the operation: an invalid
//! format label, a type whose attributes cannot be compiled, an I/O failure
//! or a malformed stream. [`DataError`] is recorded in the session state while
//! encoding carries on with a fallback value, so the stream stays well formed.

use crate::format::{CharacterRepresentation, FormatLabel};
use thiserror::Error;

/// Default upper bound on the number of elements a decoder will allocate for
/// a single bounded sequence or text value.
pub const MAX_NDR_ARRAY_ELEMENTS: usize = 16 * 1024 * 1024;

/// Fatal NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    /// Underlying sink or source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Format label is valid but has no primitive codec
    #[error("unsupported format label: {0}")]
    UnsupportedFormat(FormatLabel),

    /// Format label carries an unknown representation code
    #[error("invalid format label: {0}")]
    InvalidFormatLabel(String),

    /// Text operation for a character set without an implementation
    #[error("unsupported character representation: {0:?}")]
    UnsupportedCharacterSet(CharacterRepresentation),

    /// A bound attribute names a field the record does not have
    #[error("type \"{type_name}\" does not contain the \"{reference}\" field, which was referenced by the IDL attributes of the \"{field}\" field")]
    MissingFieldReference {
        type_name: String,
        field: String,
        reference: String,
    },

    /// A bound attribute names a field that does not hold an integer
    #[error("field \"{reference}\" of type \"{type_name}\" is referenced by \"{field}\" but is not an integer")]
    NonIntegerReference {
        type_name: String,
        field: String,
        reference: String,
    },

    /// `last_is` and `length_is` on the same field
    #[error("field \"{field}\" of type \"{type_name}\" has both last_is and length_is")]
    ConflictingVaryingBounds { type_name: String, field: String },

    /// Bound attributes on a field that cannot carry them
    #[error("field \"{field}\" of type \"{type_name}\" cannot carry the {attribute} attribute")]
    InvalidBoundTarget {
        type_name: String,
        field: String,
        attribute: String,
    },

    /// Fixed array nested deeper than the compiler specializes
    #[error("fixed array has {dims} dimensions, at most {max} are supported")]
    TooManyDimensions { dims: usize, max: usize },

    /// Decoded element count exceeds the configured limit
    #[error("allocation limit exceeded: requested {requested} elements, limit {limit}")]
    AllocationLimitExceeded { requested: u64, limit: usize },

    /// A decoded value does not fit the requested Rust type
    #[error("value mismatch: expected {expected}, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Data errors surfaced by a strict codec
    #[error("{} data error(s), first: {}", .0.len(), .0.first().map(ToString::to_string).unwrap_or_default())]
    Data(Vec<DataError>),
}

impl NdrError {
    /// Numeric code for structural errors, matching the run-time numbering of
    /// [`DataError::code`].
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::MissingFieldReference { .. } => Some(1000),
            Self::ConflictingVaryingBounds { .. } => Some(1001),
            Self::NonIntegerReference { .. } => Some(1002),
            Self::InvalidBoundTarget { .. } => Some(1003),
            Self::TooManyDimensions { .. } => Some(1004),
            _ => None,
        }
    }

    pub(crate) fn value_mismatch(expected: &'static str, found: &crate::Value) -> Self {
        Self::ValueMismatch {
            expected,
            found: found.kind_name(),
        }
    }
}

/// Non-fatal errors accumulated while a program runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("type \"{type_name}\" contains a varying field \"{field}\" whose first index {first} (from \"{reference}\") is less than its minimum {min}")]
    FirstLessThanMin {
        type_name: String,
        field: String,
        reference: String,
        first: i64,
        min: i64,
    },

    #[error("type \"{type_name}\" contains a varying field \"{field}\" whose last index {last} (from \"{reference}\") is less than its minimum {min}")]
    LastLessThanMin {
        type_name: String,
        field: String,
        reference: String,
        last: i64,
        min: i64,
    },

    #[error("type \"{type_name}\" contains a varying field \"{field}\" with first index {first} greater than its last index {last} (from \"{reference}\")")]
    FirstGreaterThanLast {
        type_name: String,
        field: String,
        reference: String,
        first: i64,
        last: i64,
    },

    #[error("type \"{type_name}\" contains a conformant field \"{field}\" with negative size {value} (from \"{reference}\")")]
    NegativeSize {
        type_name: String,
        field: String,
        reference: String,
        value: i64,
    },

    #[error("type \"{type_name}\" contains a varying field \"{field}\" with negative length {value} (from \"{reference}\")")]
    NegativeLength {
        type_name: String,
        field: String,
        reference: String,
        value: i64,
    },

    #[error("type \"{type_name}\" contains a varying field \"{field}\" with negative index {value} (from \"{reference}\")")]
    NegativeIndex {
        type_name: String,
        field: String,
        reference: String,
        value: i64,
    },

    #[error("fixed array expected {expected} elements, found {found}")]
    ArrayLengthMismatch { expected: usize, found: usize },

    #[error("{count} character(s) not representable in ASCII")]
    NonAsciiCharacter { count: usize },

    #[error("expected a {expected} value, found {found}; zero written instead")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("referent id {id} does not fit the wire width")]
    ReferentOverflow { id: u64 },

    #[error("type \"{type_name}\" contains a bounded field \"{field}\" whose bound {value} (from \"{reference}\") exceeds the wire limit {limit}")]
    BoundOverflow {
        type_name: String,
        field: String,
        reference: String,
        value: u64,
        limit: u64,
    },
}

impl DataError {
    /// Stable numeric code of the error
    pub fn code(&self) -> u32 {
        match self {
            Self::FirstLessThanMin { .. } => 2000,
            Self::LastLessThanMin { .. } => 2001,
            Self::FirstGreaterThanLast { .. } => 2002,
            Self::NegativeSize { .. } => 2003,
            Self::NegativeLength { .. } => 2004,
            Self::NegativeIndex { .. } => 2005,
            Self::ArrayLengthMismatch { .. } => 2006,
            Self::NonAsciiCharacter { .. } => 2007,
            Self::ShapeMismatch { .. } => 2008,
            Self::ReferentOverflow { .. } => 2009,
            Self::BoundOverflow { .. } => 2010,
        }
    }
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
