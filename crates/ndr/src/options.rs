//! Codec configuration

use crate::error::MAX_NDR_ARRAY_ELEMENTS;

/// Transfer syntax of the stub data
///
/// NDR64 widens array bounds, offsets, counts and referent ids to 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferSyntax {
    #[default]
    Ndr,
    Ndr64,
}

impl TransferSyntax {
    /// Size and alignment of bounds, offsets, counts and referent ids
    pub fn length_size(self) -> usize {
        match self {
            Self::Ndr => 4,
            Self::Ndr64 => 8,
        }
    }

    /// Largest bound, offset or count an encoder transmits
    pub fn max_length(self) -> u64 {
        match self {
            Self::Ndr => u64::from(u32::MAX),
            Self::Ndr64 => i64::MAX as u64,
        }
    }
}

/// Encoder/decoder options
#[derive(Debug, Clone)]
pub struct CodecOptions {
    /// Transfer syntax for bounds and referent ids
    pub syntax: TransferSyntax,
    /// Largest element count a decoder allocates for one bounded value
    pub max_elements: usize,
    /// Return accumulated data errors as `NdrError::Data`
    pub strict: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            syntax: TransferSyntax::Ndr,
            max_elements: MAX_NDR_ARRAY_ELEMENTS,
            strict: false,
        }
    }
}

impl CodecOptions {
    /// Options for NDR64 stub data
    pub fn ndr64() -> Self {
        Self {
            syntax: TransferSyntax::Ndr64,
            ..Self::default()
        }
    }

    pub fn with_syntax(mut self, syntax: TransferSyntax) -> Self {
        self.syntax = syntax;
        self
    }

    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
