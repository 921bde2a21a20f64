//! NDR format label
//!
//! The format label is the 4-byte data representation tag carried in every
//! DCE RPC PDU header. It selects the integer byte order, the character set
//! and the floating point representation of the stub data:
//!
//! ```text
//! byte 0: integer representation (high nibble) | character representation (low nibble)
//! byte 1: floating point representation
//! byte 2: reserved, zero
//! byte 3: reserved, zero
//! ```

use crate::{NdrError, Result};
use std::fmt;

/// Integer byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerRepresentation {
    BigEndian = 0,
    LittleEndian = 1,
}

/// Character set used for text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterRepresentation {
    Ascii = 0,
    Ebcdic = 1,
    Unicode = 2,
}

/// Floating point representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatRepresentation {
    Ieee = 0,
    Vax = 1,
    Cray = 2,
    Ibm = 3,
}

impl IntegerRepresentation {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::BigEndian),
            1 => Some(Self::LittleEndian),
            _ => None,
        }
    }
}

impl CharacterRepresentation {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ascii),
            1 => Some(Self::Ebcdic),
            2 => Some(Self::Unicode),
            _ => None,
        }
    }
}

impl FloatRepresentation {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Ieee),
            1 => Some(Self::Vax),
            2 => Some(Self::Cray),
            3 => Some(Self::Ibm),
            _ => None,
        }
    }
}

/// Packed NDR format label
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatLabel([u8; 4]);

/// Big-endian integers, ASCII characters, IEEE floating point
pub const BE_ASCII_IEEE: FormatLabel = FormatLabel::new(
    IntegerRepresentation::BigEndian,
    CharacterRepresentation::Ascii,
    FloatRepresentation::Ieee,
);

/// Little-endian integers, ASCII characters, IEEE floating point
pub const LE_ASCII_IEEE: FormatLabel = FormatLabel::new(
    IntegerRepresentation::LittleEndian,
    CharacterRepresentation::Ascii,
    FloatRepresentation::Ieee,
);

impl FormatLabel {
    /// Size of the label on the wire
    pub const SIZE: usize = 4;

    /// Build a label from its three representations
    pub const fn new(
        integer: IntegerRepresentation,
        character: CharacterRepresentation,
        float: FloatRepresentation,
    ) -> Self {
        Self([((integer as u8) << 4) | (character as u8 & 0x0f), float as u8, 0, 0])
    }

    /// Parse a label from its wire bytes. Reserved bytes are not checked.
    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self> {
        let integer = bytes[0] >> 4;
        let character = bytes[0] & 0x0f;
        let float = bytes[1];
        let (Some(integer), Some(character), Some(float)) = (
            IntegerRepresentation::from_code(integer),
            CharacterRepresentation::from_code(character),
            FloatRepresentation::from_code(float),
        ) else {
            return Err(NdrError::InvalidFormatLabel(format!(
                "{:02x} {:02x} {:02x} {:02x}",
                bytes[0], bytes[1], bytes[2], bytes[3]
            )));
        };
        Ok(Self::new(integer, character, float))
    }

    /// Wire bytes of the label
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    pub fn integer_representation(&self) -> IntegerRepresentation {
        // Codes are validated on construction.
        IntegerRepresentation::from_code(self.0[0] >> 4).unwrap_or(IntegerRepresentation::BigEndian)
    }

    pub fn character_representation(&self) -> CharacterRepresentation {
        CharacterRepresentation::from_code(self.0[0] & 0x0f).unwrap_or(CharacterRepresentation::Ascii)
    }

    pub fn float_representation(&self) -> FloatRepresentation {
        FloatRepresentation::from_code(self.0[1]).unwrap_or(FloatRepresentation::Ieee)
    }

    /// Whether the primitive codec implements this combination
    pub fn is_supported(&self) -> bool {
        *self == BE_ASCII_IEEE || *self == LE_ASCII_IEEE
    }

    pub fn is_little_endian(&self) -> bool {
        self.integer_representation() == IntegerRepresentation::LittleEndian
    }
}

impl Default for FormatLabel {
    fn default() -> Self {
        LE_ASCII_IEEE
    }
}

impl fmt::Debug for FormatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatLabel")
            .field("integer", &self.integer_representation())
            .field("character", &self.character_representation())
            .field("float", &self.float_representation())
            .finish()
    }
}

impl fmt::Display for FormatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}",
            self.integer_representation(),
            self.character_representation(),
            self.float_representation()
        )
    }
}

impl TryFrom<[u8; 4]> for FormatLabel {
    type Error = NdrError;

    fn try_from(bytes: [u8; 4]) -> Result<Self> {
        Self::from_bytes(bytes)
    }
}

impl From<FormatLabel> for [u8; 4] {
    fn from(label: FormatLabel) -> Self {
        label.to_bytes()
    }
}
