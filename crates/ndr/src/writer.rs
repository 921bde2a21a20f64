//! NDR primitive writer
//!
//! Writes every NDR primitive to an underlying [`std::io::Write`] sink and
//! tracks the offset from the start of the octet stream. Multi-byte values
//! are aligned to their natural size first by inserting zero padding.
//!
//! | NDR type       | Size | Alignment |
//! |----------------|------|-----------|
//! | boolean, small | 1    | 1         |
//! | short          | 2    | 2         |
//! | long, float    | 4    | 4         |
//! | hyper, double  | 8    | 8         |

use crate::format::{CharacterRepresentation, FormatLabel};
use crate::options::TransferSyntax;
use crate::{NdrError, Result};
use std::io::Write;

const ZERO_PADDING_LEN: usize = 512;

static ZERO_PADDING: [u8; ZERO_PADDING_LEN] = [0; ZERO_PADDING_LEN];

/// Calculate padding needed to align `offset` to the given boundary
#[inline]
pub fn align_padding(offset: u64, alignment: usize) -> usize {
    if alignment <= 1 {
        return 0;
    }
    let remainder = (offset % alignment as u64) as usize;
    if remainder == 0 {
        0
    } else {
        alignment - remainder
    }
}

// Explicit big/little-endian writers plus the format-dependent variant.
// Sinks are `io::Write` so a façade can stream into files or sockets; a
// `BytesMut` reaches here through `BufMut::writer`.
macro_rules! impl_write_numeric {
    ($ty:ty, $size:expr, $be:ident, $le:ident, $native:ident) => {
        #[doc = concat!("Write a big-endian `", stringify!($ty), "`")]
        pub fn $be(&mut self, value: $ty) -> Result<()> {
            self.align($size)?;
            self.write_bytes(&value.to_be_bytes())
        }

        #[doc = concat!("Write a little-endian `", stringify!($ty), "`")]
        pub fn $le(&mut self, value: $ty) -> Result<()> {
            self.align($size)?;
            self.write_bytes(&value.to_le_bytes())
        }

        #[doc = concat!("Write a `", stringify!($ty), "` in the label's byte order")]
        #[inline]
        pub fn $native(&mut self, value: $ty) -> Result<()> {
            if self.little_endian {
                self.$le(value)
            } else {
                self.$be(value)
            }
        }
    };
}

/// Writer for NDR primitives
#[derive(Debug)]
pub struct NdrWriter<W> {
    inner: W,
    format: FormatLabel,
    little_endian: bool,
    /// Current offset from the start of the octet stream
    offset: u64,
}

impl<W: Write> NdrWriter<W> {
    /// Create a writer for the given format label.
    ///
    /// Fails with [`NdrError::UnsupportedFormat`] unless the label selects
    /// ASCII characters and IEEE floating point.
    pub fn new(inner: W, format: FormatLabel) -> Result<Self> {
        if !format.is_supported() {
            return Err(NdrError::UnsupportedFormat(format));
        }
        Ok(Self {
            inner,
            format,
            little_endian: format.is_little_endian(),
            offset: 0,
        })
    }

    pub fn format(&self) -> FormatLabel {
        self.format
    }

    /// Bytes written so far, padding included
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Insert zero padding until `offset % modulo == 0`.
    ///
    /// Returns the number of padding bytes written.
    pub fn align(&mut self, modulo: usize) -> Result<usize> {
        let padding = align_padding(self.offset, modulo);
        let mut remaining = padding;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_PADDING_LEN);
            self.write_bytes(&ZERO_PADDING[..chunk])?;
            remaining -= chunk;
        }
        Ok(padding)
    }

    /// Write raw octets without alignment
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// NDR boolean - a single octet, 0 or 1
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_u8(u8::from(value))
    }

    impl_write_numeric!(u16, 2, write_u16_be, write_u16_le, write_u16);
    impl_write_numeric!(i16, 2, write_i16_be, write_i16_le, write_i16);
    impl_write_numeric!(u32, 4, write_u32_be, write_u32_le, write_u32);
    impl_write_numeric!(i32, 4, write_i32_be, write_i32_le, write_i32);
    impl_write_numeric!(u64, 8, write_u64_be, write_u64_le, write_u64);
    impl_write_numeric!(i64, 8, write_i64_be, write_i64_le, write_i64);
    impl_write_numeric!(f32, 4, write_f32_be, write_f32_le, write_f32);
    impl_write_numeric!(f64, 8, write_f64_be, write_f64_le, write_f64);

    /// Write a bound, offset, count or referent id in the width of `syntax`.
    /// Callers check values against [`TransferSyntax::max_length`]; anything
    /// wider is clamped.
    pub fn write_length(&mut self, syntax: TransferSyntax, value: u64) -> Result<()> {
        match syntax {
            TransferSyntax::Ndr => self.write_u32(u32::try_from(value).unwrap_or(u32::MAX)),
            TransferSyntax::Ndr64 => self.write_u64(value),
        }
    }

    /// Number of characters `text` occupies in the label's character set
    pub fn text_units(&self, text: &str) -> usize {
        match self.format.character_representation() {
            CharacterRepresentation::Unicode => text.encode_utf16().count(),
            _ => text.chars().count(),
        }
    }

    /// Write text in the label's character set.
    ///
    /// Returns the number of characters that had to be substituted.
    pub fn write_string(&mut self, text: &str) -> Result<usize> {
        match self.format.character_representation() {
            CharacterRepresentation::Ascii => self.write_ascii(text),
            CharacterRepresentation::Ebcdic => self.write_ebcdic(text),
            CharacterRepresentation::Unicode => self.write_unicode(text).map(|()| 0),
        }
    }

    /// Write text as ASCII, one octet per character. Characters outside
    /// ASCII are written as `?` and counted in the return value.
    pub fn write_ascii(&mut self, text: &str) -> Result<usize> {
        if text.is_ascii() {
            self.write_bytes(text.as_bytes())?;
            return Ok(0);
        }
        let mut substituted = 0;
        let bytes: Vec<u8> = text
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    c as u8
                } else {
                    substituted += 1;
                    b'?'
                }
            })
            .collect();
        self.write_bytes(&bytes)?;
        Ok(substituted)
    }

    pub fn write_ebcdic(&mut self, _text: &str) -> Result<usize> {
        Err(NdrError::UnsupportedCharacterSet(CharacterRepresentation::Ebcdic))
    }

    /// Write text as UTF-16 code units in the label's byte order
    pub fn write_unicode(&mut self, text: &str) -> Result<()> {
        for unit in text.encode_utf16() {
            self.write_u16(unit)?;
        }
        Ok(())
    }
}
