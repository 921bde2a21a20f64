//! NDR primitive reader
//!
//! Mirror of [`crate::NdrWriter`]: reads NDR primitives from an underlying
//! [`std::io::Read`] source, discarding alignment padding before each
//! multi-byte value.

use crate::format::{CharacterRepresentation, FormatLabel};
use crate::options::TransferSyntax;
use crate::writer::align_padding;
use crate::{NdrError, Result};
use std::io::Read;

const READER_BUF_LEN: usize = 16;
const SKIP_CHUNK_LEN: usize = 4096;

// Sources are `io::Read`; `Bytes` input arrives through `Buf::reader`.
macro_rules! impl_read_numeric {
    ($ty:ty, $size:expr, $be:ident, $le:ident, $native:ident) => {
        #[doc = concat!("Read a big-endian `", stringify!($ty), "`")]
        pub fn $be(&mut self) -> Result<$ty> {
            self.align($size)?;
            let mut bytes = [0u8; $size];
            self.read_exact(&mut bytes)?;
            Ok(<$ty>::from_be_bytes(bytes))
        }

        #[doc = concat!("Read a little-endian `", stringify!($ty), "`")]
        pub fn $le(&mut self) -> Result<$ty> {
            self.align($size)?;
            let mut bytes = [0u8; $size];
            self.read_exact(&mut bytes)?;
            Ok(<$ty>::from_le_bytes(bytes))
        }

        #[doc = concat!("Read a `", stringify!($ty), "` in the label's byte order")]
        #[inline]
        pub fn $native(&mut self) -> Result<$ty> {
            if self.little_endian {
                self.$le()
            } else {
                self.$be()
            }
        }
    };
}

/// Reader for NDR primitives
#[derive(Debug)]
pub struct NdrReader<R> {
    inner: R,
    format: FormatLabel,
    little_endian: bool,
    /// Current offset from the start of the octet stream
    offset: u64,
}

impl<R: Read> NdrReader<R> {
    /// Create a reader for the given format label.
    pub fn new(inner: R, format: FormatLabel) -> Result<Self> {
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

    /// Bytes consumed so far, padding included
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fill `buf` completely
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    /// Discard `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        // Small skips stay on the stack.
        match count {
            0 => Ok(()),
            c if c <= READER_BUF_LEN => self.read_exact(&mut [0u8; READER_BUF_LEN][..c]),
            c if c <= 64 => self.read_exact(&mut [0u8; 64][..c]),
            c if c <= 128 => self.read_exact(&mut [0u8; 128][..c]),
            c if c <= 256 => self.read_exact(&mut [0u8; 256][..c]),
            c if c <= 512 => self.read_exact(&mut [0u8; 512][..c]),
            mut remaining => {
                let mut buf = [0u8; SKIP_CHUNK_LEN];
                while remaining > 0 {
                    let chunk = remaining.min(SKIP_CHUNK_LEN);
                    self.read_exact(&mut buf[..chunk])?;
                    remaining -= chunk;
                }
                Ok(())
            }
        }
    }

    /// Skip padding until `offset % modulo == 0`.
    ///
    /// Returns the number of bytes skipped.
    pub fn align(&mut self, modulo: usize) -> Result<usize> {
        let padding = align_padding(self.offset, modulo);
        self.skip(padding)?;
        Ok(padding)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// NDR boolean - any non-zero octet is true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    impl_read_numeric!(u16, 2, read_u16_be, read_u16_le, read_u16);
    impl_read_numeric!(i16, 2, read_i16_be, read_i16_le, read_i16);
    impl_read_numeric!(u32, 4, read_u32_be, read_u32_le, read_u32);
    impl_read_numeric!(i32, 4, read_i32_be, read_i32_le, read_i32);
    impl_read_numeric!(u64, 8, read_u64_be, read_u64_le, read_u64);
    impl_read_numeric!(i64, 8, read_i64_be, read_i64_le, read_i64);
    impl_read_numeric!(f32, 4, read_f32_be, read_f32_le, read_f32);
    impl_read_numeric!(f64, 8, read_f64_be, read_f64_le, read_f64);

    /// Read a bound, offset, count or referent id in the width of `syntax`.
    pub fn read_length(&mut self, syntax: TransferSyntax) -> Result<u64> {
        match syntax {
            TransferSyntax::Ndr => self.read_u32().map(u64::from),
            TransferSyntax::Ndr64 => self.read_u64(),
        }
    }

    /// Read `units` characters in the label's character set.
    ///
    /// Returns the text and the number of characters that were substituted.
    pub fn read_string(&mut self, units: usize) -> Result<(String, usize)> {
        match self.format.character_representation() {
            CharacterRepresentation::Ascii => self.read_ascii(units),
            CharacterRepresentation::Ebcdic => self.read_ebcdic(units),
            CharacterRepresentation::Unicode => self.read_unicode(units),
        }
    }

    /// Read `len` octets of ASCII; octets above 0x7F become `?`.
    pub fn read_ascii(&mut self, len: usize) -> Result<(String, usize)> {
        let mut bytes = vec![0u8; len];
        self.read_exact(&mut bytes)?;
        let mut substituted = 0;
        let text = bytes
            .into_iter()
            .map(|b| {
                if b.is_ascii() {
                    b as char
                } else {
                    substituted += 1;
                    '?'
                }
            })
            .collect();
        Ok((text, substituted))
    }

    pub fn read_ebcdic(&mut self, _len: usize) -> Result<(String, usize)> {
        Err(NdrError::UnsupportedCharacterSet(CharacterRepresentation::Ebcdic))
    }

    /// Read `units` UTF-16 code units; unpaired surrogates become U+FFFD.
    pub fn read_unicode(&mut self, units: usize) -> Result<(String, usize)> {
        let mut code_units = Vec::with_capacity(units);
        for _ in 0..units {
            code_units.push(self.read_u16()?);
        }
        let mut substituted = 0;
        let text = char::decode_utf16(code_units)
            .map(|c| {
                c.unwrap_or_else(|_| {
                    substituted += 1;
                    char::REPLACEMENT_CHARACTER
                })
            })
            .collect();
        Ok((text, substituted))
    }
}
