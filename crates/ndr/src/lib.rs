//! NDR (Network Data Representation) codec
//!
//! This crate encodes typed values into the DCE RPC NDR transfer syntax and
//! decodes them back, driven by a static description of each type's shape.
//!
//! # NDR Wire Format
//!
//! NDR is the standard encoding for DCE RPC data. Key characteristics:
//! - A 4-byte format label selects byte order, character set and float format
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes), measured
//!   from the start of the stream
//! - Records align to their largest member
//! - Bounded sequences carry an `(offset, count)` window; conformant bounds
//!   of a record's trailing member precede the whole record
//! - Full pointers carry a referent id and transmit each target once
//!
//! # Usage
//!
//! ```
//! use dcerpc_ndr::{from_bytes, ndr_record, to_bytes, LE_ASCII_IEEE};
//!
//! ndr_record! {
//!     #[derive(Debug, PartialEq)]
//!     pub struct Buffer {
//!         pub len: u32,
//!         #[idl("length_is(len)")]
//!         pub data: Vec<u16>,
//!     }
//! }
//!
//! let buffer = Buffer { len: 2, data: vec![7, 8] };
//! let bytes = to_bytes(LE_ASCII_IEEE, &buffer).unwrap();
//! assert_eq!(from_bytes::<Buffer>(LE_ASCII_IEEE, bytes).unwrap(), buffer);
//! ```
//!
//! Types are compiled once into a [`Program`] and cached per
//! [`ProgramCache`]; the [`Encoder`] and [`Decoder`] façades do this
//! transparently.

mod attrs;
mod bounds;
mod cache;
mod codec;
mod compile;
mod decode;
mod encode;
mod error;
mod format;
mod options;
mod reader;
mod shape;
mod state;
mod types;
mod writer;

pub use attrs::{FieldAttr, FieldAttrList, FIRST_IS, IGNORE, LAST_IS, LENGTH_IS, MAX_IS, MIN_IS, SIZE_IS};
pub use bounds::SliceSubset;
pub use cache::ProgramCache;
pub use codec::{from_bytes, to_bytes, Decoded, Decoder, Encoder, Report};
pub use compile::{Program, MAX_ARRAY_DIMENSIONS};
pub use error::{DataError, NdrError, Result, MAX_NDR_ARRAY_ELEMENTS};
pub use format::{
    CharacterRepresentation, FloatRepresentation, FormatLabel, IntegerRepresentation, BE_ASCII_IEEE, LE_ASCII_IEEE,
};
pub use options::{CodecOptions, TransferSyntax};
pub use reader::NdrReader;
pub use shape::{FieldShape, Handle, Primitive, RecordShape, Referent, Shape, Value};
pub use state::{State, FIRST_REFERENT_ID};
pub use types::{FullPtr, NdrType};
pub use writer::{align_padding, NdrWriter};

/// Re-export bytes for convenience
pub use bytes::{Buf, BufMut, Bytes, BytesMut};
