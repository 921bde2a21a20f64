//! Shared fixtures for the NDR codec integration tests
//!
//! Run a single category:
//! ```text
//! cargo test -p integration-tests --test codec_tests
//! cargo test -p integration-tests --test complex_types_tests
//! cargo test -p integration-tests --test stress_tests
//! ```
//!
//! Run with increased logging:
//! ```text
//! RUST_LOG=dcerpc_ndr=trace cargo test -p integration-tests
//! ```

use dcerpc_ndr::{ndr_record, Decoded, Decoder, Encoder, FormatLabel, FullPtr, NdrType, Report};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Install a test-friendly subscriber once per test binary.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Encode one value into a fresh buffer.
pub fn encode_one<T: NdrType>(format: FormatLabel, value: &T) -> (Vec<u8>, Report) {
    let encoder = Encoder::new(Vec::new(), format).expect("supported format");
    let report = encoder.encode(value).expect("encode");
    (encoder.into_inner(), report)
}

/// Decode one value, asserting the whole buffer was consumed.
pub fn decode_one<T: NdrType>(format: FormatLabel, bytes: &[u8]) -> Decoded<T> {
    let decoder = Decoder::new(bytes, format).expect("supported format");
    let decoded = decoder.decode::<T>().expect("decode");
    assert_eq!(decoder.offset(), bytes.len() as u64, "trailing octets");
    decoded
}

ndr_record! {
    /// `{A: uint8, B: uint32}`
    #[derive(Debug, Clone, PartialEq)]
    pub struct Pair {
        pub a: u8,
        pub b: u32,
    }
}

ndr_record! {
    /// Every primitive kind once
    #[derive(Debug, Clone, PartialEq)]
    pub struct Primitives {
        pub flag: bool,
        pub small: i8,
        pub byte: u8,
        pub short: i16,
        pub ushort: u16,
        pub long: i32,
        pub ulong: u32,
        pub hyper: i64,
        pub uhyper: u64,
        pub single: f32,
        pub double: f64,
    }
}

ndr_record! {
    /// Varying array delimited by first and last index
    #[derive(Debug, Clone, PartialEq)]
    pub struct Window {
        pub first: u32,
        pub last: u32,
        #[idl("first_is(first), last_is(last)")]
        pub data: Vec<u16>,
    }
}

ndr_record! {
    /// Conformant trailing array
    #[derive(Debug, Clone, PartialEq)]
    pub struct Blob {
        pub size: u32,
        #[idl("size_is(size)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Record ending in a conformant record
    #[derive(Debug, Clone, PartialEq)]
    pub struct Envelope {
        pub tag: u16,
        pub body: Blob,
    }
}

ndr_record! {
    /// Conformant varying array followed by another field
    #[derive(Debug, Clone, PartialEq)]
    pub struct Counted {
        pub max: u32,
        pub len: u32,
        #[idl("size_is(max), length_is(len)")]
        pub items: Vec<i32>,
        pub checksum: u16,
    }
}

ndr_record! {
    /// Conformant trailing array with a lower and an upper bound
    #[derive(Debug, Clone, PartialEq)]
    pub struct Span {
        pub lo: u32,
        pub hi: u32,
        #[idl("min_is(lo), max_is(hi)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Lower and upper bound carried inline, before a trailing field
    #[derive(Debug, Clone, PartialEq)]
    pub struct InlineSpan {
        pub lo: u32,
        pub hi: u32,
        #[idl("min_is(lo), max_is(hi)")]
        pub data: Vec<u8>,
        pub tail: u8,
    }
}

ndr_record! {
    /// Varying array whose last index must not fall below its minimum
    #[derive(Debug, Clone, PartialEq)]
    pub struct Floor {
        pub lo: u32,
        pub last: u32,
        #[idl("min_is(lo), last_is(last)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Window delimited by 64-bit indices
    #[derive(Debug, Clone, PartialEq)]
    pub struct WideWindow {
        pub first: u64,
        pub last: u64,
        #[idl("first_is(first), last_is(last)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Conformant array sized by a 64-bit field
    #[derive(Debug, Clone, PartialEq)]
    pub struct WideBlob {
        pub size: u64,
        #[idl("size_is(size)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Varying array starting at a 64-bit index
    #[derive(Debug, Clone, PartialEq)]
    pub struct WideFirst {
        pub first: u64,
        #[idl("first_is(first)")]
        pub data: Vec<u8>,
    }
}

ndr_record! {
    /// Linked node with an untransmitted back pointer
    #[derive(Debug, Clone, PartialEq)]
    pub struct Node {
        pub value: i32,
        #[idl("ignore")]
        pub parent: FullPtr<i32>,
        pub next: FullPtr<i32>,
    }
}

ndr_record! {
    /// Ragged two-dimensional sequence
    #[derive(Debug, Clone, PartialEq)]
    pub struct Grid {
        pub rows: Vec<Vec<i16>>,
    }
}

ndr_record! {
    /// Fixed two-dimensional array
    #[derive(Debug, Clone, PartialEq)]
    pub struct Matrix {
        pub cells: [[u8; 3]; 2],
        pub label: String,
    }
}

ndr_record! {
    /// Message exchanged by the stress tests
    #[derive(Debug, Clone, PartialEq)]
    pub struct Message {
        pub sender: u32,
        pub seq: u32,
        pub payload: Vec<u8>,
        pub note: String,
    }
}

impl Message {
    pub fn new(sender: u32, seq: u32) -> Self {
        Self {
            sender,
            seq,
            payload: (0..(seq % 17) as u8).collect(),
            note: format!("sender {} message {}", sender, seq),
        }
    }
}

/// Counters shared by concurrent workers
#[derive(Debug, Default)]
pub struct ConcurrentStats {
    successes: AtomicU64,
    failures: Mutex<Vec<String>>,
}

impl ConcurrentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, reason: impl Into<String>) {
        self.failures.lock().push(reason.into());
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}
