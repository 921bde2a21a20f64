//! Complex Types Tests - Bounded, Nested and Pointer Types
//!
//! These tests exercise complex data type handling:
//! - Conformant structures, nested and not
//! - Conformant varying arrays
//! - Ragged multi-dimensional sequences
//! - Full pointers with aliasing, and ignored pointer fields
//! - NDR64 framing and bounds wider than the wire
//! - Decoder limits and strict mode

use dcerpc_ndr::{
    to_bytes, CodecOptions, DataError, Decoder, Encoder, FullPtr, NdrError, RecordShape, Shape, TransferSyntax, Value,
    BE_ASCII_IEEE, LE_ASCII_IEEE,
};
use integration_tests::*;

/// Test: the bound of a nested trailing conformant array precedes the outer record
#[test]
fn test_nested_conformant_prefix() {
    init_logging();

    let envelope = Envelope {
        tag: 0x0102,
        body: Blob {
            size: 3,
            data: vec![1, 2, 3],
        },
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &envelope);
    assert!(report.is_clean());
    assert_eq!(
        bytes,
        vec![
            3, 0, 0, 0, // size_is(size), hoisted
            2, 1, 0, 0, // tag + padding
            3, 0, 0, 0, // size
            0, 0, 0, 0, 3, 0, 0, 0, // offset, count
            1, 2, 3,
        ]
    );
    assert_eq!(decode_one::<Envelope>(LE_ASCII_IEEE, &bytes).value, envelope);
}

/// Test: a conformant array that is not last carries its bound inline
#[test]
fn test_conformant_varying_inline() {
    init_logging();

    let counted = Counted {
        max: 4,
        len: 3,
        items: vec![1, -2, 3, -4],
        checksum: 0xA55A,
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &counted);
    assert!(report.is_clean());
    assert_eq!(bytes.len(), 34);
    assert_eq!(&bytes[8..20], &[4, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0]);
    assert_eq!(&bytes[32..], &[0x5A, 0xA5]);

    let decoded = decode_one::<Counted>(LE_ASCII_IEEE, &bytes).value;
    assert_eq!(decoded.items, vec![1, -2, 3]);
    assert_eq!(decoded.checksum, 0xA55A);
}

/// Test: short rows of a ragged grid are zero filled to the longest row
#[test]
fn test_ragged_grid() {
    init_logging();

    let grid = Grid {
        rows: vec![vec![1], vec![2, 3, 4]],
    };
    let (bytes, _) = encode_one(BE_ASCII_IEEE, &grid);
    assert_eq!(&bytes[..16], &[0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 3]);
    assert_eq!(&bytes[16..], &[0, 1, 0, 0, 0, 0, 0, 2, 0, 3, 0, 4]);

    let decoded = decode_one::<Grid>(BE_ASCII_IEEE, &bytes).value;
    assert_eq!(decoded.rows, vec![vec![1, 0, 0], vec![2, 3, 4]]);
}

/// Test: fixed two-dimensional arrays are written row by row without framing
#[test]
fn test_fixed_matrix() {
    init_logging();

    let matrix = Matrix {
        cells: [[1, 2, 3], [4, 5, 6]],
        label: "m".into(),
    };
    let (bytes, _) = encode_one(LE_ASCII_IEEE, &matrix);
    assert_eq!(&bytes[..8], &[1, 2, 3, 4, 5, 6, 0, 0]);
    assert_eq!(bytes.len(), 17);
    assert_eq!(decode_one::<Matrix>(LE_ASCII_IEEE, &bytes).value, matrix);
}

/// Test: a target shared by two full pointers is transmitted once
#[test]
fn test_aliased_full_pointers() {
    init_logging();

    let pointers = vec![
        FullPtr::new(7, String::from("ab")),
        FullPtr::new(7, String::from("ab")),
        FullPtr::null(),
        FullPtr::new(8, String::from("cd")),
    ];
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &pointers);
    assert!(report.is_clean());
    assert_eq!(bytes.len(), 46);
    assert_eq!(bytes.windows(2).filter(|w| w == b"ab").count(), 1);
    assert_eq!(&bytes[24..32], &[1, 0, 0, 0, 0, 0, 0, 0]);

    let decoded = decode_one::<Vec<FullPtr<String>>>(LE_ASCII_IEEE, &bytes).value;
    assert_eq!(
        decoded,
        vec![
            FullPtr::new(1, String::from("ab")),
            FullPtr::new(1, String::from("ab")),
            FullPtr::null(),
            FullPtr::new(2, String::from("cd")),
        ]
    );
}

/// Test: ignored pointer fields occupy no octets and decode as null
#[test]
fn test_ignored_pointer_field() {
    init_logging();

    let node = Node {
        value: 5,
        parent: FullPtr::new(1, 9),
        next: FullPtr::new(2, 10),
    };
    let (bytes, _) = encode_one(LE_ASCII_IEEE, &node);
    assert_eq!(bytes, vec![5, 0, 0, 0, 1, 0, 0, 0, 10, 0, 0, 0]);

    let decoded = decode_one::<Node>(LE_ASCII_IEEE, &bytes).value;
    assert!(decoded.parent.is_null());
    assert_eq!(decoded.next.as_ref(), Some(&10));
}

/// Test: NDR64 widens bounds, offsets and counts to eight octets
#[test]
fn test_ndr64_framing() {
    init_logging();

    let blob = Blob {
        size: 2,
        data: vec![5, 6],
    };
    let encoder = Encoder::with_options(Vec::new(), LE_ASCII_IEEE, CodecOptions::ndr64()).unwrap();
    encoder.encode(&blob).unwrap();
    let bytes = encoder.into_inner();
    assert_eq!(bytes.len(), 34);
    assert_eq!(&bytes[..8], &[2, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(&bytes[24..32], &[2, 0, 0, 0, 0, 0, 0, 0]);

    let decoder = Decoder::with_options(bytes.as_slice(), LE_ASCII_IEEE, CodecOptions::ndr64()).unwrap();
    assert_eq!(decoder.decode::<Blob>().unwrap().value, blob);
}

/// Test: the same program encodes differently per transfer syntax
#[test]
fn test_syntax_changes_layout() {
    let ndr = Encoder::new(Vec::new(), BE_ASCII_IEEE).unwrap();
    let ndr64 = Encoder::with_options(
        Vec::new(),
        BE_ASCII_IEEE,
        CodecOptions::default().with_syntax(TransferSyntax::Ndr64),
    )
    .unwrap();
    ndr.encode(&vec![1u8]).unwrap();
    ndr64.encode(&vec![1u8]).unwrap();
    assert_eq!(ndr.offset(), 9);
    assert_eq!(ndr64.offset(), 17);
}

/// Test: decoders refuse element counts above their limit
#[test]
fn test_decode_allocation_limit() {
    init_logging();

    let (bytes, _) = encode_one(LE_ASCII_IEEE, &vec![0u8; 10]);
    let decoder = Decoder::with_options(
        bytes.as_slice(),
        LE_ASCII_IEEE,
        CodecOptions::default().with_max_elements(4),
    )
    .unwrap();
    assert!(matches!(
        decoder.decode::<Vec<u8>>(),
        Err(NdrError::AllocationLimitExceeded { requested: 10, limit: 4 })
    ));
}

/// Test: non-ASCII octets are reported, and refused in strict mode
#[test]
fn test_non_ascii_text() {
    init_logging();

    let bytes = [0u8, 0, 0, 0, 2, 0, 0, 0, b'o', 0xFF];

    let lenient = Decoder::new(&bytes[..], LE_ASCII_IEEE).unwrap();
    let decoded = lenient.decode::<String>().unwrap();
    assert_eq!(decoded.value, "o?");
    assert_eq!(decoded.report.errors, vec![DataError::NonAsciiCharacter { count: 1 }]);

    let strict = Decoder::with_options(&bytes[..], LE_ASCII_IEEE, CodecOptions::default().with_strict(true)).unwrap();
    assert!(matches!(strict.decode::<String>(), Err(NdrError::Data(_))));
}

/// Test: dynamic shapes report structural errors before writing anything
#[test]
fn test_dynamic_structural_errors() {
    init_logging();

    let shape = Shape::record(
        RecordShape::new("Broken")
            .field("len", Shape::Primitive(dcerpc_ndr::Primitive::Uint32), "")
            .field(
                "data",
                Shape::sequence(Shape::Primitive(dcerpc_ndr::Primitive::Uint8)),
                "last_is(len), length_is(len)",
            ),
    );
    let encoder = Encoder::new(Vec::new(), LE_ASCII_IEEE).unwrap();
    let err = encoder
        .encode_value(&shape, &Value::Record(vec![Value::Uint32(0), Value::Sequence(vec![])]))
        .unwrap_err();
    assert_eq!(err.code(), Some(1001));
    assert_eq!(encoder.offset(), 0);
}

/// Test: min_is and max_is transmit two bounds, minimum first
#[test]
fn test_min_max_bounds() {
    init_logging();

    let span = Span {
        lo: 1,
        hi: 3,
        data: vec![7, 8],
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &span);
    assert!(report.is_clean());
    assert_eq!(
        bytes,
        vec![
            1, 0, 0, 0, 3, 0, 0, 0, // min_is(lo), max_is(hi), hoisted
            1, 0, 0, 0, 3, 0, 0, 0, // lo, hi
            0, 0, 0, 0, 2, 0, 0, 0, // offset, count
            7, 8,
        ]
    );
    assert_eq!(decode_one::<Span>(LE_ASCII_IEEE, &bytes).value, span);

    let inline = InlineSpan {
        lo: 1,
        hi: 3,
        data: vec![7, 8],
        tail: 9,
    };
    let (bytes, report) = encode_one(BE_ASCII_IEEE, &inline);
    assert!(report.is_clean());
    assert_eq!(bytes.len(), 27);
    assert_eq!(&bytes[8..16], &[0, 0, 0, 1, 0, 0, 0, 3]);
    assert_eq!(&bytes[24..], &[7, 8, 9]);
    assert_eq!(decode_one::<InlineSpan>(BE_ASCII_IEEE, &bytes).value, inline);
}

/// Test: last_is below min_is falls back to an empty window
#[test]
fn test_last_less_than_min() {
    init_logging();

    let floor = Floor {
        lo: 3,
        last: 1,
        data: vec![1, 2, 3],
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &floor);
    assert_eq!(bytes.len(), 20);
    assert_eq!(&bytes[12..], &[0; 8]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].code(), 2001);
    assert!(decode_one::<Floor>(LE_ASCII_IEEE, &bytes).value.data.is_empty());
}

/// Test: a window past the signed 64-bit range is reported, not computed
#[test]
fn test_window_past_signed_range() {
    init_logging();

    for last in [u64::MAX, i64::MAX as u64] {
        let window = WideWindow {
            first: 0,
            last,
            data: vec![],
        };
        for options in [CodecOptions::default(), CodecOptions::ndr64()] {
            let encoder = Encoder::with_options(Vec::new(), LE_ASCII_IEEE, options.clone()).unwrap();
            let report = encoder.encode(&window).unwrap();
            assert!(matches!(
                &report.errors[..],
                [DataError::BoundOverflow { reference, .. }] if reference == "last"
            ));

            let bytes = encoder.into_inner();
            let width = options.syntax.length_size();
            assert_eq!(&bytes[16..], &vec![0u8; 2 * width][..]);

            let decoder = Decoder::with_options(bytes.as_slice(), LE_ASCII_IEEE, options).unwrap();
            assert!(decoder.decode::<WideWindow>().unwrap().value.data.is_empty());
        }
    }
}

/// Test: NDR bounds and offsets above u32::MAX are reported and sent as zero
#[test]
fn test_bounds_beyond_ndr_width() {
    init_logging();

    let blob = WideBlob {
        size: 1 << 32,
        data: vec![],
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &blob);
    assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
    assert!(matches!(
        &report.errors[..],
        [DataError::BoundOverflow { value: 0x1_0000_0000, limit: 0xFFFF_FFFF, .. }]
    ));

    let first = WideFirst {
        first: 1 << 32,
        data: vec![],
    };
    let (bytes, report) = encode_one(LE_ASCII_IEEE, &first);
    assert_eq!(bytes, vec![0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(report.errors[0].code(), 2010);
    assert!(decode_one::<WideFirst>(LE_ASCII_IEEE, &bytes).value.data.is_empty());

    assert!(matches!(
        to_bytes(LE_ASCII_IEEE, &first),
        Err(NdrError::Data(errors)) if errors[0].code() == 2010
    ));

    // NDR64 carries the same values.
    let encoder = Encoder::with_options(Vec::new(), LE_ASCII_IEEE, CodecOptions::ndr64()).unwrap();
    assert!(encoder.encode(&blob).unwrap().is_clean());
    assert_eq!(&encoder.into_inner()[..8], &[0, 0, 0, 0, 1, 0, 0, 0]);
}

