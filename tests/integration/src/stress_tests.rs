//! Stress Tests - Concurrent Use of Shared Codecs
//!
//! These tests exercise race conditions by:
//! - Encoding from many threads through a single encoder
//! - Sharing one program cache between many façades
//! - Checking data integrity of everything written

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Barrier};
use std::thread;

use dcerpc_ndr::{CodecOptions, Decoder, Encoder, ProgramCache, LE_ASCII_IEEE};
use integration_tests::*;
use tracing::info;

const NUM_THREADS: u32 = 8;
const MESSAGES_PER_THREAD: u32 = 200;

/// Test: concurrent encodes on one encoder never interleave their octets
#[test]
fn test_single_encoder_many_threads() {
    init_logging();

    let encoder = Arc::new(Encoder::new(Vec::new(), LE_ASCII_IEEE).unwrap());
    let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));
    let stats = Arc::new(ConcurrentStats::new());

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|sender| {
            let encoder = Arc::clone(&encoder);
            let barrier = Arc::clone(&barrier);
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                barrier.wait();
                for seq in 0..MESSAGES_PER_THREAD {
                    match encoder.encode(&Message::new(sender, seq)) {
                        Ok(report) if report.is_clean() => stats.record_success(),
                        Ok(report) => stats.record_failure(format!("{:?}", report.errors)),
                        Err(e) => stats.record_failure(e.to_string()),
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(stats.failures().is_empty(), "failures: {:?}", stats.failures());
    assert_eq!(stats.successes(), u64::from(NUM_THREADS * MESSAGES_PER_THREAD));
    assert_eq!(encoder.cache().len(), 1);

    let encoder = Arc::try_unwrap(encoder).expect("threads joined");
    let bytes = encoder.into_inner();
    info!(messages = stats.successes(), octets = bytes.len(), "concurrent encode finished");

    // Every message decodes intact; per-sender order is preserved.
    let decoder = Decoder::new(bytes.as_slice(), LE_ASCII_IEEE).unwrap();
    let mut next_seq = vec![0u32; NUM_THREADS as usize];
    for _ in 0..NUM_THREADS * MESSAGES_PER_THREAD {
        let message = decoder.decode::<Message>().unwrap().value;
        let expected = &mut next_seq[message.sender as usize];
        assert_eq!(message, Message::new(message.sender, *expected));
        *expected += 1;
    }
    assert_eq!(decoder.offset(), bytes.len() as u64);
    assert!(next_seq.iter().all(|n| *n == MESSAGES_PER_THREAD));
}

/// Test: many façades sharing one cache end up with a single program
#[test]
fn test_shared_cache_across_encoders() {
    init_logging();

    let cache = Arc::new(ProgramCache::new());
    let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|sender| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let encoder =
                    Encoder::with_cache(Vec::new(), LE_ASCII_IEEE, CodecOptions::default(), cache).unwrap();
                barrier.wait();
                for seq in 0..20 {
                    encoder.encode(&Message::new(sender, seq)).unwrap();
                    encoder
                        .encode(&Window {
                            first: 0,
                            last: seq % 3,
                            data: vec![1, 2, 3],
                        })
                        .unwrap();
                }
                encoder.into_inner()
            })
        })
        .collect();

    let outputs: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(cache.len(), 2);

    // Outputs differ only by sender, so they have equal lengths.
    let lengths: HashSet<usize> = outputs.iter().map(Vec::len).collect();
    assert_eq!(lengths.len(), 1);
}

/// Test: concurrent decodes on one decoder each take whole values
#[test]
fn test_single_decoder_many_threads() {
    init_logging();

    let total = NUM_THREADS * 50;
    let encoder = Encoder::new(Vec::new(), LE_ASCII_IEEE).unwrap();
    for seq in 0..total {
        encoder.encode(&Message::new(seq % NUM_THREADS, seq)).unwrap();
    }
    let bytes = encoder.into_inner();
    let len = bytes.len() as u64;

    let decoder = Arc::new(Decoder::new(Cursor::new(bytes), LE_ASCII_IEEE).unwrap());
    let barrier = Arc::new(Barrier::new(NUM_THREADS as usize));
    let stats = Arc::new(ConcurrentStats::new());

    let handles: Vec<_> = (0..NUM_THREADS)
        .map(|_| {
            let decoder = Arc::clone(&decoder);
            let barrier = Arc::clone(&barrier);
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                barrier.wait();
                let mut seen = Vec::new();
                for _ in 0..50 {
                    match decoder.decode::<Message>() {
                        Ok(decoded) if decoded.report.is_clean() => {
                            stats.record_success();
                            seen.push(decoded.value);
                        }
                        Ok(decoded) => stats.record_failure(format!("{:?}", decoded.report.errors)),
                        Err(e) => stats.record_failure(e.to_string()),
                    }
                }
                seen
            })
        })
        .collect();

    let mut seqs = HashSet::new();
    for handle in handles {
        for message in handle.join().unwrap() {
            assert_eq!(message, Message::new(message.sender, message.seq));
            assert!(seqs.insert(message.seq), "duplicate message {}", message.seq);
        }
    }

    assert!(stats.failures().is_empty(), "failures: {:?}", stats.failures());
    assert_eq!(stats.successes(), u64::from(total));
    assert_eq!(seqs.len(), total as usize);
    assert_eq!(decoder.offset(), len);
}
