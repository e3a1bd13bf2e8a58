#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Once;
use tracing_subscriber::EnvFilter;
use warp_device::{HostBuffer, Queue};
use warp_digest::{Algorithm, Hasher, Runner};

static INIT: Once = Once::new();

pub fn setup_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// One CPU queue per weight
pub fn runners(weights: &[f64]) -> Vec<Runner> {
    weights
        .iter()
        .enumerate()
        .map(|(i, &w)| Runner::new(Queue::cpu(format!("cpu{}", i)).unwrap(), w))
        .collect()
}

/// Hash `records` (all the same length) and return one digest per record
pub fn hash_records(
    algorithm: Algorithm,
    key: &[u8],
    runners: &[Runner],
    records: &[Vec<u8>],
) -> Vec<Vec<u8>> {
    let record_len = records.first().map_or(0, Vec::len);
    let input = Bytes::from(records.concat());
    let out_size = algorithm.output_size();
    let output = HostBuffer::zeroed(out_size * records.len());

    let hasher = Hasher::with_key(algorithm, runners, key).unwrap();
    hasher
        .compute(&input, record_len as u32, &output, records.len() as u32)
        .unwrap();

    output.chunks(out_size)
}

/// Hash `record` replicated `copies` times and check every digest
pub fn assert_replicated(
    algorithm: Algorithm,
    key: &[u8],
    weights: &[f64],
    record: &[u8],
    copies: usize,
    expected_hex: &str,
) {
    setup_test_logger();
    let records = vec![record.to_vec(); copies];
    let digests = hash_records(algorithm, key, &runners(weights), &records);
    assert_eq!(digests.len(), copies);
    for (i, digest) in digests.iter().enumerate() {
        assert_eq!(hex::encode(digest), expected_hex, "{} record {}", algorithm, i);
    }
}
