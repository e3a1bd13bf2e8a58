//! Known-answer tests, each record replicated across a batch split over
//! one and two runners

mod common;

use common::assert_replicated;
use warp_digest::Algorithm;

const COPIES: usize = 229;

fn check(algorithm: Algorithm, key: &[u8], record: &[u8], expected_hex: &str) {
    assert_replicated(algorithm, key, &[1.0], record, COPIES, expected_hex);
    assert_replicated(algorithm, key, &[1.0, 1.0], record, COPIES, expected_hex);
}

#[test]
fn test_sha1_vectors() {
    check(Algorithm::Sha1, &[], b"", "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    check(Algorithm::Sha1, &[], b"abc", "a9993e364706816aba3e25717850c26c9cd0d89d");
    check(
        Algorithm::Sha1,
        &[],
        b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
        "84983e441c3bd26ebaae4aa1f95129e5e54670f1",
    );
}

#[test]
fn test_md5_vectors() {
    check(Algorithm::Md5, &[], b"", "d41d8cd98f00b204e9800998ecf8427e");
    check(Algorithm::Md5, &[], b"abc", "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn test_sha256_vectors() {
    check(
        Algorithm::Sha256,
        &[],
        b"abc",
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
    );
    check(
        Algorithm::Sha256,
        &[],
        b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
        "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
    );
}

#[test]
fn test_md2_vectors() {
    check(Algorithm::Md2, &[], b"abc", "da853b0d3f88d99b30283a69e6ded6bb");
    check(
        Algorithm::Md2,
        &[],
        b"abcdefghijklmnopqrstuvwxyz",
        "4e8ddff3650292ab5a4108c3aa47940b",
    );
}

#[test]
fn test_keccak_256_vector() {
    check(
        Algorithm::Keccak { bits: 256 },
        &[],
        b"abc",
        "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45",
    );
}

#[test]
fn test_sha3_384_vector() {
    check(
        Algorithm::Sha3 { bits: 384 },
        &[],
        b"abc",
        "ec01498288516fc926459f58e2c6ad8df9b473cb0fc08c2596da7cf0e49be4b2\
         98d88cea927ac7f539f1edf228376d25",
    );
}

#[test]
fn test_blake2b_512_keyed_vector() {
    check(
        Algorithm::Blake2b { bits: 512 },
        b"def",
        b"abc",
        "956f2f56e2308b97120bb9f50eefaa5c6a5ae4238a372e308aeb824d3166d869\
         c9a9ba32226d33ba081b235fc45c03852b262d97ce13018c55ed304d302c86b5",
    );
}

#[test]
fn test_blake2b_512_keyed_kat() {
    let key: Vec<u8> = (0..64).collect();
    let expected = [
        "10ebb67700b1868efb4417987acf4690ae9d972fb7a590c2f02871799aaa4786\
         b5e996e8f0f4eb981fc214b005f42d2ff4233499391653df7aefcbc13fc51568",
        "961f6dd1e4dd30f63901690c512e78e4b45e4742ed197c3c5e45c549fd25f2e4\
         187b0bc9fe30492b16b0d0bc4ef9b0f34c7003fac09a5ef1532e69430234cebd",
        "da2cfbe2d8409a0f38026113884f84b50156371ae304c4430173d08a99d9fb1b\
         983164a3770706d537f49e0c916d9f32b95cc37a95b99d857436f0232c88a965",
        "33d0825dddf7ada99b0e7e307104ad07ca9cfd9692214f1561356315e784f3e5\
         a17e364ae9dbb14cb2036df932b77f4b292761365fb328de7afdc6d8998f5fc1",
        "beaa5a3d08f3807143cf621d95cd690514d0b49efff9c91d24b59241ec0eefa5\
         f60196d407048bba8d2146828ebcb0488d8842fd56bb4f6df8e19c4b4daab8ac",
        "098084b51fd13deae5f4320de94a688ee07baea2800486689a8636117b46c1f4\
         c1f6af7f74ae7c857600456a58a3af251dc4723a64cc7c0a5ab6d9cac91c20bb",
    ];

    for (len, expected) in expected.iter().enumerate() {
        let record: Vec<u8> = (0..len as u8).collect();
        check(Algorithm::Blake2b { bits: 512 }, &key, &record, expected);
    }
}
