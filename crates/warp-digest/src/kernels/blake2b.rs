//! BLAKE2b (RFC 7693), keyed or unkeyed, 1 to 64 byte output
//!
//! Staged layout: IV (64 bytes), sigma schedule (12 x 16 bytes), initial
//! chaining value with the parameter block applied (64 bytes) and, for keyed
//! hashing, the zero-padded key block (128 bytes). The last two form the
//! keyed context, computed once per device instead of once per record.

use super::{read_words, HashKernel};

const BLOCK: usize = 128;
const IV_BYTES: usize = 64;
const SIGMA_BYTES: usize = 12 * 16;
const CONTEXT_BYTES: usize = IV_BYTES + SIGMA_BYTES + 64;

const IV: [u64; 8] = [
    0x6a09_e667_f3bc_c908,
    0xbb67_ae85_84ca_a73b,
    0x3c6e_f372_fe94_f82b,
    0xa54f_f53a_5f1d_36f1,
    0x510e_527f_ade6_82d1,
    0x9b05_688c_2b3e_6c1f,
    0x1f83_d9ab_fb41_bd6b,
    0x5be0_cd19_137e_2179,
];

const SIGMA: [[u8; 16]; 12] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
];

/// Decoded BLAKE2b tables and keyed context
pub struct Blake2bTables {
    iv: [u64; 8],
    sigma: [[u8; 16]; 12],
    h0: [u64; 8],
    key_block: Option<[u8; BLOCK]>,
}

/// BLAKE2b kernel
#[derive(Debug, Clone)]
pub struct Blake2bKernel {
    output_len: usize,
    key: Vec<u8>,
}

impl Blake2bKernel {
    /// Kernel producing `bits`-bit digests
    ///
    /// Whether hashing is keyed is decided by the staged context.
    pub fn new(bits: u32) -> Self {
        Self::with_key(bits, &[])
    }

    /// Kernel whose staged context carries `key`
    pub fn with_key(bits: u32, key: &[u8]) -> Self {
        Self {
            output_len: (bits >> 3) as usize,
            key: key.to_vec(),
        }
    }
}

#[inline(always)]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

fn compress(tables: &Blake2bTables, h: &mut [u64; 8], block: &[u8; BLOCK], t: u128, last: bool) {
    let mut m = [0u64; 16];
    for (word, bytes) in m.iter_mut().zip(block.chunks_exact(8)) {
        let mut le = [0u8; 8];
        le.copy_from_slice(bytes);
        *word = u64::from_le_bytes(le);
    }

    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&tables.iv);
    v[12] ^= t as u64;
    v[13] ^= (t >> 64) as u64;
    if last {
        v[14] = !v[14];
    }

    for s in &tables.sigma {
        let s = s.map(usize::from);
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

impl HashKernel for Blake2bKernel {
    type Tables = Blake2bTables;

    fn output_size(&self) -> usize {
        self.output_len
    }

    fn constants(&self) -> Vec<u8> {
        let mut h0 = IV;
        h0[0] ^= 0x0101_0000 ^ ((self.key.len() as u64) << 8) ^ self.output_len as u64;

        let mut blob = Vec::with_capacity(CONTEXT_BYTES + BLOCK);
        blob.extend(IV.iter().flat_map(|w| w.to_le_bytes()));
        blob.extend(SIGMA.iter().flatten());
        blob.extend(h0.iter().flat_map(|w| w.to_le_bytes()));
        if !self.key.is_empty() {
            let mut key_block = [0u8; BLOCK];
            key_block[..self.key.len()].copy_from_slice(&self.key);
            blob.extend_from_slice(&key_block);
        }
        blob
    }

    fn load(&self, staged: &[u8]) -> Result<Blake2bTables, String> {
        let keyed = match staged.len() {
            CONTEXT_BYTES => false,
            n if n == CONTEXT_BYTES + BLOCK => true,
            n => {
                return Err(format!(
                    "blake2b tables hold {} bytes, {} or {} expected",
                    n,
                    CONTEXT_BYTES,
                    CONTEXT_BYTES + BLOCK
                ))
            }
        };

        let iv = read_words::<8, 8>(staged, "blake2b")?.map(u64::from_le_bytes);
        let sigma = read_words::<12, 16>(&staged[IV_BYTES..], "blake2b")?;
        if sigma.iter().flatten().any(|&i| i >= 16) {
            return Err("blake2b sigma schedule out of range".to_string());
        }
        let h0 = read_words::<8, 8>(&staged[IV_BYTES + SIGMA_BYTES..], "blake2b")?
            .map(u64::from_le_bytes);
        let key_block = if keyed {
            Some(read_words::<1, BLOCK>(&staged[CONTEXT_BYTES..], "blake2b")?[0])
        } else {
            None
        };

        Ok(Blake2bTables {
            iv,
            sigma,
            h0,
            key_block,
        })
    }

    fn digest(&self, tables: &Blake2bTables, record: &[u8], out: &mut [u8]) {
        let mut h = tables.h0;
        let mut t: u128 = 0;

        if let Some(key_block) = &tables.key_block {
            t += BLOCK as u128;
            compress(tables, &mut h, key_block, t, record.is_empty());
        }

        if !record.is_empty() || tables.key_block.is_none() {
            // Every block but the last, which is always finalised even when full
            let split = record.len().saturating_sub(1) / BLOCK * BLOCK;
            let (body, tail) = record.split_at(split);
            for chunk in body.chunks_exact(BLOCK) {
                let mut block = [0u8; BLOCK];
                block.copy_from_slice(chunk);
                t += BLOCK as u128;
                compress(tables, &mut h, &block, t, false);
            }
            let mut block = [0u8; BLOCK];
            block[..tail.len()].copy_from_slice(tail);
            t += tail.len() as u128;
            compress(tables, &mut h, &block, t, true);
        }

        for (i, byte) in out.iter_mut().enumerate() {
            *byte = (h[i / 8] >> (8 * (i % 8))) as u8;
        }
    }
}
