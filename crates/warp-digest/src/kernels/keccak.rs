//! Keccak-f[1600] sponge, original Keccak and FIPS 202 SHA-3 padding

use super::{read_words, HashKernel};

const ROUNDS: usize = 24;

const RC: [u64; ROUNDS] = [
    0x0000_0000_0000_0001,
    0x0000_0000_0000_8082,
    0x8000_0000_0000_808a,
    0x8000_0000_8000_8000,
    0x0000_0000_0000_808b,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8009,
    0x0000_0000_0000_008a,
    0x0000_0000_0000_0088,
    0x0000_0000_8000_8009,
    0x0000_0000_8000_000a,
    0x0000_0000_8000_808b,
    0x8000_0000_0000_008b,
    0x8000_0000_0000_8089,
    0x8000_0000_0000_8003,
    0x8000_0000_0000_8002,
    0x8000_0000_0000_0080,
    0x0000_0000_0000_800a,
    0x8000_0000_8000_000a,
    0x8000_0000_8000_8081,
    0x8000_0000_0000_8080,
    0x0000_0000_8000_0001,
    0x8000_0000_8000_8008,
];

// Rotation offsets and lane order of the combined rho and pi steps
const RHO: [u32; 24] = [
    1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62, 18, 39, 61, 20, 44,
];
const PI: [usize; 24] = [
    10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20, 14, 22, 9, 6, 1,
];

/// Domain separation byte of the original Keccak submission
const KECCAK_SUFFIX: u8 = 0x01;
/// Domain separation byte of FIPS 202 SHA-3
const SHA3_SUFFIX: u8 = 0x06;

fn keccak_f(state: &mut [u64; 25], rc: &[u64; ROUNDS]) {
    for &round_constant in rc {
        // theta
        let mut c = [0u64; 5];
        for (x, column) in c.iter_mut().enumerate() {
            *column = state[x] ^ state[x + 5] ^ state[x + 10] ^ state[x + 15] ^ state[x + 20];
        }
        for x in 0..5 {
            let d = c[(x + 4) % 5] ^ c[(x + 1) % 5].rotate_left(1);
            for y in (0..25).step_by(5) {
                state[y + x] ^= d;
            }
        }

        // rho and pi
        let mut last = state[1];
        for (&rot, &lane) in RHO.iter().zip(PI.iter()) {
            let next = state[lane];
            state[lane] = last.rotate_left(rot);
            last = next;
        }

        // chi
        for y in (0..25).step_by(5) {
            let row = [state[y], state[y + 1], state[y + 2], state[y + 3], state[y + 4]];
            for x in 0..5 {
                state[y + x] = row[x] ^ (!row[(x + 1) % 5] & row[(x + 2) % 5]);
            }
        }

        // iota
        state[0] ^= round_constant;
    }
}

/// Keccak sponge kernel for both padding variants
#[derive(Debug, Clone, Copy)]
pub struct KeccakKernel {
    output_len: usize,
    suffix: u8,
}

impl KeccakKernel {
    /// Original Keccak padding with a `bits`-bit output
    pub fn keccak(bits: u32) -> Self {
        Self {
            output_len: (bits >> 3) as usize,
            suffix: KECCAK_SUFFIX,
        }
    }

    /// SHA-3 padding with a `bits`-bit output
    pub fn sha3(bits: u32) -> Self {
        Self {
            output_len: (bits >> 3) as usize,
            suffix: SHA3_SUFFIX,
        }
    }

    /// Sponge rate in bytes, capacity is twice the output
    fn rate(&self) -> usize {
        200 - 2 * self.output_len
    }

    fn absorb(state: &mut [u64; 25], block: &[u8]) {
        for (lane, bytes) in state.iter_mut().zip(block.chunks_exact(8)) {
            let mut word = [0u8; 8];
            word.copy_from_slice(bytes);
            *lane ^= u64::from_le_bytes(word);
        }
    }
}

impl HashKernel for KeccakKernel {
    type Tables = [u64; ROUNDS];

    fn output_size(&self) -> usize {
        self.output_len
    }

    fn constants(&self) -> Vec<u8> {
        RC.iter().flat_map(|rc| rc.to_le_bytes()).collect()
    }

    fn load(&self, staged: &[u8]) -> Result<[u64; ROUNDS], String> {
        let words = read_words::<ROUNDS, 8>(staged, "keccak")?;
        Ok(words.map(u64::from_le_bytes))
    }

    fn digest(&self, rc: &[u64; ROUNDS], record: &[u8], out: &mut [u8]) {
        let rate = self.rate();
        let mut state = [0u64; 25];

        let mut blocks = record.chunks_exact(rate);
        for block in &mut blocks {
            Self::absorb(&mut state, block);
            keccak_f(&mut state, rc);
        }

        let tail = blocks.remainder();
        let mut last = [0u8; 200];
        last[..tail.len()].copy_from_slice(tail);
        last[tail.len()] ^= self.suffix;
        last[rate - 1] ^= 0x80;
        Self::absorb(&mut state, &last[..rate]);
        keccak_f(&mut state, rc);

        // Output never exceeds the rate, one squeeze suffices
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = (state[i / 8] >> (8 * (i % 8))) as u8;
        }
    }
}
