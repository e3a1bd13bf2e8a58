//! MD2 (RFC 1319)

use super::HashKernel;

const BLOCK: usize = 16;

/// Substitution table built from the digits of pi
const PI_SUBST: [u8; 256] = [
    41, 46, 67, 201, 162, 216, 124, 1, 61, 54, 84, 161, 236, 240, 6, 19, 98, 167, 5, 243, 192,
    199, 115, 140, 152, 147, 43, 217, 188, 76, 130, 202, 30, 155, 87, 60, 253, 212, 224, 22, 103,
    66, 111, 24, 138, 23, 229, 18, 190, 78, 196, 214, 218, 158, 222, 73, 160, 251, 245, 142, 187,
    47, 238, 122, 169, 104, 121, 145, 21, 178, 7, 63, 148, 194, 16, 137, 11, 34, 95, 33, 128, 127,
    93, 154, 90, 144, 50, 39, 53, 62, 204, 231, 191, 247, 151, 3, 255, 25, 48, 179, 72, 165, 181,
    209, 215, 94, 146, 42, 172, 86, 170, 198, 79, 184, 56, 210, 150, 164, 125, 182, 118, 252, 107,
    226, 156, 116, 4, 241, 69, 157, 112, 89, 100, 113, 135, 32, 134, 91, 207, 101, 230, 45, 168, 2,
    27, 96, 37, 173, 174, 176, 185, 246, 28, 70, 97, 105, 52, 64, 126, 15, 85, 71, 163, 35, 221,
    81, 175, 58, 195, 92, 249, 206, 186, 197, 234, 38, 44, 83, 13, 110, 133, 40, 132, 9, 211, 223,
    205, 244, 65, 129, 77, 82, 106, 220, 55, 200, 108, 193, 171, 250, 36, 225, 123, 8, 12, 189,
    177, 74, 120, 136, 149, 139, 227, 99, 232, 109, 233, 203, 213, 254, 59, 0, 29, 57, 242, 239,
    183, 14, 102, 88, 208, 228, 166, 119, 114, 248, 235, 117, 75, 10, 49, 68, 80, 180, 143, 237,
    31, 26, 219, 153, 141, 51, 159, 17, 131, 20,
];

/// MD2 kernel, reads the staged substitution table
#[derive(Debug, Clone, Copy, Default)]
pub struct Md2Kernel;

struct State {
    x: [u8; 48],
    checksum: [u8; BLOCK],
}

impl State {
    fn transform(&mut self, s: &[u8; 256], block: &[u8; BLOCK]) {
        for j in 0..BLOCK {
            self.x[BLOCK + j] = block[j];
            self.x[2 * BLOCK + j] = block[j] ^ self.x[j];
        }

        let mut t = 0u8;
        for j in 0..18u8 {
            for k in 0..48 {
                self.x[k] ^= s[t as usize];
                t = self.x[k];
            }
            t = t.wrapping_add(j);
        }

        let mut l = self.checksum[BLOCK - 1];
        for j in 0..BLOCK {
            self.checksum[j] ^= s[(block[j] ^ l) as usize];
            l = self.checksum[j];
        }
    }
}

impl HashKernel for Md2Kernel {
    type Tables = [u8; 256];

    fn output_size(&self) -> usize {
        16
    }

    fn constants(&self) -> Vec<u8> {
        PI_SUBST.to_vec()
    }

    fn load(&self, staged: &[u8]) -> Result<[u8; 256], String> {
        staged
            .get(..256)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| format!("md2 tables hold {} bytes, 256 expected", staged.len()))
    }

    fn digest(&self, s: &[u8; 256], record: &[u8], out: &mut [u8]) {
        let mut state = State {
            x: [0; 48],
            checksum: [0; BLOCK],
        };

        let mut blocks = record.chunks_exact(BLOCK);
        for block in &mut blocks {
            let mut b = [0u8; BLOCK];
            b.copy_from_slice(block);
            state.transform(s, &b);
        }

        let tail = blocks.remainder();
        let pad = (BLOCK - tail.len()) as u8;
        let mut last = [pad; BLOCK];
        last[..tail.len()].copy_from_slice(tail);
        state.transform(s, &last);

        let checksum = state.checksum;
        state.transform(s, &checksum);

        out.copy_from_slice(&state.x[..BLOCK]);
    }
}
