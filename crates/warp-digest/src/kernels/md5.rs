//! MD5

use super::HashKernel;
use ::md5::{Digest, Md5};

/// MD5 kernel, needs no staged tables
#[derive(Debug, Clone, Copy, Default)]
pub struct Md5Kernel;

impl HashKernel for Md5Kernel {
    type Tables = ();

    fn output_size(&self) -> usize {
        16
    }

    fn load(&self, _staged: &[u8]) -> Result<(), String> {
        Ok(())
    }

    fn digest(&self, _tables: &(), record: &[u8], out: &mut [u8]) {
        out.copy_from_slice(&Md5::digest(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_stages_nothing() {
        assert!(Md5Kernel.constants().is_empty());
    }

    #[test]
    fn test_md5_digest() {
        let mut out = [0u8; 16];
        Md5Kernel.digest(&(), b"abc", &mut out);
        assert_eq!(out[..4], [0x90, 0x01, 0x50, 0x98]);
    }
}
