//! SHA-1

use super::HashKernel;
use ::sha1::{Digest, Sha1};

/// SHA-1 kernel, needs no staged tables
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha1Kernel;

impl HashKernel for Sha1Kernel {
    type Tables = ();

    fn output_size(&self) -> usize {
        20
    }

    fn load(&self, _staged: &[u8]) -> Result<(), String> {
        Ok(())
    }

    fn digest(&self, _tables: &(), record: &[u8], out: &mut [u8]) {
        out.copy_from_slice(&Sha1::digest(record));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_stages_nothing() {
        assert!(Sha1Kernel.constants().is_empty());
        assert!(Sha1Kernel.load(&[]).is_ok());
    }

    #[test]
    fn test_sha1_digest() {
        let mut out = [0u8; 20];
        Sha1Kernel.digest(&(), b"abc", &mut out);
        assert_eq!(hex::encode(out), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}
