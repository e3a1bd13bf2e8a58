//! Supported digest algorithms

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Keccak output widths in bits
pub const KECCAK_WIDTHS: [u32; 6] = [128, 224, 256, 288, 384, 512];

/// SHA-3 output widths in bits
pub const SHA3_WIDTHS: [u32; 4] = [224, 256, 384, 512];

/// Largest Blake2b key in bytes
pub const BLAKE2B_MAX_KEY: usize = 64;

/// Digest algorithm and, where variable, its output width in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// MD2 (RFC 1319), 128-bit
    Md2,
    /// MD5, 128-bit
    Md5,
    /// SHA-1, 160-bit
    Sha1,
    /// SHA-256, 256-bit
    Sha256,
    /// Original Keccak padding
    Keccak {
        /// Output width in bits
        bits: u32,
    },
    /// FIPS 202 SHA-3
    Sha3 {
        /// Output width in bits
        bits: u32,
    },
    /// Blake2b, optionally keyed
    Blake2b {
        /// Output width in bits
        bits: u32,
    },
}

impl Algorithm {
    /// Check the output width
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfiguration`] for widths the algorithm
    /// does not define.
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Algorithm::Md2 | Algorithm::Md5 | Algorithm::Sha1 | Algorithm::Sha256 => true,
            Algorithm::Keccak { bits } => KECCAK_WIDTHS.contains(&bits),
            Algorithm::Sha3 { bits } => SHA3_WIDTHS.contains(&bits),
            Algorithm::Blake2b { bits } => (8..=512).contains(&bits) && bits % 8 == 0,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "{} does not support a {}-bit output",
                self.name(),
                self.output_bits()
            )))
        }
    }

    /// Output width in bits
    pub fn output_bits(&self) -> u32 {
        match *self {
            Algorithm::Md2 | Algorithm::Md5 => 128,
            Algorithm::Sha1 => 160,
            Algorithm::Sha256 => 256,
            Algorithm::Keccak { bits } | Algorithm::Sha3 { bits } | Algorithm::Blake2b { bits } => {
                bits
            }
        }
    }

    /// Digest size in bytes per record
    pub fn output_size(&self) -> usize {
        (self.output_bits() >> 3) as usize
    }

    /// Family name without the width
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Md2 => "md2",
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Keccak { .. } => "keccak",
            Algorithm::Sha3 { .. } => "sha3",
            Algorithm::Blake2b { .. } => "blake2b",
        }
    }

    /// Whether the algorithm accepts a key
    pub fn is_keyed(&self) -> bool {
        matches!(self, Algorithm::Blake2b { .. })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Keccak { bits } | Algorithm::Sha3 { bits } | Algorithm::Blake2b { bits } => {
                write!(f, "{}-{}", self.name(), bits)
            }
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (family, width) = match lower.split_once('-') {
            Some((family, width)) => (family, Some(width)),
            None => (lower.as_str(), None),
        };

        let bits = |default: Option<u32>| -> Result<u32> {
            match (width, default) {
                (Some(w), _) => w
                    .parse::<u32>()
                    .map_err(|_| Error::invalid(format!("invalid digest width in {:?}", s))),
                (None, Some(d)) => Ok(d),
                (None, None) => Err(Error::invalid(format!("missing digest width in {:?}", s))),
            }
        };

        let algorithm = match family {
            "md2" | "md5" | "sha1" | "sha256" if width.is_some() => {
                return Err(Error::invalid(format!("{} has a fixed width", family)));
            }
            "md2" => Algorithm::Md2,
            "md5" => Algorithm::Md5,
            "sha1" => Algorithm::Sha1,
            "sha256" => Algorithm::Sha256,
            "keccak" => Algorithm::Keccak { bits: bits(None)? },
            "sha3" => Algorithm::Sha3 { bits: bits(None)? },
            "blake2b" => Algorithm::Blake2b {
                bits: bits(Some(512))?,
            },
            _ => return Err(Error::invalid(format!("unknown digest algorithm {:?}", s))),
        };
        algorithm.validate()?;
        Ok(algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_sizes() {
        assert_eq!(Algorithm::Md2.output_size(), 16);
        assert_eq!(Algorithm::Md5.output_size(), 16);
        assert_eq!(Algorithm::Sha1.output_size(), 20);
        assert_eq!(Algorithm::Sha256.output_size(), 32);
        assert_eq!(Algorithm::Keccak { bits: 288 }.output_size(), 36);
        assert_eq!(Algorithm::Sha3 { bits: 384 }.output_size(), 48);
        assert_eq!(Algorithm::Blake2b { bits: 8 }.output_size(), 1);
    }

    #[test]
    fn test_validate_widths() {
        for bits in KECCAK_WIDTHS {
            assert!(Algorithm::Keccak { bits }.validate().is_ok());
        }
        assert!(Algorithm::Keccak { bits: 160 }.validate().is_err());
        assert!(Algorithm::Sha3 { bits: 128 }.validate().is_err());
        assert!(Algorithm::Sha3 { bits: 288 }.validate().is_err());
        assert!(Algorithm::Blake2b { bits: 0 }.validate().is_err());
        assert!(Algorithm::Blake2b { bits: 12 }.validate().is_err());
        assert!(Algorithm::Blake2b { bits: 520 }.validate().is_err());
        assert!(Algorithm::Blake2b { bits: 160 }.validate().is_ok());
    }

    #[test]
    fn test_display_and_parse() {
        let all = [
            Algorithm::Md2,
            Algorithm::Md5,
            Algorithm::Sha1,
            Algorithm::Sha256,
            Algorithm::Keccak { bits: 256 },
            Algorithm::Sha3 { bits: 384 },
            Algorithm::Blake2b { bits: 512 },
        ];
        for algorithm in all {
            let parsed: Algorithm = algorithm.to_string().parse().unwrap();
            assert_eq!(parsed, algorithm);
        }
        assert_eq!(Algorithm::Sha3 { bits: 256 }.to_string(), "sha3-256");
        assert_eq!("SHA256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!(
            "blake2b".parse::<Algorithm>().unwrap(),
            Algorithm::Blake2b { bits: 512 }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!("whirlpool".parse::<Algorithm>().is_err());
        assert!("sha3".parse::<Algorithm>().is_err());
        assert!("sha3-100".parse::<Algorithm>().is_err());
        assert!("keccak-abc".parse::<Algorithm>().is_err());
        assert!("md5-128".parse::<Algorithm>().is_err());
    }
}
