use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};

use crate::error::TypeError;

/// The hash algorithm that produced a [`Digest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    /// Algorithm identifier as it appears before the `:` separator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Length of the hex-encoded hash.
    pub fn hex_len(&self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(TypeError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Algorithm-tagged content hash, rendered as `sha256:<hex>`.
///
/// A `Digest` is the sole identity of a blob: identical bytes always produce
/// the same digest. The hex part is validated and stored lowercase.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl Digest {
    /// SHA-256 digest of raw bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::compute(DigestAlgorithm::Sha256, data)
    }

    /// Digest of raw bytes under the given algorithm.
    pub fn compute(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        let hex = match algorithm {
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(data)),
            DigestAlgorithm::Sha512 => hex::encode(Sha512::digest(data)),
        };
        Self { algorithm, hex }
    }

    /// Build a digest from an algorithm and a finished hash value.
    pub fn from_hash(algorithm: DigestAlgorithm, hash: &[u8]) -> Result<Self, TypeError> {
        Self::from_parts(algorithm, &hex::encode(hash))
    }

    fn from_parts(algorithm: DigestAlgorithm, hex: &str) -> Result<Self, TypeError> {
        if hex.len() != algorithm.hex_len() {
            return Err(TypeError::InvalidDigest {
                digest: format!("{algorithm}:{hex}"),
                reason: format!("expected {} hex characters, got {}", algorithm.hex_len(), hex.len()),
            });
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidDigest {
                digest: format!("{algorithm}:{hex}"),
                reason: "contains non-hex characters".into(),
            });
        }
        Ok(Self {
            algorithm,
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Parse `algorithm:hex`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let (algorithm, hex) = s.split_once(':').ok_or_else(|| TypeError::InvalidDigest {
            digest: s.to_string(),
            reason: "missing ':' separator".into(),
        })?;
        Self::from_parts(algorithm.parse()?, hex)
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The hex-encoded hash without the algorithm prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Short hex representation (first 12 characters).
    pub fn short_hex(&self) -> &str {
        &self.hex[..12]
    }

    /// File-system safe form used for blob entries: `sha256.<hex>`.
    pub fn encoded(&self) -> String {
        format!("{}.{}", self.algorithm, self.hex)
    }

    /// Inverse of [`Digest::encoded`].
    pub fn from_encoded(name: &str) -> Result<Self, TypeError> {
        let (algorithm, hex) = name.split_once('.').ok_or_else(|| TypeError::InvalidDigest {
            digest: name.to_string(),
            reason: "missing '.' separator in blob name".into(),
        })?;
        Self::from_parts(algorithm.parse()?, hex)
    }

    /// Check that `data` hashes to this digest.
    pub fn verify(&self, data: &[u8]) -> bool {
        Self::compute(self.algorithm, data) == *self
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl FromStr for Digest {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.to_string()
    }
}
