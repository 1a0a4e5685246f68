//! Hashing.
//!
//! Claim identifiers and parameter fingerprints are keccak-256 digests
//! rendered as `0x`-prefixed lowercase hex.

use tiny_keccak::Hasher as _;

/// A hashing algorithm.
pub trait Hasher {
    /// The output of the hasher.
    type Output: AsRef<[u8]>;

    /// Creates a new hash which can be updated incrementally.
    fn new() -> Self;

    /// Updates the hash with the given data.
    fn update(&mut self, data: &[u8]);

    /// Finalizes the hash.
    fn finalize(self) -> Self::Output;

    /// Computes the hash of the given data.
    fn hash(data: &[u8]) -> Self::Output
    where
        Self: Sized,
    {
        let mut hasher = Self::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// The Keccak-256 hashing algorithm, as used by Ethereum.
#[derive(Clone)]
pub struct Keccak256(tiny_keccak::Keccak);

opaque_debug::implement!(Keccak256);

impl Hasher for Keccak256 {
    type Output = [u8; 32];

    fn new() -> Self {
        Keccak256(tiny_keccak::Keccak::v256())
    }

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Self::Output {
        let mut output = [0; 32];
        self.0.finalize(&mut output);
        output
    }
}

/// Returns the keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::hash(data)
}

/// Returns the keccak-256 digest of `data` as `0x`-prefixed lowercase hex.
pub fn keccak256_hex(data: &[u8]) -> String {
    to_prefixed_hex(&keccak256(data))
}

/// Encodes bytes as `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            keccak256_hex(b""),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_incremental() {
        let mut hasher = Keccak256::new();
        hasher.update(b"hello ");
        hasher.update(b"world");

        assert_eq!(hasher.finalize(), keccak256(b"hello world"));
    }
}
