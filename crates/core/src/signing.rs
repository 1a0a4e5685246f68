//! Cryptographic signatures.
//!
//! Witnesses sign claims with a [`SignatureScheme`] identified by a
//! [`SignatureType`]. Schemes are registered in a [`SignatureSchemeProvider`]
//! which is passed to whoever needs to sign or verify.

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    claim::{create_sign_data_for_claim, ProviderClaimData},
    response::{ClaimSignatures, ClaimTunnelResponse},
};

/// Signature scheme identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignatureType(u8);

impl SignatureType {
    /// Ethereum personal-message signatures over secp256k1.
    pub const ETH: Self = Self(1);

    /// Creates a new signature scheme identifier.
    ///
    /// # Panics
    ///
    /// Panics if the identifier is in the reserved range 0-127.
    ///
    /// # Arguments
    ///
    /// * id - Unique identifier for the signature scheme.
    pub const fn new(id: u8) -> Self {
        assert!(id >= 128, "signature type id range 0-127 is reserved");

        Self(id)
    }

    /// Returns the id as a `u8`.
    pub const fn as_u8(&self) -> u8 {
        self.0
    }
}

impl Default for SignatureType {
    fn default() -> Self {
        Self::ETH
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SignatureType::ETH => write!(f, "eth"),
            _ => write!(f, "custom({:02x})", self.0),
        }
    }
}

/// Unknown signature scheme error.
#[derive(Debug, thiserror::Error)]
#[error("unknown signature type: {0}")]
pub struct UnknownSignatureType(SignatureType);

/// A signature scheme.
pub trait SignatureScheme {
    /// Signs the message with the given private key.
    fn sign(&self, msg: &[u8], private_key: &[u8]) -> Result<Vec<u8>, SignerError>;

    /// Returns whether `signature` over `msg` was produced by the holder of
    /// `address`.
    fn verify(&self, msg: &[u8], signature: &[u8], address: &str) -> bool;

    /// Returns the address identifying the holder of the private key.
    fn address(&self, private_key: &[u8]) -> Result<String, SignerError>;
}

/// Provider of signature schemes.
pub struct SignatureSchemeProvider {
    schemes: HashMap<SignatureType, Box<dyn SignatureScheme + Send + Sync>>,
}

opaque_debug::implement!(SignatureSchemeProvider);

impl Default for SignatureSchemeProvider {
    fn default() -> Self {
        let mut schemes = HashMap::new();

        schemes.insert(SignatureType::ETH, Box::new(EthSignatureScheme) as _);

        Self { schemes }
    }
}

impl SignatureSchemeProvider {
    /// Creates a provider without any schemes.
    pub fn empty() -> Self {
        Self {
            schemes: HashMap::new(),
        }
    }

    /// Sets a scheme for the given type.
    pub fn set_scheme(
        &mut self,
        typ: SignatureType,
        scheme: Box<dyn SignatureScheme + Send + Sync>,
    ) {
        self.schemes.insert(typ, scheme);
    }

    /// Returns the scheme for the given type.
    pub fn get(
        &self,
        typ: &SignatureType,
    ) -> Result<&(dyn SignatureScheme + Send + Sync), UnknownSignatureType> {
        self.schemes
            .get(typ)
            .map(|s| &**s)
            .ok_or(UnknownSignatureType(*typ))
    }
}

/// Error for [`SignatureScheme`] signing operations.
#[derive(Debug, thiserror::Error)]
#[error("signer error: {0}")]
pub struct SignerError(String);

impl From<UnknownSignatureType> for SignerError {
    fn from(err: UnknownSignatureType) -> Self {
        Self(err.to_string())
    }
}

/// Signs on behalf of a witness.
pub struct WitnessSigner<'a> {
    typ: SignatureType,
    private_key: Vec<u8>,
    schemes: &'a SignatureSchemeProvider,
}

impl fmt::Debug for WitnessSigner<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WitnessSigner")
            .field("typ", &self.typ)
            .finish_non_exhaustive()
    }
}

impl<'a> WitnessSigner<'a> {
    /// Creates a new witness signer.
    ///
    /// # Arguments
    ///
    /// * `typ` - The signature scheme to sign with.
    /// * `private_key` - The witness's private key.
    /// * `schemes` - The available schemes.
    pub fn new(
        typ: SignatureType,
        private_key: impl Into<Vec<u8>>,
        schemes: &'a SignatureSchemeProvider,
    ) -> Result<Self, SignerError> {
        let signer = Self {
            typ,
            private_key: private_key.into(),
            schemes,
        };

        // Fails early on unknown schemes or malformed keys.
        signer.address()?;

        Ok(signer)
    }

    /// Returns the witness's address.
    pub fn address(&self) -> Result<String, SignerError> {
        self.schemes.get(&self.typ)?.address(&self.private_key)
    }

    /// Signs arbitrary data.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignerError> {
        self.schemes.get(&self.typ)?.sign(data, &self.private_key)
    }

    /// Signs the sign data of a claim.
    pub fn sign_claim(&self, claim: &ProviderClaimData) -> Result<Vec<u8>, SignerError> {
        let sign_data =
            create_sign_data_for_claim(claim).map_err(|e| SignerError(e.to_string()))?;

        self.sign(sign_data.as_bytes())
    }

    /// Signs a claim tunnel response, filling in its signatures.
    ///
    /// The result signature covers the encoded response without signatures,
    /// the claim signature covers the claim's sign data.
    pub fn sign_response(&self, response: &mut ClaimTunnelResponse) -> Result<(), SignerError> {
        response.signatures = None;

        let encoded = response
            .encode_for_signing()
            .map_err(|e| SignerError(e.to_string()))?;
        let result_signature = self.sign(&encoded)?;

        let claim_signature = match &response.claim {
            Some(claim) => self.sign_claim(claim)?,
            None => Vec::new(),
        };

        response.signatures = Some(ClaimSignatures {
            witness_address: self.address()?,
            claim_signature,
            result_signature,
        });

        Ok(())
    }
}

mod eth {
    use k256::{
        ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
        elliptic_curve::sec1::ToEncodedPoint,
    };
    use tracing::debug;

    use super::*;
    use crate::hash::{keccak256, to_prefixed_hex};

    /// Ethereum personal-message signatures (EIP-191) over secp256k1.
    ///
    /// Signatures are 65 bytes, `r || s || v` with `v` in `{27, 28}`, and the
    /// signer is identified by its lowercase `0x` address.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct EthSignatureScheme;

    impl EthSignatureScheme {
        fn signing_key(private_key: &[u8]) -> Result<SigningKey, SignerError> {
            SigningKey::from_slice(private_key)
                .map_err(|_| SignerError("invalid secp256k1 private key".to_string()))
        }
    }

    impl SignatureScheme for EthSignatureScheme {
        fn sign(&self, msg: &[u8], private_key: &[u8]) -> Result<Vec<u8>, SignerError> {
            let key = Self::signing_key(private_key)?;

            let (sig, recid) = key
                .sign_prehash_recoverable(&personal_message_hash(msg))
                .map_err(|e| SignerError(format!("secp256k1 signing failed: {e}")))?;

            let mut out = sig.to_vec();
            out.push(27 + recid.to_byte());

            Ok(out)
        }

        fn verify(&self, msg: &[u8], signature: &[u8], address: &str) -> bool {
            let [rs @ .., v] = signature else {
                return false;
            };

            if rs.len() != 64 {
                debug!("eth signature has invalid length: {}", signature.len());
                return false;
            }

            let v = if *v >= 27 { *v - 27 } else { *v };
            let (Ok(sig), Some(recid)) = (Signature::from_slice(rs), RecoveryId::from_byte(v))
            else {
                debug!("malformed eth signature");
                return false;
            };

            match VerifyingKey::recover_from_prehash(&personal_message_hash(msg), &sig, recid) {
                Ok(key) => address_of(&key).eq_ignore_ascii_case(address),
                Err(_) => false,
            }
        }

        fn address(&self, private_key: &[u8]) -> Result<String, SignerError> {
            let key = Self::signing_key(private_key)?;

            Ok(address_of(key.verifying_key()))
        }
    }

    /// Hash of a message prefixed as an Ethereum signed message.
    fn personal_message_hash(msg: &[u8]) -> [u8; 32] {
        let mut prefixed = format!("\x19Ethereum Signed Message:\n{}", msg.len()).into_bytes();
        prefixed.extend_from_slice(msg);

        keccak256(&prefixed)
    }

    /// Last 20 bytes of the keccak-256 hash of the uncompressed public key.
    fn address_of(key: &VerifyingKey) -> String {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);

        to_prefixed_hex(&hash[12..])
    }
}

pub use eth::EthSignatureScheme;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{witness_address, WITNESS_KEY};

    #[test]
    fn test_eth_address() {
        let address = EthSignatureScheme.address(&WITNESS_KEY).unwrap();
        assert_eq!(address, witness_address());
    }

    #[test]
    fn test_eth_sign_verify() {
        let scheme = EthSignatureScheme;
        let address = scheme.address(&WITNESS_KEY).unwrap();

        let sig = scheme.sign(b"hello", &WITNESS_KEY).unwrap();

        assert_eq!(sig.len(), 65);
        assert!(scheme.verify(b"hello", &sig, &address));
        assert!(scheme.verify(b"hello", &sig, &address.to_uppercase().replace("0X", "0x")));
    }

    #[test]
    fn test_eth_verify_rejects_tampering() {
        let scheme = EthSignatureScheme;
        let address = scheme.address(&WITNESS_KEY).unwrap();
        let sig = scheme.sign(b"hello", &WITNESS_KEY).unwrap();

        assert!(!scheme.verify(b"hellp", &sig, &address));

        let mut bad_sig = sig.clone();
        bad_sig[10] ^= 1;
        assert!(!scheme.verify(b"hello", &bad_sig, &address));

        assert!(!scheme.verify(b"hello", &sig[..64], &address));
        assert!(!scheme.verify(
            b"hello",
            &sig,
            "0x0000000000000000000000000000000000000000"
        ));
    }

    #[test]
    fn test_unknown_scheme() {
        let provider = SignatureSchemeProvider::empty();
        assert!(provider.get(&SignatureType::ETH).is_err());
        assert!(WitnessSigner::new(SignatureType::ETH, WITNESS_KEY, &provider).is_err());
    }

    #[test]
    fn test_invalid_key() {
        let provider = SignatureSchemeProvider::default();
        assert!(WitnessSigner::new(SignatureType::ETH, [0u8; 32], &provider).is_err());
    }
}
