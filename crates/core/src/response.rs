//! Claim tunnel responses.
//!
//! After validating a receipt a witness answers with a [`ClaimTunnelResponse`]
//! holding the claim, if one could be made, and its signatures. The result
//! signature covers the [encoded](ClaimTunnelResponse::encode_for_signing)
//! response, the claim signature covers the claim's sign data.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    claim::{create_sign_data_for_claim, ProviderClaimData},
    serialize::CanonicalSerialize,
    signing::{SignatureSchemeProvider, SignatureType},
};

/// Signatures of a witness over a claim tunnel response.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimSignatures {
    /// Address of the witness which signed.
    pub witness_address: String,
    /// Signature over the claim's sign data.
    pub claim_signature: Vec<u8>,
    /// Signature over the encoded response.
    pub result_signature: Vec<u8>,
}

/// Error reported by a witness in place of a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessErrorData {
    /// Error code.
    pub code: u32,
    /// Human readable message.
    pub message: String,
}

/// Response of a witness to a claim request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClaimTunnelResponse {
    /// The claim, absent if the transcript did not support one.
    pub claim: Option<ProviderClaimData>,
    /// The error, if claim creation failed.
    pub error: Option<WitnessErrorData>,
    /// The witness's signatures.
    pub signatures: Option<ClaimSignatures>,
}

impl ClaimTunnelResponse {
    /// Returns the bytes covered by the result signature, ie. the encoding of
    /// the response without its signatures.
    pub fn encode_for_signing(&self) -> Result<Vec<u8>, bcs::Error> {
        let unsigned = ClaimTunnelResponse {
            claim: self.claim.clone(),
            error: self.error.clone(),
            signatures: None,
        };

        CanonicalSerialize::serialize(&unsigned)
    }
}

/// Metadata describing how claims are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimMetadata {
    /// The signature scheme used by the witness.
    pub signature_type: SignatureType,
}

/// Verifies the signatures of a claim tunnel response.
///
/// The result signature is checked if present. Then, if the response carries
/// a claim, the claim signature is checked against the claim's sign data. A
/// response without a claim is valid, the transcript did not contain the
/// data needed for one.
pub fn assert_valid_claim_signatures(
    response: &ClaimTunnelResponse,
    metadata: &ClaimMetadata,
    schemes: &SignatureSchemeProvider,
) -> Result<(), ClaimSignatureError> {
    let signatures = response
        .signatures
        .as_ref()
        .ok_or_else(|| ClaimSignatureError::new(ErrorKind::MissingSignatures, None))?;

    let scheme = schemes
        .get(&metadata.signature_type)
        .map_err(|e| ClaimSignatureError::new(ErrorKind::UnknownScheme, Some(e.into())))?;

    if !signatures.result_signature.is_empty() {
        let encoded = response
            .encode_for_signing()
            .map_err(|e| ClaimSignatureError::new(ErrorKind::Encoding, Some(e.into())))?;

        if !scheme.verify(
            &encoded,
            &signatures.result_signature,
            &signatures.witness_address,
        ) {
            return Err(ClaimSignatureError::new(ErrorKind::ResultSignature, None));
        }

        debug!("verified result signature of {}", signatures.witness_address);
    }

    let Some(claim) = &response.claim else {
        return Ok(());
    };

    let sign_data = create_sign_data_for_claim(claim)
        .map_err(|e| ClaimSignatureError::new(ErrorKind::Encoding, Some(e.into())))?;

    if !scheme.verify(
        sign_data.as_bytes(),
        &signatures.claim_signature,
        &signatures.witness_address,
    ) {
        return Err(ClaimSignatureError::new(ErrorKind::ClaimSignature, None));
    }

    debug!(
        "verified claim {} signed by {}",
        claim.identifier, signatures.witness_address
    );

    Ok(())
}

/// Error for [`assert_valid_claim_signatures`].
#[derive(Debug, thiserror::Error)]
pub struct ClaimSignatureError {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ClaimSignatureError {
    fn new(kind: ErrorKind, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self { kind, source }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Kind of [`ClaimSignatureError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The response carries no signatures.
    MissingSignatures,
    /// The signature scheme is not registered.
    UnknownScheme,
    /// The response or claim could not be encoded.
    Encoding,
    /// The result signature is invalid.
    ResultSignature,
    /// The claim signature is invalid.
    ClaimSignature,
}

impl fmt::Display for ClaimSignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("claim signature error: ")?;

        match self.kind {
            ErrorKind::MissingSignatures => f.write_str("no signatures provided")?,
            ErrorKind::UnknownScheme => f.write_str("unknown signature scheme")?,
            ErrorKind::Encoding => f.write_str("encoding error")?,
            ErrorKind::ResultSignature => f.write_str("invalid result signature")?,
            ErrorKind::ClaimSignature => f.write_str("invalid claim signature")?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{claim_fixture, signed_response_fixture};

    #[test]
    fn test_valid_signatures() {
        let (response, schemes) = signed_response_fixture(Some(claim_fixture()));

        assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes).unwrap();
    }

    #[test]
    fn test_missing_claim_is_valid() {
        let (response, schemes) = signed_response_fixture(None);

        assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes).unwrap();
    }

    #[test]
    fn test_missing_signatures() {
        let (mut response, schemes) = signed_response_fixture(Some(claim_fixture()));
        response.signatures = None;

        let err = assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingSignatures);
    }

    #[test]
    fn test_tampered_claim_is_rejected() {
        let (mut response, schemes) = signed_response_fixture(Some(claim_fixture()));

        // Only check the claim signature.
        response.signatures.as_mut().unwrap().result_signature.clear();
        response.claim.as_mut().unwrap().epoch += 1;

        let err = assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ClaimSignature);
    }

    #[test]
    fn test_tampered_response_is_rejected() {
        let (mut response, schemes) = signed_response_fixture(Some(claim_fixture()));
        response.error = Some(WitnessErrorData {
            code: 1,
            message: "injected".to_string(),
        });

        let err = assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResultSignature);
    }

    #[test]
    fn test_wrong_witness_is_rejected() {
        let (mut response, schemes) = signed_response_fixture(Some(claim_fixture()));
        response.signatures.as_mut().unwrap().witness_address =
            "0x0000000000000000000000000000000000000001".to_string();

        assert!(
            assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes).is_err()
        );
    }

    #[test]
    fn test_unknown_scheme() {
        let (response, _) = signed_response_fixture(Some(claim_fixture()));

        let err = assert_valid_claim_signatures(
            &response,
            &ClaimMetadata::default(),
            &SignatureSchemeProvider::empty(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownScheme);
    }

    #[test]
    fn test_encoding_ignores_signatures() {
        let (signed, _) = signed_response_fixture(Some(claim_fixture()));
        let mut unsigned = signed.clone();
        unsigned.signatures = None;

        assert_eq!(
            signed.encode_for_signing().unwrap(),
            unsigned.encode_for_signing().unwrap()
        );
    }
}
