//! Claims.
//!
//! A claim asserts that a TLS session with some provider satisfied a set of
//! parameters. The witness signs the claim's [sign data](create_sign_data_for_claim),
//! which commits to the claim [identifier](identifier_from_claim_info), the
//! owner, the timestamp and the epoch.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    canonical::{recanonicalize_str, CanonicalizationError},
    hash::keccak256_hex,
};

/// Identifier of a claim, a `0x`-prefixed lowercase keccak-256 hex digest.
pub type ClaimId = String;

/// The information a claim is made about.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimInfo {
    /// Name of the provider, eg. `"http"`.
    pub provider: String,
    /// Canonical JSON of the provider parameters.
    pub parameters: String,
    /// Canonical JSON of the claim context, may be empty.
    #[serde(default)]
    pub context: String,
}

impl ClaimInfo {
    /// Computes the identifier of this claim.
    pub fn identifier(&self) -> Result<ClaimId, CanonicalizationError> {
        identifier_from_claim_info(self)
    }
}

/// Complete claim data signed by a witness.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderClaimData {
    /// Name of the provider.
    pub provider: String,
    /// Canonical JSON of the provider parameters.
    pub parameters: String,
    /// Address of the owner of the claim.
    pub owner: String,
    /// Unix timestamp, in seconds, of the claim.
    pub timestamp_s: u64,
    /// Canonical JSON of the claim context, may be empty.
    #[serde(default)]
    pub context: String,
    /// Identifier of the claim, see [`identifier_from_claim_info`].
    ///
    /// May be left empty, in which case it is derived when needed.
    #[serde(default)]
    pub identifier: ClaimId,
    /// Epoch of the witness set the claim was made in.
    pub epoch: u32,
}

impl ProviderClaimData {
    /// Creates complete claim data, deriving the identifier from `info`.
    pub fn new(
        info: ClaimInfo,
        owner: impl Into<String>,
        timestamp_s: u64,
        epoch: u32,
    ) -> Result<Self, CanonicalizationError> {
        let identifier = info.identifier()?;

        Ok(Self {
            provider: info.provider,
            parameters: info.parameters,
            owner: owner.into(),
            timestamp_s,
            context: info.context,
            identifier,
            epoch,
        })
    }

    /// Returns the claim info part of the data.
    pub fn info(&self) -> ClaimInfo {
        ClaimInfo {
            provider: self.provider.clone(),
            parameters: self.parameters.clone(),
            context: self.context.clone(),
        }
    }
}

/// Generates the identifier of a claim.
///
/// A non-empty context is re-canonicalized first, so two contexts holding the
/// same members in a different order produce the same identifier.
///
/// # Errors
///
/// Fails if the context is non-empty and not valid JSON.
pub fn identifier_from_claim_info(info: &ClaimInfo) -> Result<ClaimId, CanonicalizationError> {
    let context = recanonicalize_str(&info.context)?;
    let preimage = format!("{}\n{}\n{}", info.provider, info.parameters, context);

    Ok(keccak256_hex(preimage.as_bytes()))
}

/// Creates the string a witness signs for a claim.
///
/// The lines are the identifier, the lowercased owner, the timestamp and the
/// epoch, joined by `\n`.
pub fn create_sign_data_for_claim(
    data: &ProviderClaimData,
) -> Result<String, CanonicalizationError> {
    let identifier = if data.identifier.is_empty() {
        identifier_from_claim_info(&data.info())?
    } else {
        data.identifier.clone()
    };

    Ok([
        identifier,
        data.owner.to_lowercase(),
        data.timestamp_s.to_string(),
        data.epoch.to_string(),
    ]
    .join("\n"))
}

/// Parses a JSON object carried as text, eg. the parameters or context of a
/// claim.
///
/// Empty text yields an empty object. The error names `key` so that the
/// offending field can be reported back to the requester.
pub fn parse_json_object(data: &str, key: &str) -> Result<Value, InvalidJsonField> {
    if data.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_str(data).map_err(|e| InvalidJsonField {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Error for a claim field which does not hold valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("invalid JSON in {key}: {reason}")]
pub struct InvalidJsonField {
    key: String,
    reason: String,
}
