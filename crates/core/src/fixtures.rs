//! Fixtures for testing

use crate::{
    claim::{ClaimInfo, ProviderClaimData},
    response::ClaimTunnelResponse,
    signing::{SignatureSchemeProvider, SignatureType, WitnessSigner},
};

/// Private key of the fixture witness.
pub const WITNESS_KEY: [u8; 32] = [
    0xac, 0x09, 0x74, 0xbe, 0xc3, 0x9a, 0x17, 0xe3, 0x6b, 0xa4, 0xa6, 0xb4, 0xd2, 0x38, 0xff, 0x94,
    0x4b, 0xac, 0xb4, 0x78, 0xcb, 0xed, 0x5e, 0xfc, 0xae, 0x78, 0x4d, 0x7b, 0xf4, 0xf2, 0xff, 0x80,
];

/// Owner of the fixture claim.
pub const OWNER: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

/// Returns the address of the fixture witness.
pub fn witness_address() -> String {
    "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string()
}

/// Returns a claim over an HTTP provider request.
pub fn claim_fixture() -> ProviderClaimData {
    let info = ClaimInfo {
        provider: "http".to_string(),
        parameters: r#"{"method":"GET","responseSelections":[{"jsonPath":"a.b","responseMatch":"1"}],"url":"https://example.com/api"}"#
            .to_string(),
        context: r#"{"contextAddress":"0x0","contextMessage":"fixture"}"#.to_string(),
    };

    ProviderClaimData::new(info, OWNER, 1700000000, 1).unwrap()
}

/// Returns a response signed by the fixture witness, along with the schemes
/// needed to verify it.
pub fn signed_response_fixture(
    claim: Option<ProviderClaimData>,
) -> (ClaimTunnelResponse, SignatureSchemeProvider) {
    let schemes = SignatureSchemeProvider::default();

    let mut response = ClaimTunnelResponse {
        claim,
        error: None,
        signatures: None,
    };

    WitnessSigner::new(SignatureType::ETH, WITNESS_KEY, &schemes)
        .unwrap()
        .sign_response(&mut response)
        .unwrap();

    (response, schemes)
}
