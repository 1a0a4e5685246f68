use serde_json::json;
use witness_core::{
    assert_valid_claim_signatures,
    canonical::canonicalize,
    claim::create_sign_data_for_claim,
    response::ErrorKind,
    signing::{SignatureScheme, SignatureSchemeProvider, SignatureType, WitnessSigner},
    ClaimInfo, ClaimMetadata, ClaimTunnelResponse, ProviderClaimData,
};

const KEY: [u8; 32] = [42u8; 32];

fn claim(context: serde_json::Value) -> ProviderClaimData {
    let parameters = json!({
        "url": "https://example.com/me",
        "method": "GET",
        "responseSelections": [{ "jsonPath": "user.name", "responseMatch": "alice" }],
    });

    let info = ClaimInfo {
        provider: "http".to_string(),
        parameters: canonicalize(&parameters),
        context: canonicalize(&context),
    };

    ProviderClaimData::new(info, "0xAbC0000000000000000000000000000000000001", 1700000000, 3)
        .unwrap()
}

/// Tests that a witness-signed claim verifies end-to-end.
#[test]
fn test_api() {
    let schemes = SignatureSchemeProvider::default();
    let signer = WitnessSigner::new(SignatureType::ETH, KEY, &schemes).unwrap();

    // Contexts with the same members in a different order refer to the same claim.
    let claim_data = claim(json!({ "x": 1, "y": 2 }));
    assert_eq!(claim_data.identifier, claim(json!({ "y": 2, "x": 1 })).identifier);

    let mut response = ClaimTunnelResponse {
        claim: Some(claim_data.clone()),
        ..Default::default()
    };
    signer.sign_response(&mut response).unwrap();

    let signatures = response.signatures.clone().unwrap();
    assert_eq!(signatures.witness_address, signer.address().unwrap());

    // The claim signature covers exactly the sign data.
    let sign_data = create_sign_data_for_claim(&claim_data).unwrap();
    let scheme = schemes.get(&SignatureType::ETH).unwrap();
    assert!(scheme.verify(
        sign_data.as_bytes(),
        &signatures.claim_signature,
        &signatures.witness_address
    ));

    assert_valid_claim_signatures(&response, &ClaimMetadata::default(), &schemes).unwrap();

    // The response survives a serde round trip over the wire.
    let wire = serde_json::to_string(&response).unwrap();
    let received: ClaimTunnelResponse = serde_json::from_str(&wire).unwrap();
    assert_valid_claim_signatures(&received, &ClaimMetadata::default(), &schemes).unwrap();

    // Any change to the signed claim is detected.
    let mut tampered = received.clone();
    tampered.claim.as_mut().unwrap().owner = "0x0000000000000000000000000000000000000002".into();
    let err =
        assert_valid_claim_signatures(&tampered, &ClaimMetadata::default(), &schemes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResultSignature);
}
