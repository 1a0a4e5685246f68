//! Witness core library.
//!
//! This crate contains the types shared by everyone taking part in a witnessed
//! TLS session: the receipt a witness reconstructs from the transcript, the
//! claim it signs once the receipt has been validated, and the machinery
//! needed to reproduce claim identifiers and verify witness signatures.
//!
//! ## Claims
//!
//! A claim binds a provider name, its canonicalized parameters and an
//! optional context to an owner, a timestamp and an epoch. The identifier of
//! a claim is the keccak-256 hash of its [canonical](crate::canonical) form,
//! which means any independent implementation must produce byte-identical
//! canonical JSON for the identifiers to agree.
//!
//! ## Signatures
//!
//! Witnesses sign with a [`SignatureScheme`](crate::signing::SignatureScheme)
//! selected by a [`SignatureType`](crate::signing::SignatureType) tag. The
//! schemes are looked up in an explicit
//! [`SignatureSchemeProvider`](crate::signing::SignatureSchemeProvider) which
//! is handed to the verifier, so no process-wide registry exists.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod canonical;
pub mod claim;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod hash;
mod range;
pub mod receipt;
pub mod response;
mod serialize;
pub mod signing;
pub mod step;

pub use claim::{ClaimId, ClaimInfo, ProviderClaimData};
pub use range::{ByteRange, InvalidByteRange};
pub use receipt::{SenderType, TlsReceipt, TranscriptMessage};
pub use response::{
    assert_valid_claim_signatures, ClaimMetadata, ClaimSignatureError, ClaimSignatures,
    ClaimTunnelResponse,
};
pub use step::CreateStep;
