//! Providers for witnessed TLS sessions.
//!
//! A [`Provider`] knows how to talk to one kind of service. Given the public
//! parameters of a claim and the secrets of its owner, it builds the request
//! sent over the TLS session and reports which bytes of the request must be
//! hidden from the witness. Once the response has been received it computes
//! which bytes of the response can be hidden, and a witness uses it to check
//! that the receipt of the session actually supports the claim.
//!
//! Providers are looked up by name in a [`ProviderRegistry`], which works on
//! untyped JSON parameters as they arrive over the wire.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod http;
mod registry;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use witness_core::{ByteRange, TlsReceipt};

pub use config::HttpProviderConfig;
pub use error::{ErrorKind, ProviderError, ReceiptCheck};
pub use http::HttpProvider;
pub use registry::{DynProvider, ProviderRegistry};

/// A request built by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRequestResult {
    /// The raw request.
    pub data: Vec<u8>,
    /// Ranges of `data` which must not be revealed to the witness.
    pub redactions: Vec<ByteRange>,
}

/// A provider of claims about a kind of service.
pub trait Provider {
    /// Public parameters of a claim.
    type Params: Serialize + DeserializeOwned;
    /// Secret parameters, known only to the owner of a claim.
    type SecretParams: DeserializeOwned;

    /// Returns the name the provider is registered under.
    fn name(&self) -> &'static str;

    /// Returns the `host[:port]` to connect to.
    fn host_port(&self, params: &Self::Params) -> Result<String, ProviderError>;

    /// Parses and validates untyped parameters.
    fn parse_params(&self, params: &Value) -> Result<Self::Params, ProviderError>;

    /// Returns `true` if the untyped parameters are valid for this provider.
    ///
    /// Must be checked before [`create_request`](Provider::create_request).
    fn are_valid_params(&self, params: &Value) -> bool {
        self.parse_params(params).is_ok()
    }

    /// Builds the request to send.
    fn create_request(
        &self,
        secret_params: &Self::SecretParams,
        params: &Self::Params,
    ) -> Result<CreateRequestResult, ProviderError>;

    /// Returns the ranges of a raw response which can be hidden from the
    /// witness.
    ///
    /// By default nothing is hidden.
    fn response_redactions(
        &self,
        response: &[u8],
        params: &Self::Params,
    ) -> Result<Vec<ByteRange>, ProviderError> {
        let _ = (response, params);
        Ok(Vec::new())
    }

    /// Checks that a receipt supports a claim with the given parameters.
    fn assert_valid_provider_receipt(
        &self,
        receipt: &TlsReceipt,
        params: &Self::Params,
    ) -> Result<(), ProviderError>;
}
