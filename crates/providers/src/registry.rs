use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;
use witness_core::{ByteRange, TlsReceipt};

use crate::{CreateRequestResult, ErrorKind, HttpProvider, Provider, ProviderError};

/// A [`Provider`] working on untyped parameters.
///
/// Implemented for every provider added to a [`ProviderRegistry`].
pub trait DynProvider: Send + Sync {
    /// Returns the name the provider is registered under.
    fn name(&self) -> &'static str;

    /// See [`Provider::host_port`].
    fn host_port(&self, params: &Value) -> Result<String, ProviderError>;

    /// See [`Provider::are_valid_params`].
    fn are_valid_params(&self, params: &Value) -> bool;

    /// See [`Provider::create_request`].
    fn create_request(
        &self,
        secret_params: &Value,
        params: &Value,
    ) -> Result<CreateRequestResult, ProviderError>;

    /// See [`Provider::response_redactions`].
    fn response_redactions(
        &self,
        response: &[u8],
        params: &Value,
    ) -> Result<Vec<ByteRange>, ProviderError>;

    /// See [`Provider::assert_valid_provider_receipt`].
    fn assert_valid_provider_receipt(
        &self,
        receipt: &TlsReceipt,
        params: &Value,
    ) -> Result<(), ProviderError>;
}

struct ErasedProvider<P>(P);

impl<P> DynProvider for ErasedProvider<P>
where
    P: Provider + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn host_port(&self, params: &Value) -> Result<String, ProviderError> {
        let params = self.0.parse_params(params)?;
        self.0.host_port(&params)
    }

    fn are_valid_params(&self, params: &Value) -> bool {
        self.0.are_valid_params(params)
    }

    fn create_request(
        &self,
        secret_params: &Value,
        params: &Value,
    ) -> Result<CreateRequestResult, ProviderError> {
        let params = self.0.parse_params(params)?;
        let secret_params = serde_json::from_value::<P::SecretParams>(secret_params.clone())
            .map_err(|e| ProviderError::new(ErrorKind::Validation, e))?;

        self.0.create_request(&secret_params, &params)
    }

    fn response_redactions(
        &self,
        response: &[u8],
        params: &Value,
    ) -> Result<Vec<ByteRange>, ProviderError> {
        let params = self.0.parse_params(params)?;
        self.0.response_redactions(response, &params)
    }

    fn assert_valid_provider_receipt(
        &self,
        receipt: &TlsReceipt,
        params: &Value,
    ) -> Result<(), ProviderError> {
        let params = self.0.parse_params(params)?;
        self.0.assert_valid_provider_receipt(receipt, &params)
    }
}

/// Providers by name.
///
/// Populated once at startup and read-only afterwards.
pub struct ProviderRegistry {
    providers: HashMap<&'static str, Box<dyn DynProvider>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Adds a provider, replacing any provider registered under the same
    /// name.
    pub fn register<P>(&mut self, provider: P)
    where
        P: Provider + Send + Sync + 'static,
    {
        let name = provider.name();
        debug!("registering provider {}", name);

        self.providers.insert(name, Box::new(ErasedProvider(provider)));
    }

    /// Returns the provider registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn DynProvider> {
        self.providers.get(name).map(|provider| provider.as_ref())
    }

    /// Returns the names of all registered providers, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ProviderRegistry {
    /// Creates a registry holding the HTTP provider with its default
    /// configuration.
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(HttpProvider::default());
        registry
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
