//! The HTTP provider.
//!
//! Claims are made about the response of a single HTTPS request, authorised
//! with a cookie and/or an `Authorization` header which are hidden from the
//! witness. The parts of the response a claim is about are selected with
//! HTML and JSON paths, everything else in the body is hidden.

mod params;
mod receipt;
mod redactions;
mod request;

use serde_json::Value;
use tracing::instrument;
use url::Url;
use witness_core::{ByteRange, TlsReceipt};
use witness_formats::html::HtmlPath;

pub use params::{
    hash_provider_params, HttpMethod, HttpProviderParams, HttpProviderSecretParams,
    ResponseMatch, ResponseSelection,
};

use crate::{CreateRequestResult, ErrorKind, HttpProviderConfig, Provider, ProviderError};

/// The HTTP provider.
#[derive(Debug, Clone, Default)]
pub struct HttpProvider {
    config: HttpProviderConfig,
}

impl HttpProvider {
    /// Name the provider is registered under.
    pub const NAME: &'static str = "http";

    /// Creates a new HTTP provider.
    pub fn new(config: HttpProviderConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration of the provider.
    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }
}

impl Provider for HttpProvider {
    type Params = HttpProviderParams;
    type SecretParams = HttpProviderSecretParams;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn host_port(&self, params: &HttpProviderParams) -> Result<String, ProviderError> {
        host_port(&parse_url(&params.url)?)
    }

    fn parse_params(&self, params: &Value) -> Result<HttpProviderParams, ProviderError> {
        let params: HttpProviderParams = serde_json::from_value(params.clone())
            .map_err(|e| ProviderError::new(ErrorKind::Validation, e))?;

        if params.response_selections.is_empty() {
            return Err(ProviderError::validation("no response selections"));
        }

        for selection in &params.response_selections {
            if let Some(x_path) = &selection.x_path {
                x_path
                    .parse::<HtmlPath>()
                    .map_err(|e| ProviderError::new(ErrorKind::Validation, e))?;
            }

            if selection.json_path.as_deref() == Some("") {
                return Err(ProviderError::validation("empty json path"));
            }
        }

        Ok(params)
    }

    #[instrument(level = "debug", skip_all, err)]
    fn create_request(
        &self,
        secret_params: &HttpProviderSecretParams,
        params: &HttpProviderParams,
    ) -> Result<CreateRequestResult, ProviderError> {
        request::create_request(&self.config, secret_params, params)
    }

    #[instrument(level = "debug", skip_all, err)]
    fn response_redactions(
        &self,
        response: &[u8],
        params: &HttpProviderParams,
    ) -> Result<Vec<ByteRange>, ProviderError> {
        redactions::response_redactions(response, params)
    }

    #[instrument(level = "debug", skip_all, err)]
    fn assert_valid_provider_receipt(
        &self,
        receipt: &TlsReceipt,
        params: &HttpProviderParams,
    ) -> Result<(), ProviderError> {
        receipt::assert_valid_provider_receipt(&self.config, receipt, params)
    }
}

fn parse_url(url: &str) -> Result<Url, ProviderError> {
    let url = Url::parse(url).map_err(|e| ProviderError::new(ErrorKind::Validation, e))?;

    if url.host_str().filter(|host| !host.is_empty()).is_none() {
        return Err(ProviderError::validation("url has no host"));
    }

    Ok(url)
}

/// Returns the `host[:port]` of a URL, with the port only if it was given
/// explicitly.
fn host_port(url: &Url) -> Result<String, ProviderError> {
    let host = url
        .host_str()
        .ok_or_else(|| ProviderError::validation("url has no host"))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Returns the path and query of a URL, as sent in the request line.
fn request_target(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
