//! Provider configuration.

use serde::{Deserialize, Serialize};

static DEFAULT_USER_AGENT: &str = concat!("witness/", env!("CARGO_PKG_VERSION"));

/// Configuration of the HTTP provider.
#[derive(derive_builder::Builder, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
#[serde(default, rename_all = "camelCase")]
pub struct HttpProviderConfig {
    /// User agent sent with every request.
    #[builder(setter(into), default = "DEFAULT_USER_AGENT.to_string()")]
    user_agent: String,
    /// Port assumed when a URL does not specify one.
    #[builder(default = "443")]
    default_port: u16,
    /// Byte substituted for redacted request bytes when a receipt's request
    /// is reassembled.
    #[builder(default = "b'*'")]
    redaction_char: u8,
}

impl HttpProviderConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(user_agent) = &self.user_agent {
            if user_agent.contains(['\r', '\n']) {
                return Err("user agent must not contain line breaks".to_string());
            }
        }

        if let Some(c) = self.redaction_char {
            if c == b':' || c.is_ascii_whitespace() {
                return Err("redaction char must not be a colon or whitespace".to_string());
            }
        }

        Ok(())
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_port: 443,
            redaction_char: b'*',
        }
    }
}

impl HttpProviderConfig {
    /// Creates a new builder for `HttpProviderConfig`.
    pub fn builder() -> HttpProviderConfigBuilder {
        HttpProviderConfigBuilder::default()
    }

    /// Returns the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns the default port.
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Returns the redaction char.
    pub fn redaction_char(&self) -> u8 {
        self.redaction_char
    }
}
