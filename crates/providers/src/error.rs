use std::{error::Error, fmt};

use witness_formats::{html::HtmlError, http::ParseError, json::JsonError};

/// Error for provider operations.
#[derive(Debug, thiserror::Error)]
pub struct ProviderError {
    kind: ErrorKind,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl ProviderError {
    pub(crate) fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        Self {
            kind,
            source: Some(source.into()),
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg.into())
    }

    pub(crate) fn receipt(check: ReceiptCheck, msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Receipt(check), msg.into())
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Kind of [`ProviderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Parameters or secret parameters are malformed or missing.
    Validation,
    /// The response could not be parsed.
    Parse,
    /// A selection could not be located in the response.
    Extraction,
    /// A selected element does not match its pattern.
    Match,
    /// A receipt does not satisfy the parameters.
    Receipt(ReceiptCheck),
}

/// The receipt checks, in the order they are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptCheck {
    /// The request method matches.
    Method,
    /// The request path matches.
    Path,
    /// The session was established with the requested host.
    HostPort,
    /// The response is `HTTP/1.1 200 OK`.
    Status,
    /// The request asked for the connection to be closed.
    ConnectionHeader,
    /// The response matches the pattern of the selection with this index.
    ResponseMatch(usize),
}

impl fmt::Display for ReceiptCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptCheck::Method => f.write_str("method"),
            ReceiptCheck::Path => f.write_str("path"),
            ReceiptCheck::HostPort => f.write_str("host and port"),
            ReceiptCheck::Status => f.write_str("status"),
            ReceiptCheck::ConnectionHeader => f.write_str("connection header"),
            ReceiptCheck::ResponseMatch(i) => write!(f, "response match {}", i),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("provider error: ")?;

        match self.kind {
            ErrorKind::Validation => f.write_str("validation error")?,
            ErrorKind::Parse => f.write_str("parse error")?,
            ErrorKind::Extraction => f.write_str("extraction error")?,
            ErrorKind::Match => f.write_str("match error")?,
            ErrorKind::Receipt(check) => write!(f, "invalid receipt, {} check failed", check)?,
        }

        if let Some(source) = &self.source {
            write!(f, " caused by: {}", source)?;
        }

        Ok(())
    }
}

impl From<ParseError> for ProviderError {
    fn from(err: ParseError) -> Self {
        Self::new(ErrorKind::Parse, err)
    }
}

impl From<JsonError> for ProviderError {
    fn from(err: JsonError) -> Self {
        Self::new(ErrorKind::Extraction, err)
    }
}

impl From<HtmlError> for ProviderError {
    fn from(err: HtmlError) -> Self {
        Self::new(ErrorKind::Extraction, err)
    }
}
