//! Locating values in JSON text.
//!
//! Paths are dot-separated, each segment being an object key or, for arrays,
//! a decimal index, eg. `user.emails.0`. Values are located with [`spansy`] so
//! the returned offsets always point into the source text.

use spansy::{
    json::{self, JsonValue},
    Spanned,
};
use tracing::debug;
use witness_core::ByteRange;

/// Returns the range of the source text holding the value at `path`.
///
/// The range covers the value's textual representation, including the quotes
/// of strings. An empty path selects the whole document.
pub fn locate_value(src: &[u8], path: &str) -> Result<ByteRange, JsonError> {
    let root = json::parse_slice(src).map_err(|e| JsonError::new(ErrorKind::InvalidJson, e))?;

    let value = if path.is_empty() {
        &root
    } else {
        root.get(path).ok_or_else(|| {
            JsonError::new(ErrorKind::PathNotFound, format!("no value at {:?}", path))
        })?
    };

    let indices = value.span().indices();
    let (Some(mut start), Some(mut end)) = (indices.min(), indices.end()) else {
        return Err(JsonError::new(
            ErrorKind::PathNotFound,
            format!("value at {:?} has no location", path),
        ));
    };

    if matches!(value, JsonValue::String(_)) && src.get(start) != Some(&b'"') {
        start = start.saturating_sub(1);
        end = (end + 1).min(src.len());
    }

    debug!("located {:?} at {}..{}", path, start, end);

    Ok(ByteRange::new(start, end))
}

/// Error for [`locate_value`].
#[derive(Debug, thiserror::Error)]
#[error("json error: {kind}")]
pub struct JsonError {
    kind: ErrorKind,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl JsonError {
    fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            kind,
            source: source.into(),
        }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Kind of [`JsonError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The source is not valid JSON.
    InvalidJson,
    /// A segment of the path does not resolve.
    PathNotFound,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidJson => f.write_str("invalid json"),
            ErrorKind::PathNotFound => f.write_str("path not found"),
        }
    }
}
