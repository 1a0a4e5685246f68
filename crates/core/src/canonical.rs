//! Canonical JSON.
//!
//! Claim identifiers are hashes over JSON text, so the text itself must be
//! reproducible by any implementation. The encoding used here is the JSON
//! Canonicalization Scheme (RFC 8785):
//!
//! - no insignificant whitespace,
//! - object members sorted by the UTF-16 code units of their names,
//! - strings escaped exactly as ECMAScript `JSON.stringify` escapes them,
//! - numbers printed as ECMAScript `Number.prototype.toString` prints them.
//!
//! Any change to this module changes claim identifiers and breaks signatures
//! produced by other implementations.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;

use crate::hash::keccak256_hex;

/// Serializes a JSON value into its canonical form.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Serializes an optional JSON value into its canonical form, returning an
/// empty string if there is no value.
pub fn canonical_stringify(value: Option<&Value>) -> String {
    value.map(canonicalize).unwrap_or_default()
}

/// Serializes any serializable type into canonical JSON.
pub fn to_canonical_string<T: Serialize + ?Sized>(
    value: &T,
) -> Result<String, CanonicalizationError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CanonicalizationError::new("value is not representable as JSON", e))?;

    Ok(canonicalize(&value))
}

/// Re-canonicalizes JSON text.
///
/// Empty text is returned as is.
pub fn recanonicalize_str(text: &str) -> Result<String, CanonicalizationError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| CanonicalizationError::new("unable to parse non-empty context as JSON", e))?;

    Ok(canonicalize(&value))
}

/// Returns the keccak-256 fingerprint of the canonical JSON form of `value`.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalizationError> {
    to_canonical_string(value).map(|text| keccak256_hex(text.as_bytes()))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(number) => {
            // serde_json numbers are always finite, and ECMAScript only has
            // doubles, so integers are formatted through f64 as well.
            let number = number.as_f64().unwrap_or_default();
            write_number(out, number);
        }
        Value::String(string) => write_string(out, string),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.encode_utf16().cmp(b.encode_utf16()));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, string: &str) {
    out.push('"');
    for c in string.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Formats a finite double the way ECMAScript `Number.prototype.toString`
/// does.
fn write_number(out: &mut String, value: f64) {
    if value == 0.0 {
        // Covers negative zero.
        out.push('0');
        return;
    }

    if value < 0.0 {
        out.push('-');
    }

    // `{:e}` yields the shortest digit string which round-trips, e.g.
    // "1.2345e3" or "5e-7".
    let sci = format!("{:e}", value.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exp: i32 = exp.parse().unwrap_or_default();

    let k = digits.len() as i32;
    let n = exp + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        out.push_str(int);
        out.push('.');
        out.push_str(frac);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        let (first, rest) = digits.split_at(1);
        out.push_str(first);
        if !rest.is_empty() {
            out.push('.');
            out.push_str(rest);
        }
        let e = n - 1;
        let _ = write!(out, "e{}{}", if e < 0 { '-' } else { '+' }, e.abs());
    }
}

/// Error for canonical JSON serialization.
#[derive(Debug, thiserror::Error)]
#[error("canonicalization error: {msg}")]
pub struct CanonicalizationError {
    msg: &'static str,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl CanonicalizationError {
    pub(crate) fn new<E>(msg: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self {
            msg,
            source: Some(source.into()),
        }
    }
}
