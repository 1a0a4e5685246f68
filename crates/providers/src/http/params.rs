use std::{collections::BTreeMap, fmt};

use regex::bytes::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use witness_core::canonical::{fingerprint, CanonicalizationError};

/// Parameters of an HTTP claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProviderParams {
    /// The URL requested, eg. `https://example.com/orders?q=abcd`.
    pub url: String,
    /// The request method.
    pub method: HttpMethod,
    /// Additional headers sent with the request. These are visible to the
    /// witness.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// The parts of the response the claim is about.
    pub response_selections: Vec<ResponseSelection>,
    /// Country the request should originate from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location: Option<String>,
}

/// Secret parameters of an HTTP claim, never revealed to the witness.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpProviderSecretParams {
    /// Value of the `Cookie` header.
    #[serde(default)]
    pub cookie_str: Option<String>,
    /// Value of the `Authorization` header.
    #[serde(default)]
    pub authorisation_header: Option<String>,
}

impl fmt::Debug for HttpProviderSecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProviderSecretParams")
            .field("cookie_str", &self.cookie_str.as_ref().map(|_| "[redacted]"))
            .field(
                "authorisation_header",
                &self.authorisation_header.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// `GET`
    #[serde(rename = "GET")]
    Get,
    /// `POST`
    #[serde(rename = "POST")]
    Post,
}

impl HttpMethod {
    /// Returns the method as it appears in a request line.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A part of the response a claim is about.
///
/// If both paths are set, the JSON path is resolved within the element
/// selected by the XPath.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSelection {
    /// Path of an HTML element, eg. `/html/body/div.a1/span.a5`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_path: Option<String>,
    /// Dot-separated path of a JSON value, eg. `email.addresses.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    /// Pattern the selected part must match.
    pub response_match: ResponseMatch,
}

/// A regular expression a selection must match.
///
/// Matching is case-insensitive, `^` and `$` match at line boundaries and `.`
/// matches line breaks.
#[derive(Clone)]
pub struct ResponseMatch {
    pattern: String,
    regex: Regex,
}

impl ResponseMatch {
    /// Compiles a pattern.
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()?;

        Ok(Self { pattern, regex })
    }

    /// Returns the pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns `true` if the pattern matches anywhere in `data`.
    pub fn is_match(&self, data: &[u8]) -> bool {
        self.regex.is_match(data)
    }
}

impl fmt::Debug for ResponseMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseMatch").field(&self.pattern).finish()
    }
}

impl PartialEq for ResponseMatch {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for ResponseMatch {}

impl Serialize for ResponseMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for ResponseMatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;

        ResponseMatch::new(pattern).map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintParams<'a> {
    url: &'a str,
    method: HttpMethod,
    response_matches: Vec<FingerprintMatch<'a>>,
    response_redactions: Vec<FingerprintRedaction<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    geo_location: Option<&'a str>,
}

#[derive(Serialize)]
struct FingerprintMatch<'a> {
    #[serde(rename = "type")]
    typ: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FingerprintRedaction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    x_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_path: Option<&'a str>,
}

/// Returns a fingerprint of the shape of a request, independent of any
/// secrets.
///
/// Covers the URL, the method, the selections and the geo location. Each
/// selection contributes a regex match on its pattern and a redaction on its
/// paths.
pub fn hash_provider_params(params: &HttpProviderParams) -> Result<String, CanonicalizationError> {
    fingerprint(&FingerprintParams {
        url: &params.url,
        method: params.method,
        response_matches: params
            .response_selections
            .iter()
            .map(|selection| FingerprintMatch {
                typ: "regex",
                value: selection.response_match.pattern(),
            })
            .collect(),
        response_redactions: params
            .response_selections
            .iter()
            .map(|selection| FingerprintRedaction {
                x_path: selection.x_path.as_deref(),
                json_path: selection.json_path.as_deref(),
            })
            .collect(),
        geo_location: params.geo_location.as_deref(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use witness_core::{canonical::canonicalize, hash::keccak256_hex};

    use super::*;

    fn params() -> HttpProviderParams {
        serde_json::from_value(json!({
            "url": "https://example.com/api/me",
            "method": "GET",
            "responseSelections": [
                { "jsonPath": "user.name", "responseMatch": "alice" },
                { "xPath": "//title", "responseMatch": "profile" },
            ],
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize() {
        let params = params();

        assert_eq!(params.method, HttpMethod::Get);
        assert!(params.headers.is_empty());
        assert_eq!(params.response_selections[0].json_path.as_deref(), Some("user.name"));
        assert_eq!(params.response_selections[1].x_path.as_deref(), Some("//title"));
    }

    #[test]
    fn test_response_match_flags() {
        let m = ResponseMatch::new("^ALICE.end$").unwrap();

        assert!(m.is_match(b"first\nalice\nend\nlast"));
        assert!(!m.is_match(b"bob"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let err = serde_json::from_value::<ResponseSelection>(json!({ "responseMatch": "(" }));

        assert!(err.is_err());
    }

    #[test]
    fn test_secret_params_are_not_printed() {
        let secrets = HttpProviderSecretParams {
            cookie_str: Some("sid=abc".to_string()),
            authorisation_header: None,
        };

        assert!(!format!("{:?}", secrets).contains("sid=abc"));
    }

    #[test]
    fn test_hash_provider_params() {
        let expected = keccak256_hex(
            canonicalize(&json!({
                "url": "https://example.com/api/me",
                "method": "GET",
                "responseMatches": [
                    { "type": "regex", "value": "alice" },
                    { "type": "regex", "value": "profile" },
                ],
                "responseRedactions": [
                    { "jsonPath": "user.name" },
                    { "xPath": "//title" },
                ],
            }))
            .as_bytes(),
        );

        assert_eq!(hash_provider_params(&params()).unwrap(), expected);
    }

    #[test]
    fn test_hash_ignores_headers_but_not_geo_location() {
        let base = hash_provider_params(&params()).unwrap();

        let mut with_headers = params();
        with_headers.headers.insert("accept".into(), "application/json".into());
        assert_eq!(hash_provider_params(&with_headers).unwrap(), base);

        let mut with_geo = params();
        with_geo.geo_location = Some("US".into());
        assert_ne!(hash_provider_params(&with_geo).unwrap(), base);
    }
}
