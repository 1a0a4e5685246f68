use tracing::trace;

use crate::http::response::find;

/// The head of an HTTP request, ie. its request line and headers.
///
/// Parsing is lenient: the request may have been reassembled from a transcript
/// in which redacted bytes were masked, so header lines which are not of the
/// form `name: value` are skipped rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    /// Request method, eg. `"GET"`.
    pub method: String,
    /// Request target, eg. `"/path?query"`.
    pub target: String,
    /// Protocol version, eg. `"HTTP/1.1"`.
    pub version: String,
    /// Header names, lower-cased, and trimmed values, in order of appearance.
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Parses the head of an HTTP request.
    ///
    /// Reads up to the first empty line, or to the end of the data if there is
    /// none.
    pub fn parse(data: &[u8]) -> Result<Self, RequestParseError> {
        let head = match find(data, b"\r\n\r\n") {
            Some(end) => &data[..end],
            None => data,
        };
        let head = String::from_utf8_lossy(head);
        let mut lines = head.split("\r\n");

        let request_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| RequestParseError("missing request line".to_string()))?;

        let mut parts = request_line.split(' ').filter(|part| !part.is_empty());
        let (Some(method), Some(target), Some(version), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(RequestParseError(format!(
                "malformed request line: {:?}",
                request_line
            )));
        };

        if !version.starts_with("HTTP/") {
            return Err(RequestParseError(format!(
                "unsupported protocol version: {:?}",
                version
            )));
        }

        let mut headers = Vec::new();
        for line in lines {
            let Some((name, value)) = line.split_once(':') else {
                trace!("skipping header line without a name");
                continue;
            };

            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            headers,
        })
    }

    /// Returns the value of the first header with the given name, compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Error for [`RequestHead::parse`].
#[derive(Debug, thiserror::Error)]
#[error("request parse error: {0}")]
pub struct RequestParseError(String);

#[cfg(test)]
mod tests {
    use witness_data_fixtures::http::request;

    use super::*;

    #[test]
    fn test_parse_request() {
        let head = RequestHead::parse(request::POST_AUTH).unwrap();

        assert_eq!(head.method, "POST");
        assert_eq!(head.target, "/api/me?full=1");
        assert_eq!(head.version, "HTTP/1.1");
        assert_eq!(head.header("host"), Some("example.com:8443"));
        assert_eq!(head.header("Connection"), Some("close"));
        assert_eq!(head.header("authorization"), Some("Bearer token"));
    }

    #[test]
    fn test_parse_masked_request() {
        let head = RequestHead::parse(
            b"GET / HTTP/1.1\r\nHost: example.com\r\n***************\r\nConnection: close\r\n\r\n",
        )
        .unwrap();

        assert_eq!(head.headers.len(), 2);
        assert_eq!(head.header("connection"), Some("close"));
    }

    #[test]
    fn test_parse_invalid_request_line() {
        assert!(RequestHead::parse(b"").is_err());
        assert!(RequestHead::parse(b"GET /\r\n\r\n").is_err());
        assert!(RequestHead::parse(b"GET / FTP/1.0\r\n\r\n").is_err());
    }
}
