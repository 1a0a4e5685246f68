use bytes::Bytes;
use tracing::{debug, trace};
use witness_core::ByteRange;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const INITIAL_HEADER_CAPACITY: usize = 32;
const MAX_HEADER_CAPACITY: usize = 1024;

/// A chunk of a body sent with chunked transfer encoding.
///
/// Relates the position of the chunk's data within the raw response to its
/// position within the decoded body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyChunk {
    /// Index of the first data byte of the chunk in the raw response.
    pub raw_offset: usize,
    /// Index of the first data byte of the chunk in the decoded body.
    pub decoded_offset: usize,
    /// Number of data bytes in the chunk.
    pub length: usize,
}

/// An HTTP response parsed from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHttpResponse {
    /// Protocol version, eg. `"HTTP/1.1"`.
    pub version: String,
    /// Status code.
    pub status_code: u16,
    /// Reason phrase.
    pub reason: String,
    /// Header names, lower-cased, and values, in order of appearance.
    pub headers: Vec<(String, String)>,
    /// Index of the end of the status line, excluding its CRLF.
    pub status_line_end_index: usize,
    /// Index of the first byte after the CRLFCRLF terminating the headers.
    pub body_start_index: usize,
    /// The decoded body.
    pub body: Bytes,
    /// The chunks of the body, empty unless the body is chunked.
    pub chunks: Vec<BodyChunk>,
}

impl ParsedHttpResponse {
    /// Parses a raw HTTP response.
    ///
    /// The body is delimited by `Transfer-Encoding: chunked` if present, then
    /// by `Content-Length`, and otherwise extends to the end of the data.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let status_line_end_index = find(raw, b"\r\n").ok_or_else(|| {
            ParseError::new(ErrorKind::MalformedResponse, "status line not terminated")
        })?;
        let head_end = find(raw, HEADER_TERMINATOR).ok_or_else(|| {
            ParseError::new(ErrorKind::BodyNotFound, "header terminator not found")
        })?;
        let body_start_index = head_end + HEADER_TERMINATOR.len();

        let (version, status_code, reason, headers) = parse_head(&raw[..body_start_index])?;

        let is_chunked = header(&headers, "transfer-encoding")
            .map(|value| {
                value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false);

        let (body, chunks) = if is_chunked {
            let (body, chunks) = dechunk(raw, body_start_index)?;
            (Bytes::from(body), chunks)
        } else if let Some(length) = header(&headers, "content-length") {
            let length: usize = length.trim().parse().map_err(|_| {
                ParseError::new(ErrorKind::MalformedResponse, "invalid content-length")
            })?;

            let end = body_start_index
                .checked_add(length)
                .filter(|end| *end <= raw.len())
                .ok_or_else(|| {
                    ParseError::new(
                        ErrorKind::Truncated,
                        format!(
                            "expected {} body bytes, found {}",
                            length,
                            raw.len() - body_start_index
                        ),
                    )
                })?;

            (Bytes::copy_from_slice(&raw[body_start_index..end]), Vec::new())
        } else {
            (Bytes::copy_from_slice(&raw[body_start_index..]), Vec::new())
        };

        debug!(
            "parsed response: status {}, {} headers, body {} bytes in {} chunks",
            status_code,
            headers.len(),
            body.len(),
            chunks.len()
        );

        Ok(Self {
            version,
            status_code,
            reason,
            headers,
            status_line_end_index,
            body_start_index,
            body,
            chunks,
        })
    }

    /// Returns the value of the first header with the given name, compared
    /// case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        header(&self.headers, name)
    }

    /// Returns `true` if the body was sent with chunked transfer encoding.
    pub fn is_chunked(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Translates the start of a range in the decoded body to an index in the
    /// raw response.
    ///
    /// A position on a chunk boundary maps to the first byte of the chunk
    /// which starts there.
    pub fn raw_start(&self, decoded: usize) -> usize {
        if !self.is_chunked() {
            return self.body_start_index + decoded;
        }

        self.chunks
            .iter()
            .find(|chunk| {
                chunk.decoded_offset <= decoded && decoded < chunk.decoded_offset + chunk.length
            })
            .map(|chunk| chunk.raw_offset + (decoded - chunk.decoded_offset))
            .unwrap_or_else(|| self.raw_end(decoded))
    }

    /// Translates the end of a range in the decoded body to an index in the
    /// raw response.
    ///
    /// A position on a chunk boundary maps to the end of the chunk which ends
    /// there, so the chunk framing following it is not included.
    pub fn raw_end(&self, decoded: usize) -> usize {
        if !self.is_chunked() {
            return self.body_start_index + decoded;
        }

        self.chunks
            .iter()
            .find(|chunk| {
                chunk.decoded_offset < decoded && decoded <= chunk.decoded_offset + chunk.length
            })
            .or_else(|| self.chunks.first().filter(|_| decoded == 0))
            .map(|chunk| chunk.raw_offset + (decoded - chunk.decoded_offset))
            .unwrap_or(self.body_start_index + decoded)
    }

    /// Translates a range of the decoded body into the range of the raw
    /// response holding the same bytes.
    ///
    /// For chunked bodies the raw range also covers the framing of any chunk
    /// boundary it crosses.
    pub fn raw_range(&self, decoded: ByteRange) -> ByteRange {
        let from = self.raw_start(decoded.from_index);
        let to = self.raw_end(decoded.to_index).max(from);

        ByteRange::new(from, to)
    }

    /// Translates an index of the raw response to an index in the decoded
    /// body, returning `None` if the byte is not part of the body data, eg.
    /// if it is chunk framing.
    pub fn decoded_index(&self, raw: usize) -> Option<usize> {
        if !self.is_chunked() {
            return raw
                .checked_sub(self.body_start_index)
                .filter(|decoded| *decoded < self.body.len());
        }

        self.chunks
            .iter()
            .find(|chunk| chunk.raw_offset <= raw && raw < chunk.raw_offset + chunk.length)
            .map(|chunk| chunk.decoded_offset + (raw - chunk.raw_offset))
    }
}

fn parse_head(head: &[u8]) -> Result<(String, u16, String, Vec<(String, String)>), ParseError> {
    let mut capacity = INITIAL_HEADER_CAPACITY;
    loop {
        let mut headers = vec![httparse::EMPTY_HEADER; capacity];
        let mut response = httparse::Response::new(&mut headers);

        match response.parse(head) {
            Ok(httparse::Status::Complete(_)) => {
                let (Some(version), Some(code)) = (response.version, response.code) else {
                    return Err(ParseError::new(
                        ErrorKind::MalformedResponse,
                        "incomplete status line",
                    ));
                };

                let headers = response
                    .headers
                    .iter()
                    .map(|h| {
                        (
                            h.name.to_ascii_lowercase(),
                            String::from_utf8_lossy(h.value).into_owned(),
                        )
                    })
                    .collect();

                return Ok((
                    format!("HTTP/1.{}", version),
                    code,
                    response.reason.unwrap_or_default().to_string(),
                    headers,
                ));
            }
            Ok(httparse::Status::Partial) => {
                return Err(ParseError::new(
                    ErrorKind::MalformedResponse,
                    "incomplete response head",
                ))
            }
            Err(httparse::Error::TooManyHeaders) if capacity < MAX_HEADER_CAPACITY => {
                trace!("growing header buffer beyond {}", capacity);
                capacity *= 2;
            }
            Err(e) => {
                return Err(ParseError::new(
                    ErrorKind::MalformedResponse,
                    format!("invalid response head: {}", e),
                ))
            }
        }
    }
}

/// Decodes a chunked body starting at `start`, recording where each chunk's
/// data sits in the raw response.
fn dechunk(raw: &[u8], start: usize) -> Result<(Vec<u8>, Vec<BodyChunk>), ParseError> {
    let mut body = Vec::new();
    let mut chunks = Vec::new();
    let mut pos = start;

    loop {
        let line_len = find(&raw[pos..], b"\r\n")
            .ok_or_else(|| ParseError::new(ErrorKind::Truncated, "missing chunk size line"))?;
        let line = &raw[pos..pos + line_len];

        // Chunk extensions are ignored.
        let size = line.split(|b| *b == b';').next().unwrap_or_default();
        let size = std::str::from_utf8(size)
            .ok()
            .map(str::trim)
            .filter(|size| !size.is_empty())
            .and_then(|size| usize::from_str_radix(size, 16).ok())
            .ok_or_else(|| ParseError::new(ErrorKind::MalformedResponse, "invalid chunk size"))?;

        pos += line_len + 2;

        if size == 0 {
            break;
        }

        let data_end = pos
            .checked_add(size)
            .filter(|end| *end <= raw.len())
            .ok_or_else(|| {
                ParseError::new(
                    ErrorKind::Truncated,
                    format!("chunk of {} bytes exceeds the response", size),
                )
            })?;

        trace!("chunk at {}, {} bytes", pos, size);

        chunks.push(BodyChunk {
            raw_offset: pos,
            decoded_offset: body.len(),
            length: size,
        });
        body.extend_from_slice(&raw[pos..data_end]);

        pos = data_end;
        match raw.get(pos..pos + 2) {
            Some(b"\r\n") => pos += 2,
            Some(_) => {
                return Err(ParseError::new(
                    ErrorKind::MalformedResponse,
                    "missing CRLF after chunk data",
                ))
            }
            None => {
                return Err(ParseError::new(
                    ErrorKind::Truncated,
                    "missing CRLF after chunk data",
                ))
            }
        }
    }

    Ok((body, chunks))
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// An HTTP response parse error.
#[derive(Debug, thiserror::Error)]
#[error("http parse error: {kind}: {msg}")]
pub struct ParseError {
    kind: ErrorKind,
    msg: String,
}

impl ParseError {
    fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }

    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Kind of [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The response head is malformed.
    MalformedResponse,
    /// The response has no body section.
    BodyNotFound,
    /// The body is shorter than announced.
    Truncated,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedResponse => f.write_str("malformed response"),
            ErrorKind::BodyNotFound => f.write_str("body not found"),
            ErrorKind::Truncated => f.write_str("truncated body"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use witness_data_fixtures::http::response;

    use super::*;

    #[test]
    fn test_parse_content_length() {
        let res = ParsedHttpResponse::parse(response::OK_JSON).unwrap();

        assert_eq!(res.status_code, 200);
        assert_eq!(res.reason, "OK");
        assert_eq!(res.version, "HTTP/1.1");
        assert_eq!(res.header("Content-Type"), Some("application/json"));
        assert_eq!(res.status_line_end_index, "HTTP/1.1 200 OK".len());
        assert_eq!(&response::OK_JSON[res.body_start_index..], &res.body[..]);
        assert!(!res.is_chunked());
    }

    #[test]
    fn test_parse_chunked() {
        let res = ParsedHttpResponse::parse(response::OK_CHUNKED_JSON).unwrap();
        let expected = ParsedHttpResponse::parse(response::OK_JSON).unwrap();

        assert_eq!(res.body, expected.body);
        assert_eq!(res.chunks.len(), 3);

        let mut decoded = 0;
        for chunk in &res.chunks {
            assert_eq!(chunk.decoded_offset, decoded);
            assert_eq!(
                &response::OK_CHUNKED_JSON[chunk.raw_offset..chunk.raw_offset + chunk.length],
                &res.body[decoded..decoded + chunk.length]
            );
            decoded += chunk.length;
        }
        assert_eq!(decoded, res.body.len());
    }

    #[test]
    fn test_parse_until_end() {
        let res = ParsedHttpResponse::parse(response::OK_TEXT_CLOSE).unwrap();

        assert_eq!(&res.body[..], b"hello world");
    }

    #[test]
    fn test_chunk_translation_round_trips() {
        let res = ParsedHttpResponse::parse(response::OK_CHUNKED_JSON).unwrap();

        for decoded in 0..res.body.len() {
            let raw = res.raw_start(decoded);
            assert_eq!(res.decoded_index(raw), Some(decoded));
            assert_eq!(response::OK_CHUNKED_JSON[raw], res.body[decoded]);
        }
    }

    #[test]
    fn test_chunk_boundary_translation() {
        let res = ParsedHttpResponse::parse(response::OK_CHUNKED_JSON).unwrap();
        let first = res.chunks[0];
        let second = res.chunks[1];

        // The end of the first chunk does not spill into the framing.
        assert_eq!(res.raw_end(first.length), first.raw_offset + first.length);
        assert_eq!(res.raw_start(first.length), second.raw_offset);
        assert_eq!(res.raw_end(0), first.raw_offset);

        // Framing bytes have no decoded counterpart.
        assert_eq!(res.decoded_index(first.raw_offset + first.length), None);

        let range = res.raw_range(ByteRange::new(first.length - 1, first.length + 1));
        assert_eq!(
            range,
            ByteRange::new(first.raw_offset + first.length - 1, second.raw_offset + 1)
        );
    }

    #[test]
    fn test_identity_translation() {
        let res = ParsedHttpResponse::parse(response::OK_JSON).unwrap();

        assert_eq!(
            res.raw_range(ByteRange::new(2, 6)),
            ByteRange::new(res.body_start_index + 2, res.body_start_index + 6)
        );
        assert_eq!(res.decoded_index(res.body_start_index - 1), None);
        assert_eq!(res.decoded_index(res.body_start_index), Some(0));
    }

    #[rstest]
    #[case::no_status_line(b"HTTP/1.1 200 OK", ErrorKind::MalformedResponse)]
    #[case::no_terminator(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n", ErrorKind::BodyNotFound)]
    #[case::bad_status_line(b"HTP/1.1 200 OK\r\n\r\n", ErrorKind::MalformedResponse)]
    #[case::truncated_length(
        b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort",
        ErrorKind::Truncated
    )]
    #[case::overflowing_length(
        b"HTTP/1.1 200 OK\r\nContent-Length: 18446744073709551615\r\n\r\nshort",
        ErrorKind::Truncated
    )]
    #[case::truncated_chunk(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nff\r\nshort",
        ErrorKind::Truncated
    )]
    #[case::bad_chunk_size(
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\nshort\r\n0\r\n\r\n",
        ErrorKind::MalformedResponse
    )]
    fn test_parse_errors(#[case] raw: &[u8], #[case] kind: ErrorKind) {
        let err = ParsedHttpResponse::parse(raw).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_many_headers() {
        let mut raw = b"HTTP/1.1 200 OK\r\n".to_vec();
        for i in 0..100 {
            raw.extend_from_slice(format!("x-header-{i}: {i}\r\n").as_bytes());
        }
        raw.extend_from_slice(b"Content-Length: 2\r\n\r\nok");

        let res = ParsedHttpResponse::parse(&raw).unwrap();

        assert_eq!(res.headers.len(), 101);
        assert_eq!(&res.body[..], b"ok");
    }
}
