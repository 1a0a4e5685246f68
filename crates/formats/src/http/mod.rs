//! Tooling for working with HTTP data.
//!
//! Responses are parsed into a [`ParsedHttpResponse`] which keeps track of
//! where each part of the decoded body sits in the raw bytes, so that ranges
//! located in the body can be translated back into ranges of the transcript.

mod request;
mod response;

pub use request::{RequestHead, RequestParseError};
pub use response::{BodyChunk, ErrorKind, ParseError, ParsedHttpResponse};
