//! Parsers and locators for the formats carried over witnessed TLS sessions.
//!
//! Everything in this crate reports positions as byte offsets into the data it
//! was given, never as re-serialized copies, so that the offsets can be used to
//! reveal or redact parts of a transcript.

#![deny(missing_docs, unreachable_pub, unused_must_use)]
#![deny(clippy::all)]
#![forbid(unsafe_code)]

pub mod html;
pub mod http;
pub mod json;

#[doc(hidden)]
pub use spansy;
