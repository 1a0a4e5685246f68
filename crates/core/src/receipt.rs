//! TLS receipts.
//!
//! A [`TlsReceipt`] is what a witness reconstructs from a session: the host it
//! connected to and the ordered application data messages, some of which were
//! redacted by the client before the witness could see them.

use serde::{Deserialize, Serialize};

/// The sender of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderType {
    /// The client, ie. the party making the claim.
    Client,
    /// The server the client connected to.
    Server,
}

/// A single message of a TLS transcript.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    /// Who sent the message.
    pub sender_type: SenderType,
    /// The plaintext of the message, empty if redacted.
    pub message: Vec<u8>,
    /// Whether the plaintext was withheld from the witness.
    pub redacted: bool,
}

opaque_debug::implement!(TranscriptMessage);

impl TranscriptMessage {
    /// Creates a message visible to the witness.
    pub fn visible(sender_type: SenderType, message: impl Into<Vec<u8>>) -> Self {
        Self {
            sender_type,
            message: message.into(),
            redacted: false,
        }
    }

    /// Creates a redacted message.
    ///
    /// `message` holds whatever placeholder bytes the transport kept, which
    /// is never plaintext.
    pub fn redacted(sender_type: SenderType, message: impl Into<Vec<u8>>) -> Self {
        Self {
            sender_type,
            message: message.into(),
            redacted: true,
        }
    }
}

/// A receipt of a TLS session observed by a witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsReceipt {
    /// The `host:port` the session was established with.
    pub host_port: String,
    /// The messages of the session, in order.
    pub transcript: Vec<TranscriptMessage>,
}

impl TlsReceipt {
    /// Returns the concatenation of all server messages the witness could
    /// read.
    pub fn visible_server_data(&self) -> Vec<u8> {
        self.transcript
            .iter()
            .filter(|msg| msg.sender_type == SenderType::Server && !msg.redacted)
            .flat_map(|msg| msg.message.iter().copied())
            .collect()
    }

    /// Returns the concatenation of all client messages.
    ///
    /// Redacted messages are replaced byte for byte with `redaction_char`, so
    /// the request keeps its shape and any header lines around a redacted
    /// block remain intact.
    pub fn client_request_data(&self, redaction_char: u8) -> Vec<u8> {
        let mut data = Vec::new();
        for msg in self
            .transcript
            .iter()
            .filter(|msg| msg.sender_type == SenderType::Client)
        {
            if msg.redacted {
                data.resize(data.len() + msg.message.len(), redaction_char);
            } else {
                data.extend_from_slice(&msg.message);
            }
        }

        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> TlsReceipt {
        TlsReceipt {
            host_port: "example.com:443".to_string(),
            transcript: vec![
                TranscriptMessage::visible(SenderType::Client, "GET / HTTP/1.1\r\n"),
                TranscriptMessage::redacted(SenderType::Client, "Cookie: a"),
                TranscriptMessage::visible(SenderType::Client, "\r\n\r\n"),
                TranscriptMessage::visible(SenderType::Server, "HTTP/1.1 200 OK\r\n"),
                TranscriptMessage::redacted(SenderType::Server, "secret"),
                TranscriptMessage::visible(SenderType::Server, "\r\n"),
            ],
        }
    }

    #[test]
    fn test_visible_server_data_skips_redacted() {
        assert_eq!(receipt().visible_server_data(), b"HTTP/1.1 200 OK\r\n\r\n");
    }

    #[test]
    fn test_client_request_data_masks_redacted() {
        assert_eq!(
            receipt().client_request_data(b'*'),
            b"GET / HTTP/1.1\r\n*********\r\n\r\n"
        );
    }

    #[test]
    fn test_sender_type_serde() {
        assert_eq!(
            serde_json::to_string(&SenderType::Server).unwrap(),
            "\"SERVER\""
        );
    }
}
