//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or validating events.
///
/// Any of these coming from a client frame is a protocol violation: the
/// relay answers with an `error` event and closes that connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not valid JSON or does not match any known event.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The handshake announced a protocol version we don't speak.
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    /// The frame decoded but breaks a protocol rule, e.g. a
    /// `requestWebcam` naming both a room and a recipient.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
