//! Failure modes of the sync layer.
//!
//! None of these terminate a process on their own: callers log and skip the
//! offending datagram or peer. Only `BindFailure` disables networking, and
//! even then only for the session that hit it.

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    /// Datagram was not valid JSON or carried a missing/unknown `type`.
    #[error("malformed message: {0}")]
    MalformedMessage(#[from] serde_json::Error),

    /// An outgoing message could not be serialized.
    #[error("failed to encode message: {0}")]
    EncodeFailure(#[source] serde_json::Error),

    /// Sending to one specific peer failed.
    #[error("peer {addr} unreachable: {source}")]
    Unreachable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A door event referenced an id with no local door object.
    #[error("unknown door {0}")]
    UnknownDoor(u32),

    #[error("failed to bind {addr}: {source}")]
    BindFailure {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The session was closed and no longer owns a socket.
    #[error("session closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<u32>("not json").unwrap_err()
    }

    #[test]
    fn test_encode_and_decode_failures_are_distinct() {
        let decode: NetError = json_error().into();
        assert!(matches!(decode, NetError::MalformedMessage(_)));
        assert!(decode.to_string().starts_with("malformed message"));

        let encode = NetError::EncodeFailure(json_error());
        assert!(!matches!(encode, NetError::MalformedMessage(_)));
        assert!(encode.to_string().starts_with("failed to encode message"));
    }
}
