//! Error taxonomy for the matrix adapter.
//!
//! One enum covers everything the adapter can report, from fatal startup
//! problems to per-operation failures. The split matters for callers:
//!
//! - **`Configuration`** is permanent and surfaces at startup; nothing is
//!   retried.
//! - **`Connection`**, **`LinkDown`**, **`Io`** and **`ReceiveOverflow`**
//!   describe the transport. The adapter never reconnects on its own; the
//!   owning process watches the connection state and decides.
//! - **`MalformedFrame`** and **`UnknownPort`** are per-frame conditions. A
//!   malformed reply is logged and dropped without touching the connection;
//!   an unknown port only becomes an error when a caller names it explicitly
//!   (unconfigured ports inside a status reply are expected and skipped).
//! - **`CorrelationTimeout`** fails a single awaited operation, never the
//!   link.

use thiserror::Error;

/// Convenience alias for results using the adapter error type.
pub type Result<T> = std::result::Result<T, MatrixError>;

/// Primary error type for the matrix adapter.
#[derive(Error, Debug)]
pub enum MatrixError {
    /// Mandatory configuration is missing or semantically invalid
    /// (e.g. no `address`). Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The TCP connection could not be established.
    #[error("connection error: {0}")]
    Connection(String),

    /// The link dropped (EOF or socket reset) while the adapter was running.
    ///
    /// Every command still queued or awaiting confirmation fails with this
    /// variant; the connection-state watch flips to `Disconnected` so the
    /// owning process can decide whether to dial again.
    #[error("link down")]
    LinkDown,

    /// A reply frame was fully delimited but could not be decoded.
    ///
    /// Logged and dropped; does not crash the connection.
    #[error("malformed frame: {0:?}")]
    MalformedFrame(String),

    /// The receive buffer grew past its cap without a frame terminator.
    ///
    /// Guards against a peer that never sends `;END`; fails the connection.
    #[error("receive buffer exceeded {max} bytes without a frame terminator")]
    ReceiveOverflow { max: usize },

    /// A caller named a port id or display name that configuration does not
    /// know.
    #[error("unknown port: {0}")]
    UnknownPort(String),

    /// An awaited confirmation never arrived within the configured timeout.
    ///
    /// The command may still have taken effect on the device; only the
    /// confirmation is lost.
    #[error("timed out waiting for status confirmation")]
    CorrelationTimeout,

    /// Socket-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = MatrixError::Configuration("missing field `address`".into());
        assert_eq!(
            err.to_string(),
            "configuration error: missing field `address`"
        );

        let err = MatrixError::ReceiveOverflow { max: 16384 };
        assert!(err.to_string().contains("16384"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = MatrixError::from(io);
        assert!(matches!(err, MatrixError::Io(_)));
    }
}
