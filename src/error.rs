//! Error types for the DHCP server.
//!
//! All fallible operations in this crate return [`Result<T>`], which uses
//! the [`Error`] enum for error variants. Per-packet variants are never
//! fatal: the receive loop logs them and moves on to the next datagram.

use std::net::Ipv4Addr;

/// Errors that can occur during DHCP server operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File system or network I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (config file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed DHCP packet received.
    ///
    /// Covers datagrams shorter than the fixed header, a missing magic
    /// cookie, and truncated or overlong option TLVs.
    #[error("Malformed DHCP packet: {0}")]
    MalformedPacket(String),

    /// The client hardware address cannot be rendered as a MAC.
    ///
    /// Only 6-byte hardware addresses are accepted as lease keys.
    #[error("Unsupported hardware address length {0} (expected 6)")]
    InvalidHardwareAddress(u8),

    /// A response option did not fit in the fixed options buffer.
    #[error("Options buffer overflow while writing option {code}")]
    OptionOverflow { code: u8 },

    /// No address in the pool satisfies any allocation rule.
    #[error("No available IP addresses in pool")]
    NoAddressAvailable,

    /// A REQUEST names a different server in its server identifier.
    #[error("Request is addressed to another server ({0})")]
    ForeignServer(Ipv4Addr),

    /// A persisted lease line could not be parsed.
    #[error("Invalid lease record on line {line}: {reason}")]
    LeaseParse { line: usize, reason: String },

    /// Invalid server configuration.
    ///
    /// Returned by [`Config::validate`](crate::Config::validate).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket creation or configuration error.
    ///
    /// Typically occurs when binding to port 67 without sufficient privileges.
    #[error("Socket error: {0}")]
    Socket(String),
}

/// A specialized Result type for DHCP operations.
pub type Result<T> = std::result::Result<T, Error>;
