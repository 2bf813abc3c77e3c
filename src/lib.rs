//! # minidhcp
//!
//! A small single-threaded DHCPv4 server (RFC 2131 / RFC 2132) with a
//! flat-file lease store.
//!
//! ## Features
//!
//! - DISCOVER, OFFER, REQUEST, ACK, NAK, RELEASE, DECLINE, INFORM
//! - Deterministic address allocation from one inclusive pool
//! - 60 second quarantine for declined addresses
//! - Lease persistence across restarts
//! - Replies routed by `ciaddr`, broadcast flag and relay agent (`giaddr`)
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use minidhcp::{Config, DhcpServer};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> minidhcp::Result<()> {
//!     let config = Config::load_or_create("config.json")?;
//!     let mut server = DhcpServer::new(config).await?;
//!     server.run(&AtomicBool::new(false)).await?;
//!     server.save_leases().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`codec`] - Options area TLV encoding and decoding
//! - [`DhcpPacket`] - DHCP packet parsing and encoding
//! - [`LeaseTable`] - MAC-keyed lease table with text persistence
//! - [`allocate`] - Address selection over an [`AddressPool`]
//! - [`MessageHandler`] - Per-message state machine, free of I/O
//! - [`DhcpServer`] - UDP receive loop on port 67
//! - [`Config`] - Server configuration (pool, lease duration, router, DNS)

pub mod allocator;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod lease;
pub mod options;
pub mod packet;
pub mod server;

pub use allocator::{AddressPool, allocate};
pub use config::Config;
pub use error::{Error, Result};
pub use handler::{Destination, MessageHandler, Reply};
pub use lease::{Lease, LeaseTable};
pub use options::{DhcpOption, MessageType, OptionCode};
pub use packet::{DhcpPacket, MacAddress};
pub use server::DhcpServer;
