//! An IPMI 2.0 BMC server core.
//!
//! This crate implements the session side of a software BMC: RMCP+
//! session establishment over UDP, the four-message RAKP authenticated
//! key agreement, and dispatch of encrypted, integrity-protected requests
//! to a pluggable [`BmcBackend`]. Cipher suite 3 (RAKP-HMAC-SHA1,
//! HMAC-SHA1-96, AES-CBC-128) is the only suite on offer.
//!
//! The dispatch model is single-threaded and cooperative: the host feeds
//! datagrams to [`IpmiServer::handle_datagram`] (or lets
//! [`IpmiServer::run`] drive a transport) and each packet is handled to
//! completion before the next one is looked at.

#![forbid(unsafe_code)]

pub mod auth;
pub mod backend;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod event;
pub mod payloads;
pub mod server;
pub mod session;

pub use auth::{AuthStore, StaticAuth};
pub use backend::{BmcBackend, DeviceInfo, RejectAllBackend, Request, SessionRef};
pub use clock::{Clock, MonotonicClock};
pub use config::ServerConfig;
pub use crypto::{EntropySource, OsEntropy};
pub use error::Error;
pub use event::{NullObserver, ProtocolEvent, ProtocolObserver};
pub use payloads::StaticPayloads;
pub use server::IpmiServer;
pub use session::{Session, SessionState};

pub use ipmi_msg as msg;
pub use ipmi_transport as transport;

/// BMC server Result type
pub type Result<T> = std::result::Result<T, Error>;
