//! IPMI wire messages and framing.
//!
//! This crate covers the three framing layers of IPMI over LAN: the RMCP
//! envelope, the session headers (both the v2.0 RMCP+ form and the v1.5
//! sessionless form), and the inner checksummed LAN message. The RMCP+
//! session-establishment payloads (open-session and RAKP messages 1-4)
//! live here as well.
//!
//! Reference: IPMI v2.0 specification, sections 13.6-13.28.

#![forbid(unsafe_code)]

#[macro_use]
mod macros;

pub mod error;
pub mod lan;
pub mod open_session;
pub mod rakp;
pub mod rmcp;
pub mod session;

pub use error::IpmiMsgError;
pub use lan::*;
pub use open_session::*;
pub use rakp::*;
pub use rmcp::*;
pub use session::*;

/// IPMI message Result type
pub type Result<T> = std::result::Result<T, IpmiMsgError>;
