//! Operator-visible protocol anomalies.
//!
//! The protocol mostly mandates silent drops toward the peer; this
//! channel exists so malformed or hostile traffic is still observable
//! server-side.

use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Framing or checksum failure anywhere in the datagram.
    MalformedPacket,
    /// Syntactically valid packet with no handler (unknown payload type,
    /// sessionless command we do not serve).
    UnknownPayload,
    /// Handshake message arriving in a state that cannot accept it.
    OutOfOrderHandshake,
    /// RAKP1 with an empty username.
    AnonymousLoginRejected,
    /// RAKP1 naming a user the auth store does not know.
    UnknownUser,
    /// RAKP3 whose authcode does not match the expected HMAC.
    BadRakp3Authcode,
    /// RAKP3 with a non-zero status: the console rejected RAKP2.
    HandshakeAbandoned,
    /// Active-session packet failing the HMAC-SHA1-96 check.
    IntegrityFailure,
    /// Active-session packet with a stale sequence number.
    ReplayDropped,
    /// A fresh Open Session Request displaced an existing session.
    SessionReplaced,
    /// The inactivity sweep collected a session.
    SessionExpired,
}

pub trait ProtocolObserver {
    fn observe(&mut self, event: ProtocolEvent, peer: SocketAddr);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProtocolObserver for NullObserver {
    fn observe(&mut self, _event: ProtocolEvent, _peer: SocketAddr) {}
}
