//! IPMI session headers and whole-packet framing.
//!
//! Two header forms follow the RMCP envelope: the IPMI v2.0 (RMCP+) session
//! header used for everything this server negotiates, and the IPMI v1.5
//! sessionless header, which remote consoles still use for the initial
//! Get Channel Authentication Capabilities probe.

use std::io::Cursor;

use binrw::prelude::*;
use modular_bitfield::prelude::*;

use crate::rmcp::{RMCP_HEADER, RMCP_HEADER_LEN, strip_rmcp};
use crate::IpmiMsgError;

/// Format marker distinguishing a v2.0 session header from the v1.5
/// auth-type byte at the same offset.
pub const FORMAT_IPMI_V2: u8 = 0x06;

/// RMCP+ payload numbers.
///
/// Reference: IPMI v2.0 table 13-16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    IpmiMessage = 0x00,
    OpenSessionRequest = 0x10,
    OpenSessionResponse = 0x11,
    Rakp1 = 0x12,
    Rakp2 = 0x13,
    Rakp3 = 0x14,
    Rakp4 = 0x15,
}

impl TryFrom<u8> for PayloadKind {
    type Error = IpmiMsgError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(PayloadKind::IpmiMessage),
            0x10 => Ok(PayloadKind::OpenSessionRequest),
            0x11 => Ok(PayloadKind::OpenSessionResponse),
            0x12 => Ok(PayloadKind::Rakp1),
            0x13 => Ok(PayloadKind::Rakp2),
            0x14 => Ok(PayloadKind::Rakp3),
            0x15 => Ok(PayloadKind::Rakp4),
            other => Err(IpmiMsgError::UnknownPayloadType(other)),
        }
    }
}

/// The payload descriptor byte: payload number in the low six bits, plus
/// the per-packet confidentiality and integrity flags.
#[bitfield]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadField {
    pub number: B6,
    pub encrypted: bool,
    pub authenticated: bool,
}

impl PayloadField {
    /// Descriptor for an unprotected payload of the given kind.
    pub fn plain(kind: PayloadKind) -> Self {
        Self::new().with_number(kind as u8)
    }

    /// Descriptor for an encrypted, integrity-protected IPMI message, the
    /// only protected payload an active cipher-suite-3 session carries.
    pub fn sealed() -> Self {
        Self::new()
            .with_number(PayloadKind::IpmiMessage as u8)
            .with_encrypted(true)
            .with_authenticated(true)
    }

    pub fn kind(&self) -> crate::Result<PayloadKind> {
        PayloadKind::try_from(self.number())
    }
}

/// IPMI v2.0 session header, following the RMCP envelope.
#[binrw]
#[brw(little, magic = 0x06u8)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Header {
    #[br(map = |b: u8| PayloadField::from_bytes([b]))]
    #[bw(map = |f: &PayloadField| f.into_bytes()[0])]
    pub payload: PayloadField,
    pub session_id: u32,
    pub session_seq: u32,
    pub payload_len: u16,
}

impl V2Header {
    /// Serialized header length, including the format marker.
    pub const WIRE_LEN: usize = 12;
    /// Offset of the payload within the whole datagram.
    pub const PAYLOAD_OFFSET: usize = RMCP_HEADER_LEN + Self::WIRE_LEN;
}

/// IPMI v1.5 session header, accepted only for sessionless (auth type
/// NONE) discovery traffic.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V15Header {
    pub auth_type: u8,
    pub session_seq: u32,
    pub session_id: u32,
    pub msg_len: u8,
}

impl V15Header {
    /// Offset of the LAN message within the whole datagram.
    pub const PAYLOAD_OFFSET: usize = 14;

    /// Header for an unauthenticated sessionless reply.
    pub fn sessionless(msg_len: u8) -> Self {
        Self {
            auth_type: 0,
            session_seq: 0,
            session_id: 0,
            msg_len,
        }
    }
}

/// A v2.0 datagram split into its session header and payload bytes. For
/// protected payloads the bytes are still ciphertext; unsealing them is
/// the session's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Packet {
    pub header: V2Header,
    pub payload: Vec<u8>,
}

impl V2Packet {
    pub fn new(payload: PayloadField, session_id: u32, session_seq: u32, body: Vec<u8>) -> Self {
        Self {
            header: V2Header {
                payload,
                session_id,
                session_seq,
                payload_len: body.len() as u16,
            },
            payload: body,
        }
    }

    /// An unprotected packet, as used by the whole session-establishment
    /// exchange.
    pub fn plain(kind: PayloadKind, session_id: u32, session_seq: u32, body: Vec<u8>) -> Self {
        Self::new(PayloadField::plain(kind), session_id, session_seq, body)
    }

    /// Splits a datagram into header and payload. Trailing bytes beyond
    /// the declared payload length (the integrity trailer of protected
    /// packets) are left to the caller.
    pub fn parse(datagram: &[u8]) -> crate::Result<Self> {
        let inner = strip_rmcp(datagram)?;
        if inner.len() < V2Header::WIRE_LEN {
            return Err(IpmiMsgError::ShortPacket(datagram.len()));
        }
        if inner[0] != FORMAT_IPMI_V2 {
            return Err(IpmiMsgError::BadMagic);
        }
        let header = V2Header::read(&mut Cursor::new(inner))
            .map_err(|_| IpmiMsgError::MalformedPayload("session header"))?;
        let end = V2Header::PAYLOAD_OFFSET + header.payload_len as usize;
        if datagram.len() < end {
            return Err(IpmiMsgError::ShortPacket(datagram.len()));
        }
        let payload = datagram[V2Header::PAYLOAD_OFFSET..end].to_vec();
        Ok(Self { header, payload })
    }

    /// Emits the full datagram: RMCP envelope, session header, payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(V2Header::PAYLOAD_OFFSET + self.payload.len());
        out.extend_from_slice(&RMCP_HEADER);
        let mut cursor = Cursor::new(&mut out);
        cursor.set_position(RMCP_HEADER_LEN as u64);
        self.header
            .write(&mut cursor)
            .expect("in-memory header serialization");
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Emits a sessionless v1.5 datagram around a LAN message.
pub fn encode_v15_sessionless(lan: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(V15Header::PAYLOAD_OFFSET + lan.len());
    out.extend_from_slice(&RMCP_HEADER);
    let mut cursor = Cursor::new(&mut out);
    cursor.set_position(RMCP_HEADER_LEN as u64);
    V15Header::sessionless(lan.len() as u8)
        .write(&mut cursor)
        .expect("in-memory header serialization");
    out.extend_from_slice(lan);
    out
}
