use thiserror::Error;

/// Errors raised while decoding inbound datagrams.
///
/// All of these are packet-scoped: the offending datagram is dropped and
/// the server carries on.
#[derive(Error, Debug)]
pub enum IpmiMsgError {
    #[error("packet too short ({0} bytes)")]
    ShortPacket(usize),

    #[error("not an RMCP/IPMI datagram")]
    BadMagic,

    #[error("IPMI message checksum mismatch")]
    BadChecksum,

    #[error("unknown payload type {0:#04x}")]
    UnknownPayloadType(u8),

    #[error("malformed {0} payload")]
    MalformedPayload(&'static str),
}
