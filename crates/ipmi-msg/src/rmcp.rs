//! The RMCP envelope.

use crate::IpmiMsgError;

/// RMCP header carried on every IPMI-over-LAN datagram: version 6, no ACK
/// requested, message class IPMI.
pub const RMCP_HEADER: [u8; 4] = [0x06, 0x00, 0xff, 0x07];

/// Length of the RMCP envelope, i.e. the offset of the session header.
pub const RMCP_HEADER_LEN: usize = 4;

/// Strips the RMCP envelope, returning the session portion of the
/// datagram. Non-IPMI class values (e.g. ASF presence pings) are rejected
/// so the caller can drop them.
pub fn strip_rmcp(datagram: &[u8]) -> crate::Result<&[u8]> {
    if datagram.len() < RMCP_HEADER_LEN {
        return Err(IpmiMsgError::ShortPacket(datagram.len()));
    }
    if datagram[0] != RMCP_HEADER[0] || datagram[2..4] != RMCP_HEADER[2..4] {
        return Err(IpmiMsgError::BadMagic);
    }
    Ok(&datagram[RMCP_HEADER_LEN..])
}
