//! The inner IPMI LAN message and its checksums.
//!
//! Reference: IPMI v2.0 figure 13-4.

use crate::IpmiMsgError;

/// BMC slave address on the IPMB.
pub const BMC_ADDRESS: u8 = 0x20;
/// Typical software/remote-console requester address.
pub const REMOTE_CONSOLE_ADDRESS: u8 = 0x81;

/// Application network function (requests; responses are `| 1`).
pub const NETFN_APP: u8 = 0x06;

pub const CMD_GET_DEVICE_ID: u8 = 0x01;
pub const CMD_GET_CHANNEL_AUTH_CAPABILITIES: u8 = 0x38;
pub const CMD_SET_SESSION_PRIVILEGE_LEVEL: u8 = 0x3b;
pub const CMD_CLOSE_SESSION: u8 = 0x3c;
pub const CMD_GET_CHANNEL_CIPHER_SUITES: u8 = 0x54;

/// Completion codes (IPMI v2.0 table 5-2).
pub const CC_OK: u8 = 0x00;
pub const CC_PRIVILEGE_LIMIT: u8 = 0x81;
pub const CC_INVALID_COMMAND: u8 = 0xc1;

/// Privilege levels (IPMI v2.0 table 13-17 role field).
pub const PRIVILEGE_CALLBACK: u8 = 1;
pub const PRIVILEGE_USER: u8 = 2;
pub const PRIVILEGE_OPERATOR: u8 = 3;
pub const PRIVILEGE_ADMIN: u8 = 4;

/// Two's-complement checksum over a span of message bytes.
pub fn checksum(span: &[u8]) -> u8 {
    span.iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        .wrapping_neg()
}

fn checksum_ok(span_and_sum: &[u8]) -> bool {
    span_and_sum
        .iter()
        .fold(0u8, |acc, b| acc.wrapping_add(*b))
        == 0
}

/// A decoded LAN message: addressing, network function, command, and body.
///
/// Requests carry raw command data; responses carry the completion code as
/// the first body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanMessage {
    pub rs_addr: u8,
    pub net_fn: u8,
    pub rs_lun: u8,
    pub rq_addr: u8,
    pub rq_seq: u8,
    pub rq_lun: u8,
    pub command: u8,
    pub data: Vec<u8>,
}

impl LanMessage {
    /// Two addressing triplets, the command byte, and no body.
    pub const MIN_LEN: usize = 7;

    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        if bytes.len() < Self::MIN_LEN {
            return Err(IpmiMsgError::ShortPacket(bytes.len()));
        }
        // csum1 covers the responder triplet, csum2 everything after it.
        if !checksum_ok(&bytes[..3]) || !checksum_ok(&bytes[3..]) {
            return Err(IpmiMsgError::BadChecksum);
        }
        Ok(Self {
            rs_addr: bytes[0],
            net_fn: bytes[1] >> 2,
            rs_lun: bytes[1] & 0b11,
            rq_addr: bytes[3],
            rq_seq: bytes[4] >> 2,
            rq_lun: bytes[4] & 0b11,
            command: bytes[5],
            data: bytes[6..bytes.len() - 1].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::MIN_LEN + self.data.len());
        out.push(self.rs_addr);
        out.push(self.net_fn << 2 | (self.rs_lun & 0b11));
        out.push(checksum(&out[..2]));
        out.push(self.rq_addr);
        out.push(self.rq_seq << 2 | (self.rq_lun & 0b11));
        out.push(self.command);
        out.extend_from_slice(&self.data);
        out.push(checksum(&out[3..]));
        out
    }

    /// Builds the response to this request: the requester and responder
    /// fields swap, the network function moves to the response half of the
    /// pair, and the completion code leads the body.
    pub fn respond(&self, completion: u8, data: &[u8]) -> LanMessage {
        let mut body = Vec::with_capacity(1 + data.len());
        body.push(completion);
        body.extend_from_slice(data);
        LanMessage {
            rs_addr: self.rq_addr,
            net_fn: self.net_fn | 1,
            rs_lun: self.rq_lun,
            rq_addr: self.rs_addr,
            rq_seq: self.rq_seq,
            rq_lun: self.rs_lun,
            command: self.command,
            data: body,
        }
    }

    /// Builds a request message addressed to the BMC. Used by tests and by
    /// consoles built on this crate.
    pub fn request(net_fn: u8, command: u8, rq_seq: u8, data: Vec<u8>) -> LanMessage {
        LanMessage {
            rs_addr: BMC_ADDRESS,
            net_fn,
            rs_lun: 0,
            rq_addr: REMOTE_CONSOLE_ADDRESS,
            rq_seq,
            rq_lun: 0,
            command,
            data,
        }
    }

    /// Completion code of a response message.
    pub fn completion(&self) -> Option<u8> {
        self.data.first().copied()
    }
}
