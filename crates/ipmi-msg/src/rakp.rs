//! RAKP handshake payloads (messages 1 through 4).
//!
//! Reference: IPMI v2.0 sections 13.20-13.23.

use binrw::prelude::*;

/// RAKP status code for a clean exchange; any other value aborts the
/// handshake.
pub const RAKP_STATUS_NO_ERRORS: u8 = 0x00;

/// Maximum username length the wire format allows.
pub const MAX_USERNAME_LEN: usize = 16;

/// RAKP Message 1 (payload type 0x12), console to BMC.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakpMessage1 {
    pub message_tag: u8,
    #[brw(pad_before = 3)]
    pub managed_session_id: u32,
    pub remote_random: [u8; 16],
    pub role: u8,
    #[brw(pad_before = 2)]
    #[bw(try_calc = u8::try_from(username.len()))]
    #[br(temp)]
    username_len: u8,
    #[br(count = username_len)]
    pub username: Vec<u8>,
}

/// RAKP Message 2 (payload type 0x13), BMC to console. Carries the BMC
/// random number, its GUID, and the first authcode of the exchange.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakpMessage2 {
    pub message_tag: u8,
    #[brw(pad_after = 2)]
    pub status: u8,
    pub remote_session_id: u32,
    pub managed_random: [u8; 16],
    pub guid: [u8; 16],
    pub authcode: [u8; 20],
}

/// RAKP Message 3 (payload type 0x14), console to BMC. The authcode length
/// depends on the negotiated authentication algorithm, so it is kept
/// variable here; with RAKP-HMAC-SHA1 it is 20 bytes.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakpMessage3 {
    pub message_tag: u8,
    #[brw(pad_after = 2)]
    pub status: u8,
    pub managed_session_id: u32,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub authcode: Vec<u8>,
}

/// RAKP Message 4 (payload type 0x15), BMC to console. The integrity check
/// value is an HMAC-SHA1 truncated to 12 bytes under cipher suite 3.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RakpMessage4 {
    pub message_tag: u8,
    #[brw(pad_after = 2)]
    pub status: u8,
    pub remote_session_id: u32,
    pub integrity_check: [u8; 12],
}

impl_to_bytes!(RakpMessage1, RakpMessage2, RakpMessage3, RakpMessage4);
