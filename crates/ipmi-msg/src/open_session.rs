//! RMCP+ Open Session Request/Response payloads.
//!
//! Reference: IPMI v2.0 sections 13.17-13.18.

use binrw::prelude::*;

/// Algorithm record types within the open-session exchange.
pub const PAYLOAD_AUTHENTICATION: u8 = 0x00;
pub const PAYLOAD_INTEGRITY: u8 = 0x01;
pub const PAYLOAD_CONFIDENTIALITY: u8 = 0x02;

/// RAKP-HMAC-SHA1 authentication (table 13-17).
pub const AUTH_RAKP_HMAC_SHA1: u8 = 0x01;
/// HMAC-SHA1-96 integrity (table 13-18).
pub const INTEGRITY_HMAC_SHA1_96: u8 = 0x01;
/// AES-CBC-128 confidentiality (table 13-19).
pub const CONFIDENTIALITY_AES_CBC_128: u8 = 0x01;

/// One 8-byte algorithm record of the open-session exchange.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPayload {
    pub payload_type: u8,
    #[brw(pad_before = 2)]
    #[bw(calc = 8u8)]
    #[br(temp)]
    length: u8,
    #[brw(pad_after = 3)]
    pub algorithm: u8,
}

impl AlgorithmPayload {
    /// The cipher-suite-3 record set: RAKP-HMAC-SHA1 authentication,
    /// HMAC-SHA1-96 integrity, AES-CBC-128 confidentiality.
    pub fn suite3() -> (Self, Self, Self) {
        (
            Self {
                payload_type: PAYLOAD_AUTHENTICATION,
                algorithm: AUTH_RAKP_HMAC_SHA1,
            },
            Self {
                payload_type: PAYLOAD_INTEGRITY,
                algorithm: INTEGRITY_HMAC_SHA1_96,
            },
            Self {
                payload_type: PAYLOAD_CONFIDENTIALITY,
                algorithm: CONFIDENTIALITY_AES_CBC_128,
            },
        )
    }
}

/// Open Session Request (payload type 0x10).
///
/// The algorithm proposals are kept raw: the responder forces cipher
/// suite 3 whatever the console offers.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionRequest {
    pub message_tag: u8,
    pub max_privilege: u8,
    #[brw(pad_before = 2)]
    pub remote_session_id: u32,
    #[br(parse_with = binrw::helpers::until_eof)]
    pub proposals: Vec<u8>,
}

/// Open Session Response (payload type 0x11).
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSessionResponse {
    pub message_tag: u8,
    pub status: u8,
    #[brw(pad_after = 1)]
    pub max_privilege: u8,
    pub remote_session_id: u32,
    pub managed_session_id: u32,
    pub authentication: AlgorithmPayload,
    pub integrity: AlgorithmPayload,
    pub confidentiality: AlgorithmPayload,
}

impl_to_bytes!(AlgorithmPayload, OpenSessionRequest, OpenSessionResponse);
