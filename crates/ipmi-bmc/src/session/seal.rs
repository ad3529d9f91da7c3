//! Sealing of active-session IPMI payloads: AES-CBC-128 confidentiality
//! inside an HMAC-SHA1-96 integrity trailer.
//!
//! Wire shape of a sealed datagram:
//!
//! ```text
//! rmcp(4) | session header(12) | iv(16) | ciphertext | integrity pad |
//! pad len(1) | next header(1) | authcode(12)
//! ```
//!
//! The ciphertext decrypts to the LAN message followed by a
//! confidentiality trailer (`01 02 ..` then its length); the integrity
//! span runs from the format byte at offset 4 through the next-header
//! byte, padded with `ff` to a four-byte multiple.

use ipmi_msg::{PayloadField, RMCP_HEADER_LEN, V2Header, V2Packet};

use super::SessionKeys;
use crate::crypto::{self, AES_BLOCK, HMAC_SHA1_96_LEN};
use crate::Error;

const INTEGRITY_PAD_BYTE: u8 = 0xff;
const NEXT_HEADER: u8 = 0x07;

/// Builds a fully framed, encrypted, integrity-protected datagram
/// carrying `lan`.
pub(super) fn seal(
    session_id: u32,
    session_seq: u32,
    lan: &[u8],
    keys: &SessionKeys,
) -> crate::Result<Vec<u8>> {
    // Confidentiality trailer: pad bytes 01 02 .. then the pad length,
    // bringing the plaintext to whole AES blocks.
    let conf_pad = (AES_BLOCK - (lan.len() + 1) % AES_BLOCK) % AES_BLOCK;
    let mut body = Vec::with_capacity(AES_BLOCK + lan.len() + conf_pad + 1);
    let iv = crypto::random_iv();
    body.extend_from_slice(&iv);
    body.extend_from_slice(lan);
    body.extend(1..=conf_pad as u8);
    body.push(conf_pad as u8);
    crypto::aes_cbc_encrypt(&keys.aes_key, &iv, &mut body[AES_BLOCK..])?;

    let mut out =
        V2Packet::new(PayloadField::sealed(), session_id, session_seq, body).to_bytes();

    // Integrity pad counts the pad-length and next-header bytes too.
    let span = out.len() - RMCP_HEADER_LEN + 2;
    let pad = (4 - span % 4) % 4;
    out.extend(std::iter::repeat(INTEGRITY_PAD_BYTE).take(pad));
    out.push(pad as u8);
    out.push(NEXT_HEADER);
    let authcode = crypto::hmac_sha1_96(&keys.k1, &out[RMCP_HEADER_LEN..]);
    out.extend_from_slice(&authcode);
    Ok(out)
}

/// Verifies the integrity trailer and decrypts the payload, returning the
/// inner LAN message bytes.
pub(super) fn unseal(
    datagram: &[u8],
    packet: &V2Packet,
    keys: &SessionKeys,
) -> crate::Result<Vec<u8>> {
    let min = V2Header::PAYLOAD_OFFSET + 2 * AES_BLOCK + 2 + HMAC_SHA1_96_LEN;
    if datagram.len() < min {
        return Err(ipmi_msg::IpmiMsgError::ShortPacket(datagram.len()).into());
    }

    let (covered, authcode) = datagram.split_at(datagram.len() - HMAC_SHA1_96_LEN);
    let expected = crypto::hmac_sha1_96(&keys.k1, &covered[RMCP_HEADER_LEN..]);
    if !crypto::ct_eq(&expected, authcode) {
        return Err(Error::IntegrityMismatch);
    }

    if packet.payload.len() < 2 * AES_BLOCK || (packet.payload.len() - AES_BLOCK) % AES_BLOCK != 0
    {
        return Err(Error::BadCiphertext);
    }
    let (iv, ciphertext) = packet.payload.split_at(AES_BLOCK);
    let iv: [u8; AES_BLOCK] = iv.try_into().expect("split at block size");
    let mut plaintext = ciphertext.to_vec();
    crypto::aes_cbc_decrypt(&keys.aes_key, &iv, &mut plaintext)?;

    let conf_pad = *plaintext.last().expect("non-empty plaintext") as usize;
    if conf_pad + 1 >= plaintext.len() {
        return Err(Error::BadCiphertext);
    }
    plaintext.truncate(plaintext.len() - conf_pad - 1);
    Ok(plaintext)
}
