//! Thin wrappers over the primitives of cipher suite 3: HMAC-SHA1,
//! HMAC-SHA1-96, and AES-CBC-128, plus constant-time comparison and an
//! entropy seam for deterministic tests.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::Error;

type HmacSha1 = Hmac<Sha1>;
type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const HMAC_SHA1_LEN: usize = 20;
pub const HMAC_SHA1_96_LEN: usize = 12;
pub const AES_BLOCK: usize = 16;

pub fn hmac_sha1(key: &[u8], data: &[u8]) -> [u8; HMAC_SHA1_LEN] {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC-SHA1 accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// HMAC-SHA1 truncated to 96 bits, the integrity format of cipher suite 3.
pub fn hmac_sha1_96(key: &[u8], data: &[u8]) -> [u8; HMAC_SHA1_96_LEN] {
    let full = hmac_sha1(key, data);
    let mut out = [0u8; HMAC_SHA1_96_LEN];
    out.copy_from_slice(&full[..HMAC_SHA1_96_LEN]);
    out
}

/// Compares authentication codes without leaking the mismatch position.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Encrypts `buf` in place with AES-CBC-128. The buffer must already
/// carry the confidentiality trailer padding it to whole blocks.
pub fn aes_cbc_encrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) -> crate::Result<()> {
    let len = buf.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| Error::BadCiphertext)?;
    Ok(())
}

/// Decrypts `buf` in place with AES-CBC-128.
pub fn aes_cbc_decrypt(key: &[u8; 16], iv: &[u8; 16], buf: &mut [u8]) -> crate::Result<()> {
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| Error::BadCiphertext)?;
    Ok(())
}

/// Fresh initialization vector for one outbound packet.
pub fn random_iv() -> [u8; AES_BLOCK] {
    let mut iv = [0u8; AES_BLOCK];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Source of cryptographic randomness for session ids and nonces.
/// Abstracted so tests can pin the values the handshake derives keys from.
pub trait EntropySource {
    fn fill(&mut self, buf: &mut [u8]);
}

/// Operating-system randomness, the production source.
#[derive(Debug, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }
}
