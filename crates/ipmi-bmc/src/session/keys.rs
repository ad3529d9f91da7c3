//! The RAKP key schedule and authcodes.
//!
//! All of the HMAC inputs below are wire-order concatenations; session ids
//! contribute the exact bytes they travel as (little-endian u32).

use crate::crypto;

/// Keys derived when RAKP3 verifies. Only `Active` sessions hold a value
/// of this type, which is what keeps pre-handshake packets away from the
/// sealed-payload path.
#[derive(Clone)]
pub struct SessionKeys {
    /// Session integrity key.
    pub sik: [u8; 20],
    /// Integrity key for the HMAC-SHA1-96 trailer.
    pub k1: [u8; 20],
    /// Confidentiality key material.
    pub k2: [u8; 20],
    /// AES-CBC-128 key, the first half of `k2`.
    pub aes_key: [u8; 16],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// Derives SIK, K1, K2 and the AES key from the handshake inputs.
pub(crate) fn derive(
    k_g: &[u8],
    remote_random: &[u8; 16],
    managed_random: &[u8; 16],
    role: u8,
    username: &[u8],
) -> SessionKeys {
    let mut seed = Vec::with_capacity(34 + username.len());
    seed.extend_from_slice(remote_random);
    seed.extend_from_slice(managed_random);
    seed.push(role);
    seed.push(username.len() as u8);
    seed.extend_from_slice(username);

    let sik = crypto::hmac_sha1(k_g, &seed);
    let k1 = crypto::hmac_sha1(&sik, &[0x01; 20]);
    let k2 = crypto::hmac_sha1(&sik, &[0x02; 20]);
    let mut aes_key = [0u8; 16];
    aes_key.copy_from_slice(&k2[..16]);

    SessionKeys {
        sik,
        k1,
        k2,
        aes_key,
    }
}

/// The authcode the BMC discloses in RAKP2, keyed with the user key.
pub(crate) fn rakp2_authcode(
    k_uid: &[u8],
    remote_session_id: u32,
    managed_session_id: &[u8; 4],
    remote_random: &[u8; 16],
    managed_random: &[u8; 16],
    guid: &[u8; 16],
    role: u8,
    username: &[u8],
) -> [u8; 20] {
    let mut data = Vec::with_capacity(58 + username.len());
    data.extend_from_slice(&remote_session_id.to_le_bytes());
    data.extend_from_slice(managed_session_id);
    data.extend_from_slice(remote_random);
    data.extend_from_slice(managed_random);
    data.extend_from_slice(guid);
    data.push(role);
    data.push(username.len() as u8);
    data.extend_from_slice(username);
    crypto::hmac_sha1(k_uid, &data)
}

/// The authcode the console must present in RAKP3.
pub(crate) fn rakp3_authcode(
    k_uid: &[u8],
    managed_random: &[u8; 16],
    remote_session_id: u32,
    role: u8,
    username: &[u8],
) -> [u8; 20] {
    let mut data = Vec::with_capacity(22 + username.len());
    data.extend_from_slice(managed_random);
    data.extend_from_slice(&remote_session_id.to_le_bytes());
    data.push(role);
    data.push(username.len() as u8);
    data.extend_from_slice(username);
    crypto::hmac_sha1(k_uid, &data)
}

/// The RAKP4 integrity check value, keyed with the freshly derived SIK.
pub(crate) fn rakp4_integrity_check(
    sik: &[u8; 20],
    remote_random: &[u8; 16],
    managed_session_id: &[u8; 4],
    guid: &[u8; 16],
) -> [u8; 12] {
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(remote_random);
    data.extend_from_slice(managed_session_id);
    data.extend_from_slice(guid);
    crypto::hmac_sha1_96(sik, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Fixed handshake inputs used across the schedule tests.
    const USERNAME: &[u8] = b"admin";
    const PASSWORD: &[u8] = b"admin";
    const ROLE: u8 = 0x14;
    const REMOTE_SID: u32 = u32::from_le_bytes([0x01, 0x02, 0x03, 0x04]);
    const MANAGED_SID: [u8; 4] = [0x0a, 0x0b, 0x0c, 0x0d];
    const R_M: [u8; 16] = [0x00; 16];
    const R_C: [u8; 16] = [0x11; 16];

    fn guid() -> [u8; 16] {
        std::array::from_fn(|i| (i as u8).wrapping_mul(0x11))
    }

    #[test]
    fn sik_input_ordering() {
        let keys = derive(PASSWORD, &R_M, &R_C, ROLE, USERNAME);

        let mut seed = Vec::new();
        seed.extend_from_slice(&R_M);
        seed.extend_from_slice(&R_C);
        seed.extend_from_slice(&[ROLE, USERNAME.len() as u8]);
        seed.extend_from_slice(USERNAME);
        assert_eq!(keys.sik, crypto::hmac_sha1(PASSWORD, &seed));

        assert_eq!(keys.k1, crypto::hmac_sha1(&keys.sik, &[0x01; 20]));
        assert_eq!(keys.k2, crypto::hmac_sha1(&keys.sik, &[0x02; 20]));
        assert_eq!(keys.aes_key, keys.k2[..16]);
        assert_ne!(keys.k1, keys.k2);
    }

    #[test]
    fn rakp2_input_ordering() {
        let code = rakp2_authcode(
            PASSWORD,
            REMOTE_SID,
            &MANAGED_SID,
            &R_M,
            &R_C,
            &guid(),
            ROLE,
            USERNAME,
        );

        let mut data = Vec::new();
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        data.extend_from_slice(&MANAGED_SID);
        data.extend_from_slice(&R_M);
        data.extend_from_slice(&R_C);
        data.extend_from_slice(&guid());
        data.extend_from_slice(&[ROLE, USERNAME.len() as u8]);
        data.extend_from_slice(USERNAME);
        assert_eq!(code, crypto::hmac_sha1(PASSWORD, &data));
    }

    #[test]
    fn rakp3_input_ordering() {
        let code = rakp3_authcode(PASSWORD, &R_C, REMOTE_SID, ROLE, USERNAME);

        let mut data = Vec::new();
        data.extend_from_slice(&R_C);
        data.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        data.extend_from_slice(&[ROLE, USERNAME.len() as u8]);
        data.extend_from_slice(USERNAME);
        assert_eq!(code, crypto::hmac_sha1(PASSWORD, &data));
    }

    #[test]
    fn rakp4_input_ordering() {
        let keys = derive(PASSWORD, &R_M, &R_C, ROLE, USERNAME);
        let check = rakp4_integrity_check(&keys.sik, &R_M, &MANAGED_SID, &guid());

        let mut data = Vec::new();
        data.extend_from_slice(&R_M);
        data.extend_from_slice(&MANAGED_SID);
        data.extend_from_slice(&guid());
        assert_eq!(check, crypto::hmac_sha1(&keys.sik, &data)[..12]);
    }

    #[test]
    fn schedule_depends_on_every_input() {
        let base = derive(PASSWORD, &R_M, &R_C, ROLE, USERNAME);
        assert_ne!(
            base.sik,
            derive(b"other", &R_M, &R_C, ROLE, USERNAME).sik
        );
        assert_ne!(
            base.sik,
            derive(PASSWORD, &[1; 16], &R_C, ROLE, USERNAME).sik
        );
        assert_ne!(
            base.sik,
            derive(PASSWORD, &R_M, &R_C, 0x12, USERNAME).sik
        );
        assert_ne!(
            base.sik,
            derive(PASSWORD, &R_M, &R_C, ROLE, b"guest").sik
        );
    }
}
