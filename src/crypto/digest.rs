//! HMAC-SHA1 and PBKDF2-HMAC-SHA1 wrappers used only by the blob decoder
//! (§4.A, §4.B). Kept thin: these exist purely so `auth::blob` doesn't reach
//! past the crypto module for primitives.

use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// `HMAC-SHA1(key, message)`.
pub fn hmac_sha1(key: &[u8], message: &[u8]) -> [u8; 20] {
    let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    let result = mac.finalize().into_bytes();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

/// `SHA1(data)`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    use sha1::Digest;
    let mut hasher = Sha1::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

/// `PBKDF2-HMAC-SHA1(password, salt, iterations, 20-byte output)`.
pub fn pbkdf2_hmac_sha1(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 20] {
    let mut out = [0u8; 20];
    pbkdf2_hmac::<Sha1>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha1_of_empty_string_matches_known_vector() {
        let digest = sha1(b"");
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert_eq!(hex, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }

    #[test]
    fn hmac_sha1_is_deterministic() {
        let a = hmac_sha1(b"key", b"message");
        let b = hmac_sha1(b"key", b"message");
        assert_eq!(a, b);
    }
}
