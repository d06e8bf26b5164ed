//! Diffie-Hellman over the fixed 768-bit group used by the credential
//! hand-off (§4.A). Generator is 2; the modulus is a Sophie-Germain safe
//! prime (`p = 2q + 1`, both prime) of exactly 768 bits, producing 96-byte
//! public/shared keys.

use num_bigint::BigUint;
use rand::RngCore;

/// 768-bit Sophie-Germain safe prime, generator 2.
const DH_PRIME_BYTES: [u8; 96] = [
    0xfb, 0x17, 0x97, 0x58, 0xce, 0x92, 0x22, 0x41, 0x9d, 0x5c, 0x77, 0x34, 0x33, 0xde, 0x60, 0xd2,
    0xe6, 0xd3, 0x63, 0x0c, 0xd6, 0x41, 0x2b, 0x12, 0x38, 0xfd, 0xbd, 0xf2, 0x5f, 0x61, 0x65, 0x70,
    0x4e, 0x27, 0x6e, 0x15, 0x0a, 0x92, 0xf6, 0x5b, 0x09, 0xf6, 0xdb, 0x65, 0xbe, 0x8f, 0x74, 0xaf,
    0xb1, 0x57, 0x03, 0x7c, 0x60, 0x1b, 0x62, 0xd9, 0xca, 0x3c, 0x44, 0xe8, 0x1b, 0xea, 0xcb, 0xf8,
    0x49, 0x9f, 0xb8, 0xeb, 0x18, 0xcc, 0x46, 0x04, 0x9d, 0xbe, 0xd6, 0x41, 0xe8, 0xa6, 0xb6, 0x06,
    0xc3, 0xc1, 0xa8, 0x0d, 0x0d, 0x42, 0x52, 0x36, 0x34, 0xa0, 0xd0, 0xac, 0xcb, 0x1b, 0xb6, 0x7b,
];

const DH_KEY_LEN: usize = 96;

pub struct DiffieHellman {
    private_key: [u8; DH_KEY_LEN],
}

impl DiffieHellman {
    /// Generates a fresh 96-byte random private key.
    pub fn new() -> Self {
        let mut private_key = [0u8; DH_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut private_key);
        Self { private_key }
    }

    /// Builds a DH instance from a fixed private key (§4.A "MAY fix it for
    /// deterministic tests").
    pub fn new_with_private_key(private_key: [u8; DH_KEY_LEN]) -> Self {
        Self { private_key }
    }

    fn prime() -> BigUint {
        BigUint::from_bytes_be(&DH_PRIME_BYTES)
    }

    fn private_key_value(&self) -> BigUint {
        BigUint::from_bytes_be(&self.private_key)
    }

    /// Computes `2^private_key mod p`, returned as a 96-byte big-endian buffer.
    pub fn public_key(&self) -> [u8; DH_KEY_LEN] {
        let generator = BigUint::from(2u32);
        let result = generator.modpow(&self.private_key_value(), &Self::prime());
        let mut out = [0u8; DH_KEY_LEN];
        let bytes = result.to_bytes_be();
        out[DH_KEY_LEN - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// Computes `remote_public_key^private_key mod p`.
    pub fn shared_key(&self, remote_public_key: &[u8]) -> [u8; DH_KEY_LEN] {
        let remote = BigUint::from_bytes_be(remote_public_key);
        let result = remote.modpow(&self.private_key_value(), &Self::prime());
        let mut out = [0u8; DH_KEY_LEN];
        let bytes = result.to_bytes_be();
        out[DH_KEY_LEN - bytes.len()..].copy_from_slice(&bytes);
        out
    }
}

impl Default for DiffieHellman {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_private_key() -> [u8; DH_KEY_LEN] {
        let mut key = [0u8; DH_KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_add(2);
        }
        key
    }

    #[test]
    fn shared_secret_agrees_both_directions() {
        let alice = DiffieHellman::new_with_private_key(fixed_private_key());
        let mut bob_key = fixed_private_key();
        bob_key[0] = 3;
        let bob = DiffieHellman::new_with_private_key(bob_key);

        let shared_from_alice = alice.shared_key(&bob.public_key());
        let shared_from_bob = bob.shared_key(&alice.public_key());
        assert_eq!(shared_from_alice, shared_from_bob);
    }

    #[test]
    fn public_key_is_96_bytes() {
        let dh = DiffieHellman::new_with_private_key(fixed_private_key());
        assert_eq!(dh.public_key().len(), DH_KEY_LEN);
    }
}
