//! The credential blob (§4.B, §3 "Credential blob"): decrypts the zero-conf
//! hand-off, derives the long-lived auth token, and holds identity.

use crate::codec::varint::read_uvarint;
use crate::crypto::digest::{hmac_sha1, pbkdf2_hmac_sha1, sha1};
use crate::crypto::DiffieHellman;
use crate::error::{CoreError, CoreResult};
use aes::cipher::{BlockDecrypt, BlockSizeUser, KeyInit, KeyIvInit};
use aes::Aes192;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use std::collections::HashMap;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// The decrypted, long-lived credential produced by the hand-off: opaque
/// bytes plus an auth-type tag, sufficient to mint access tokens.
#[derive(Debug, Clone)]
pub struct AuthBlob {
    pub auth_type: u32,
    pub data: Vec<u8>,
}

/// Identity carried alongside the blob.
#[derive(Debug, Clone)]
pub struct Identity {
    pub device_id: String,
    pub device_name: String,
    pub username: Option<String>,
}

/// Owns the DH keypair used for the zero-conf hand-off and the resulting
/// `AuthBlob` once a controller has authenticated.
pub struct ZeroconfAuthenticator {
    dh: DiffieHellman,
    identity: Identity,
    auth_blob: Option<AuthBlob>,
    username: Option<String>,
}

#[derive(Debug, Serialize)]
struct ZeroconfResponse {
    status: u32,
    #[serde(rename = "statusString")]
    status_string: &'static str,
    #[serde(rename = "spotifyError")]
    spotify_error: u32,
    version: &'static str,
    #[serde(rename = "deviceID")]
    device_id: String,
    #[serde(rename = "remoteName")]
    remote_name: String,
    #[serde(rename = "activeUser")]
    active_user: String,
    #[serde(rename = "publicKey")]
    public_key: String,
    #[serde(rename = "deviceType")]
    device_type: &'static str,
}

impl ZeroconfAuthenticator {
    pub fn new(device_id: String, device_name: String) -> Self {
        Self {
            dh: DiffieHellman::new(),
            identity: Identity {
                device_id,
                device_name,
                username: None,
            },
            auth_blob: None,
            username: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_blob.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn auth_blob(&self) -> Option<&AuthBlob> {
        self.auth_blob.as_ref()
    }

    /// Handles `POST /spotify_handler?action=addUser`: `query` is the
    /// URL-encoded form body carrying `action`, `userName`, `blob`,
    /// `clientKey`, `deviceId`.
    pub fn authenticate_zeroconf(&mut self, query: &str) -> CoreResult<()> {
        let form = parse_form(query)?;
        let action = form
            .get("action")
            .ok_or_else(|| CoreError::invalid_argument("missing action"))?;
        if action != "addUser" {
            return Err(CoreError::invalid_argument(format!(
                "unsupported zeroconf action: {action}"
            )));
        }
        let user_name = form
            .get("userName")
            .ok_or_else(|| CoreError::invalid_argument("missing userName"))?;
        let blob_b64 = form
            .get("blob")
            .ok_or_else(|| CoreError::invalid_argument("missing blob"))?;
        let client_key_b64 = form
            .get("clientKey")
            .ok_or_else(|| CoreError::invalid_argument("missing clientKey"))?;

        let blob = STANDARD
            .decode(blob_b64)
            .map_err(|e| CoreError::bad_message(e.to_string()))?;
        let client_key = STANDARD
            .decode(client_key_b64)
            .map_err(|e| CoreError::bad_message(e.to_string()))?;

        if blob.len() < 16 + 20 {
            return Err(CoreError::bad_message("zeroconf blob too short"));
        }

        let shared = self.dh.shared_key(&client_key);
        let base_key = &sha1(&shared)[0..16];
        let checksum_key = hmac_sha1(base_key, b"checksum");
        let encryption_key = hmac_sha1(base_key, b"encryption");

        let iv = &blob[0..16];
        let trailer = &blob[blob.len() - 20..];
        let cipher_blob = &blob[16..blob.len() - 20];

        let expected_trailer = hmac_sha1(&checksum_key, cipher_blob);
        if expected_trailer != trailer {
            return Err(CoreError::bad_message("zeroconf checksum mismatch"));
        }

        let mut plaintext = cipher_blob.to_vec();
        let mut cipher = Aes128Ctr::new_from_slices(&encryption_key[..16], iv)
            .map_err(|e| CoreError::bad_message(e.to_string()))?;
        aes::cipher::StreamCipher::apply_keystream(&mut cipher, &mut plaintext);

        self.auth_blob = Some(AuthBlob {
            auth_type: 0,
            data: plaintext,
        });
        self.username = Some(user_name.clone());
        self.identity.username = Some(user_name.clone());
        Ok(())
    }

    pub fn build_zeroconf_response(&self) -> serde_json::Value {
        let response = ZeroconfResponse {
            status: 101,
            status_string: "OK",
            spotify_error: 0,
            version: "2.10.0",
            device_id: self.identity.device_id.clone(),
            remote_name: self.identity.device_name.clone(),
            active_user: self.username.clone().unwrap_or_default(),
            public_key: STANDARD.encode(self.dh.public_key()),
            device_type: "SPEAKER",
        };
        serde_json::to_value(response).expect("ZeroconfResponse always serializes")
    }
}

fn parse_form(query: &str) -> CoreResult<HashMap<String, String>> {
    let mut out = HashMap::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let mut kv = pair.splitn(2, '=');
        let key = kv.next().unwrap_or_default();
        let value = kv.next().unwrap_or_default();
        let key = urlencoding::decode(key)
            .map_err(|e| CoreError::bad_message(e.to_string()))?
            .into_owned();
        let value = urlencoding::decode(value)
            .map_err(|e| CoreError::bad_message(e.to_string()))?
            .into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

/// Decodes a persisted `encrypted_auth_blob` into the final `AuthBlob`
/// (§4.B `decode_encrypted_auth_blob`).
pub fn decode_encrypted_auth_blob(
    device_id: &str,
    username: &str,
    blob_b64: &str,
) -> CoreResult<AuthBlob> {
    let mut data = STANDARD
        .decode(blob_b64)
        .map_err(|e| CoreError::bad_message(e.to_string()))?;

    if data.len() % Aes192::block_size() != 0 || data.is_empty() {
        return Err(CoreError::bad_message("auth blob length not aligned to AES block"));
    }

    let pbkdf2_out = pbkdf2_hmac_sha1(&sha1(device_id.as_bytes()), username.as_bytes(), 256);
    let mut key24 = sha1(&pbkdf2_out).to_vec();
    key24.extend_from_slice(&[0x00, 0x00, 0x00, 0x14]);

    aes_192_ecb_decrypt_in_place(&key24, &mut data)?;

    let len = data.len();
    if len > 16 {
        for i in 0..(len - 16) {
            data[len - i - 1] ^= data[len - i - 17];
        }
    }

    parse_auth_blob(&data)
}

fn aes_192_ecb_decrypt_in_place(key: &[u8], data: &mut [u8]) -> CoreResult<()> {
    let cipher =
        Aes192::new_from_slice(key).map_err(|e| CoreError::bad_message(e.to_string()))?;
    let block_size = Aes192::block_size();
    for chunk in data.chunks_mut(block_size) {
        let block = aes::Block::from_mut_slice(chunk);
        cipher.decrypt_block(block);
    }
    Ok(())
}

fn parse_auth_blob(data: &[u8]) -> CoreResult<AuthBlob> {
    let mut pos = 1usize; // skip 1 byte
    let (skip_len, n) = read_uvarint(data.get(pos..).ok_or_else(too_short)?)?;
    pos += n + skip_len as usize + 1;

    let (auth_type, n) = read_uvarint(data.get(pos..).ok_or_else(too_short)?)?;
    pos += n;

    pos += 1; // skip 1 byte

    let (auth_len, n) = read_uvarint(data.get(pos..).ok_or_else(too_short)?)?;
    pos += n;

    let auth_len = auth_len as usize;
    let auth_bytes = data
        .get(pos..pos + auth_len)
        .ok_or_else(too_short)?
        .to_vec();

    Ok(AuthBlob {
        auth_type: auth_type as u32,
        data: auth_bytes,
    })
}

fn too_short() -> CoreError {
    CoreError::bad_message("auth blob truncated")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_response_reports_status_101() {
        let auth = ZeroconfAuthenticator::new("deadbeef".into(), "speaker".into());
        let response = auth.build_zeroconf_response();
        assert_eq!(response["status"], 101);
        assert_eq!(response["deviceID"], "deadbeef");
    }

    #[test]
    fn addUser_rejects_malformed_form() {
        let mut auth = ZeroconfAuthenticator::new("id".into(), "name".into());
        let err = auth.authenticate_zeroconf("action=addUser").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }
}
