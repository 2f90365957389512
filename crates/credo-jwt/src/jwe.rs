//! Encrypted envelope around a signed token (JWE compact serialization,
//! `alg: dir`, AES-GCM).
//!
//! ```text
//! BASE64URL(header) . "" . BASE64URL(iv) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! The additional authenticated data is the ASCII of the encoded header, so
//! any change to the header fails authentication.

use crate::compact::{decode_segment, encode_segment};
use crate::keys::{ContentEncryption, EncryptionKey};
use crate::{Error, Result};

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const DIRECT: &str = "dir";
const NESTED_CONTENT_TYPE: &str = "JWT";
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
}

/// Encrypt a signed token. A fresh random IV is drawn for every call.
pub fn encrypt(signed: &str, key: &EncryptionKey) -> Result<String> {
    let header = JweHeader {
        alg: DIRECT.to_string(),
        enc: key.method().as_str().to_string(),
        cty: Some(NESTED_CONTENT_TYPE.to_string()),
    };
    let header_segment = encode_segment(&serde_json::to_vec(&header)?);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut sealed = seal(key, &iv, signed.as_bytes(), header_segment.as_bytes())?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    Ok(format!(
        "{header_segment}..{}.{}.{}",
        encode_segment(&iv),
        encode_segment(&sealed),
        encode_segment(&tag)
    ))
}

/// Decrypt a five-segment token back to the signed token it carries.
///
/// Every failure, including a wrong key or a modified segment, is reported as
/// [`Error::DecryptionFailed`].
pub fn decrypt(token: &str, key: &EncryptionKey) -> Result<String> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header_segment, encrypted_key, iv, ciphertext, tag] = segments.as_slice() else {
        return Err(Error::DecryptionFailed);
    };

    let header: JweHeader = decode_segment(header_segment)
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(Error::DecryptionFailed)?;
    if header.alg != DIRECT || header.enc != key.method().as_str() || !encrypted_key.is_empty() {
        return Err(Error::DecryptionFailed);
    }

    let iv = decode_segment(iv)
        .filter(|iv| iv.len() == IV_LEN)
        .ok_or(Error::DecryptionFailed)?;
    let tag = decode_segment(tag)
        .filter(|tag| tag.len() == TAG_LEN)
        .ok_or(Error::DecryptionFailed)?;
    let mut sealed = decode_segment(ciphertext).ok_or(Error::DecryptionFailed)?;
    sealed.extend_from_slice(&tag);

    let plaintext = open(key, &iv, &sealed, header_segment.as_bytes())?;
    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}

fn seal(key: &EncryptionKey, iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::<U12>::from_slice(iv);
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    let sealed = match key.method() {
        ContentEncryption::A128Gcm => Aes128Gcm::new_from_slice(key.bytes())
            .map_err(|_| Error::InvalidKey("bad A128GCM key length".to_string()))?
            .encrypt(nonce, payload),
        ContentEncryption::A256Gcm => Aes256Gcm::new_from_slice(key.bytes())
            .map_err(|_| Error::InvalidKey("bad A256GCM key length".to_string()))?
            .encrypt(nonce, payload),
    };
    sealed.map_err(|_| Error::InvalidKey("content encryption failed".to_string()))
}

fn open(key: &EncryptionKey, iv: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce = Nonce::<U12>::from_slice(iv);
    let payload = Payload { msg: sealed, aad };
    let opened = match key.method() {
        ContentEncryption::A128Gcm => Aes128Gcm::new_from_slice(key.bytes())
            .map_err(|_| Error::DecryptionFailed)?
            .decrypt(nonce, payload),
        ContentEncryption::A256Gcm => Aes256Gcm::new_from_slice(key.bytes())
            .map_err(|_| Error::DecryptionFailed)?
            .decrypt(nonce, payload),
    };
    opened.map_err(|_| Error::DecryptionFailed)
}
