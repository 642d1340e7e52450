//! Deterministic filename cipher
//!
//! Filenames stored on the remote drive are encrypted per path segment
//! with AES-256-GCM and encoded as URL-safe base64. The nonce is derived
//! from the plaintext name itself (first 12 bytes of its SHA-256), which
//! makes the mapping deterministic: the remote adapter can compute the
//! stored name for any plaintext path without a lookup table. Each
//! distinct name gets a distinct nonce, which keeps nonce reuse within
//! GCM's rules for this usage.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::CryptoError;

const NONCE_LEN: usize = 12;

fn name_nonce(name: &str) -> [u8; NONCE_LEN] {
    let digest = Sha256::digest(name.as_bytes());
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&digest[..NONCE_LEN]);
    nonce
}

/// Encrypts one path segment into a URL-safe base64 string.
pub fn encrypt_name(name: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(key.into());
    let nonce_bytes = name_nonce(name);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: name.as_bytes(),
                aad: &[],
            },
        )
        .map_err(|_| CryptoError::NameSeal)?;

    // Prefix the nonce so decryption does not need to re-derive it.
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(URL_SAFE.encode(out))
}

/// Decrypts a segment produced by [`encrypt_name`].
///
/// Fails with [`CryptoError::NameOpen`] for names that were never
/// encrypted; listing code treats that case as a plaintext legacy name.
pub fn decrypt_name(encoded: &str, key: &[u8; 32]) -> Result<String, CryptoError> {
    let data = URL_SAFE.decode(encoded)?;
    if data.len() < NONCE_LEN {
        return Err(CryptoError::NameTruncated);
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(key.into());
    let plain = cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| CryptoError::NameOpen)?;

    String::from_utf8(plain).map_err(|_| CryptoError::NameUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive_key;

    #[test]
    fn round_trip() {
        let key = derive_key("names");
        let sealed = encrypt_name("report.pdf", &key).unwrap();
        assert_ne!(sealed, "report.pdf");
        assert_eq!(decrypt_name(&sealed, &key).unwrap(), "report.pdf");
    }

    #[test]
    fn encryption_is_deterministic() {
        // The remote adapter relies on this to address paths directly.
        let key = derive_key("names");
        assert_eq!(
            encrypt_name("a.txt", &key).unwrap(),
            encrypt_name("a.txt", &key).unwrap()
        );
        assert_ne!(
            encrypt_name("a.txt", &key).unwrap(),
            encrypt_name("b.txt", &key).unwrap()
        );
    }

    #[test]
    fn plaintext_name_fails_to_decrypt() {
        let key = derive_key("names");
        assert!(decrypt_name("just-a-folder", &key).is_err());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let sealed = encrypt_name("secret.doc", &derive_key("one")).unwrap();
        assert!(matches!(
            decrypt_name(&sealed, &derive_key("two")),
            Err(CryptoError::NameOpen)
        ));
    }

    #[test]
    fn unicode_names_survive() {
        let key = derive_key("names");
        let name = "Ünïcodé 文件.txt";
        let sealed = encrypt_name(name, &key).unwrap();
        assert_eq!(decrypt_name(&sealed, &key).unwrap(), name);
    }
}
