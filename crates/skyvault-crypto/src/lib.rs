//! skyvault-crypto - Content and filename encryption
//!
//! Two independent transforms live here:
//!
//! - [`EncryptReader`] / [`DecryptReader`] wrap a byte stream with
//!   AES-256-CTR. Encryption prepends a 16-byte random IV, so ciphertext
//!   is always exactly [`ENCRYPTED_OVERHEAD`] bytes longer than the
//!   plaintext. There is no framing, MAC, or chunking; the transform is a
//!   pure stream wrapper the transfer pipeline can interpose between the
//!   two file system ports.
//! - [`encrypt_name`] / [`decrypt_name`] map filenames with deterministic
//!   AES-256-GCM (nonce derived from the name itself) so that equal names
//!   always encrypt to equal strings and the remote adapter can address
//!   paths without keeping a mapping table.
//!
//! [`derive_key`] turns a passphrase of any length into the 32-byte key
//! both transforms use.

pub mod name;
pub mod stream;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use name::{decrypt_name, encrypt_name};
pub use stream::{DecryptReader, EncryptReader};

/// Fixed size delta between plaintext and ciphertext: the prepended IV.
pub const ENCRYPTED_OVERHEAD: u64 = 16;

/// Errors from the filename cipher.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("filename could not be encrypted")]
    NameSeal,

    #[error("encrypted filename is not valid base64: {0}")]
    NameEncoding(#[from] base64::DecodeError),

    #[error("encrypted filename is too short")]
    NameTruncated,

    #[error("filename could not be decrypted (wrong key or plaintext name)")]
    NameOpen,

    #[error("decrypted filename is not valid UTF-8")]
    NameUtf8,
}

/// Derives the 32-byte AES-256 key from a passphrase via SHA-256.
pub fn derive_key(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_is_deterministic() {
        assert_eq!(derive_key("hunter2"), derive_key("hunter2"));
        assert_ne!(derive_key("hunter2"), derive_key("hunter3"));
    }
}
