//! Envelope encryption with AES-256-GCM
//!
//! Master keys come from configuration (hex, 32 bytes) and never touch the
//! data model. Everything sensitive in the audit tables is sealed with one.
//!
//! Format: `hex(nonce_12bytes):hex(tag_16bytes):hex(ciphertext)`

use std::fmt;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use thiserror::Error;
use zeroize::Zeroize;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

const FIELD_DELIMITER: char = ':';

/// Invalid key material
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is not valid hex: {0}")]
    Encoding(#[from] hex::FromHexError),
    #[error("key has wrong length: {actual} bytes (expected {expected})", expected = KEY_LEN)]
    Length { actual: usize },
}

/// Sealing failed (only possible for absurdly large plaintexts)
#[derive(Debug, Error)]
#[error("encryption failed")]
pub struct EncryptionError;

/// Opening a blob failed. Never carries partial plaintext.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("malformed envelope: expected 3 fields, found {0}")]
    FieldCount(usize),
    #[error("malformed envelope: {field} is not valid hex")]
    Hex { field: &'static str },
    #[error("malformed envelope: {field} must be {expected} bytes, found {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("decryption failed (wrong key or tampered data)")]
    Authentication,
    #[error("decrypted data is not valid UTF-8")]
    Utf8,
}

/// Master encryption key (32 bytes for AES-256-GCM)
#[derive(Clone)]
pub struct MasterKey {
    key: [u8; KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for MasterKey {}

impl MasterKey {
    /// Exact-length key; never padded or truncated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != KEY_LEN {
            return Err(KeyError::Length {
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Parse a hex-encoded key (64 hex chars)
    pub fn from_hex(encoded: &str) -> Result<Self, KeyError> {
        let mut bytes = hex::decode(encoded.trim())?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Fresh random key (provisioning, development, tests)
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut key);
        Self { key }
    }

    /// Encrypt plaintext → `hex(nonce):hex(tag):hex(ciphertext)`
    ///
    /// Every call draws a fresh nonce, so equal inputs never produce equal blobs.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| EncryptionError)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut nonce);

        let mut ciphertext = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
            .map_err(|_| EncryptionError)?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(EnvelopeBlob {
            nonce,
            tag: tag_bytes,
            ciphertext,
        }
        .to_string())
    }

    /// Decrypt `hex(nonce):hex(tag):hex(ciphertext)` → plaintext
    pub fn open(&self, blob: &str) -> Result<Vec<u8>, DecryptionError> {
        let envelope = EnvelopeBlob::parse(blob)?;
        let cipher =
            Aes256Gcm::new_from_slice(&self.key).map_err(|_| DecryptionError::Authentication)?;

        let mut buffer = envelope.ciphertext;
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&envelope.nonce),
                b"",
                &mut buffer,
                Tag::from_slice(&envelope.tag),
            )
            .map_err(|_| DecryptionError::Authentication)?;
        Ok(buffer)
    }

    /// Encrypt a string → sealed blob
    pub fn seal_str(&self, plaintext: &str) -> Result<String, EncryptionError> {
        self.seal(plaintext.as_bytes())
    }

    /// Decrypt sealed blob → string
    pub fn open_str(&self, blob: &str) -> Result<String, DecryptionError> {
        let bytes = self.open(blob)?;
        String::from_utf8(bytes).map_err(|_| DecryptionError::Utf8)
    }
}

/// Parsed sealed unit: nonce, authentication tag, ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeBlob {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

impl EnvelopeBlob {
    /// Strict parse: exactly three hex fields, fixed nonce/tag lengths.
    pub fn parse(blob: &str) -> Result<Self, DecryptionError> {
        let fields: Vec<&str> = blob.split(FIELD_DELIMITER).collect();
        let [nonce_hex, tag_hex, ciphertext_hex] = fields.as_slice() else {
            return Err(DecryptionError::FieldCount(fields.len()));
        };

        let nonce = decode_fixed::<NONCE_LEN>("nonce", nonce_hex)?;
        let tag = decode_fixed::<TAG_LEN>("tag", tag_hex)?;
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| DecryptionError::Hex {
            field: "ciphertext",
        })?;

        Ok(Self {
            nonce,
            tag,
            ciphertext,
        })
    }
}

impl fmt::Display for EnvelopeBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            hex::encode(self.nonce),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }
}

fn decode_fixed<const N: usize>(
    field: &'static str,
    encoded: &str,
) -> Result<[u8; N], DecryptionError> {
    let bytes = hex::decode(encoded).map_err(|_| DecryptionError::Hex { field })?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| DecryptionError::Length {
            field,
            expected: N,
            actual: bytes.len(),
        })
}

/// Current key plus, during a rotation window, the retired one.
///
/// Seals under `current` only. Opens with `current` first, then `previous`,
/// so records not yet migrated stay readable.
#[derive(Debug, Clone)]
pub struct Keyring {
    current: MasterKey,
    previous: Option<MasterKey>,
}

impl Keyring {
    pub fn new(current: MasterKey) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    pub fn with_previous(current: MasterKey, previous: Option<MasterKey>) -> Self {
        Self { current, previous }
    }

    pub fn current(&self) -> &MasterKey {
        &self.current
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<String, EncryptionError> {
        self.current.seal(plaintext)
    }

    pub fn open(&self, blob: &str) -> Result<Vec<u8>, DecryptionError> {
        match self.current.open(blob) {
            Ok(plain) => Ok(plain),
            // Framing errors are key-independent; only retry on tag mismatch
            Err(DecryptionError::Authentication) => match &self.previous {
                Some(previous) => previous.open(blob),
                None => Err(DecryptionError::Authentication),
            },
            Err(e) => Err(e),
        }
    }
}
