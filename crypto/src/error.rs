use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid length: expected {expected} bytes, found {found}")]
    InvalidLength { expected: usize, found: usize },

    #[error("memo ciphertext of {found} bytes exceeds the {max} byte slot")]
    MemoTooLarge { found: usize, max: usize },

    #[error("aead encryption failed")]
    EncryptionFailed,

    #[error("aead decryption failed")]
    DecryptionFailed,

    #[error("invalid field encoding")]
    InvalidField,
}
