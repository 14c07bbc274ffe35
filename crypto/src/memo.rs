//! Memo encryption.
//!
//! Notes carry an optional memo field encrypted to the recipient's viewing
//! key. The viewing key lives in the BN254 scalar field and is never usable
//! directly as an X25519 scalar, so HKDF bridges the two key spaces: each
//! viewing key deterministically expands into an X25519 static secret, and
//! the memo itself is sealed under a fresh ephemeral ECDH exchange per send
//! (forward secrecy against a later-compromised viewing key does not hold --
//! the recipient's static secret is itself derived from the viewing key --
//! but each memo's AEAD key is still unique).
//!
//! Wire format: `ephemeral_pubkey(32) || nonce(12) || ciphertext+tag`.

use chacha20poly1305::aead::{Aead, Payload};
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::CryptoError;
use crate::field::{field_to_bytes, Fr};

pub const MAX_MEMO_LEN: usize = 1024;

const STATIC_SECRET_DOMAIN: &[u8] = b"zdoge/memo/x25519-static-secret/v1";
const AEAD_KEY_DOMAIN: &[u8] = b"zdoge/memo/chacha20poly1305-key/v1";
const HEADER_LEN: usize = 32 + 12;
const AEAD_TAG_LEN: usize = 16;

fn memo_static_secret(viewing_key: &Fr) -> StaticSecret {
    let ikm = field_to_bytes(viewing_key);
    let hk = Hkdf::<Sha256>::new(None, &ikm);
    let mut okm = [0u8; 32];
    hk.expand(STATIC_SECRET_DOMAIN, &mut okm)
        .expect("32 is a valid HKDF-SHA256 output length");
    StaticSecret::from(okm)
}

/// The memo-encryption public key published alongside a shielded address.
pub fn memo_public_key(viewing_key: &Fr) -> [u8; 32] {
    PublicKey::from(&memo_static_secret(viewing_key)).to_bytes()
}

fn aead_key(shared_secret: &x25519_dalek::SharedSecret) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, shared_secret.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(AEAD_KEY_DOMAIN, &mut okm)
        .expect("32 is a valid HKDF-SHA256 output length");
    okm
}

/// Encrypt `plaintext` for the holder of `recipient_viewing_key`. `MAX_MEMO_LEN`
/// bounds the assembled wire (header + ciphertext + AEAD tag), not the
/// plaintext, since that's what actually lands on chain.
pub fn encrypt_memo(recipient_viewing_key: &Fr, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut rng = rand::rngs::OsRng;
    let ephemeral = StaticSecret::random_from_rng(&mut rng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let recipient_public = PublicKey::from(&memo_static_secret(recipient_viewing_key));
    let shared = ephemeral.diffie_hellman(&recipient_public);

    let key_bytes = aead_key(&shared);
    let cipher = ChaCha20Poly1305::new(key_bytes.as_slice().into());

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: ephemeral_public.as_bytes(),
            },
        )
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);

    if out.len() > MAX_MEMO_LEN {
        return Err(CryptoError::MemoTooLarge {
            found: out.len(),
            max: MAX_MEMO_LEN,
        });
    }
    Ok(out)
}

/// Decrypt a memo previously produced by [`encrypt_memo`] for `viewing_key`.
pub fn decrypt_memo(viewing_key: &Fr, wire: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if wire.len() < HEADER_LEN {
        return Err(CryptoError::InvalidLength {
            expected: HEADER_LEN,
            found: wire.len(),
        });
    }

    let (ephemeral_public_bytes, rest) = wire.split_at(32);
    let (nonce_bytes, ciphertext) = rest.split_at(12);

    let ephemeral_public = PublicKey::from(
        <[u8; 32]>::try_from(ephemeral_public_bytes).expect("split_at(32) guarantees the length"),
    );
    let secret = memo_static_secret(viewing_key);
    let shared = secret.diffie_hellman(&ephemeral_public);

    let key_bytes = aead_key(&shared);
    let cipher = ChaCha20Poly1305::new(key_bytes.as_slice().into());
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: ephemeral_public_bytes,
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::random_field;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let viewing_key = random_field();
        let memo = b"hello from the sender";
        let wire = encrypt_memo(&viewing_key, memo).unwrap();
        let recovered = decrypt_memo(&viewing_key, &wire).unwrap();
        assert_eq!(recovered, memo);
    }

    #[test]
    fn wrong_viewing_key_fails_to_decrypt() {
        let viewing_key = random_field();
        let other_key = random_field();
        let wire = encrypt_memo(&viewing_key, b"secret memo").unwrap();
        assert!(decrypt_memo(&other_key, &wire).is_err());
    }

    #[test]
    fn oversize_memo_is_rejected() {
        let viewing_key = random_field();
        // A plaintext right at the cap still blows the budget once the
        // header and AEAD tag are accounted for.
        let memo = vec![0u8; MAX_MEMO_LEN];
        match encrypt_memo(&viewing_key, &memo) {
            Err(CryptoError::MemoTooLarge { found, max }) => {
                assert_eq!(found, HEADER_LEN + memo.len() + AEAD_TAG_LEN);
                assert_eq!(max, MAX_MEMO_LEN);
            }
            other => panic!("expected MemoTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn memo_within_wire_budget_is_accepted() {
        let viewing_key = random_field();
        let memo = vec![0u8; MAX_MEMO_LEN - HEADER_LEN - AEAD_TAG_LEN];
        let wire = encrypt_memo(&viewing_key, &memo).unwrap();
        assert_eq!(wire.len(), MAX_MEMO_LEN);
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let viewing_key = random_field();
        let mut wire = encrypt_memo(&viewing_key, b"tamper me").unwrap();
        let last = wire.len() - 1;
        wire[last] ^= 0xff;
        assert!(decrypt_memo(&viewing_key, &wire).is_err());
    }

    #[test]
    fn empty_memo_round_trips() {
        let viewing_key = random_field();
        let wire = encrypt_memo(&viewing_key, b"").unwrap();
        assert_eq!(decrypt_memo(&viewing_key, &wire).unwrap(), b"");
    }
}
