//! Encrypted memo: carries a recipient-decryptable note body alongside a
//! transfer output. Wraps `zdoge_crypto`'s AEAD scheme with the note's wire
//! encoding.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use zdoge_crypto::{field_from_bytes, field_to_bytes, Fr};

use crate::error::{StorageError, WalletError};
use crate::note::Note;

#[derive(Serialize, Deserialize)]
struct NoteBodyWire {
    amount: u128,
    secret: [u8; 32],
    blinding: [u8; 32],
    token_symbol: String,
    token_address: [u8; 20],
    token_decimals: u8,
}

/// Encrypt the recipient-facing body of `note` (amount, secret, blinding,
/// token metadata) to `recipient_viewing_key`.
pub fn encrypt_note(recipient_viewing_key: Fr, note: &Note) -> Result<Vec<u8>, WalletError> {
    let wire = NoteBodyWire {
        amount: note.amount,
        secret: field_to_bytes(&note.secret),
        blinding: field_to_bytes(&note.blinding),
        token_symbol: note.token_symbol.clone(),
        token_address: note.token_address.into_array(),
        token_decimals: note.token_decimals,
    };
    let plaintext = bincode::serialize(&wire)
        .map_err(|e| WalletError::Storage(StorageError::Serialization(e.to_string())))?;
    Ok(zdoge_crypto::encrypt_memo(&recipient_viewing_key, &plaintext)?)
}

/// Attempt to decrypt `memo` with `viewing_key` and reconstruct the note it
/// describes, addressed to `owner_pubkey` (this identity's own shielded
/// address) and placed at `leaf_index`.
///
/// Returns `None` on decryption failure (the memo is not addressed to this
/// identity) or on a commitment mismatch (the event's claimed commitment
/// does not match what the decrypted body would produce).
pub fn try_decrypt_note(
    viewing_key: Fr,
    memo: &[u8],
    owner_pubkey: Fr,
    expected_commitment: Fr,
    leaf_index: u64,
    created_at: i64,
) -> Option<Note> {
    let plaintext = zdoge_crypto::decrypt_memo(&viewing_key, memo).ok()?;
    let wire: NoteBodyWire = bincode::deserialize(&plaintext).ok()?;

    let secret = field_from_bytes(&wire.secret);
    let blinding = field_from_bytes(&wire.blinding);
    let commitment = Note::compute_commitment(secret, blinding, wire.amount, owner_pubkey);
    if commitment != expected_commitment {
        return None;
    }

    Some(Note {
        amount: wire.amount,
        owner_pubkey,
        secret,
        blinding,
        token_symbol: wire.token_symbol,
        token_address: Address::from(wire.token_address),
        token_decimals: wire.token_decimals,
        leaf_index: Some(leaf_index),
        commitment,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zdoge_crypto::random_field;

    #[test]
    fn encrypt_then_decrypt_reconstructs_the_note() {
        let viewing_key = random_field();
        let owner = random_field();
        let note = Note::new(500, owner, random_field(), random_field(), "DOGE".into(), Address::ZERO, 18, 1000);

        let memo = encrypt_note(viewing_key, &note).unwrap();
        let recovered = try_decrypt_note(viewing_key, &memo, owner, note.commitment, 4, 1000).unwrap();

        assert_eq!(recovered.amount, note.amount);
        assert_eq!(recovered.secret, note.secret);
        assert_eq!(recovered.leaf_index, Some(4));
    }

    #[test]
    fn wrong_viewing_key_yields_none() {
        let owner = random_field();
        let note = Note::new(500, owner, random_field(), random_field(), "DOGE".into(), Address::ZERO, 18, 1000);
        let memo = encrypt_note(random_field(), &note).unwrap();
        assert!(try_decrypt_note(random_field(), &memo, owner, note.commitment, 0, 0).is_none());
    }

    #[test]
    fn commitment_mismatch_is_rejected() {
        let viewing_key = random_field();
        let owner = random_field();
        let note = Note::new(500, owner, random_field(), random_field(), "DOGE".into(), Address::ZERO, 18, 1000);
        let memo = encrypt_note(viewing_key, &note).unwrap();
        let wrong_expected = random_field();
        assert!(try_decrypt_note(viewing_key, &memo, owner, wrong_expected, 0, 0).is_none());
    }
}
