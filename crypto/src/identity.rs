//! Deterministic identity derivation: `signature -> spending_key -> viewing_key -> shielded_address`.

use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::Domain;
use crate::field::{field_from_bytes, field_to_bytes, Fr};
use crate::mimc::mimc2;

/// The spending key, derived once per external wallet and kept in memory
/// only as long as needed. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SpendingKey([u8; 32]);

impl SpendingKey {
    pub fn from_signature(signature: &[u8]) -> Self {
        let digest = Keccak256::digest(signature);
        let field = field_from_bytes(&digest);
        Self(field_to_bytes(&field))
    }

    pub fn as_field(&self) -> Fr {
        field_from_bytes(&self.0)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The public half of an identity: viewing key and shielded address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub viewing_key: Fr,
    pub shielded_address: Fr,
}

/// Derive the full identity triple from a wallet signature.
///
/// Deterministic: the same signature always yields the same
/// `(spending_key, viewing_key, shielded_address)`.
pub fn derive_identity(signature: &[u8]) -> (SpendingKey, Identity) {
    let spending_key = SpendingKey::from_signature(signature);
    let sk = spending_key.as_field();
    let viewing_key = mimc2(sk, Domain::ViewingKey.as_field());
    let shielded_address = mimc2(sk, Domain::ShieldedAddress.as_field());
    (spending_key, Identity {
        viewing_key,
        shielded_address,
    })
}
