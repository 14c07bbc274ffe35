//! The note model: structure, commitment/nullifier computation, and the
//! canonical persisted JSON schema.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use zdoge_crypto::{field_from_bytes, field_from_u64, mimc2, mimc_sponge, Fr};

use crate::address::ShieldedAddress;

/// Reduce a base-unit amount into the scalar field for commitment hashing.
/// `u128` comfortably fits below the BN254 modulus, so this is an exact
/// embedding, not a lossy approximation.
pub fn amount_to_field(amount: u128) -> Fr {
    field_from_bytes(&amount.to_be_bytes())
}

mod serde_field_hex {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use zdoge_crypto::{field_from_bytes, field_to_bytes, Fr};

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error> {
        format!("0x{}", hex::encode(field_to_bytes(value))).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(deserializer)?;
        let stripped = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(stripped).map_err(serde::de::Error::custom)?;
        Ok(field_from_bytes(&bytes))
    }
}

mod serde_amount_decimal {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}

/// An off-chain note. `commitment` is the field the circuit reasons about;
/// everything else is the witness that opens it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    #[serde(with = "serde_amount_decimal")]
    pub amount: u128,
    #[serde(rename = "ownerPubkey", with = "serde_field_hex")]
    pub owner_pubkey: Fr,
    #[serde(with = "serde_field_hex")]
    pub secret: Fr,
    #[serde(with = "serde_field_hex")]
    pub blinding: Fr,
    pub token_symbol: String,
    #[serde(rename = "tokenAddress")]
    pub token_address: Address,
    #[serde(rename = "decimals")]
    pub token_decimals: u8,
    #[serde(rename = "leafIndex")]
    pub leaf_index: Option<u64>,
    #[serde(with = "serde_field_hex")]
    pub commitment: Fr,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Note {
    /// `commitment = MiMC( MiMC(secret, blinding), MiMC(amount, owner_pubkey) )`.
    /// Fixed exactly this way -- any reassociation breaks proofs against the
    /// compiled circuit.
    pub fn compute_commitment(secret: Fr, blinding: Fr, amount: u128, owner_pubkey: Fr) -> Fr {
        let left = mimc2(secret, blinding);
        let right = mimc2(amount_to_field(amount), owner_pubkey);
        mimc2(left, right)
    }

    pub fn new(
        amount: u128,
        owner_pubkey: Fr,
        secret: Fr,
        blinding: Fr,
        token_symbol: String,
        token_address: Address,
        token_decimals: u8,
        created_at: i64,
    ) -> Self {
        let commitment = Self::compute_commitment(secret, blinding, amount, owner_pubkey);
        Self {
            amount,
            owner_pubkey,
            secret,
            blinding,
            token_symbol,
            token_address,
            token_decimals,
            leaf_index: None,
            commitment,
            created_at,
        }
    }

    pub fn owner(&self) -> ShieldedAddress {
        ShieldedAddress::from_field(self.owner_pubkey)
    }

    /// `nullifier = MiMC(secret, leaf_index, spending_key)`, sponge over
    /// three inputs. Only meaningful once `leaf_index` is set.
    pub fn nullifier(&self, spending_key: Fr) -> Option<Fr> {
        let leaf_index = self.leaf_index?;
        Some(mimc_sponge(&[self.secret, field_from_u64(leaf_index), spending_key]))
    }

    pub fn nullifier_hash(&self, spending_key: Fr) -> Option<Fr> {
        let nullifier = self.nullifier(spending_key)?;
        Some(mimc2(nullifier, nullifier))
    }

    /// The canonical zero-note used to pad unused multi-input slots.
    pub fn zero_note() -> Self {
        Self {
            amount: 0,
            owner_pubkey: Fr::from(0u64),
            secret: Fr::from(0u64),
            blinding: Fr::from(0u64),
            token_symbol: String::new(),
            token_address: Address::ZERO,
            token_decimals: 0,
            leaf_index: Some(0),
            commitment: Self::compute_commitment(Fr::from(0u64), Fr::from(0u64), 0, Fr::from(0u64)),
            created_at: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zdoge_crypto::random_field;

    fn sample_note(amount: u128, owner: Fr) -> Note {
        Note::new(
            amount,
            owner,
            random_field(),
            random_field(),
            "DOGE".to_string(),
            Address::ZERO,
            18,
            0,
        )
    }

    #[test]
    fn commitment_is_deterministic() {
        let owner = random_field();
        let a = sample_note(100, owner);
        let b = Note::compute_commitment(a.secret, a.blinding, a.amount, a.owner_pubkey);
        assert_eq!(a.commitment, b);
    }

    #[test]
    fn distinct_notes_yield_distinct_commitments() {
        let owner = random_field();
        let a = sample_note(100, owner);
        let b = sample_note(100, owner);
        assert_ne!(a.commitment, b.commitment);
    }

    #[test]
    fn nullifier_is_none_until_confirmed() {
        let note = sample_note(50, random_field());
        assert!(note.nullifier(random_field()).is_none());
    }

    #[test]
    fn nullifier_depends_on_leaf_index() {
        let mut a = sample_note(50, random_field());
        a.leaf_index = Some(3);
        let mut b = a.clone();
        b.leaf_index = Some(4);
        let spending_key = random_field();
        assert_ne!(a.nullifier(spending_key), b.nullifier(spending_key));
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let mut note = sample_note(42, random_field());
        note.leaf_index = Some(7);
        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(note, back);
    }
}
