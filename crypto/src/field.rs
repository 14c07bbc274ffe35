//! BN254 scalar field arithmetic.
//!
//! All note commitments, nullifiers, and keys live in this field so that
//! values produced here match the Circom-compiled circuit bit-for-bit.

use ark_ff::{BigInteger, PrimeField};
use rand::RngCore;

/// A BN254 scalar field element.
pub type Fr = ark_bn254::Fr;

/// Interpret `bytes` as a big-endian integer and reduce modulo the field order.
pub fn field_from_bytes(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Encode a field element as 32 big-endian bytes.
pub fn field_to_bytes(value: &Fr) -> [u8; 32] {
    let mut out = [0u8; 32];
    let be = value.into_bigint().to_bytes_be();
    out[32 - be.len()..].copy_from_slice(&be);
    out
}

/// Draw 31 random bytes and interpret them as a big-endian integer.
///
/// 31 bytes is strictly less than `2^248`, which is itself below the BN254
/// scalar modulus, so the result needs no reduction and carries no modular
/// bias.
pub fn random_field() -> Fr {
    let mut rng = rand::rngs::OsRng;
    random_field_with(&mut rng)
}

pub fn random_field_with<R: RngCore + ?Sized>(rng: &mut R) -> Fr {
    let mut bytes = [0u8; 31];
    rng.fill_bytes(&mut bytes);
    field_from_bytes(&bytes)
}

pub fn field_from_u64(value: u64) -> Fr {
    Fr::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_field_is_canonical_without_reduction() {
        let mut rng = rand::rngs::mock::StepRng::new(7, 11);
        for _ in 0..16 {
            let value = random_field_with(&mut rng);
            let bytes = field_to_bytes(&value);
            assert_eq!(field_from_bytes(&bytes), value);
        }
    }

    #[test]
    fn round_trip_bytes() {
        let value = field_from_u64(424242);
        let bytes = field_to_bytes(&value);
        assert_eq!(field_from_bytes(&bytes), value);
    }
}
