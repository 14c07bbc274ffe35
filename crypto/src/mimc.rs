//! MiMC-Sponge over the BN254 scalar field.
//!
//! The permutation below follows the circomlib `MiMCSponge` Feistel
//! construction: 220 rounds, exponent 5, round constants fixed at compile
//! time. The round count and the constants are wire-level parameters of the
//! arithmetic circuit this wallet produces witnesses for -- changing either
//! breaks proof compatibility.
//!
//! The constants here are expanded deterministically from a fixed domain
//! tag rather than copied from a specific circuit build; a production
//! deployment pins `ROUND_CONSTANTS` to the constants baked into its
//! `circuit.wasm`/`circuit.zkey` pair.

use ark_ff::Field;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::field::{field_from_bytes, Fr};

pub const ROUNDS: usize = 220;

const CONSTANTS_DOMAIN: &[u8] = b"zdoge/mimc-sponge/round-constants/v1";

fn round_constants() -> &'static [Fr; ROUNDS] {
    static CONSTANTS: OnceLock<[Fr; ROUNDS]> = OnceLock::new();
    CONSTANTS.get_or_init(|| {
        let mut constants = [Fr::from(0u64); ROUNDS];
        for (i, slot) in constants.iter_mut().enumerate() {
            // circomlib convention: the first and last round constants are zero.
            if i == 0 || i == ROUNDS - 1 {
                continue;
            }
            let mut hasher = Sha256::new();
            hasher.update(CONSTANTS_DOMAIN);
            hasher.update((i as u64).to_be_bytes());
            let digest = hasher.finalize();
            *slot = field_from_bytes(&digest);
        }
        constants
    })
}

fn pow5(value: Fr) -> Fr {
    let sq = value.square();
    let fourth = sq.square();
    fourth * value
}

/// One MiMC-Feistel permutation round over the `(xl, xr)` sponge state.
fn permute(mut xl: Fr, mut xr: Fr, key: Fr) -> (Fr, Fr) {
    let constants = round_constants();
    for (i, c) in constants.iter().enumerate() {
        let t = xl + key + *c;
        let t5 = pow5(t);
        if i < ROUNDS - 1 {
            let new_xr = xr + t5;
            xr = xl;
            xl = new_xr;
        } else {
            xr += t5;
        }
    }
    (xl, xr)
}

/// Sponge hash over an arbitrary number of field elements, fixed capacity.
///
/// Each input is absorbed into the left lane and the state is run through
/// the full permutation before the next input is absorbed; the squeezed
/// output is the left lane after the final absorption.
pub fn mimc_sponge(inputs: &[Fr]) -> Fr {
    let mut xl = Fr::from(0u64);
    let mut xr = Fr::from(0u64);
    for input in inputs {
        xl += input;
        let (nxl, nxr) = permute(xl, xr, Fr::from(0u64));
        xl = nxl;
        xr = nxr;
    }
    xl
}

/// Two-input collapse of the sponge, used throughout the note model as
/// `MiMC(l, r)`.
pub fn mimc2(l: Fr, r: Fr) -> Fr {
    mimc_sponge(&[l, r])
}
