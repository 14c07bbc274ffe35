//! BN254/MiMC cryptographic primitives shared by the wallet and Merkle crates.

pub mod domain;
pub mod error;
pub mod field;
pub mod identity;
pub mod memo;
pub mod mimc;

pub use domain::Domain;
pub use error::CryptoError;
pub use field::{field_from_bytes, field_from_u64, field_to_bytes, random_field, Fr};
pub use identity::{derive_identity, Identity, SpendingKey};
pub use memo::{decrypt_memo, encrypt_memo, memo_public_key, MAX_MEMO_LEN};
pub use mimc::{mimc2, mimc_sponge};
