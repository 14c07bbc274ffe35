//! Permanent per-wallet identity: `signature -> spending_key -> viewing_key -> shielded_address`.
//!
//! The signature message is versioned; bumping [`IDENTITY_MESSAGE_VERSION`]
//! changes the derived identity for every wallet and must ship with an
//! explicit migration, never silently.

use zdoge_crypto::{derive_identity, Identity, SpendingKey};

use crate::address::ShieldedAddress;
use crate::error::IdentityError;

pub const IDENTITY_MESSAGE_VERSION: u32 = 1;

/// The message an external wallet is asked to sign to derive its identity.
pub fn identity_message(wallet_address: &str) -> String {
    format!("zdoge shielded wallet identity v{IDENTITY_MESSAGE_VERSION} for {wallet_address}")
}

pub struct WalletIdentity {
    pub spending_key: SpendingKey,
    pub identity: Identity,
    pub signature: Vec<u8>,
}

impl WalletIdentity {
    /// A signer's refusal to sign surfaces as `IdentityError::SignRefused`
    /// at the call site before this function is ever reached; this function
    /// only derives from an already-obtained signature.
    pub fn from_signature(signature: Vec<u8>) -> Self {
        let (spending_key, identity) = derive_identity(&signature);
        Self {
            spending_key,
            identity,
            signature,
        }
    }

    pub fn shielded_address(&self) -> ShieldedAddress {
        ShieldedAddress::from_field(self.identity.shielded_address)
    }

    /// Re-derive from the stored signature and confirm it still matches a
    /// previously-recorded address. The stored signature is authoritative;
    /// a mismatch overwrites the stored address rather than discarding
    /// state, and the caller is expected to record a migration event.
    pub fn rederive_and_check(
        stored_signature: Vec<u8>,
        previously_stored_address: ShieldedAddress,
    ) -> Result<(Self, bool), IdentityError> {
        let rederived = Self::from_signature(stored_signature);
        let migrated = rederived.shielded_address() != previously_stored_address;
        Ok((rederived, migrated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_signature_is_deterministic() {
        let sig = b"a wallet signature".to_vec();
        let a = WalletIdentity::from_signature(sig.clone());
        let b = WalletIdentity::from_signature(sig);
        assert_eq!(a.shielded_address(), b.shielded_address());
    }

    #[test]
    fn rederive_detects_no_mismatch_for_unchanged_signature() {
        let sig = b"a wallet signature".to_vec();
        let original = WalletIdentity::from_signature(sig.clone());
        let stored_address = original.shielded_address();
        let (_, migrated) = WalletIdentity::rederive_and_check(sig, stored_address).unwrap();
        assert!(!migrated);
    }

    #[test]
    fn rederive_flags_mismatch_against_a_stale_address() {
        let sig = b"a wallet signature".to_vec();
        let stale = WalletIdentity::from_signature(b"a different signature".to_vec()).shielded_address();
        let (rederived, migrated) = WalletIdentity::rederive_and_check(sig, stale).unwrap();
        assert!(migrated);
        assert_ne!(rederived.shielded_address(), stale);
    }
}
