//! Encrypted persistence and the in-memory note store.
//!
//! Persistence goes through the injected [`KvStore`] capability rather than
//! a concrete filesystem path, so the same store works unmodified behind a
//! browser extension's storage API or a native key-value backend. Each
//! slot's value is `"1:" || nonce(12) || ciphertext+tag`; a value lacking
//! the `"1:"` marker is legacy plaintext and is transparently migrated to
//! the encrypted form the next time it is written.

use std::collections::HashMap;

use argon2::Argon2;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, KeyInit, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use zdoge_crypto::{field_to_bytes, Fr};

use crate::error::{StorageError, WalletError};
use crate::external::KvStore;
use crate::identity::WalletIdentity;
use crate::note::Note;
use crate::selection::{self, NoteSelection};

const STORAGE_VERSION_PREFIX: &[u8] = b"1:";
const BALANCE_CACHE_TTL_MS: i64 = 100;

fn storage_key(wallet_address: &str) -> String {
    format!("zdoge/wallet/{wallet_address}")
}

fn derive_key(wallet_address: &str, password: Option<&str>) -> Result<[u8; 32], StorageError> {
    let salt = Sha256::digest(wallet_address.as_bytes());
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(password.unwrap_or("").as_bytes(), &salt, &mut key)
        .map_err(|_| StorageError::EncryptionFailed)?;
    Ok(key)
}

fn encrypt_blob(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, StorageError> {
    let cipher = ChaCha20Poly1305::new(key.into());
    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| StorageError::EncryptionFailed)?;
    let mut out = Vec::with_capacity(STORAGE_VERSION_PREFIX.len() + 12 + ciphertext.len());
    out.extend_from_slice(STORAGE_VERSION_PREFIX);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a stored blob. A blob lacking the version marker is legacy
/// plaintext and is returned as-is; the caller is responsible for
/// re-persisting it (which encrypts it) on next write.
fn decrypt_blob(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, StorageError> {
    if !blob.starts_with(STORAGE_VERSION_PREFIX) {
        return Ok(blob.to_vec());
    }
    let rest = &blob[STORAGE_VERSION_PREFIX.len()..];
    if rest.len() < 12 {
        return Err(StorageError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = rest.split_at(12);
    let cipher = ChaCha20Poly1305::new(key.into());
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| StorageError::DecryptionFailed)
}

#[derive(Serialize, Deserialize, Default)]
struct PersistedState {
    signature: Vec<u8>,
    /// The identity triple's public half, as last persisted. Authoritative
    /// only in the sense of "what we stored last" -- the signature is what
    /// actually authorizes re-derivation; see `WalletStore::open`.
    #[serde(rename = "identity")]
    shielded_address_hex: Option<String>,
    notes: Vec<Note>,
    stealth_keys: Option<Vec<u8>>,
}

struct WalletState {
    identity: WalletIdentity,
    /// Keyed by the commitment's canonical byte encoding; `Fr` itself is not
    /// relied on to implement `Hash`.
    notes: HashMap<[u8; 32], Note>,
    balance_cache: Option<(i64, HashMap<String, u128>)>,
}

impl WalletState {
    fn invalidate_balance_cache(&mut self) {
        self.balance_cache = None;
    }
}

/// Single-owner, many-reader store of this wallet's notes, backed by
/// encrypted persistence. Every mutation flows through `&self` methods that
/// take the write lock internally and release it before persisting, so no
/// suspension point falls inside the note store's critical section.
pub struct WalletStore<K: KvStore> {
    kv: K,
    wallet_address: String,
    key: [u8; 32],
    state: RwLock<WalletState>,
}

impl<K: KvStore> WalletStore<K> {
    /// Create a brand-new store for an identity just derived from a
    /// signature.
    pub async fn create(
        kv: K,
        wallet_address: String,
        password: Option<&str>,
        identity: WalletIdentity,
    ) -> Result<Self, WalletError> {
        let key = derive_key(&wallet_address, password)?;
        let store = Self {
            kv,
            wallet_address,
            key,
            state: RwLock::new(WalletState {
                identity,
                notes: HashMap::new(),
                balance_cache: None,
            }),
        };
        store.persist().await?;
        Ok(store)
    }

    /// Open a previously-created store, re-deriving identity from the
    /// stored signature and repairing a stale stored address in place.
    pub async fn open(
        kv: K,
        wallet_address: String,
        password: Option<&str>,
    ) -> Result<(Self, bool), WalletError> {
        let key = derive_key(&wallet_address, password)?;
        let raw = kv
            .get(&storage_key(&wallet_address))
            .await
            .map_err(|e| WalletError::Storage(StorageError::Io(std::io::Error::other(e.0))))?
            .ok_or_else(|| WalletError::Storage(StorageError::Serialization("no stored wallet".into())))?;

        let plaintext = decrypt_blob(&key, &raw)?;
        let persisted: PersistedState = serde_json::from_slice(&plaintext)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        // The stored signature is authoritative; re-derive from it and
        // compare against whatever address we last persisted. A legacy
        // blob with no recorded address has nothing to compare against and
        // is never treated as a mismatch -- only a disagreement between two
        // values we actually hold counts as one.
        let stored_address = persisted
            .shielded_address_hex
            .as_deref()
            .and_then(|s| crate::address::ShieldedAddress::decode(s).ok());
        let (identity, migrated) = match stored_address {
            Some(stored) => {
                let (identity, migrated) =
                    WalletIdentity::rederive_and_check(persisted.signature.clone(), stored)?;
                if migrated {
                    tracing::warn!(
                        stored = %stored,
                        rederived = %identity.shielded_address(),
                        "stored shielded address did not match re-derivation from signature; overwriting"
                    );
                }
                (identity, migrated)
            }
            None => (WalletIdentity::from_signature(persisted.signature.clone()), false),
        };

        let notes = persisted
            .notes
            .into_iter()
            .map(|n| (field_to_bytes(&n.commitment), n))
            .collect();

        let store = Self {
            kv,
            wallet_address,
            key,
            state: RwLock::new(WalletState {
                identity,
                notes,
                balance_cache: None,
            }),
        };
        if migrated {
            store.persist().await?;
        }
        Ok((store, migrated))
    }

    async fn persist(&self) -> Result<(), WalletError> {
        let state = self.state.read().await;
        let persisted = PersistedState {
            signature: state.identity.signature.clone(),
            shielded_address_hex: Some(state.identity.shielded_address().encode()),
            notes: state.notes.values().cloned().collect(),
            stealth_keys: None,
        };
        let plaintext = serde_json::to_vec(&persisted)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        drop(state);

        let blob = encrypt_blob(&self.key, &plaintext)?;
        self.kv
            .put(&storage_key(&self.wallet_address), &blob)
            .await
            .map_err(|e| WalletError::Storage(StorageError::Io(std::io::Error::other(e.0))))?;
        Ok(())
    }

    pub async fn shielded_address(&self) -> crate::address::ShieldedAddress {
        self.state.read().await.identity.shielded_address()
    }

    pub async fn spending_key(&self) -> Fr {
        self.state.read().await.identity.spending_key.as_field()
    }

    pub async fn viewing_key(&self) -> Fr {
        self.state.read().await.identity.identity.viewing_key
    }

    pub async fn owner_pubkey(&self) -> Fr {
        self.state.read().await.identity.identity.shielded_address
    }

    /// Look up a single stored note by commitment, e.g. to confirm it is
    /// still present before spending it.
    pub async fn get_by_commitment(&self, commitment: Fr) -> Option<Note> {
        self.state.read().await.notes.get(&field_to_bytes(&commitment)).cloned()
    }

    /// Returns `false` (a no-op) if a note with this commitment is already
    /// present. Rejects a note addressed to a different identity outright.
    pub async fn add_discovered(&self, note: Note) -> Result<bool, WalletError> {
        {
            let state = self.state.read().await;
            if note.owner_pubkey != state.identity.identity.shielded_address {
                return Err(WalletError::InvalidArgument(
                    "note is not addressed to this identity",
                ));
            }
            if state.notes.contains_key(&field_to_bytes(&note.commitment)) {
                return Ok(false);
            }
        }
        {
            let mut state = self.state.write().await;
            let key = field_to_bytes(&note.commitment);
            if state.notes.contains_key(&key) {
                return Ok(false);
            }
            state.notes.insert(key, note.clone());
            state.invalidate_balance_cache();
        }
        self.persist().await?;
        tracing::debug!(token = %note.token_symbol, amount = note.amount, "discovered note");
        Ok(true)
    }

    pub async fn remove_by_commitment(&self, commitment: Fr) -> Result<bool, WalletError> {
        let removed = {
            let mut state = self.state.write().await;
            let removed = state.notes.remove(&field_to_bytes(&commitment)).is_some();
            if removed {
                state.invalidate_balance_cache();
            }
            removed
        };
        if removed {
            self.persist().await?;
            tracing::debug!("removed spent note from store");
        }
        Ok(removed)
    }

    pub async fn notes_by_token(&self, symbol: &str) -> Vec<Note> {
        self.state
            .read()
            .await
            .notes
            .values()
            .filter(|n| n.token_symbol == symbol)
            .cloned()
            .collect()
    }

    /// Only notes with `leaf_index = Some(_)` count toward balance.
    pub async fn balance_by_token(&self, now_ms: i64) -> HashMap<String, u128> {
        let mut state = self.state.write().await;
        if let Some((computed_at, cached)) = &state.balance_cache {
            if now_ms - computed_at < BALANCE_CACHE_TTL_MS {
                return cached.clone();
            }
        }
        let mut balances: HashMap<String, u128> = HashMap::new();
        for note in state.notes.values() {
            if note.leaf_index.is_some() {
                *balances.entry(note.token_symbol.clone()).or_default() += note.amount;
            }
        }
        state.balance_cache = Some((now_ms, balances.clone()));
        balances
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.notes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Coin selection over this token's confirmed notes. The returned
    /// selection borrows nothing from the store; callers snapshot first.
    pub async fn select(
        &self,
        token_symbol: &str,
        target: u128,
        min_fee: u128,
        fee_bps: u32,
    ) -> Result<Vec<selection::OwnedPlannedSpend>, WalletError> {
        let confirmed: Vec<Note> = self
            .state
            .read()
            .await
            .notes
            .values()
            .filter(|n| n.token_symbol == token_symbol && n.leaf_index.is_some())
            .cloned()
            .collect();
        let selection: NoteSelection = selection::select(&confirmed, target, min_fee, fee_bps)?;
        Ok(selection.to_owned_spends())
    }
}
