//! Client-side shielded-transaction wallet core for an account-model EVM
//! chain: identity derivation, the note store, the proof orchestrator, and
//! the auto-discovery/reconciliation pipelines that keep them in sync with
//! the chain. Host applications (UI, CLI, browser extension) wire these
//! modules to a concrete [`external::Signer`], [`external::Rpc`],
//! [`external::Prover`] and [`external::KvStore`].

pub mod address;
pub mod api;
pub mod chain;
pub mod error;
pub mod external;
pub mod identity;
pub mod memo;
pub mod note;
pub mod orchestrator;
pub mod reconcile;
pub mod scanner;
pub mod selection;
pub mod store;

pub use address::ShieldedAddress;
pub use api::{
    PendingOutput, PreparedShield, PreparedSwap, PreparedUnshield, TransferPlan, Wallet,
};
pub use error::{
    ChainError, IdentityError, ProofError, SelectionError, SpendError, StorageError, WalletError,
};
pub use external::{Clock, Groth16Proof, KvStore, OsRng, Prover, Rng, Rpc, Signer, SystemClock};
pub use identity::{identity_message, WalletIdentity, IDENTITY_MESSAGE_VERSION};
pub use note::Note;
pub use orchestrator::{MAX_MULTI_INPUTS, ProofOrchestrator};
pub use scanner::{ingest_events, ScanStats, Scanner};
pub use selection::{select, NoteSelection, PlannedSpend, MIN_CHANGE};
pub use store::WalletStore;
