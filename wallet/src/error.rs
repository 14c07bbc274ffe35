use thiserror::Error;

/// Failures in deriving or re-verifying a permanent identity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("signer refused to sign the identity message")]
    SignRefused,

    #[error("re-derivation from the stored signature produced a different shielded address")]
    MismatchRederived,
}

/// Failures in the encrypted persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("aead encryption failed")]
    EncryptionFailed,

    #[error("aead decryption failed: blob is corrupt or the key is wrong")]
    DecryptionFailed,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reaching or interpreting the chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("rpc call failed: {0}")]
    RpcFailure(String),

    #[error("leaf index {0} is not yet indexed")]
    LeafNotIndexed(u64),

    #[error("requested block range {span} exceeds MAX_BLOCK_RANGE ({max})")]
    RangeTooLarge { span: u64, max: u64 },

    #[error("event log failed address or topic validation")]
    InvalidEvent,
}

/// Coin-selection failure: the wallet cannot meet the requested spend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("insufficient balance: target {target} exceeds available {available}")]
    Insufficient { target: u128, available: u128 },
}

/// Pre-spend verification failure. The note store has already been repaired
/// by the time this surfaces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpendError {
    #[error("note commitment {0:#x} does not exist on-chain")]
    NoteNotOnChain(String),

    #[error("note at leaf {0} was already spent")]
    AlreadySpent(u64),
}

/// Proof construction or prover-side rejection.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("prover rejected the witness: {0}")]
    ProverRejected(String),

    #[error("malformed witness: {0}")]
    MalformedWitness(&'static str),
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("spend error: {0}")]
    Spend(#[from] SpendError),

    #[error("proof error: {0}")]
    Proof(#[from] ProofError),

    #[error("value conservation violated: {0}")]
    ValueConservation(String),

    #[error("memo ciphertext of {found} bytes exceeds the {max} byte slot")]
    MemoTooLarge { found: usize, max: usize },

    #[error("invalid address encoding: {0}")]
    AddressEncoding(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] zdoge_crypto::CryptoError),

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl WalletError {
    /// True for failures a retry (after a delay, or after resync) might fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Chain(_))
    }

    /// User-facing message, distinguishing transient from permanent causes.
    pub fn user_message(&self) -> String {
        match self {
            Self::Selection(SelectionError::Insufficient { target, available }) => format!(
                "insufficient balance: need {target} base units, have {available} available"
            ),
            Self::Spend(SpendError::AlreadySpent(leaf)) => {
                format!("note at leaf {leaf} was already spent on-chain")
            }
            Self::Spend(SpendError::NoteNotOnChain(commitment)) => {
                format!("note {commitment} could not be found on-chain and was removed")
            }
            Self::Chain(_) => format!("temporary chain error, please retry: {self}"),
            _ => self.to_string(),
        }
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
