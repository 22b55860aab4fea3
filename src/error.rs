use num_bigint::BigUint;
use std::fmt;
use thiserror::Error;

use crate::transaction::TxType;
use crate::types::{Address, ObjectId, TokenSymbol};

/// Whose signing policy an authorization error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Account(Address),
    Data(ObjectId),
    Model(ObjectId),
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Account(id) => write!(f, "{}", id),
            Subject::Data(id) => write!(f, "data {}", id),
            Subject::Model(id) => write!(f, "model {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state was read.
    Malformed,
    /// Rejected by the ledger state; nothing was mutated.
    Precondition,
    /// The storage or configuration layer failed.
    Storage,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{tx_type}: invalid {field}, {reason}")]
    Malformed {
        tx_type: TxType,
        field: &'static str,
        reason: String,
    },

    // Fees and replay protection
    #[error("invalid gasFeeCap, expected >= {expected}, got {actual}")]
    GasFeeCapTooLow { expected: u64, actual: u64 },
    #[error("invalid gas, expected {expected}, got {actual}")]
    GasMismatch { expected: u64, actual: u64 },
    #[error("{account} invalid nonce, expected {expected}, got {actual}")]
    NonceMismatch {
        account: Address,
        expected: u64,
        actual: u64,
    },
    #[error("{account} nonce {nonce} exists at {expire}")]
    NonceExists {
        account: Address,
        nonce: u64,
        expire: u64,
    },
    #[error("{account} nonce {nonce} not exists at {expire}")]
    NonceNotExists {
        account: Address,
        nonce: u64,
        expire: u64,
    },
    #[error("{account} too many nonce groups, expected <= {max}")]
    NonceTableFull { account: Address, max: usize },
    #[error("invalid expire, expected in ({min}, {max}], got {actual}")]
    ExpireOutOfRange { min: u64, max: u64, actual: u64 },
    #[error("authorization expired at {expire}, now {now}")]
    Expired { expire: u64, now: u64 },

    // Balances
    #[error("{account} insufficient {token} balance, expected {expected}, got {actual}")]
    InsufficientBalance {
        account: Address,
        token: TokenSymbol,
        expected: BigUint,
        actual: BigUint,
    },
    #[error("{account} invalid token, expected {expected}, got {actual}")]
    TokenMismatch {
        account: Address,
        expected: TokenSymbol,
        actual: TokenSymbol,
    },
    #[error("{account} invalid amount, expected in [{min}, {max}], got {actual}")]
    AmountOutOfRange {
        account: Address,
        min: BigUint,
        max: BigUint,
        actual: BigUint,
    },
    #[error("invalid pledge, expected >= {expected}, got {actual}")]
    InsufficientPledge { expected: BigUint, actual: BigUint },

    // Authorization
    #[error("{subject} invalid signatures for keepers")]
    InvalidKeeperSignatures { subject: Subject },
    #[error("{subject} invalid signature for approver")]
    InvalidApproverSignature { subject: Subject },
    #[error("{account} {tx_type} is not allowed")]
    NotAllowed { account: Address, tx_type: TxType },
    #[error("{account} invalid account, {reason}")]
    InvalidAccount { account: Address, reason: String },

    // Token accounts
    #[error("{account} token account exists")]
    TokenAccountExists { account: Address },
    #[error("{account} some token in the use, maxTotalSupply expected {expected}, got {actual}")]
    TokenInUse {
        account: Address,
        expected: BigUint,
        actual: BigUint,
    },

    // Stake accounts
    #[error("{account} stake account exists")]
    StakeAccountExists { account: Address },
    #[error("{account} invalid stake account")]
    NotStakeAccount { account: Address },
    #[error("{account} can't change stake type/token")]
    StakeConfigImmutable { account: Address },
    #[error("{account} stake in lock, retry after lockTime {lock_time}")]
    StakeInLock { account: Address, lock_time: u64 },
    #[error("{account} stake holders should not more than 1")]
    TooManyStakeHolders { account: Address },
    #[error("{account} {holder} has no stake")]
    StakeHolderNotFound { account: Address, holder: Address },
    #[error("{account} {holder} has insufficient stake, expected {expected}, got {actual}")]
    InsufficientStake {
        account: Address,
        holder: Address,
        expected: BigUint,
        actual: BigUint,
    },
    #[error("{account} stake holder {holder} should be the recipient")]
    HolderNotRecipient { account: Address, holder: Address },
    #[error("invalid lockTime, expected 0 or > {now}, got {lock_time}")]
    InvalidLockTime { lock_time: u64, now: u64 },

    // Lending
    #[error("{account} lending exists")]
    LendingExists { account: Address },
    #[error("{account} invalid lending")]
    LendingNotFound { account: Address },
    #[error("{account} please repay all before close")]
    LendingOutstanding { account: Address },
    #[error("{account} {borrower} has no loan")]
    LoanNotFound { account: Address, borrower: Address },
    #[error("invalid dueTime, expected 0 or >= {now}, got {due_time}")]
    InvalidDueTime { due_time: u64, now: u64 },

    // Exchange
    #[error("invalid quantity, expected in [{minimum}, {quota}], got {actual}")]
    QuantityOutOfRange {
        minimum: BigUint,
        quota: BigUint,
        actual: BigUint,
    },

    // Data and models
    #[error("model {id} not found")]
    ModelNotFound { id: ObjectId },
    #[error("data {id} not found")]
    DataNotFound { id: ObjectId },
    #[error("data {id} was deleted")]
    DataDeleted { id: ObjectId },
    #[error("{id} exists")]
    ObjectExists { id: ObjectId },
    #[error("data {id} invalid version, expected {expected}, got {actual}")]
    VersionMismatch {
        id: ObjectId,
        expected: u64,
        actual: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Malformed { .. } => ErrorKind::Malformed,
            LedgerError::Storage(_) | LedgerError::Config(_) => ErrorKind::Storage,
            _ => ErrorKind::Precondition,
        }
    }

    pub(crate) fn malformed(tx_type: TxType, field: &'static str, reason: impl Into<String>) -> Self {
        LedgerError::Malformed {
            tx_type,
            field,
            reason: reason.into(),
        }
    }
}
