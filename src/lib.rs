pub mod account; // typed account state and its sub-ledgers
pub mod chain;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod genesis;
pub mod storage;
pub mod transaction;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use account::{Account, AccountState, AccountType, SigningPolicy};
pub use chain::BlockContext;
pub use config::LedgerConfig;
pub use error::{ErrorKind, LedgerError};
pub use storage::{MemoryState, StateAccess};
pub use transaction::{Receipt, Transaction, TxType};
pub use types::{Address, ObjectId, StakeSymbol, TokenSymbol, TREASURY};
