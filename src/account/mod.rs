//! Account ledger
//!
//! This module implements the account-based state model with:
//! - Native and token balances with a pledged reserve
//! - Sequential nonces plus a table of pre-authorized nonces
//! - Threshold multisig with an optional approver
//! - Stake pools and lending books kept on the account itself

pub mod auth;
pub mod balance;
pub mod lending;
pub mod nonce;
pub mod stake;
pub mod token;
pub mod types;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use auth::{PolicyUpdate, SigningPolicy};
pub use lending::{LendingConfig, LoanEntry};
pub use stake::{StakeConfig, StakeEntry};
pub use types::{AccountState, AccountType};

use crate::types::Address;

/// Shared handle to one account's state.
///
/// Readers may inspect an account concurrently; the accept path takes the
/// write guard for the duration of a single mutation.
#[derive(Debug)]
pub struct Account {
    id: Address,
    state: RwLock<AccountState>,
}

impl Account {
    pub fn new(state: AccountState) -> Self {
        Self {
            id: state.id,
            state: RwLock::new(state),
        }
    }

    pub fn id(&self) -> Address {
        self.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, AccountState> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, AccountState> {
        self.state.write()
    }

    pub fn snapshot(&self) -> AccountState {
        self.state.read().clone()
    }

    pub fn restore(&self, state: AccountState) {
        *self.state.write() = state;
    }
}
