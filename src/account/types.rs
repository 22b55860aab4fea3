//! Account state record

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::auth::SigningPolicy;
use super::lending::{LendingConfig, LoanEntry};
use super::stake::{StakeConfig, StakeEntry};
use crate::error::LedgerError;
use crate::types::{Address, TokenSymbol};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccountType {
    /// Plain holding account
    #[default]
    Native,
    /// Issues a token; its id is derived from the token symbol
    Token,
    /// Holds a stake pool; its id is derived from the stake symbol
    Stake,
}

/// Everything persisted for one account. The `Account` wrapper guards it
/// behind a read/write lock.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub id: Address,
    pub account_type: AccountType,

    // Balances
    pub balance: BigUint,
    pub tokens: BTreeMap<TokenSymbol, BigUint>,
    pub pledge: BigUint,
    pub max_total_supply: Option<BigUint>,

    // Replay protection
    pub nonce: u64,
    pub nonce_table: BTreeMap<u64, Vec<u64>>,

    // Authorization
    pub policy: SigningPolicy,

    // Sub-ledgers
    pub stake: Option<StakeConfig>,
    pub stake_ledger: Option<BTreeMap<Address, StakeEntry>>,
    pub lending: Option<LendingConfig>,
    pub lending_ledger: Option<BTreeMap<Address, LoanEntry>>,
}

impl AccountState {
    /// Zero-valued account as materialized on first access.
    pub fn new(id: Address) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn is_token(&self) -> bool {
        self.account_type == AccountType::Token
    }

    pub fn is_stake(&self) -> bool {
        self.account_type == AccountType::Stake
    }

    /// Structural validity of the typed account variants.
    pub fn validate(&self) -> Result<(), LedgerError> {
        let invalid = |reason: &str| LedgerError::InvalidAccount {
            account: self.id,
            reason: reason.to_string(),
        };
        match self.account_type {
            AccountType::Native => Ok(()),
            AccountType::Token => match &self.max_total_supply {
                Some(supply) if !supply.is_zero() => Ok(()),
                _ => Err(invalid("token account without max total supply")),
            },
            AccountType::Stake => {
                if self.stake.is_none() || self.stake_ledger.is_none() {
                    Err(invalid("stake account without stake ledger"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// True when nothing was ever installed on this address.
    pub fn is_pristine(&self) -> bool {
        self.account_type == AccountType::Native
            && self.policy.keepers.is_empty()
            && self.max_total_supply.is_none()
            && self.stake.is_none()
            && self.lending.is_none()
    }

    /// Drops the typed configuration and returns the address to a plain
    /// holding account. Balances are left to the caller.
    pub(crate) fn reset_to_native(&mut self) {
        self.account_type = AccountType::Native;
        self.policy = SigningPolicy::default();
        self.pledge = BigUint::zero();
        self.max_total_supply = None;
        self.stake = None;
        self.stake_ledger = None;
        self.lending = None;
        self.lending_ledger = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_typed_accounts() {
        let mut state = AccountState::new(Address([9u8; 20]));
        assert!(state.validate().is_ok());
        assert!(state.is_pristine());

        state.account_type = AccountType::Token;
        assert!(state.validate().is_err());
        state.max_total_supply = Some(BigUint::from(0u8));
        assert!(state.validate().is_err());
        state.max_total_supply = Some(BigUint::from(10u8));
        assert!(state.validate().is_ok());

        state.account_type = AccountType::Stake;
        assert!(state.validate().is_err());

        state.reset_to_native();
        assert!(state.is_pristine());
    }
}
