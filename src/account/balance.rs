//! Multi-token balances and sequential-nonce spending

use num_bigint::BigUint;
use num_traits::Zero;
use std::collections::BTreeMap;

use super::types::AccountState;
use crate::error::LedgerError;
use crate::types::TokenSymbol;

impl AccountState {
    pub fn balance_of(&self, token: &TokenSymbol) -> BigUint {
        if token.is_native() {
            self.balance.clone()
        } else {
            self.tokens.get(token).cloned().unwrap_or_default()
        }
    }

    /// Checks `amount` can be debited. With `keep_pledge` the native balance
    /// must stay at or above the pledge.
    pub fn check_balance(&self, token: &TokenSymbol, amount: &BigUint, keep_pledge: bool) -> Result<(), LedgerError> {
        let mut expected = amount.clone();
        if token.is_native() && keep_pledge {
            expected += &self.pledge;
        }
        let actual = self.balance_of(token);
        if actual < expected {
            return Err(LedgerError::InsufficientBalance {
                account: self.id,
                token: token.clone(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn add(&mut self, token: &TokenSymbol, amount: &BigUint) {
        if amount.is_zero() {
            return;
        }
        if token.is_native() {
            self.balance += amount;
        } else {
            *self.tokens.entry(token.clone()).or_default() += amount;
        }
    }

    pub fn sub(&mut self, token: &TokenSymbol, amount: &BigUint) -> Result<(), LedgerError> {
        self.check_balance(token, amount, true)?;
        self.debit(token, amount);
        Ok(())
    }

    // Caller has checked the balance.
    pub(crate) fn debit(&mut self, token: &TokenSymbol, amount: &BigUint) {
        if token.is_native() {
            self.balance -= amount;
        } else if let Some(bal) = self.tokens.get_mut(token) {
            *bal -= amount;
            if bal.is_zero() {
                self.tokens.remove(token);
            }
        }
    }

    /// Checks a sender debit of `amount` in `token` plus `fee` in the native
    /// token under sequential nonce `nonce`.
    pub fn check_sub_by_nonce(
        &self,
        token: &TokenSymbol,
        amount: &BigUint,
        fee: &BigUint,
        nonce: u64,
        keep_pledge: bool,
    ) -> Result<(), LedgerError> {
        if self.nonce != nonce {
            return Err(LedgerError::NonceMismatch {
                account: self.id,
                expected: self.nonce,
                actual: nonce,
            });
        }
        if token.is_native() {
            self.check_balance(token, &(amount + fee), keep_pledge)
        } else {
            self.check_balance(&TokenSymbol::native(), fee, keep_pledge)?;
            self.check_balance(token, amount, false)
        }
    }

    pub fn sub_by_nonce(
        &mut self,
        token: &TokenSymbol,
        amount: &BigUint,
        fee: &BigUint,
        nonce: u64,
        keep_pledge: bool,
    ) -> Result<(), LedgerError> {
        self.check_sub_by_nonce(token, amount, fee, nonce, keep_pledge)?;
        self.debit(&TokenSymbol::native(), fee);
        self.debit(token, amount);
        self.nonce += 1;
        Ok(())
    }

    /// Empties every balance, returning the native amount and the token map.
    pub(crate) fn take_all(&mut self) -> (BigUint, BTreeMap<TokenSymbol, BigUint>) {
        (std::mem::take(&mut self.balance), std::mem::take(&mut self.tokens))
    }
}
