//! Token issuing accounts

use num_bigint::BigUint;
use std::collections::BTreeMap;

use super::auth::SigningPolicy;
use super::types::{AccountState, AccountType};
use crate::error::LedgerError;
use crate::types::TokenSymbol;

impl AccountState {
    pub fn check_create_token(&self) -> Result<(), LedgerError> {
        if !self.is_pristine() {
            return Err(LedgerError::TokenAccountExists { account: self.id });
        }
        Ok(())
    }

    /// Installs the token on this account and mints the whole supply into
    /// it. The pledge is credited in native tokens and then reserved.
    pub fn create_token(
        &mut self,
        token: &TokenSymbol,
        policy: SigningPolicy,
        max_total_supply: BigUint,
        pledge: BigUint,
    ) -> Result<(), LedgerError> {
        self.check_create_token()?;
        self.account_type = AccountType::Token;
        self.policy = policy;
        self.add(token, &max_total_supply);
        self.add(&TokenSymbol::native(), &pledge);
        self.max_total_supply = Some(max_total_supply);
        self.pledge = pledge;
        Ok(())
    }

    /// The token this account issues.
    pub fn own_token(&self) -> Result<TokenSymbol, LedgerError> {
        match TokenSymbol::from_address(&self.id) {
            Some(token) if self.is_token() => Ok(token),
            _ => Err(LedgerError::InvalidAccount {
                account: self.id,
                reason: "not a token account".to_string(),
            }),
        }
    }

    pub fn check_destroy_token(&self) -> Result<(), LedgerError> {
        let token = self.own_token()?;
        let supply = self.max_total_supply.clone().unwrap_or_default();
        let held = self.balance_of(&token);
        if held != supply {
            return Err(LedgerError::TokenInUse {
                account: self.id,
                expected: supply,
                actual: held,
            });
        }
        self.check_lending_closed()
    }

    /// Burns the supply, releases the pledge and hands back what remains.
    pub fn destroy_token(&mut self) -> Result<(BigUint, BTreeMap<TokenSymbol, BigUint>), LedgerError> {
        self.check_destroy_token()?;
        let token = self.own_token()?;
        let supply = self.balance_of(&token);
        self.debit(&token, &supply);
        let balances = self.take_all();
        self.reset_to_native();
        Ok(balances)
    }
}
