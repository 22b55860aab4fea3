//! Lending sub-ledger with daily interest accrual

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::AccountState;
use crate::error::LedgerError;
use crate::types::{Address, TokenSymbol};

pub const DAY: u64 = 86_400;
pub const BPS_DENOMINATOR: u32 = 10_000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LendingConfig {
    pub token: TokenSymbol,
    pub daily_interest_bps: u32,
    pub overdue_interest_bps: u32,
    pub min_amount: BigUint,
    pub max_amount: BigUint,
}

impl LendingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.daily_interest_bps == 0 || self.daily_interest_bps > BPS_DENOMINATOR {
            return Err(format!(
                "dailyInterest should be in [1, {}], got {}",
                BPS_DENOMINATOR, self.daily_interest_bps
            ));
        }
        if self.overdue_interest_bps < self.daily_interest_bps
            || self.overdue_interest_bps > BPS_DENOMINATOR
        {
            return Err(format!(
                "overdueInterest should be in [{}, {}], got {}",
                self.daily_interest_bps, BPS_DENOMINATOR, self.overdue_interest_bps
            ));
        }
        if self.max_amount.is_zero() || self.min_amount > self.max_amount {
            return Err(format!(
                "invalid amount range [{}, {}]",
                self.min_amount, self.max_amount
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LoanEntry {
    /// Outstanding principal
    pub amount: BigUint,
    /// Accrued, unpaid interest
    pub interest: BigUint,
    /// Zero means no due date
    pub due_time: u64,
    pub updated_at: u64,
}

impl LoanEntry {
    pub fn total(&self) -> BigUint {
        &self.amount + &self.interest
    }

    /// Folds whole elapsed days into `interest`. Days up to the due time use
    /// the daily rate, later days the overdue rate. A partial day carries
    /// over to the next accrual.
    pub fn accrue(&mut self, config: &LendingConfig, now: u64) {
        if now <= self.updated_at {
            return;
        }
        let days = (now - self.updated_at) / DAY;
        if days == 0 {
            return;
        }
        let normal_days = if self.due_time == 0 {
            days
        } else if self.due_time <= self.updated_at {
            0
        } else {
            days.min((self.due_time - self.updated_at).div_ceil(DAY))
        };
        let overdue_days = days - normal_days;

        let bps = BPS_DENOMINATOR;
        self.interest += &self.amount * config.daily_interest_bps * normal_days / bps;
        self.interest += &self.amount * config.overdue_interest_bps * overdue_days / bps;
        self.updated_at += days * DAY;
    }
}

impl AccountState {
    fn lending_parts(&self) -> Result<(&LendingConfig, &BTreeMap<Address, LoanEntry>), LedgerError> {
        match (&self.lending, &self.lending_ledger) {
            (Some(cfg), Some(ledger)) => Ok((cfg, ledger)),
            _ => Err(LedgerError::LendingNotFound { account: self.id }),
        }
    }

    fn check_lending_token(&self, cfg: &LendingConfig, token: &TokenSymbol) -> Result<(), LedgerError> {
        if &cfg.token != token {
            return Err(LedgerError::TokenMismatch {
                account: self.id,
                expected: cfg.token.clone(),
                actual: token.clone(),
            });
        }
        Ok(())
    }

    pub fn check_lending_closed(&self) -> Result<(), LedgerError> {
        if self.lending.is_some() {
            return Err(LedgerError::LendingExists { account: self.id });
        }
        Ok(())
    }

    pub fn open_lending(&mut self, config: LendingConfig) -> Result<(), LedgerError> {
        self.check_lending_closed()?;
        self.lending = Some(config);
        self.lending_ledger = Some(BTreeMap::new());
        Ok(())
    }

    pub fn check_close_lending(&self) -> Result<(), LedgerError> {
        let (_, ledger) = self.lending_parts()?;
        if !ledger.is_empty() {
            return Err(LedgerError::LendingOutstanding { account: self.id });
        }
        Ok(())
    }

    pub fn close_lending(&mut self) -> Result<(), LedgerError> {
        self.check_close_lending()?;
        self.lending = None;
        self.lending_ledger = None;
        Ok(())
    }

    /// Checks that `borrower` may draw `amount` more from this account. The
    /// lender's nonce-table authorization is checked by the caller.
    pub fn check_borrow(
        &self,
        token: &TokenSymbol,
        borrower: &Address,
        amount: &BigUint,
        due_time: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        let (cfg, ledger) = self.lending_parts()?;
        self.check_lending_token(cfg, token)?;
        if due_time != 0 && due_time < now {
            return Err(LedgerError::InvalidDueTime { due_time, now });
        }
        let total = ledger.get(borrower).map_or_else(BigUint::zero, |e| e.amount.clone()) + amount;
        if total < cfg.min_amount || total > cfg.max_amount {
            return Err(LedgerError::AmountOutOfRange {
                account: self.id,
                min: cfg.min_amount.clone(),
                max: cfg.max_amount.clone(),
                actual: total,
            });
        }
        self.check_balance(token, amount, true)
    }

    pub fn borrow(
        &mut self,
        token: &TokenSymbol,
        borrower: Address,
        amount: &BigUint,
        due_time: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.check_borrow(token, &borrower, amount, due_time, now)?;
        let (cfg, ledger) = match (&self.lending, &mut self.lending_ledger) {
            (Some(cfg), Some(ledger)) => (cfg, ledger),
            _ => return Err(LedgerError::LendingNotFound { account: self.id }),
        };
        let entry = ledger.entry(borrower).or_insert_with(|| LoanEntry {
            updated_at: now,
            ..Default::default()
        });
        entry.accrue(cfg, now);
        entry.amount += amount;
        entry.due_time = due_time;
        self.debit(token, amount);
        Ok(())
    }

    /// Returns what `borrower` owes at `now`, principal plus interest.
    pub fn check_repay(&self, token: &TokenSymbol, borrower: &Address, now: u64) -> Result<BigUint, LedgerError> {
        let (cfg, ledger) = self.lending_parts()?;
        self.check_lending_token(cfg, token)?;
        let mut entry = ledger
            .get(borrower)
            .cloned()
            .ok_or(LedgerError::LoanNotFound {
                account: self.id,
                borrower: *borrower,
            })?;
        entry.accrue(cfg, now);
        Ok(entry.total())
    }

    /// Settles interest first, then principal. Returns the amount actually
    /// taken, never more than is owed.
    pub fn repay(
        &mut self,
        token: &TokenSymbol,
        borrower: &Address,
        amount: &BigUint,
        now: u64,
    ) -> Result<BigUint, LedgerError> {
        let owed = self.check_repay(token, borrower, now)?;
        let actual = owed.min(amount.clone());
        let id = self.id;
        let (cfg, ledger) = match (&self.lending, &mut self.lending_ledger) {
            (Some(cfg), Some(ledger)) => (cfg, ledger),
            _ => return Err(LedgerError::LendingNotFound { account: id }),
        };
        let entry = ledger.get_mut(borrower).ok_or(LedgerError::LoanNotFound {
            account: id,
            borrower: *borrower,
        })?;
        entry.accrue(cfg, now);

        let mut rest = actual.clone();
        let to_interest = entry.interest.clone().min(rest.clone());
        entry.interest -= &to_interest;
        rest -= &to_interest;
        entry.amount -= &rest;
        if entry.amount.is_zero() && entry.interest.is_zero() {
            ledger.remove(borrower);
        }
        self.add(token, &actual);
        Ok(actual)
    }
}
