//! Stake sub-ledger: pool configuration plus one entry per holder

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::auth::SigningPolicy;
use super::types::{AccountState, AccountType};
use crate::crypto::Signers;
use crate::error::{LedgerError, Subject};
use crate::types::{Address, TokenSymbol};

pub const FEE_PPM_DENOMINATOR: u32 = 1_000_000;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StakeConfig {
    pub token: TokenSymbol,
    /// 0: administration only, 1: may stake elsewhere, 2: may also transfer
    pub tier: u8,
    pub lock_time: u64,
    pub withdraw_fee_ppm: u32,
    pub min_amount: BigUint,
    pub max_amount: BigUint,
}

impl StakeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tier > 2 {
            return Err(format!("tier should be 0, 1 or 2, got {}", self.tier));
        }
        if self.withdraw_fee_ppm >= FEE_PPM_DENOMINATOR {
            return Err(format!(
                "withdrawFee should be < {}, got {}",
                FEE_PPM_DENOMINATOR, self.withdraw_fee_ppm
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

    /// `floor(amount * withdraw_fee_ppm / 1_000_000)`
    pub fn withdraw_fee(&self, amount: &BigUint) -> BigUint {
        amount * self.withdraw_fee_ppm / FEE_PPM_DENOMINATOR
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct StakeEntry {
    pub amount: BigUint,
    pub lock_time: u64,
    pub approver: Option<Address>,
}

fn check_lock_time(lock_time: u64, now: u64) -> Result<(), LedgerError> {
    if lock_time != 0 && lock_time <= now {
        return Err(LedgerError::InvalidLockTime { lock_time, now });
    }
    Ok(())
}

impl AccountState {
    fn stake_parts(&self) -> Result<(&StakeConfig, &BTreeMap<Address, StakeEntry>), LedgerError> {
        match (&self.account_type, &self.stake, &self.stake_ledger) {
            (AccountType::Stake, Some(cfg), Some(ledger)) => Ok((cfg, ledger)),
            _ => Err(LedgerError::NotStakeAccount { account: self.id }),
        }
    }

    fn stake_ledger_mut(&mut self) -> Result<&mut BTreeMap<Address, StakeEntry>, LedgerError> {
        let id = self.id;
        self.stake_ledger
            .as_mut()
            .ok_or(LedgerError::NotStakeAccount { account: id })
    }

    /// Number of holders with a nonzero stake.
    pub fn stake_holders(&self) -> usize {
        self.stake_ledger
            .as_ref()
            .map_or(0, |l| l.values().filter(|e| !e.amount.is_zero()).count())
    }

    pub fn check_create_stake(&self, config: &StakeConfig, now: u64) -> Result<(), LedgerError> {
        if !self.is_pristine() {
            return Err(LedgerError::StakeAccountExists { account: self.id });
        }
        check_lock_time(config.lock_time, now)
    }

    pub fn create_stake(
        &mut self,
        policy: SigningPolicy,
        config: StakeConfig,
        pledge: BigUint,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.check_create_stake(&config, now)?;
        self.account_type = AccountType::Stake;
        self.policy = policy;
        self.stake = Some(config);
        self.stake_ledger = Some(BTreeMap::new());
        self.add(&TokenSymbol::native(), &pledge);
        self.pledge = pledge;
        Ok(())
    }

    pub fn check_reset_stake(&self, config: &StakeConfig, now: u64) -> Result<(), LedgerError> {
        let (current, _) = self.stake_parts()?;
        if current.token != config.token || current.tier != config.tier {
            return Err(LedgerError::StakeConfigImmutable { account: self.id });
        }
        if now < current.lock_time {
            return Err(LedgerError::StakeInLock {
                account: self.id,
                lock_time: current.lock_time,
            });
        }
        if self.stake_holders() > 1 {
            return Err(LedgerError::TooManyStakeHolders { account: self.id });
        }
        check_lock_time(config.lock_time, now)
    }

    pub fn reset_stake(&mut self, config: StakeConfig, now: u64) -> Result<(), LedgerError> {
        self.check_reset_stake(&config, now)?;
        self.stake = Some(config);
        Ok(())
    }

    pub fn check_take_stake(
        &self,
        token: &TokenSymbol,
        holder: &Address,
        amount: &BigUint,
        lock_time: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        let (cfg, ledger) = self.stake_parts()?;
        if &cfg.token != token {
            return Err(LedgerError::TokenMismatch {
                account: self.id,
                expected: cfg.token.clone(),
                actual: token.clone(),
            });
        }
        check_lock_time(lock_time, now)?;
        let total = ledger.get(holder).map_or_else(BigUint::zero, |e| e.amount.clone()) + amount;
        if total < cfg.min_amount || total > cfg.max_amount {
            return Err(LedgerError::AmountOutOfRange {
                account: self.id,
                min: cfg.min_amount.clone(),
                max: cfg.max_amount.clone(),
                actual: total,
            });
        }
        Ok(())
    }

    pub fn take_stake(
        &mut self,
        token: &TokenSymbol,
        holder: Address,
        amount: &BigUint,
        lock_time: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.check_take_stake(token, &holder, amount, lock_time, now)?;
        let entry = self.stake_ledger_mut()?.entry(holder).or_default();
        entry.amount += amount;
        // never lowered
        entry.lock_time = entry.lock_time.max(lock_time);
        self.add(token, amount);
        Ok(())
    }

    /// Returns the payout, `amount` minus the withdraw fee.
    pub fn check_withdraw_stake(
        &self,
        token: &TokenSymbol,
        holder: &Address,
        signers: &Signers,
        amount: &BigUint,
        now: u64,
    ) -> Result<BigUint, LedgerError> {
        let (cfg, ledger) = self.stake_parts()?;
        if &cfg.token != token {
            return Err(LedgerError::TokenMismatch {
                account: self.id,
                expected: cfg.token.clone(),
                actual: token.clone(),
            });
        }
        let entry = ledger.get(holder).ok_or(LedgerError::StakeHolderNotFound {
            account: self.id,
            holder: *holder,
        })?;
        if &entry.amount < amount {
            return Err(LedgerError::InsufficientStake {
                account: self.id,
                holder: *holder,
                expected: amount.clone(),
                actual: entry.amount.clone(),
            });
        }
        let lock_time = cfg.lock_time.max(entry.lock_time);
        if now < lock_time {
            return Err(LedgerError::StakeInLock {
                account: self.id,
                lock_time,
            });
        }
        if let Some(approver) = entry.approver {
            if !signers.contains(&approver) {
                return Err(LedgerError::InvalidApproverSignature {
                    subject: Subject::Account(*holder),
                });
            }
        }
        let payout = amount - cfg.withdraw_fee(amount);
        self.check_balance(token, &payout, true)?;
        Ok(payout)
    }

    pub fn withdraw_stake(
        &mut self,
        token: &TokenSymbol,
        holder: &Address,
        signers: &Signers,
        amount: &BigUint,
        now: u64,
    ) -> Result<BigUint, LedgerError> {
        let payout = self.check_withdraw_stake(token, holder, signers, amount, now)?;
        let ledger = self.stake_ledger_mut()?;
        if let Some(entry) = ledger.get_mut(holder) {
            entry.amount -= amount;
            if entry.amount.is_zero() && entry.approver.is_none() {
                ledger.remove(holder);
            }
        }
        self.debit(token, &payout);
        Ok(payout)
    }

    /// The holder signs the transaction. Once an approver is set, changing
    /// it also needs the approver or the stake keepers (`ex_signers`).
    pub fn check_update_stake_approver(
        &self,
        holder: &Address,
        signers: &Signers,
        ex_signers: &Signers,
    ) -> Result<(), LedgerError> {
        let (_, ledger) = self.stake_parts()?;
        let entry = ledger.get(holder).ok_or(LedgerError::StakeHolderNotFound {
            account: self.id,
            holder: *holder,
        })?;
        match entry.approver {
            Some(approver) if !signers.contains(&approver) && !self.satisfy(ex_signers) => {
                Err(LedgerError::InvalidApproverSignature {
                    subject: Subject::Account(*holder),
                })
            }
            _ => Ok(()),
        }
    }

    pub fn update_stake_approver(
        &mut self,
        holder: &Address,
        approver: Option<Address>,
        signers: &Signers,
        ex_signers: &Signers,
    ) -> Result<(), LedgerError> {
        self.check_update_stake_approver(holder, signers, ex_signers)?;
        if let Some(entry) = self.stake_ledger_mut()?.get_mut(holder) {
            entry.approver = approver;
        }
        Ok(())
    }

    /// Checks that the pool can be dissolved into `recipient`.
    pub fn check_destroy_stake(&self, recipient: &Address, now: u64) -> Result<(), LedgerError> {
        let (cfg, ledger) = self.stake_parts()?;
        if now < cfg.lock_time {
            return Err(LedgerError::StakeInLock {
                account: self.id,
                lock_time: cfg.lock_time,
            });
        }
        if self.stake_holders() > 1 {
            return Err(LedgerError::TooManyStakeHolders { account: self.id });
        }
        if let Some((holder, _)) = ledger.iter().find(|(_, e)| !e.amount.is_zero()) {
            if holder != recipient {
                return Err(LedgerError::HolderNotRecipient {
                    account: self.id,
                    holder: *holder,
                });
            }
        }
        self.check_lending_closed()
    }

    /// Resets the pool to a plain account and hands back every balance.
    pub fn destroy_stake(
        &mut self,
        recipient: &Address,
        now: u64,
    ) -> Result<(BigUint, BTreeMap<TokenSymbol, BigUint>), LedgerError> {
        self.check_destroy_stake(recipient, now)?;
        let balances = self.take_all();
        self.reset_to_native();
        Ok(balances)
    }
}
