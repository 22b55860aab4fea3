//! Signing policy and per-type sender/receiver permissions

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;

use super::types::{AccountState, AccountType};
use crate::crypto::Signers;
use crate::error::{LedgerError, Subject};
use crate::transaction::{TxType, TxTypes};
use crate::types::{Address, TREASURY};

pub const MAX_KEEPERS: usize = 64;

/// Threshold multisig with an optional mandatory approver.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SigningPolicy {
    pub threshold: u16,
    /// Unique; order is kept for display only.
    pub keepers: Vec<Address>,
    pub approver: Option<Address>,
    /// Kinds that need the approver. `None` means every policy-changing kind.
    pub approve_list: Option<TxTypes>,
}

/// Partial update of a signing policy. A zero approver or an empty approve
/// list clears the field.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyUpdate {
    pub threshold: Option<u16>,
    pub keepers: Option<Vec<Address>>,
    pub approver: Option<Address>,
    pub approve_list: Option<TxTypes>,
}

impl PolicyUpdate {
    pub fn is_empty(&self) -> bool {
        self.threshold.is_none()
            && self.keepers.is_none()
            && self.approver.is_none()
            && self.approve_list.is_none()
    }
}

impl SigningPolicy {
    pub fn new(threshold: u16, keepers: Vec<Address>) -> Self {
        Self {
            threshold,
            keepers,
            approver: None,
            approve_list: None,
        }
    }

    /// Shape rules. `require_keepers` is set for addresses nobody holds a
    /// key for (token, stake, data and model records).
    pub fn validate(&self, require_keepers: bool) -> Result<(), String> {
        if self.keepers.len() > MAX_KEEPERS {
            return Err(format!("too many keepers, expected <= {}", MAX_KEEPERS));
        }
        let unique: BTreeSet<_> = self.keepers.iter().collect();
        if unique.len() != self.keepers.len() {
            return Err("duplicate keepers".to_string());
        }
        if self.keepers.iter().any(|k| k.is_zero()) {
            return Err("zero address keeper".to_string());
        }
        if require_keepers && self.keepers.is_empty() {
            return Err("keepers should not be empty".to_string());
        }
        if self.threshold as usize > self.keepers.len() {
            return Err(format!(
                "threshold {} exceeds {} keepers",
                self.threshold,
                self.keepers.len()
            ));
        }
        if matches!(self.approver, Some(a) if a.is_zero()) {
            return Err("zero address approver".to_string());
        }
        Ok(())
    }

    /// `|signers ∩ keepers| >= threshold`. Never true without keepers.
    pub fn satisfy_keepers(&self, signers: &Signers) -> bool {
        if self.keepers.is_empty() {
            return false;
        }
        let signed = self.keepers.iter().filter(|k| signers.contains(k)).count();
        signed >= self.threshold as usize
    }

    /// Whether `tx_type` needs the approver. `plus` selects the strict rule
    /// used by policy-changing kinds, where an unset approve list counts.
    pub fn approver_required(&self, tx_type: TxType, plus: bool) -> bool {
        if self.approver.is_none() {
            return false;
        }
        match &self.approve_list {
            None => plus,
            Some(list) => list.contains(tx_type),
        }
    }

    fn approver_signed(&self, signers: &Signers) -> bool {
        self.approver.map_or(true, |a| signers.contains(&a))
    }

    /// Keeper threshold plus the approver when required for `tx_type`.
    pub fn check(&self, subject: Subject, tx_type: TxType, signers: &Signers) -> Result<(), LedgerError> {
        if !self.satisfy_keepers(signers) {
            return Err(LedgerError::InvalidKeeperSignatures { subject });
        }
        if self.approver_required(tx_type, tx_type.changes_policy()) && !self.approver_signed(signers) {
            return Err(LedgerError::InvalidApproverSignature { subject });
        }
        Ok(())
    }

    pub fn updated(&self, update: &PolicyUpdate) -> SigningPolicy {
        let mut next = self.clone();
        if let Some(threshold) = update.threshold {
            next.threshold = threshold;
        }
        if let Some(keepers) = &update.keepers {
            next.keepers = keepers.clone();
        }
        if let Some(approver) = update.approver {
            next.approver = if approver.is_zero() { None } else { Some(approver) };
        }
        if let Some(list) = update.approve_list {
            next.approve_list = if list.is_empty() { None } else { Some(list) };
        }
        next
    }
}

const TOKEN_FROM: TxTypes = TxTypes::of(&[
    TxType::Transfer,
    TxType::TransferMultiple,
    TxType::UpdateAccountInfo,
    TxType::AddNonceTable,
    TxType::DestroyToken,
    TxType::OpenLending,
    TxType::CloseLending,
]);

const TOKEN_TO: TxTypes = TxTypes::of(&[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferCash,
    TxType::Exchange,
    TxType::Borrow,
    TxType::Repay,
]);

// Stake administration only.
const STAKE_FROM_0: TxTypes = TxTypes::of(&[
    TxType::UpdateAccountInfo,
    TxType::AddNonceTable,
    TxType::ResetStake,
    TxType::DestroyStake,
    TxType::OpenLending,
    TxType::CloseLending,
]);

const STAKE_FROM_1: TxTypes = STAKE_FROM_0.union(TxTypes::of(&[
    TxType::TakeStake,
    TxType::WithdrawStake,
    TxType::UpdateStakeApprover,
]));

const STAKE_FROM_2: TxTypes = STAKE_FROM_1.union(TxTypes::of(&[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferMultiple,
]));

const STAKE_TO: TxTypes = TxTypes::of(&[
    TxType::Transfer,
    TxType::TransferPay,
    TxType::TransferCash,
    TxType::Exchange,
    TxType::TakeStake,
    TxType::WithdrawStake,
    TxType::UpdateStakeApprover,
    TxType::Borrow,
    TxType::Repay,
]);

impl AccountState {
    /// The account's policy, with a bare address standing in as its own
    /// single keeper.
    fn signing_policy(&self) -> Cow<'_, SigningPolicy> {
        if self.policy.keepers.is_empty() {
            Cow::Owned(SigningPolicy {
                threshold: 1,
                keepers: vec![self.id],
                ..self.policy.clone()
            })
        } else {
            Cow::Borrowed(&self.policy)
        }
    }

    /// Keeper threshold, or the account's own key for a bare address.
    /// The treasury never satisfies.
    pub fn satisfy(&self, signers: &Signers) -> bool {
        self.id != TREASURY && self.signing_policy().satisfy_keepers(signers)
    }

    /// `satisfy` plus the approver when the approve list is unset or names
    /// `tx_type`.
    pub fn satisfy_plus(&self, signers: &Signers, tx_type: TxType) -> bool {
        self.satisfy(signers)
            && (!self.policy.approver_required(tx_type, true) || self.policy.approver_signed(signers))
    }

    pub fn verify_signers(&self, tx_type: TxType, signers: &Signers) -> Result<(), LedgerError> {
        let subject = Subject::Account(self.id);
        if self.id == TREASURY {
            return Err(LedgerError::InvalidKeeperSignatures { subject });
        }
        self.signing_policy().check(subject, tx_type, signers)
    }

    pub fn check_as_from(&self, tx_type: TxType) -> Result<(), LedgerError> {
        let not_allowed = LedgerError::NotAllowed {
            account: self.id,
            tx_type,
        };
        if self.id == TREASURY {
            return Err(not_allowed);
        }
        self.validate()?;
        let allowed = match self.account_type {
            AccountType::Native => return Ok(()),
            AccountType::Token => TOKEN_FROM,
            AccountType::Stake => match self.stake.as_ref().map(|s| s.tier) {
                Some(2) => STAKE_FROM_2,
                Some(1) => STAKE_FROM_1,
                _ => STAKE_FROM_0,
            },
        };
        if allowed.contains(tx_type) {
            Ok(())
        } else {
            Err(not_allowed)
        }
    }

    pub fn check_as_to(&self, tx_type: TxType) -> Result<(), LedgerError> {
        self.validate()?;
        let allowed = match self.account_type {
            AccountType::Native => return Ok(()),
            AccountType::Token => TOKEN_TO,
            AccountType::Stake => STAKE_TO,
        };
        if allowed.contains(tx_type) {
            Ok(())
        } else {
            Err(LedgerError::NotAllowed {
                account: self.id,
                tx_type,
            })
        }
    }
}
