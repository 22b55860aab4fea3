use num_bigint::BigUint;

use super::payload::LoanAuth;
use super::pipeline::{check_expire, TxContext};
use crate::account::LendingConfig;
use crate::chain::BlockContext;
use crate::error::LedgerError;

pub(super) fn verify_open_lending(cx: &TxContext) -> Result<BigUint, LedgerError> {
    cx.from.read().check_lending_closed()?;
    Ok(BigUint::default())
}

pub(super) fn accept_open_lending(cx: &TxContext, config: &LendingConfig) -> Result<(), LedgerError> {
    cx.from.write().open_lending(config.clone())
}

pub(super) fn verify_close_lending(cx: &TxContext) -> Result<BigUint, LedgerError> {
    cx.from.read().check_close_lending()?;
    Ok(BigUint::default())
}

pub(super) fn accept_close_lending(cx: &TxContext) -> Result<(), LedgerError> {
    cx.from.write().close_lending()
}

/// The lender countersigned the terms; the loan is paid out of the lender's
/// balance against one of its pre-authorized nonces.
pub(super) fn verify_borrow(cx: &TxContext, auth: &LoanAuth, block: &BlockContext) -> Result<BigUint, LedgerError> {
    check_expire(auth.expire, block.timestamp)?;
    let lender = cx.to()?.read();
    lender.verify_signers(cx.tx_type(), &cx.ex_signers)?;
    lender.check_consume_nonce(auth.expire, auth.nonce)?;
    lender.check_borrow(&cx.token, &cx.from_id(), &cx.amount, auth.due_time, block.timestamp)?;
    Ok(BigUint::default())
}

pub(super) fn accept_borrow(cx: &TxContext, auth: &LoanAuth, block: &BlockContext) -> Result<(), LedgerError> {
    {
        let mut lender = cx.to()?.write();
        lender.consume_nonce(auth.expire, auth.nonce)?;
        lender.borrow(&cx.token, cx.from_id(), &cx.amount, auth.due_time, block.timestamp)?;
    }
    cx.from.write().add(&cx.token, &cx.amount);
    Ok(())
}

/// The sender pays at most what it owes.
pub(super) fn verify_repay(cx: &TxContext, block: &BlockContext) -> Result<BigUint, LedgerError> {
    let owed = cx
        .to()?
        .read()
        .check_repay(&cx.token, &cx.from_id(), block.timestamp)?;
    Ok(owed.min(cx.amount.clone()))
}

pub(super) fn accept_repay(cx: &TxContext, block: &BlockContext) -> Result<(), LedgerError> {
    let lender = cx.to()?;
    let repaid = lender
        .write()
        .repay(&cx.token, &cx.from_id(), &cx.amount, block.timestamp)?;
    if repaid != cx.debit {
        return Err(LedgerError::InvalidAccount {
            account: lender.id(),
            reason: format!("repaid {} but debited {}", repaid, cx.debit),
        });
    }
    Ok(())
}
