use num_bigint::BigUint;

use super::payload::StakeParams;
use super::pipeline::TxContext;
use crate::account::StakeConfig;
use crate::chain::BlockContext;
use crate::error::LedgerError;
use crate::types::{Address, TokenSymbol};

pub(super) fn verify_create_stake(
    cx: &TxContext,
    params: &StakeParams,
    block: &BlockContext,
) -> Result<BigUint, LedgerError> {
    cx.to()?.read().check_create_stake(&params.config, block.timestamp)?;
    let min_pledge = &block.config.fees.min_stake_pledge;
    if !cx.genesis && &cx.amount < min_pledge {
        return Err(LedgerError::InsufficientPledge {
            expected: min_pledge.clone(),
            actual: cx.amount.clone(),
        });
    }
    Ok(cx.amount.clone())
}

pub(super) fn accept_create_stake(cx: &TxContext, params: &StakeParams, block: &BlockContext) -> Result<(), LedgerError> {
    cx.to()?.write().create_stake(
        params.policy.clone(),
        params.config.clone(),
        cx.amount.clone(),
        block.timestamp,
    )
}

pub(super) fn verify_reset_stake(cx: &TxContext, config: &StakeConfig, block: &BlockContext) -> Result<BigUint, LedgerError> {
    cx.from.read().check_reset_stake(config, block.timestamp)?;
    Ok(BigUint::default())
}

pub(super) fn accept_reset_stake(cx: &TxContext, config: &StakeConfig, block: &BlockContext) -> Result<(), LedgerError> {
    cx.from.write().reset_stake(config.clone(), block.timestamp)
}

fn recipient(cx: &TxContext) -> Result<Address, LedgerError> {
    Ok(cx.to()?.id())
}

pub(super) fn verify_destroy_stake(cx: &TxContext, block: &BlockContext) -> Result<BigUint, LedgerError> {
    cx.from
        .read()
        .check_destroy_stake(&recipient(cx)?, block.timestamp)?;
    Ok(BigUint::default())
}

pub(super) fn accept_destroy_stake(cx: &TxContext, block: &BlockContext) -> Result<(), LedgerError> {
    let (native, tokens) = cx
        .from
        .write()
        .destroy_stake(&recipient(cx)?, block.timestamp)?;
    let mut to = cx.to()?.write();
    to.add(&TokenSymbol::native(), &native);
    for (token, amount) in &tokens {
        to.add(token, amount);
    }
    Ok(())
}

pub(super) fn verify_take_stake(cx: &TxContext, lock_time: u64, block: &BlockContext) -> Result<BigUint, LedgerError> {
    cx.to()?
        .read()
        .check_take_stake(&cx.token, &cx.from_id(), &cx.amount, lock_time, block.timestamp)?;
    Ok(cx.amount.clone())
}

pub(super) fn accept_take_stake(cx: &TxContext, lock_time: u64, block: &BlockContext) -> Result<(), LedgerError> {
    cx.to()?
        .write()
        .take_stake(&cx.token, cx.from_id(), &cx.amount, lock_time, block.timestamp)
}

/// The holder withdraws; the fee stays with the pool.
pub(super) fn verify_withdraw_stake(cx: &TxContext, amount: &BigUint, block: &BlockContext) -> Result<BigUint, LedgerError> {
    cx.to()?
        .read()
        .check_withdraw_stake(&cx.token, &cx.from_id(), &cx.signers, amount, block.timestamp)?;
    Ok(BigUint::default())
}

pub(super) fn accept_withdraw_stake(cx: &TxContext, amount: &BigUint, block: &BlockContext) -> Result<(), LedgerError> {
    let payout = cx.to()?.write().withdraw_stake(
        &cx.token,
        &cx.from_id(),
        &cx.signers,
        amount,
        block.timestamp,
    )?;
    cx.from.write().add(&cx.token, &payout);
    Ok(())
}

pub(super) fn verify_update_stake_approver(cx: &TxContext) -> Result<BigUint, LedgerError> {
    cx.to()?
        .read()
        .check_update_stake_approver(&cx.from_id(), &cx.signers, &cx.ex_signers)?;
    Ok(BigUint::default())
}

pub(super) fn accept_update_stake_approver(cx: &TxContext, approver: Option<Address>) -> Result<(), LedgerError> {
    cx.to()?
        .write()
        .update_stake_approver(&cx.from_id(), approver, &cx.signers, &cx.ex_signers)
}
