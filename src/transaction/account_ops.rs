use num_bigint::BigUint;

use super::payload::{NonceBatch, TokenParams};
use super::pipeline::TxContext;
use crate::account::{AccountState, AccountType, PolicyUpdate, SigningPolicy};
use crate::chain::BlockContext;
use crate::error::LedgerError;
use crate::types::TokenSymbol;

fn updated_policy(state: &AccountState, update: &PolicyUpdate) -> Result<SigningPolicy, LedgerError> {
    let next = state.policy.updated(update);
    // only plain accounts may fall back to their own key
    next.validate(state.account_type != AccountType::Native)
        .map_err(|reason| LedgerError::InvalidAccount {
            account: state.id,
            reason,
        })?;
    Ok(next)
}

pub(super) fn verify_update_account_info(cx: &TxContext, update: &PolicyUpdate) -> Result<BigUint, LedgerError> {
    updated_policy(&cx.from.read(), update)?;
    Ok(BigUint::default())
}

pub(super) fn accept_update_account_info(cx: &TxContext, update: &PolicyUpdate) -> Result<(), LedgerError> {
    let mut from = cx.from.write();
    let next = updated_policy(&from, update)?;
    from.policy = next;
    Ok(())
}

fn check_batch(cx: &TxContext, batch: &NonceBatch, block: &BlockContext) -> Result<(), LedgerError> {
    let limits = &block.config.nonce_table;
    if batch.nonces.len() > limits.max_batch {
        return Err(LedgerError::malformed(
            cx.tx_type(),
            "data",
            format!("too many nonces, expected <= {}", limits.max_batch),
        ));
    }
    let now = block.timestamp;
    let max = now + limits.max_expire_secs;
    if batch.expire <= now || batch.expire > max {
        return Err(LedgerError::ExpireOutOfRange {
            min: now,
            max,
            actual: batch.expire,
        });
    }
    Ok(())
}

pub(super) fn verify_add_nonce_table(
    cx: &TxContext,
    batch: &NonceBatch,
    block: &BlockContext,
) -> Result<BigUint, LedgerError> {
    check_batch(cx, batch, block)?;
    cx.from
        .read()
        .check_add_nonce_table(batch.expire, &batch.nonces, block.timestamp)?;
    Ok(BigUint::default())
}

pub(super) fn accept_add_nonce_table(cx: &TxContext, batch: &NonceBatch, block: &BlockContext) -> Result<(), LedgerError> {
    cx.from
        .write()
        .add_nonce_table(batch.expire, &batch.nonces, block.timestamp)
}

/// The sender pays the pledge; the new token account holds the supply.
pub(super) fn verify_create_token(
    cx: &TxContext,
    params: &TokenParams,
    block: &BlockContext,
) -> Result<BigUint, LedgerError> {
    cx.to()?.read().check_create_token()?;
    if params.symbol.is_native() && params.max_total_supply != block.config.chain.max_total_supply {
        return Err(LedgerError::malformed(
            cx.tx_type(),
            "data",
            format!("native maxTotalSupply should be {}", block.config.chain.max_total_supply),
        ));
    }
    let min_pledge = &block.config.fees.min_token_pledge;
    if !cx.genesis && &cx.amount < min_pledge {
        return Err(LedgerError::InsufficientPledge {
            expected: min_pledge.clone(),
            actual: cx.amount.clone(),
        });
    }
    Ok(cx.amount.clone())
}

pub(super) fn accept_create_token(cx: &TxContext, params: &TokenParams) -> Result<(), LedgerError> {
    cx.to()?.write().create_token(
        &params.symbol,
        params.policy.clone(),
        params.max_total_supply.clone(),
        cx.amount.clone(),
    )
}

pub(super) fn verify_destroy_token(cx: &TxContext) -> Result<BigUint, LedgerError> {
    cx.from.read().check_destroy_token()?;
    Ok(BigUint::default())
}

pub(super) fn accept_destroy_token(cx: &TxContext) -> Result<(), LedgerError> {
    let (native, tokens) = cx.from.write().destroy_token()?;
    let mut recipient = cx.to()?.write();
    recipient.add(&TokenSymbol::native(), &native);
    for (token, amount) in &tokens {
        recipient.add(token, amount);
    }
    Ok(())
}
