//! Value transfers: direct, invoiced, cheques, batches and exchanges

use num_bigint::BigUint;

use super::payload::{ExchangeOffer, Payment, TransferAuth};
use super::pipeline::{check_expire, TxContext};
use crate::chain::BlockContext;
use crate::error::LedgerError;
use crate::storage::StateAccess;

pub(super) fn verify_transfer(cx: &TxContext) -> Result<BigUint, LedgerError> {
    Ok(cx.amount.clone())
}

pub(super) fn accept_transfer(cx: &TxContext) -> Result<(), LedgerError> {
    cx.to()?.write().add(&cx.token, &cx.amount);
    Ok(())
}

/// The payee countersigned the invoice.
pub(super) fn verify_pay(cx: &TxContext, auth: &TransferAuth, block: &BlockContext) -> Result<BigUint, LedgerError> {
    check_expire(auth.expire, block.timestamp)?;
    cx.to()?.read().verify_signers(cx.tx_type(), &cx.ex_signers)?;
    Ok(cx.amount.clone())
}

/// The payer countersigned the cheque and pays it from its nonce table.
pub(super) fn verify_cash(cx: &TxContext, auth: &TransferAuth, block: &BlockContext) -> Result<BigUint, LedgerError> {
    check_expire(auth.expire, block.timestamp)?;
    let payer = cx.to()?.read();
    payer.verify_signers(cx.tx_type(), &cx.ex_signers)?;
    payer.check_sub_by_nonce_table(&cx.token, auth.expire, auth.nonce, &cx.amount)?;
    Ok(BigUint::default())
}

pub(super) fn accept_cash(cx: &TxContext, auth: &TransferAuth) -> Result<(), LedgerError> {
    cx.to()?
        .write()
        .sub_by_nonce_table(&cx.token, auth.expire, auth.nonce, &cx.amount)?;
    cx.from.write().add(&cx.token, &cx.amount);
    Ok(())
}

pub(super) fn verify_multiple<S: StateAccess + ?Sized>(
    cx: &TxContext,
    payments: &[Payment],
    state: &S,
) -> Result<BigUint, LedgerError> {
    for payment in payments {
        state.load_account(payment.to)?.read().check_as_to(cx.tx_type())?;
    }
    Ok(cx.amount.clone())
}

pub(super) fn accept_multiple<S: StateAccess + ?Sized>(
    cx: &TxContext,
    payments: &[Payment],
    state: &S,
) -> Result<(), LedgerError> {
    for payment in payments {
        state.load_account(payment.to)?.write().add(&cx.token, &payment.amount);
    }
    Ok(())
}

/// The buyer pays `amount` of `receive` to the payee and takes the matching
/// quantity of `sell` from the seller's nonce table.
pub(super) fn verify_exchange<S: StateAccess + ?Sized>(
    cx: &TxContext,
    offer: &ExchangeOffer,
    block: &BlockContext,
    state: &S,
) -> Result<BigUint, LedgerError> {
    check_expire(offer.expire, block.timestamp)?;
    let quantity = offer.quantity(&cx.amount);
    if quantity < offer.minimum || quantity > offer.quota {
        return Err(LedgerError::QuantityOutOfRange {
            minimum: offer.minimum.clone(),
            quota: offer.quota.clone(),
            actual: quantity,
        });
    }
    {
        let seller = cx.to()?.read();
        seller.verify_signers(cx.tx_type(), &cx.ex_signers)?;
        seller.check_sub_by_nonce_table(&offer.sell, offer.expire, offer.nonce, &quantity)?;
    }
    state.load_account(offer.payee)?.read().check_as_to(cx.tx_type())?;
    Ok(cx.amount.clone())
}

pub(super) fn accept_exchange<S: StateAccess + ?Sized>(
    cx: &TxContext,
    offer: &ExchangeOffer,
    state: &S,
) -> Result<(), LedgerError> {
    let quantity = offer.quantity(&cx.amount);
    cx.to()?
        .write()
        .sub_by_nonce_table(&offer.sell, offer.expire, offer.nonce, &quantity)?;
    state.load_account(offer.payee)?.write().add(&offer.receive, &cx.amount);
    cx.from.write().add(&offer.sell, &quantity);
    Ok(())
}
