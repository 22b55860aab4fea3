//! Parse → verify → accept
//!
//! `syntactic_verify` looks at the transaction alone. `verify` reads the
//! ledger but never writes it. `accept` applies a verified transaction and
//! cannot fail: an error there means verify and accept disagree, which is
//! logged and aborts.

use num_bigint::BigUint;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::payload::{self, TxPayload};
use super::{account_ops, data_ops, lending_ops, required_gas, stake_ops, transfer};
use super::{Transaction, TxType, MAX_SIGNATURES};
use crate::account::Account;
use crate::chain::BlockContext;
use crate::crypto::Signers;
use crate::error::LedgerError;
use crate::storage::{MemoryState, StateAccess};
use crate::types::{Address, TokenSymbol, TREASURY};

/// A transaction that passed the stateless checks.
#[derive(Debug, Clone)]
pub struct ParsedTx {
    tx: Transaction,
    id: [u8; 32],
    payload: TxPayload,
    signers: Signers,
    ex_signers: Signers,
    genesis: bool,
}

impl ParsedTx {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn id(&self) -> [u8; 32] {
        self.id
    }

    pub fn payload(&self) -> &TxPayload {
        &self.payload
    }

    pub fn signers(&self) -> &Signers {
        &self.signers
    }
}

/// Everything the per-kind hooks share: the transaction, its recovered
/// signers and the account handles loaded during verify.
pub(crate) struct TxContext {
    pub tx: Transaction,
    pub id: [u8; 32],
    pub signers: Signers,
    pub ex_signers: Signers,
    pub genesis: bool,
    pub token: TokenSymbol,
    pub amount: BigUint,
    pub fee: BigUint,
    /// What the sender pays in `token` on top of the fee
    pub debit: BigUint,
    pub from: Arc<Account>,
    pub to: Option<Arc<Account>>,
    pub treasury: Arc<Account>,
    pub miner: Option<Arc<Account>>,
}

impl TxContext {
    pub fn tx_type(&self) -> TxType {
        self.tx.tx_type
    }

    pub fn from_id(&self) -> Address {
        self.tx.from
    }

    pub fn to(&self) -> Result<&Arc<Account>, LedgerError> {
        self.to
            .as_ref()
            .ok_or_else(|| LedgerError::malformed(self.tx.tx_type, "to", "should not be nil"))
    }
}

/// Rejects an authorization that expired before `now`.
pub(crate) fn check_expire(expire: u64, now: u64) -> Result<(), LedgerError> {
    if expire < now {
        return Err(LedgerError::Expired { expire, now });
    }
    Ok(())
}

/// A transaction that passed every check against the current ledger.
pub struct VerifiedTx {
    cx: TxContext,
    payload: TxPayload,
}

impl VerifiedTx {
    pub fn tx(&self) -> &Transaction {
        &self.cx.tx
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: String,
    pub tx_type: TxType,
    pub from: Address,
    pub fee: BigUint,
    pub miner_fee: BigUint,
    pub treasury_fee: BigUint,
}

pub fn syntactic_verify(tx: Transaction, block: &BlockContext) -> Result<ParsedTx, LedgerError> {
    parse(tx, block, false)
}

/// Stateless checks for a genesis transaction. Signatures are not required.
pub fn syntactic_verify_genesis(tx: Transaction, block: &BlockContext) -> Result<ParsedTx, LedgerError> {
    parse(tx, block, true)
}

fn parse(tx: Transaction, block: &BlockContext, genesis: bool) -> Result<ParsedTx, LedgerError> {
    let ty = tx.tx_type;
    if tx.chain_id != block.chain_id() {
        return Err(LedgerError::malformed(
            ty,
            "chainID",
            format!("expected {}, got {}", block.chain_id(), tx.chain_id),
        ));
    }
    if tx.gas_tip > tx.gas_fee_cap {
        return Err(LedgerError::malformed(
            ty,
            "gasTip",
            format!("expected <= {}, got {}", tx.gas_fee_cap, tx.gas_tip),
        ));
    }
    if tx.signatures.len() > MAX_SIGNATURES || tx.ex_signatures.len() > MAX_SIGNATURES {
        return Err(LedgerError::malformed(
            ty,
            "signatures",
            format!("too many signatures, expected <= {}", MAX_SIGNATURES),
        ));
    }
    if genesis {
        if !ty.has_genesis() {
            return Err(LedgerError::malformed(ty, "type", "not allowed in genesis"));
        }
    } else if tx.signatures.is_empty() {
        return Err(LedgerError::malformed(ty, "signatures", "no signature"));
    }
    payload::check_shape(&tx, genesis)?;
    let payload = TxPayload::decode(ty, &tx.data)?;
    payload::check_payload(&tx, &payload, genesis)?;

    let signers = tx.signers()?;
    let ex_signers = tx.ex_signers()?;
    Ok(ParsedTx {
        id: tx.id(),
        tx,
        payload,
        signers,
        ex_signers,
        genesis,
    })
}

/// Checks `parsed` against the ledger. Reads only; accounts touched for the
/// first time are materialized in the working set.
pub fn verify<S: StateAccess + ?Sized>(
    parsed: ParsedTx,
    block: &BlockContext,
    state: &S,
) -> Result<VerifiedTx, LedgerError> {
    let ParsedTx {
        tx,
        id,
        payload,
        signers,
        ex_signers,
        genesis,
    } = parsed;
    let ty = tx.tx_type;

    if tx.gas_fee_cap < block.gas_price {
        return Err(LedgerError::GasFeeCapTooLow {
            expected: block.gas_price,
            actual: tx.gas_fee_cap,
        });
    }
    let expected_gas = required_gas(tx.payload_size(), block.config.fees.gas_threshold);
    if tx.gas != expected_gas {
        return Err(LedgerError::GasMismatch {
            expected: expected_gas,
            actual: tx.gas,
        });
    }

    let from = state.load_account(tx.from)?;
    let to = tx.to.map(|id| state.load_account(id)).transpose()?;
    if !genesis {
        let sender = from.read();
        sender.check_as_from(ty)?;
        sender.verify_signers(ty, &signers)?;
    }
    if let Some(to) = &to {
        to.read().check_as_to(ty)?;
    }

    let mut cx = TxContext {
        token: tx.token_or_native(),
        amount: tx.amount_or_zero(),
        fee: tx.fee(),
        debit: BigUint::default(),
        treasury: state.load_account(TREASURY)?,
        miner: state.load_miner(block.miner.as_ref())?,
        tx,
        id,
        signers,
        ex_signers,
        genesis,
        from,
        to,
    };

    cx.debit = match &payload {
        TxPayload::Transfer { .. } => transfer::verify_transfer(&cx)?,
        TxPayload::TransferPay(auth) => transfer::verify_pay(&cx, auth, block)?,
        TxPayload::TransferCash(auth) => transfer::verify_cash(&cx, auth, block)?,
        TxPayload::TransferMultiple(payments) => transfer::verify_multiple(&cx, payments, state)?,
        TxPayload::Exchange(offer) => transfer::verify_exchange(&cx, offer, block, state)?,
        TxPayload::UpdateAccountInfo(update) => account_ops::verify_update_account_info(&cx, update)?,
        TxPayload::AddNonceTable(batch) => account_ops::verify_add_nonce_table(&cx, batch, block)?,
        TxPayload::CreateToken(params) => account_ops::verify_create_token(&cx, params, block)?,
        TxPayload::DestroyToken => account_ops::verify_destroy_token(&cx)?,
        TxPayload::CreateStake(params) => stake_ops::verify_create_stake(&cx, params, block)?,
        TxPayload::ResetStake(config) => stake_ops::verify_reset_stake(&cx, config, block)?,
        TxPayload::DestroyStake => stake_ops::verify_destroy_stake(&cx, block)?,
        TxPayload::TakeStake { lock_time } => stake_ops::verify_take_stake(&cx, *lock_time, block)?,
        TxPayload::WithdrawStake { amount } => stake_ops::verify_withdraw_stake(&cx, amount, block)?,
        TxPayload::UpdateStakeApprover { .. } => stake_ops::verify_update_stake_approver(&cx)?,
        TxPayload::OpenLending(_) => lending_ops::verify_open_lending(&cx)?,
        TxPayload::CloseLending => lending_ops::verify_close_lending(&cx)?,
        TxPayload::Borrow(auth) => lending_ops::verify_borrow(&cx, auth, block)?,
        TxPayload::Repay => lending_ops::verify_repay(&cx, block)?,
        TxPayload::CreateModel(_) => data_ops::verify_create_model(&cx, state)?,
        TxPayload::CreateData(params) => data_ops::verify_create_data(&cx, params, state)?,
        TxPayload::UpdateDataInfo(info) => data_ops::verify_update_data_info(&cx, info, state)?,
        TxPayload::DeleteData(data_ref) => data_ops::verify_delete_data(&cx, data_ref, state)?,
    };

    cx.from.read().check_sub_by_nonce(
        &cx.token,
        &cx.debit,
        &cx.fee,
        cx.tx.nonce,
        !ty.releases_pledge(),
    )?;
    Ok(VerifiedTx { cx, payload })
}

/// Applies a verified transaction. Panics if the ledger no longer agrees
/// with what verify saw.
pub fn accept<S: StateAccess + ?Sized>(verified: VerifiedTx, block: &BlockContext, state: &S) -> Receipt {
    let VerifiedTx { cx, payload } = verified;
    let ty = cx.tx_type();

    invariant(
        &cx,
        cx.from.write().sub_by_nonce(
            &cx.token,
            &cx.debit,
            &cx.fee,
            cx.tx.nonce,
            !ty.releases_pledge(),
        ),
    );

    let applied = match &payload {
        TxPayload::Transfer { .. } | TxPayload::TransferPay(_) => transfer::accept_transfer(&cx),
        TxPayload::TransferCash(auth) => transfer::accept_cash(&cx, auth),
        TxPayload::TransferMultiple(payments) => transfer::accept_multiple(&cx, payments, state),
        TxPayload::Exchange(offer) => transfer::accept_exchange(&cx, offer, state),
        TxPayload::UpdateAccountInfo(update) => account_ops::accept_update_account_info(&cx, update),
        TxPayload::AddNonceTable(batch) => account_ops::accept_add_nonce_table(&cx, batch, block),
        TxPayload::CreateToken(params) => account_ops::accept_create_token(&cx, params),
        TxPayload::DestroyToken => account_ops::accept_destroy_token(&cx),
        TxPayload::CreateStake(params) => stake_ops::accept_create_stake(&cx, params, block),
        TxPayload::ResetStake(config) => stake_ops::accept_reset_stake(&cx, config, block),
        TxPayload::DestroyStake => stake_ops::accept_destroy_stake(&cx, block),
        TxPayload::TakeStake { lock_time } => stake_ops::accept_take_stake(&cx, *lock_time, block),
        TxPayload::WithdrawStake { amount } => stake_ops::accept_withdraw_stake(&cx, amount, block),
        TxPayload::UpdateStakeApprover { approver } => stake_ops::accept_update_stake_approver(&cx, *approver),
        TxPayload::OpenLending(config) => lending_ops::accept_open_lending(&cx, config),
        TxPayload::CloseLending => lending_ops::accept_close_lending(&cx),
        TxPayload::Borrow(auth) => lending_ops::accept_borrow(&cx, auth, block),
        TxPayload::Repay => lending_ops::accept_repay(&cx, block),
        TxPayload::CreateModel(params) => data_ops::accept_create_model(&cx, params, state),
        TxPayload::CreateData(params) => data_ops::accept_create_data(&cx, params, state),
        TxPayload::UpdateDataInfo(info) => data_ops::accept_update_data_info(&cx, info, state),
        TxPayload::DeleteData(data_ref) => data_ops::accept_delete_data(&cx, data_ref, state),
    };
    invariant(&cx, applied);

    let native = TokenSymbol::native();
    let miner_fee = match &cx.miner {
        Some(miner) => {
            let miner_fee = cx.tx.miner_fee();
            miner.write().add(&native, &miner_fee);
            miner_fee
        }
        None => BigUint::default(),
    };
    let treasury_fee = &cx.fee - &miner_fee;
    cx.treasury.write().add(&native, &treasury_fee);

    let receipt = Receipt {
        id: hex::encode(cx.id),
        tx_type: ty,
        from: cx.tx.from,
        fee: cx.fee.clone(),
        miner_fee,
        treasury_fee,
    };
    debug!(
        tx = %receipt.id,
        tx_type = %ty,
        from = %receipt.from,
        fee = %receipt.fee,
        miner_fee = %receipt.miner_fee,
        "transaction accepted"
    );
    receipt
}

fn invariant<T>(cx: &TxContext, result: Result<T, LedgerError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            let id = hex::encode(cx.id);
            error!(tx = %id, tx_type = %cx.tx_type(), error = %err, "accept diverged from verify");
            panic!("invariant violated while accepting {} {}: {}", cx.tx_type(), id, err);
        }
    }
}

/// Runs one transaction against `state` inside a checkpoint. On rejection
/// the working set is rolled back and the error returned.
pub fn apply_transaction(tx: Transaction, block: &BlockContext, state: &MemoryState) -> Result<Receipt, LedgerError> {
    let ty = tx.tx_type;
    let from = tx.from;
    state.checkpoint();
    match syntactic_verify(tx, block).and_then(|parsed| verify(parsed, block, state)) {
        Ok(verified) => {
            let receipt = accept(verified, block, state);
            state.release();
            Ok(receipt)
        }
        Err(err) => {
            state.revert();
            warn!(tx_type = %ty, from = %from, error = %err, "transaction rejected");
            Err(err)
        }
    }
}

/// Applies the chain-initialization transactions. Signatures are not
/// checked; any rejection rolls back the whole set.
pub fn apply_genesis(
    txs: Vec<Transaction>,
    block: &BlockContext,
    state: &MemoryState,
) -> Result<Vec<Receipt>, LedgerError> {
    state.checkpoint();
    let mut receipts = Vec::with_capacity(txs.len());
    for tx in txs {
        let ty = tx.tx_type;
        match syntactic_verify_genesis(tx, block).and_then(|parsed| verify(parsed, block, state)) {
            Ok(verified) => receipts.push(accept(verified, block, state)),
            Err(err) => {
                state.revert();
                warn!(tx_type = %ty, error = %err, "genesis transaction rejected");
                return Err(err);
            }
        }
    }
    state.release();
    info!(transactions = receipts.len(), height = block.height, "genesis applied");
    Ok(receipts)
}
