//! Model and data records kept outside the account ledger

use num_bigint::BigUint;

use super::payload::{DataInfoUpdate, DataParams, DataRef, ModelParams};
use super::pipeline::TxContext;
use crate::account::SigningPolicy;
use crate::error::{LedgerError, Subject};
use crate::storage::{DataInfo, ModelInfo, StateAccess};
use crate::types::ObjectId;

fn new_object_id(cx: &TxContext) -> ObjectId {
    ObjectId::from_tx_id(&cx.id)
}

pub(super) fn verify_create_model<S: StateAccess + ?Sized>(cx: &TxContext, state: &S) -> Result<BigUint, LedgerError> {
    let id = new_object_id(cx);
    if state.load_model(&id)?.is_some() {
        return Err(LedgerError::ObjectExists { id });
    }
    Ok(BigUint::default())
}

pub(super) fn accept_create_model<S: StateAccess + ?Sized>(
    cx: &TxContext,
    params: &ModelParams,
    state: &S,
) -> Result<(), LedgerError> {
    state.save_model(ModelInfo {
        id: new_object_id(cx),
        name: params.name.clone(),
        policy: params.policy.clone(),
        schema: params.schema.clone(),
    })
}

/// Models with keepers only accept records they countersigned.
pub(super) fn verify_create_data<S: StateAccess + ?Sized>(
    cx: &TxContext,
    params: &DataParams,
    state: &S,
) -> Result<BigUint, LedgerError> {
    let model = state
        .load_model(&params.model)?
        .ok_or(LedgerError::ModelNotFound { id: params.model })?;
    if !model.policy.keepers.is_empty() {
        model
            .policy
            .check(Subject::Model(model.id), cx.tx_type(), &cx.ex_signers)?;
    }
    let id = new_object_id(cx);
    if state.load_data(&id)?.is_some() {
        return Err(LedgerError::ObjectExists { id });
    }
    Ok(BigUint::default())
}

pub(super) fn accept_create_data<S: StateAccess + ?Sized>(
    cx: &TxContext,
    params: &DataParams,
    state: &S,
) -> Result<(), LedgerError> {
    state.save_data(DataInfo {
        id: new_object_id(cx),
        model: params.model,
        version: 1,
        policy: params.policy.clone(),
        payload: params.payload.clone(),
    })
}

/// Loads a live record at `version` that the signers may change.
fn load_for_change<S: StateAccess + ?Sized>(
    cx: &TxContext,
    id: &ObjectId,
    version: u64,
    state: &S,
) -> Result<DataInfo, LedgerError> {
    let data = state.load_data(id)?.ok_or(LedgerError::DataNotFound { id: *id })?;
    if data.version == 0 {
        return Err(LedgerError::DataDeleted { id: *id });
    }
    if data.version != version {
        return Err(LedgerError::VersionMismatch {
            id: *id,
            expected: data.version,
            actual: version,
        });
    }
    data.policy.check(Subject::Data(*id), cx.tx_type(), &cx.signers)?;
    Ok(data)
}

fn updated_policy(cx: &TxContext, data: &DataInfo, info: &DataInfoUpdate) -> Result<SigningPolicy, LedgerError> {
    let next = data.policy.updated(&info.update);
    next.validate(true)
        .map_err(|e| LedgerError::malformed(cx.tx_type(), "data", e))?;
    Ok(next)
}

pub(super) fn verify_update_data_info<S: StateAccess + ?Sized>(
    cx: &TxContext,
    info: &DataInfoUpdate,
    state: &S,
) -> Result<BigUint, LedgerError> {
    let data = load_for_change(cx, &info.id, info.version, state)?;
    updated_policy(cx, &data, info)?;
    Ok(BigUint::default())
}

pub(super) fn accept_update_data_info<S: StateAccess + ?Sized>(
    cx: &TxContext,
    info: &DataInfoUpdate,
    state: &S,
) -> Result<(), LedgerError> {
    let mut data = load_for_change(cx, &info.id, info.version, state)?;
    data.policy = updated_policy(cx, &data, info)?;
    data.version += 1;
    state.save_data(data)
}

pub(super) fn verify_delete_data<S: StateAccess + ?Sized>(
    cx: &TxContext,
    data_ref: &DataRef,
    state: &S,
) -> Result<BigUint, LedgerError> {
    load_for_change(cx, &data_ref.id, data_ref.version, state)?;
    Ok(BigUint::default())
}

pub(super) fn accept_delete_data<S: StateAccess + ?Sized>(
    cx: &TxContext,
    data_ref: &DataRef,
    state: &S,
) -> Result<(), LedgerError> {
    let mut data = load_for_change(cx, &data_ref.id, data_ref.version, state)?;
    data.version = 0;
    state.save_data(data)
}
