//! Kind-specific `data` payloads
//!
//! Each transaction kind carries its arguments in the envelope's `data`
//! field, bincode encoded. [`TxPayload::decode`] turns the bytes into the
//! closed set of variants the pipeline matches on.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Transaction, TxType};
use crate::account::{LendingConfig, PolicyUpdate, SigningPolicy, StakeConfig};
use crate::error::LedgerError;
use crate::types::{Address, ObjectId, StakeSymbol, TokenSymbol};

pub const MAX_PAYMENTS: usize = 1024;
pub const MAX_MEMO_LEN: usize = 1024;
/// Exchange prices are quoted per 1e9 units of the sold token.
pub const PRICE_UNIT: u64 = 1_000_000_000;

/// A signed, single-use transfer authorization. For `TransferPay` the payee
/// (`to`) signs an invoice bound to the payer's next sequential nonce; for
/// `TransferCash` the payer (`from`) signs a cheque redeemed through its
/// nonce table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TransferAuth {
    pub nonce: u64,
    pub expire: u64,
    pub from: Option<Address>,
    pub to: Address,
    pub token: TokenSymbol,
    pub amount: BigUint,
    pub memo: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Payment {
    pub to: Address,
    pub amount: BigUint,
}

/// A seller's standing offer: `sell` tokens for `receive` tokens at `price`
/// receive-units per 1e9 sell-units.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExchangeOffer {
    pub nonce: u64,
    pub expire: u64,
    pub sell: TokenSymbol,
    pub receive: TokenSymbol,
    pub quota: BigUint,
    pub minimum: BigUint,
    pub price: BigUint,
    pub payee: Address,
}

impl ExchangeOffer {
    /// Units of `sell` bought with `amount` units of `receive`.
    pub fn quantity(&self, amount: &BigUint) -> BigUint {
        amount * PRICE_UNIT / &self.price
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NonceBatch {
    pub expire: u64,
    pub nonces: Vec<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TokenParams {
    pub symbol: TokenSymbol,
    pub name: String,
    pub max_total_supply: BigUint,
    pub policy: SigningPolicy,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StakeParams {
    pub symbol: StakeSymbol,
    pub policy: SigningPolicy,
    pub config: StakeConfig,
}

/// Lender's countersigned loan terms, redeemed through its nonce table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LoanAuth {
    pub nonce: u64,
    pub expire: u64,
    pub borrower: Address,
    pub token: TokenSymbol,
    pub amount: BigUint,
    /// Zero means no due date
    pub due_time: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelParams {
    pub name: String,
    pub policy: SigningPolicy,
    pub schema: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DataParams {
    pub model: ObjectId,
    pub policy: SigningPolicy,
    pub payload: Vec<u8>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DataInfoUpdate {
    pub id: ObjectId,
    pub version: u64,
    pub update: PolicyUpdate,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DataRef {
    pub id: ObjectId,
    pub version: u64,
}

/// Decoded `data` of a transaction, one variant per kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxPayload {
    Transfer { memo: Vec<u8> },
    TransferPay(TransferAuth),
    TransferCash(TransferAuth),
    TransferMultiple(Vec<Payment>),
    Exchange(ExchangeOffer),
    UpdateAccountInfo(PolicyUpdate),
    AddNonceTable(NonceBatch),
    CreateToken(TokenParams),
    DestroyToken,
    CreateStake(StakeParams),
    ResetStake(StakeConfig),
    DestroyStake,
    TakeStake { lock_time: u64 },
    WithdrawStake { amount: BigUint },
    UpdateStakeApprover { approver: Option<Address> },
    OpenLending(LendingConfig),
    CloseLending,
    Borrow(LoanAuth),
    Repay,
    CreateModel(ModelParams),
    CreateData(DataParams),
    UpdateDataInfo(DataInfoUpdate),
    DeleteData(DataRef),
}

fn decode<T: DeserializeOwned>(tx_type: TxType, data: &[u8]) -> Result<T, LedgerError> {
    if data.is_empty() {
        return Err(LedgerError::malformed(tx_type, "data", "should not be empty"));
    }
    bincode::deserialize(data).map_err(|e| LedgerError::malformed(tx_type, "data", e.to_string()))
}

fn expect_empty(tx_type: TxType, data: &[u8]) -> Result<(), LedgerError> {
    if !data.is_empty() {
        return Err(LedgerError::malformed(tx_type, "data", "should be empty"));
    }
    Ok(())
}

pub fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    // Vec-backed bincode serialization of these types cannot fail.
    bincode::serialize(value).unwrap_or_default()
}

impl TxPayload {
    pub fn decode(tx_type: TxType, data: &[u8]) -> Result<Self, LedgerError> {
        let payload = match tx_type {
            TxType::Transfer => {
                if data.len() > MAX_MEMO_LEN {
                    return Err(LedgerError::malformed(
                        tx_type,
                        "data",
                        format!("memo too long, expected <= {}", MAX_MEMO_LEN),
                    ));
                }
                TxPayload::Transfer { memo: data.to_vec() }
            }
            TxType::TransferPay => TxPayload::TransferPay(decode(tx_type, data)?),
            TxType::TransferCash => TxPayload::TransferCash(decode(tx_type, data)?),
            TxType::TransferMultiple => TxPayload::TransferMultiple(decode(tx_type, data)?),
            TxType::Exchange => TxPayload::Exchange(decode(tx_type, data)?),
            TxType::UpdateAccountInfo => TxPayload::UpdateAccountInfo(decode(tx_type, data)?),
            TxType::AddNonceTable => TxPayload::AddNonceTable(decode(tx_type, data)?),
            TxType::CreateToken => TxPayload::CreateToken(decode(tx_type, data)?),
            TxType::DestroyToken => {
                expect_empty(tx_type, data)?;
                TxPayload::DestroyToken
            }
            TxType::CreateStake => TxPayload::CreateStake(decode(tx_type, data)?),
            TxType::ResetStake => TxPayload::ResetStake(decode(tx_type, data)?),
            TxType::DestroyStake => {
                expect_empty(tx_type, data)?;
                TxPayload::DestroyStake
            }
            TxType::TakeStake => TxPayload::TakeStake {
                lock_time: if data.is_empty() { 0 } else { decode(tx_type, data)? },
            },
            TxType::WithdrawStake => TxPayload::WithdrawStake {
                amount: decode(tx_type, data)?,
            },
            TxType::UpdateStakeApprover => TxPayload::UpdateStakeApprover {
                approver: decode(tx_type, data)?,
            },
            TxType::OpenLending => TxPayload::OpenLending(decode(tx_type, data)?),
            TxType::CloseLending => {
                expect_empty(tx_type, data)?;
                TxPayload::CloseLending
            }
            TxType::Borrow => TxPayload::Borrow(decode(tx_type, data)?),
            TxType::Repay => {
                expect_empty(tx_type, data)?;
                TxPayload::Repay
            }
            TxType::CreateModel => TxPayload::CreateModel(decode(tx_type, data)?),
            TxType::CreateData => TxPayload::CreateData(decode(tx_type, data)?),
            TxType::UpdateDataInfo => TxPayload::UpdateDataInfo(decode(tx_type, data)?),
            TxType::DeleteData => TxPayload::DeleteData(decode(tx_type, data)?),
        };
        Ok(payload)
    }

    /// Bytes for the envelope's `data` field.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            TxPayload::Transfer { memo } => memo.clone(),
            TxPayload::TransferPay(auth) | TxPayload::TransferCash(auth) => encode(auth),
            TxPayload::TransferMultiple(payments) => encode(payments),
            TxPayload::Exchange(offer) => encode(offer),
            TxPayload::UpdateAccountInfo(update) => encode(update),
            TxPayload::AddNonceTable(batch) => encode(batch),
            TxPayload::CreateToken(params) => encode(params),
            TxPayload::CreateStake(params) => encode(params),
            TxPayload::ResetStake(config) => encode(config),
            TxPayload::TakeStake { lock_time } => {
                if *lock_time == 0 {
                    Vec::new()
                } else {
                    encode(lock_time)
                }
            }
            TxPayload::WithdrawStake { amount } => encode(amount),
            TxPayload::UpdateStakeApprover { approver } => encode(approver),
            TxPayload::OpenLending(config) => encode(config),
            TxPayload::Borrow(auth) => encode(auth),
            TxPayload::CreateModel(params) => encode(params),
            TxPayload::CreateData(params) => encode(params),
            TxPayload::UpdateDataInfo(update) => encode(update),
            TxPayload::DeleteData(data_ref) => encode(data_ref),
            TxPayload::DestroyToken | TxPayload::DestroyStake | TxPayload::CloseLending | TxPayload::Repay => {
                Vec::new()
            }
        }
    }
}

/// Presence of an envelope field for a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Required,
    Optional,
    Absent,
}

/// `(to, token, amount)` presence per kind.
pub fn shape(tx_type: TxType) -> (Field, Field, Field) {
    use Field::*;
    match tx_type {
        TxType::Transfer
        | TxType::TransferPay
        | TxType::TransferCash
        | TxType::Exchange
        | TxType::TakeStake
        | TxType::Borrow
        | TxType::Repay => (Required, Optional, Required),
        TxType::TransferMultiple => (Absent, Optional, Required),
        TxType::CreateToken | TxType::CreateStake => (Required, Absent, Required),
        TxType::DestroyToken | TxType::DestroyStake | TxType::UpdateStakeApprover => (Required, Absent, Absent),
        TxType::WithdrawStake => (Required, Optional, Absent),
        TxType::UpdateAccountInfo
        | TxType::AddNonceTable
        | TxType::ResetStake
        | TxType::OpenLending
        | TxType::CloseLending
        | TxType::CreateModel
        | TxType::CreateData
        | TxType::UpdateDataInfo
        | TxType::DeleteData => (Absent, Absent, Absent),
    }
}

fn check_field<T>(tx_type: TxType, name: &'static str, value: &Option<T>, field: Field) -> Result<(), LedgerError> {
    match (field, value) {
        (Field::Required, None) => Err(LedgerError::malformed(tx_type, name, "should not be nil")),
        (Field::Absent, Some(_)) => Err(LedgerError::malformed(tx_type, name, "should be nil")),
        _ => Ok(()),
    }
}

/// Envelope shape rules for `tx.tx_type`. Genesis accounts are created
/// without a pledge.
pub fn check_shape(tx: &Transaction, genesis: bool) -> Result<(), LedgerError> {
    let (to, token, mut amount) = shape(tx.tx_type);
    if genesis && matches!(tx.tx_type, TxType::CreateToken | TxType::CreateStake) {
        amount = Field::Optional;
    }
    check_field(tx.tx_type, "to", &tx.to, to)?;
    check_field(tx.tx_type, "token", &tx.token, token)?;
    check_field(tx.tx_type, "amount", &tx.amount, amount)?;
    if matches!(&tx.token, Some(t) if t.is_native()) {
        return Err(LedgerError::malformed(tx.tx_type, "token", "native token should be nil"));
    }
    if matches!(&tx.amount, Some(a) if a.is_zero()) {
        return Err(LedgerError::malformed(tx.tx_type, "amount", "should be > 0"));
    }
    if tx.to == Some(tx.from) {
        return Err(LedgerError::malformed(tx.tx_type, "to", "should not be the sender"));
    }
    Ok(())
}

fn check_policy(tx_type: TxType, field: &'static str, policy: &SigningPolicy) -> Result<(), LedgerError> {
    policy
        .validate(true)
        .map_err(|e| LedgerError::malformed(tx_type, field, e))
}

fn check_update(tx_type: TxType, update: &PolicyUpdate) -> Result<(), LedgerError> {
    if update.is_empty() {
        return Err(LedgerError::malformed(tx_type, "data", "nothing to update"));
    }
    if let Some(keepers) = &update.keepers {
        SigningPolicy::new(0, keepers.clone())
            .validate(false)
            .map_err(|e| LedgerError::malformed(tx_type, "keepers", e))?;
    }
    Ok(())
}

/// Stateless rules tying a payload to its envelope. `genesis` admits the
/// native token in `CreateToken` and an absent pledge.
pub fn check_payload(tx: &Transaction, payload: &TxPayload, genesis: bool) -> Result<(), LedgerError> {
    let ty = tx.tx_type;
    let token = tx.token_or_native();
    let amount = tx.amount_or_zero();
    match payload {
        TxPayload::Transfer { .. } | TxPayload::DestroyToken | TxPayload::DestroyStake => Ok(()),
        TxPayload::CloseLending | TxPayload::Repay => Ok(()),
        TxPayload::TransferPay(auth) | TxPayload::TransferCash(auth) => {
            if auth.token != token || auth.amount != amount {
                return Err(LedgerError::malformed(ty, "data", "token or amount mismatch"));
            }
            if ty == TxType::TransferPay {
                if Some(auth.to) != tx.to || auth.from.is_some_and(|f| f != tx.from) {
                    return Err(LedgerError::malformed(ty, "data", "invoice parties mismatch"));
                }
                if auth.nonce != tx.nonce {
                    return Err(LedgerError::malformed(ty, "data", "invoice nonce mismatch"));
                }
            } else if auth.from != tx.to || auth.to != tx.from {
                return Err(LedgerError::malformed(ty, "data", "cheque parties mismatch"));
            }
            Ok(())
        }
        TxPayload::TransferMultiple(payments) => {
            if payments.is_empty() || payments.len() > MAX_PAYMENTS {
                return Err(LedgerError::malformed(
                    ty,
                    "data",
                    format!("payments should be in [1, {}]", MAX_PAYMENTS),
                ));
            }
            let mut total = BigUint::zero();
            for payment in payments {
                if payment.amount.is_zero() {
                    return Err(LedgerError::malformed(ty, "data", "payment amount should be > 0"));
                }
                if payment.to == tx.from {
                    return Err(LedgerError::malformed(ty, "data", "payment to the sender"));
                }
                total += &payment.amount;
            }
            if total != amount {
                return Err(LedgerError::malformed(
                    ty,
                    "amount",
                    format!("expected {}, got {}", total, amount),
                ));
            }
            Ok(())
        }
        TxPayload::Exchange(offer) => {
            if offer.sell == offer.receive {
                return Err(LedgerError::malformed(ty, "data", "sell and receive should differ"));
            }
            if offer.receive != token {
                return Err(LedgerError::malformed(ty, "token", format!("expected {}", offer.receive)));
            }
            if offer.payee == tx.from {
                return Err(LedgerError::malformed(ty, "data", "payee should not be the sender"));
            }
            if offer.price.is_zero() || offer.quota.is_zero() || offer.minimum > offer.quota {
                return Err(LedgerError::malformed(ty, "data", "invalid price or quota"));
            }
            Ok(())
        }
        TxPayload::UpdateAccountInfo(update) => check_update(ty, update),
        TxPayload::AddNonceTable(batch) => {
            if batch.nonces.is_empty() {
                return Err(LedgerError::malformed(ty, "data", "nonces should not be empty"));
            }
            Ok(())
        }
        TxPayload::CreateToken(params) => {
            if params.symbol.is_native() && !genesis {
                return Err(LedgerError::malformed(ty, "data", "native token is created at genesis"));
            }
            if tx.to != Some(params.symbol.address()) {
                return Err(LedgerError::malformed(
                    ty,
                    "to",
                    format!("expected {}", params.symbol.address()),
                ));
            }
            if params.max_total_supply.is_zero() {
                return Err(LedgerError::malformed(ty, "data", "maxTotalSupply should be > 0"));
            }
            if params.symbol.is_native() {
                params.policy.validate(false).map_err(|e| LedgerError::malformed(ty, "data", e))
            } else {
                check_policy(ty, "data", &params.policy)
            }
        }
        TxPayload::CreateStake(params) => {
            if tx.to != Some(params.symbol.address()) {
                return Err(LedgerError::malformed(
                    ty,
                    "to",
                    format!("expected {}", params.symbol.address()),
                ));
            }
            check_policy(ty, "data", &params.policy)?;
            params.config.validate().map_err(|e| LedgerError::malformed(ty, "data", e))
        }
        TxPayload::ResetStake(config) => config.validate().map_err(|e| LedgerError::malformed(ty, "data", e)),
        TxPayload::TakeStake { .. } => Ok(()),
        TxPayload::WithdrawStake { amount } => {
            if amount.is_zero() {
                return Err(LedgerError::malformed(ty, "data", "amount should be > 0"));
            }
            Ok(())
        }
        TxPayload::UpdateStakeApprover { approver } => {
            if matches!(approver, Some(a) if a.is_zero()) {
                return Err(LedgerError::malformed(ty, "data", "zero address approver"));
            }
            Ok(())
        }
        TxPayload::OpenLending(config) => config.validate().map_err(|e| LedgerError::malformed(ty, "data", e)),
        TxPayload::Borrow(auth) => {
            if auth.borrower != tx.from || auth.token != token || auth.amount != amount {
                return Err(LedgerError::malformed(ty, "data", "loan terms mismatch"));
            }
            Ok(())
        }
        TxPayload::CreateModel(params) => {
            if params.name.is_empty() {
                return Err(LedgerError::malformed(ty, "data", "model name should not be empty"));
            }
            check_policy(ty, "data", &params.policy)
        }
        TxPayload::CreateData(params) => check_policy(ty, "data", &params.policy),
        TxPayload::UpdateDataInfo(info) => check_update(ty, &info.update),
        TxPayload::DeleteData(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address([b; 20])
    }

    #[test]
    fn test_decode_by_kind() {
        let batch = NonceBatch {
            expire: 10,
            nonces: vec![1, 2],
        };
        let bytes = encode(&batch);
        assert_eq!(
            TxPayload::decode(TxType::AddNonceTable, &bytes).unwrap(),
            TxPayload::AddNonceTable(batch)
        );
        assert!(matches!(
            TxPayload::decode(TxType::CreateToken, &bytes),
            Err(LedgerError::Malformed { .. })
        ));
        assert!(TxPayload::decode(TxType::Repay, &[1]).is_err());
        assert_eq!(
            TxPayload::decode(TxType::TakeStake, &[]).unwrap(),
            TxPayload::TakeStake { lock_time: 0 }
        );
        let err = TxPayload::decode(TxType::OpenLending, &[]).unwrap_err();
        assert_eq!(err.to_string(), "TypeOpenLending: invalid data, should not be empty");
    }

    #[test]
    fn test_shape_rules() {
        let mut tx = Transaction::new(TxType::Transfer, 1, addr(1));
        assert_eq!(
            check_shape(&tx, false).unwrap_err().to_string(),
            "TypeTransfer: invalid to, should not be nil"
        );
        tx.to = Some(addr(1));
        tx.amount = Some(BigUint::from(1u8));
        assert!(check_shape(&tx, false).is_err());
        tx.to = Some(addr(2));
        assert!(check_shape(&tx, false).is_ok());
        tx.token = Some(TokenSymbol::native());
        assert!(check_shape(&tx, false).is_err());
        tx.token = None;
        tx.amount = Some(BigUint::zero());
        assert!(check_shape(&tx, false).is_err());

        let mut tx = Transaction::new(TxType::OpenLending, 1, addr(1));
        tx.to = Some(addr(2));
        assert!(check_shape(&tx, false).is_err());
    }

    #[test]
    fn test_transfer_multiple_sum() {
        let mut tx = Transaction::new(TxType::TransferMultiple, 1, addr(1));
        tx.amount = Some(BigUint::from(30u8));
        let payments = vec![
            Payment {
                to: addr(2),
                amount: BigUint::from(10u8),
            },
            Payment {
                to: addr(3),
                amount: BigUint::from(20u8),
            },
        ];
        assert!(check_payload(&tx, &TxPayload::TransferMultiple(payments.clone()), false).is_ok());
        tx.amount = Some(BigUint::from(31u8));
        assert!(check_payload(&tx, &TxPayload::TransferMultiple(payments), false).is_err());
    }

    #[test]
    fn test_exchange_quantity() {
        let offer = ExchangeOffer {
            nonce: 1,
            expire: 100,
            sell: TokenSymbol::new("USD").unwrap(),
            receive: TokenSymbol::native(),
            quota: BigUint::from(1_000u32),
            minimum: BigUint::from(1u8),
            price: BigUint::from(2 * PRICE_UNIT),
            payee: addr(3),
        };
        assert_eq!(offer.quantity(&BigUint::from(100u8)), BigUint::from(50u8));
    }
}
