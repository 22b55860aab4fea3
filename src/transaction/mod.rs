//! Transaction envelope and the three-phase state transition
//!
//! A submitted [`Transaction`] moves through
//! [`pipeline::syntactic_verify`] → [`pipeline::verify`] → [`pipeline::accept`].
//! The first two phases may reject; `accept` cannot fail.

mod account_ops;
mod data_ops;
mod lending_ops;
pub mod payload;
pub mod pipeline;
mod stake_ops;
mod transfer;
pub mod tx_type;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

use crate::crypto::{self, KeyPair, Signature, Signers};
use crate::encoding::CanonicalSerialize;
use crate::error::LedgerError;
use crate::types::{Address, TokenSymbol};

pub use payload::TxPayload;
pub use pipeline::{accept, apply_genesis, apply_transaction, syntactic_verify, verify, Receipt};
pub use tx_type::{TxType, TxTypes};

pub const MAX_SIGNATURES: usize = 64;

/// Gas charged for a payload of `size` bytes: one per byte up to
/// `threshold`, two per byte beyond it.
pub fn required_gas(size: u64, threshold: u64) -> u64 {
    if size <= threshold {
        size
    } else {
        threshold + 2 * (size - threshold)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub chain_id: u32,
    pub nonce: u64,
    pub gas_tip: u64,
    pub gas_fee_cap: u64,
    pub gas: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub token: Option<TokenSymbol>,
    #[serde(default)]
    pub amount: Option<BigUint>,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub signatures: Vec<Signature>,
    #[serde(default)]
    pub ex_signatures: Vec<Signature>,
}

impl CanonicalSerialize for Transaction {
    /// Every field but the two signature lists.
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.tx_type.code().canonical_serialize(writer)?;
        self.chain_id.canonical_serialize(writer)?;
        self.nonce.canonical_serialize(writer)?;
        self.gas_tip.canonical_serialize(writer)?;
        self.gas_fee_cap.canonical_serialize(writer)?;
        self.gas.canonical_serialize(writer)?;
        self.from.canonical_serialize(writer)?;
        self.to.canonical_serialize(writer)?;
        self.token.canonical_serialize(writer)?;
        self.amount.canonical_serialize(writer)?;
        self.data.canonical_serialize(writer)
    }
}

impl Transaction {
    pub fn new(tx_type: TxType, chain_id: u32, from: Address) -> Self {
        Self {
            tx_type,
            chain_id,
            nonce: 0,
            gas_tip: 0,
            gas_fee_cap: 0,
            gas: 0,
            from,
            to: None,
            token: None,
            amount: None,
            data: Vec::new(),
            signatures: Vec::new(),
            ex_signatures: Vec::new(),
        }
    }

    pub fn unsigned_bytes(&self) -> Vec<u8> {
        self.to_bytes()
    }

    /// `sha256` of the unsigned bytes; what `signatures` sign.
    pub fn id(&self) -> [u8; 32] {
        crypto::sha256(&self.unsigned_bytes())
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id())
    }

    pub fn payload_size(&self) -> u64 {
        self.unsigned_bytes().len() as u64
    }

    /// Sets `gas` to what the current payload requires.
    pub fn with_exact_gas(mut self, threshold: u64) -> Self {
        self.gas = required_gas(self.payload_size(), threshold);
        self
    }

    pub fn token_or_native(&self) -> TokenSymbol {
        self.token.clone().unwrap_or_default()
    }

    pub fn amount_or_zero(&self) -> BigUint {
        self.amount.clone().unwrap_or_default()
    }

    /// Total fee charged to the sender.
    pub fn fee(&self) -> BigUint {
        BigUint::from(self.gas) * self.gas_fee_cap
    }

    pub fn miner_fee(&self) -> BigUint {
        BigUint::from(self.gas) * self.gas_tip
    }

    pub fn sign(&mut self, keys: &[&KeyPair]) {
        let id = self.id();
        self.signatures.extend(keys.iter().map(|k| k.sign(&id)));
    }

    /// Countersigns the embedded authorization in `data`.
    pub fn ex_sign(&mut self, keys: &[&KeyPair]) {
        let digest = crypto::sha256(&self.data);
        self.ex_signatures.extend(keys.iter().map(|k| k.sign(&digest)));
    }

    pub fn signers(&self) -> Result<Signers, LedgerError> {
        crypto::recover_all(&self.id(), &self.signatures)
            .map_err(|e| LedgerError::malformed(self.tx_type, "signatures", e))
    }

    pub fn ex_signers(&self) -> Result<Signers, LedgerError> {
        crypto::recover_all(&crypto::sha256(&self.data), &self.ex_signatures)
            .map_err(|e| LedgerError::malformed(self.tx_type, "exSignatures", e))
    }
}
