//! Shared fixtures for the in-crate tests

use num_bigint::BigUint;

use crate::chain::BlockContext;
use crate::config::LedgerConfig;
use crate::crypto::KeyPair;
use crate::storage::{MemoryState, StateAccess};
use crate::transaction::{Transaction, TxType};
use crate::types::{Address, TokenSymbol};

pub const NOW: u64 = 1_700_000_000;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn key(seed: u8) -> KeyPair {
    KeyPair::from_seed(&[seed; 32])
}

pub fn block() -> BlockContext {
    BlockContext::new(LedgerConfig::default(), 1, NOW)
}

/// A fresh state where each of `keys` holds `native` units.
pub fn funded_state(keys: &[&KeyPair], native: u64) -> MemoryState {
    let state = MemoryState::new();
    for key in keys {
        credit(&state, key.address(), &TokenSymbol::native(), native);
    }
    state
}

pub fn credit(state: &MemoryState, id: Address, token: &TokenSymbol, amount: u64) {
    if let Ok(account) = state.load_account(id) {
        account.write().add(token, &BigUint::from(amount));
    }
}

pub fn balance(state: &MemoryState, id: Address, token: &TokenSymbol) -> BigUint {
    state
        .load_account(id)
        .map(|account| account.read().balance_of(token))
        .unwrap_or_default()
}

pub fn nonce(state: &MemoryState, id: Address) -> u64 {
    state.load_account(id).map(|account| account.read().nonce).unwrap_or_default()
}

/// Builds a transaction from `sender` priced at the block's gas price.
pub struct TxBuilder {
    tx: Transaction,
}

impl TxBuilder {
    pub fn new(tx_type: TxType, sender: &KeyPair, block: &BlockContext) -> Self {
        let mut tx = Transaction::new(tx_type, block.chain_id(), sender.address());
        tx.gas_fee_cap = block.gas_price;
        Self { tx }
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.tx.nonce = nonce;
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.tx.to = Some(to);
        self
    }

    pub fn token(mut self, token: &str) -> Self {
        self.tx.token = TokenSymbol::new(token).ok();
        self
    }

    pub fn amount(mut self, amount: u64) -> Self {
        self.tx.amount = Some(BigUint::from(amount));
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.tx.data = data;
        self
    }

    pub fn gas_price(mut self, fee_cap: u64, tip: u64) -> Self {
        self.tx.gas_fee_cap = fee_cap;
        self.tx.gas_tip = tip;
        self
    }

    /// Exact gas, then signatures from `keys` and countersignatures from
    /// `ex_keys`.
    pub fn sign(self, keys: &[&KeyPair], ex_keys: &[&KeyPair], block: &BlockContext) -> Transaction {
        let mut tx = self.tx.with_exact_gas(block.config.fees.gas_threshold);
        tx.sign(keys);
        if !ex_keys.is_empty() {
            tx.ex_sign(ex_keys);
        }
        tx
    }
}
