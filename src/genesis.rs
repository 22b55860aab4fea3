use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::account::SigningPolicy;
use crate::chain::BlockContext;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::storage::MemoryState;
use crate::transaction::payload::{TokenParams, TxPayload};
use crate::transaction::{apply_genesis, Receipt, Transaction, TxType};
use crate::types::{decimal, Address, TokenSymbol, TREASURY};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenesisConfig {
    pub timestamp: u64,
    /// Sender of the native token creation
    pub issuer: Address,
    #[serde(default)]
    pub treasury_threshold: u16,
    #[serde(default)]
    pub treasury_keepers: Vec<Address>,
    #[serde(default)]
    pub allocations: Vec<GenesisAllocation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GenesisAllocation {
    pub address: Address,
    #[serde(with = "decimal")]
    pub amount: BigUint,
}

impl GenesisConfig {
    pub fn load(path: &str) -> Result<Self, LedgerError> {
        if !Path::new(path).exists() {
            return Err(LedgerError::Config(format!("Genesis file not found: {}", path)));
        }
        let content = fs::read_to_string(path).map_err(|e| LedgerError::Config(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| LedgerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.issuer.is_zero() {
            return Err(LedgerError::Config("issuer should not be the zero address".to_string()));
        }
        for alloc in &self.allocations {
            if alloc.address.is_zero() || alloc.amount.is_zero() {
                return Err(LedgerError::Config(format!(
                    "invalid allocation {} {}",
                    alloc.address, alloc.amount
                )));
            }
        }
        Ok(())
    }

    /// Native token creation into the treasury, then one transfer out of the
    /// treasury per allocation.
    pub fn transactions(&self, config: &LedgerConfig) -> Result<Vec<Transaction>, LedgerError> {
        self.validate()?;
        let chain_id = config.chain.chain_id;
        let threshold = config.fees.gas_threshold;

        let mut create = Transaction::new(TxType::CreateToken, chain_id, self.issuer);
        create.to = Some(TREASURY);
        create.data = TxPayload::CreateToken(TokenParams {
            symbol: TokenSymbol::native(),
            name: "NativeToken".to_string(),
            max_total_supply: config.chain.max_total_supply.clone(),
            policy: SigningPolicy::new(self.treasury_threshold, self.treasury_keepers.clone()),
        })
        .encode();

        let mut txs = vec![create.with_exact_gas(threshold)];
        for (nonce, alloc) in self.allocations.iter().enumerate() {
            let mut transfer = Transaction::new(TxType::Transfer, chain_id, TREASURY);
            transfer.nonce = nonce as u64;
            transfer.to = Some(alloc.address);
            transfer.amount = Some(alloc.amount.clone());
            txs.push(transfer.with_exact_gas(threshold));
        }
        Ok(txs)
    }

    /// Applies and commits the genesis state.
    pub fn apply(&self, config: &LedgerConfig, state: &MemoryState) -> Result<Vec<Receipt>, LedgerError> {
        let block = BlockContext::genesis(config.clone(), self.timestamp);
        let receipts = apply_genesis(self.transactions(config)?, &block, state)?;
        state.commit()?;
        info!(
            allocations = self.allocations.len(),
            chain_id = config.chain.chain_id,
            "genesis committed"
        );
        Ok(receipts)
    }
}

/// Writes a genesis file allocating `amount` to each of `addresses`.
pub fn write_genesis(path: &str, issuer: Address, addresses: &[Address], amount: &BigUint) -> Result<(), LedgerError> {
    let config = GenesisConfig {
        timestamp: 0,
        issuer,
        treasury_threshold: 0,
        treasury_keepers: vec![],
        allocations: addresses
            .iter()
            .map(|address| GenesisAllocation {
                address: *address,
                amount: amount.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&config).map_err(|e| LedgerError::Config(e.to_string()))?;
    fs::write(path, json).map_err(|e| LedgerError::Config(e.to_string()))?;
    info!("Created '{}'.", path);
    Ok(())
}
