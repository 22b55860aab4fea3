use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::LedgerError;
use crate::types::decimal;

/// Native units per whole coin.
pub const NANO: u64 = 1_000_000_000;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub chain: ChainConfig,
    pub fees: FeeSchedule,
    #[serde(default)]
    pub nonce_table: NonceTableConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u32,
    /// Native supply minted at genesis
    #[serde(with = "decimal")]
    pub max_total_supply: BigUint,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct FeeSchedule {
    pub min_gas_price: u64,
    /// Payload bytes charged at one gas each; the excess is charged double
    pub gas_threshold: u64,
    #[serde(with = "decimal")]
    pub min_token_pledge: BigUint,
    #[serde(with = "decimal")]
    pub min_stake_pledge: BigUint,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct NonceTableConfig {
    /// Furthest expiry accepted, relative to the block timestamp
    #[serde(default = "default_max_expire_secs")]
    pub max_expire_secs: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_max_expire_secs() -> u64 {
    30 * 24 * 3600
}

fn default_max_batch() -> usize {
    crate::account::nonce::MAX_NONCES_PER_BATCH
}

impl Default for NonceTableConfig {
    fn default() -> Self {
        Self {
            max_expire_secs: default_max_expire_secs(),
            max_batch: default_max_batch(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig {
                chain_id: 2357,
                max_total_supply: BigUint::from(1_000_000_000u64) * NANO,
            },
            fees: FeeSchedule {
                min_gas_price: 10_000,
                gas_threshold: 1_000,
                min_token_pledge: BigUint::from(10_000u64) * NANO,
                min_stake_pledge: BigUint::from(1_000u64) * NANO,
            },
            nonce_table: NonceTableConfig::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml(s: &str) -> Result<Self, LedgerError> {
        let config: LedgerConfig = toml::from_str(s).map_err(|e| LedgerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.chain.max_total_supply == BigUint::default() {
            return Err(LedgerError::Config("max_total_supply should be > 0".to_string()));
        }
        if self.fees.gas_threshold == 0 {
            return Err(LedgerError::Config("gas_threshold should be > 0".to_string()));
        }
        if self.nonce_table.max_batch == 0 {
            return Err(LedgerError::Config("nonce_table.max_batch should be > 0".to_string()));
        }
        Ok(())
    }

    pub fn load_or_default(path: &str) -> Self {
        if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(s) => match Self::from_toml(&s) {
                    Ok(c) => {
                        info!("Config loaded from {}", path);
                        c
                    }
                    Err(e) => {
                        warn!("Error parsing config: {}. Using defaults.", e);
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("Error reading config: {}. Using defaults.", e);
                    Self::default()
                }
            }
        } else {
            info!("Config file not found at '{}'. Creating default.", path);
            let config = Self::default();
            if let Ok(s) = toml::to_string_pretty(&config) {
                if let Err(e) = std::fs::write(path, s) {
                    warn!("Could not write default config to {}: {}", path, e);
                }
            }
            config
        }
    }
}
