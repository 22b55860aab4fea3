use crate::config::LedgerConfig;
use crate::types::StakeSymbol;

/// Block-level inputs shared by every transaction applied in one block.
#[derive(Debug, Clone)]
pub struct BlockContext {
    pub height: u64,
    /// Seconds since the unix epoch
    pub timestamp: u64,
    pub gas_price: u64,
    /// Stake account credited with the tips
    pub miner: Option<StakeSymbol>,
    pub config: LedgerConfig,
}

impl BlockContext {
    pub fn new(config: LedgerConfig, height: u64, timestamp: u64) -> Self {
        Self {
            height,
            timestamp,
            gas_price: config.fees.min_gas_price,
            miner: None,
            config,
        }
    }

    /// Context for the genesis block: height zero and free gas.
    pub fn genesis(config: LedgerConfig, timestamp: u64) -> Self {
        Self {
            height: 0,
            timestamp,
            gas_price: 0,
            miner: None,
            config,
        }
    }

    pub fn with_miner(mut self, miner: StakeSymbol) -> Self {
        self.miner = Some(miner);
        self
    }

    pub fn with_gas_price(mut self, gas_price: u64) -> Self {
        self.gas_price = gas_price;
        self
    }

    pub fn chain_id(&self) -> u32 {
        self.config.chain.chain_id
    }
}
