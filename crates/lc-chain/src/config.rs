use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Genesis and mining constants. Mirrors the teacher's practice of a plain
/// `Default`-implementing config struct rather than a bespoke file format.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub difficulty: u32,
    pub mining_reward: Decimal,
    pub genesis_initial_supply: Decimal,
    pub miner_address: String,
    pub genesis_address: String,
    pub mining_interval_seconds: u64,
    pub pending_poll_seconds: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 2,
            mining_reward: dec!(100),
            genesis_initial_supply: dec!(1_000_000),
            miner_address: String::new(),
            genesis_address: String::new(),
            mining_interval_seconds: 30,
            pending_poll_seconds: 10,
        }
    }
}
