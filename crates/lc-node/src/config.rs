use clap::Parser;
use rust_decimal::Decimal;

/// ledger-core node daemon configuration. Every flag has an environment
/// fallback, matching the teacher's `sp-node` convention of `env = "..."`
/// on every `clap::Parser` field.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "lc-node",
    version,
    about = "ledger-core P2P node",
    long_about = "Runs a ledger-core P2P node: chain state machine, mempool, \
                  miner, and WebSocket peer protocol."
)]
pub struct NodeConfig {
    /// TCP port this node listens on for peer WebSocket connections.
    #[arg(short, long, default_value_t = 6001, env = "LC_PORT")]
    pub port: u16,

    /// Path to the sqlite database file (or `sqlite::memory:` for an
    /// ephemeral store).
    #[arg(long, default_value = "ledger.db", env = "LC_DATASTORE")]
    pub datastore: String,

    /// Comma-separated list of `ws://host:port` peer addresses to connect
    /// to on startup.
    #[arg(long, default_value = "", env = "LC_PEERS")]
    pub peers: String,

    /// Number of leading hex zeroes required in a block hash.
    #[arg(long, default_value_t = 2, env = "LC_DIFFICULTY")]
    pub difficulty: u32,

    /// Reward credited to the miner address for each mined block.
    #[arg(long, default_value = "100", env = "LC_MINING_REWARD")]
    pub mining_reward: Decimal,

    /// Initial supply minted to the genesis address when this node is the
    /// very first in the network.
    #[arg(long, default_value = "1000000", env = "LC_GENESIS_SUPPLY")]
    pub genesis_initial_supply: Decimal,

    /// Address credited with the genesis supply.
    #[arg(long, env = "LC_GENESIS_ADDRESS")]
    pub genesis_address: String,

    /// Address credited with mining rewards from this node.
    #[arg(long, env = "LC_MINER_ADDRESS")]
    pub miner_address: String,

    /// Seconds between interval-driven mining attempts.
    #[arg(long, default_value_t = 30, env = "LC_MINING_INTERVAL")]
    pub mining_interval_seconds: u64,

    /// Seconds between pending-count-driven mining attempts.
    #[arg(long, default_value_t = 10, env = "LC_PENDING_POLL")]
    pub pending_poll_seconds: u64,

    /// Seconds between peer heartbeat pings.
    #[arg(long, default_value_t = 30, env = "LC_HEARTBEAT")]
    pub heartbeat_seconds: u64,

    /// Suppress log output to stderr.
    #[arg(short, long, default_value_t = false, env = "LC_QUIET")]
    pub quiet: bool,
}

impl NodeConfig {
    pub fn peer_list(&self) -> Vec<String> {
        self.peers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
