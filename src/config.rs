use clap::Parser;
use thiserror::Error;

use std::time::Duration;

use crate::blockchain::block::DEFAULT_GENESIS_TIMESTAMP;
use crate::blockchain::pow::{DEFAULT_DIFFICULTY, MAX_DIFFICULTY};
use crate::blockchain::{ChainSettings, Difficulty, LedgerPolicy};
use crate::network::PeerAddr;

/// Proof-of-work ledger node configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "powledger")]
#[command(about = "Proof-of-work ledger node with block gossip")]
#[command(version)]
pub struct NodeConfig {
    /// Address to listen on for peer connections
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on for peer connections
    #[arg(long, default_value_t = 5000)]
    pub port: u16,

    /// Peer to gossip mined blocks to, as host:port (repeatable)
    #[arg(long = "peer")]
    pub peers: Vec<PeerAddr>,

    /// Number of leading zero hex digits required in a block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: usize,

    /// Whether blocks received from peers update balances
    #[arg(long, value_enum, default_value_t = LedgerPolicy::Replay)]
    pub ledger_policy: LedgerPolicy,

    /// Timestamp of the genesis block; nodes must agree on it to share blocks
    #[arg(long, default_value_t = DEFAULT_GENESIS_TIMESTAMP)]
    pub genesis_timestamp: i64,

    /// Timeout for connecting to a peer, in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub connect_timeout_ms: u64,

    /// Time a peer has to deliver its message before the connection is dropped, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub read_timeout_ms: u64,

    /// Run the scripted wallet and transfer scenario after startup
    #[arg(long)]
    pub demo: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl NodeConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::DifficultyTooHigh(self.difficulty));
        }

        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidConnectTimeout);
        }

        if self.read_timeout_ms == 0 {
            return Err(ConfigError::InvalidReadTimeout);
        }

        Ok(())
    }

    pub fn chain_settings(&self) -> ChainSettings {
        ChainSettings {
            difficulty: Difficulty::new(self.difficulty),
            ledger_policy: self.ledger_policy,
            genesis_timestamp: self.genesis_timestamp,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("difficulty {0} exceeds the {} hex digits of a hash", MAX_DIFFICULTY)]
    DifficultyTooHigh(usize),

    #[error("connect timeout must be greater than 0")]
    InvalidConnectTimeout,

    #[error("read timeout must be greater than 0")]
    InvalidReadTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::parse_from(["powledger"]);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 5000);
        assert!(config.peers.is_empty());
        assert_eq!(config.difficulty, 4);
        assert_eq!(config.ledger_policy, LedgerPolicy::Replay);
        assert!(!config.demo);
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_settings(), ChainSettings::default());
    }

    #[test]
    fn test_peers_and_policy() {
        let config = NodeConfig::parse_from([
            "powledger",
            "--peer",
            "localhost:5001",
            "--peer",
            "10.0.0.2:5002",
            "--ledger-policy",
            "local-only",
            "--difficulty",
            "2",
        ]);

        assert_eq!(
            config.peers,
            vec![PeerAddr::new("localhost", 5001), PeerAddr::new("10.0.0.2", 5002)]
        );
        assert_eq!(config.ledger_policy, LedgerPolicy::LocalOnly);
        assert_eq!(config.chain_settings().difficulty, Difficulty::new(2));
    }

    #[test]
    fn test_bare_port_peer_is_rejected() {
        let result = NodeConfig::try_parse_from(["powledger", "--peer", "5001"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_difficulty() {
        let mut config = NodeConfig::parse_from(["powledger"]);
        config.difficulty = MAX_DIFFICULTY + 1;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::DifficultyTooHigh(65))
        ));
    }

    #[test]
    fn test_validate_connect_timeout() {
        let mut config = NodeConfig::parse_from(["powledger", "--connect-timeout-ms", "250"]);
        assert_eq!(config.connect_timeout(), Duration::from_millis(250));

        config.connect_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConnectTimeout)
        ));
    }

    #[test]
    fn test_validate_read_timeout() {
        let mut config = NodeConfig::parse_from(["powledger", "--read-timeout-ms", "750"]);
        assert_eq!(config.read_timeout(), Duration::from_millis(750));
        assert!(config.validate().is_ok());

        config.read_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidReadTimeout)));
    }
}
