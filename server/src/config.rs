//! Process configuration.
//!
//! Every game option is available both as a CLI flag and as the environment
//! variable the deployment charts use.

use clap::Parser;
use plinko_types::config::parse_multipliers;
use plinko_types::GameConfig;
use std::net::IpAddr;

#[derive(Parser, Debug)]
#[command(author, version, about = "Market-synchronized Plinko wagering engine", long_about = None)]
pub struct Args {
    /// Host interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Markets to run round loops for.
    #[arg(long, env = "MARKETS", value_delimiter = ',', default_value = "CryptoStream")]
    pub markets: Vec<String>,

    /// Ordered multiplier board, comma-separated.
    #[arg(long, env = "PLINKO_MULTIPLIERS")]
    pub multipliers: Option<String>,

    /// Symbols selected per round.
    #[arg(long, env = "PLINKO_STOCK_COUNT", default_value_t = 5)]
    pub stock_count: usize,

    #[arg(long, env = "PLINKO_BET_TIME_MS", default_value_t = 20_000)]
    pub bet_time_ms: u64,

    #[arg(long, env = "PLINKO_DELTA_TIME_MS", default_value_t = 10_000)]
    pub delta_time_ms: u64,

    #[arg(long, env = "PLINKO_DROP_TIME_MS", default_value_t = 10_000)]
    pub drop_time_ms: u64,

    #[arg(long, env = "PLINKO_PAYOUT_TIME_MS", default_value_t = 5_000)]
    pub payout_time_ms: u64,

    /// Target long-run payout percentage.
    #[arg(long, env = "DESIRED_RTP", default_value_t = 96.5)]
    pub desired_rtp: f64,

    /// Plays before the RTP governor activates.
    #[arg(long, env = "THRESHOLD_PLAYCOUNT", default_value_t = 100)]
    pub threshold_playcount: u64,

    /// Plays at which the RTP counters auto-reset.
    #[arg(long, env = "LIMIT_PLAYCOUNT", default_value_t = 10_000)]
    pub limit_playcount: u64,

    #[arg(long, env = "WALLET_BASE_URL", default_value = "http://127.0.0.1:9100")]
    pub wallet_base_url: String,

    #[arg(long, env = "WALLET_TIMEOUT_MS", default_value_t = 5_000)]
    pub wallet_timeout_ms: u64,

    #[arg(long, env = "WALLET_SIGNATURE_SECRET", default_value = "", hide_env_values = true)]
    pub wallet_signature_secret: String,

    /// Snapshot age beyond which a market pauses, seconds.
    #[arg(long, env = "SNAPSHOT_FRESHNESS_SECONDS", default_value_t = 5)]
    pub snapshot_freshness_seconds: u64,

    /// Game tag carried in wallet metadata.
    #[arg(long, env = "GAME_NAME", default_value = "plinko")]
    pub game_name: String,
}

impl Args {
    /// Assemble and validate the per-market game configuration.
    pub fn game_config(&self) -> Result<GameConfig, String> {
        let multipliers = match &self.multipliers {
            Some(raw) => parse_multipliers(raw)?,
            None => GameConfig::default().multipliers,
        };
        let config = GameConfig {
            multipliers,
            stock_count: self.stock_count,
            bet_time_ms: self.bet_time_ms,
            delta_time_ms: self.delta_time_ms,
            drop_time_ms: self.drop_time_ms,
            payout_time_ms: self.payout_time_ms,
            desired_rtp: self.desired_rtp,
            threshold_playcount: self.threshold_playcount,
            limit_playcount: self.limit_playcount,
            snapshot_freshness_seconds: self.snapshot_freshness_seconds,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_produce_a_valid_config() {
        let args = Args::parse_from(["plinko-server"]);
        let config = args.game_config().unwrap();
        assert_eq!(config.multipliers.len(), 9);
        assert_eq!(config.bet_time_ms, 20_000);
        assert_eq!(args.markets, vec!["CryptoStream".to_string()]);
    }

    #[test]
    fn multiplier_override_is_parsed() {
        let args = Args::parse_from(["plinko-server", "--multipliers", "2,0,2"]);
        let config = args.game_config().unwrap();
        assert_eq!(config.multipliers, vec![2.0, 0.0, 2.0]);
    }

    #[test]
    fn market_list_splits_on_commas() {
        let args = Args::parse_from(["plinko-server", "--markets", "CryptoStream,TechStocks"]);
        assert_eq!(args.markets.len(), 2);
    }

    #[test]
    fn bad_multipliers_are_rejected() {
        let args = Args::parse_from(["plinko-server", "--multipliers", "2,oops"]);
        assert!(args.game_config().is_err());
    }
}
