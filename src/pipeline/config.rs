//! Pipeline configuration from environment variables
//!
//! Everything here is read once at startup and handed to the engine and
//! runtime as immutable values.

use super::registry::{ATOM_DENOM, UOSMO, USDC_DENOM};
use std::env;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Entity store backend for the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    Sqlite,
    /// Nothing persisted; dry runs over an event file
    Memory,
}

impl BackendType {
    /// `--backend sqlite|memory` from the process arguments, default SQLite
    pub fn parse_backend_from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        Self::parse_backend(&args)
    }

    pub fn parse_backend(args: &[String]) -> Self {
        if let Some(idx) = args.iter().position(|x| x == "--backend") {
            if let Some("memory") = args.get(idx + 1).map(|s| s.as_str()) {
                return BackendType::Memory;
            }
        }
        BackendType::Sqlite
    }
}

/// How synthetic USD candles are derived
#[derive(Debug, Clone, PartialEq)]
pub enum PricingMode {
    /// Price every traded token through `intermediate` (OSMO), then into USDC
    Intermediate { intermediate: String },
    /// Price ATOM only, from ATOM/OSMO and OSMO/USDC trades in whitelisted pools
    WhitelistedPools {
        atom: String,
        osmo: String,
        pools: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub usdc_denom: String,
    pub mode: PricingMode,
}

impl PricingConfig {
    pub fn intermediate(usdc_denom: &str, intermediate: &str) -> Self {
        Self {
            usdc_denom: usdc_denom.to_string(),
            mode: PricingMode::Intermediate {
                intermediate: intermediate.to_string(),
            },
        }
    }

    pub fn whitelisted(usdc_denom: &str, atom: &str, osmo: &str, pools: &[&str]) -> Self {
        Self {
            usdc_denom: usdc_denom.to_string(),
            mode: PricingMode::WhitelistedPools {
                atom: atom.to_string(),
                osmo: osmo.to_string(),
                pools: pools.iter().map(|p| p.to_string()).collect(),
            },
        }
    }

    /// Load pricing configuration
    ///
    /// Environment variables:
    /// - `USD_PRICING_MODE` (`intermediate` | `whitelist`, default: intermediate)
    /// - `USDC_DENOM` (default: axelar USDC on Osmosis)
    /// - `INTERMEDIATE_DENOM` (default: uosmo)
    /// - `ATOM_DENOM` (default: Cosmos Hub ATOM on Osmosis)
    /// - `WHITELISTED_POOLS` (comma-separated, default: 1,678)
    pub fn from_env() -> Result<Self, ConfigError> {
        let usdc_denom = env::var("USDC_DENOM").unwrap_or_else(|_| USDC_DENOM.to_string());
        let intermediate =
            env::var("INTERMEDIATE_DENOM").unwrap_or_else(|_| UOSMO.to_string());

        let mode_str = env::var("USD_PRICING_MODE").unwrap_or_else(|_| "intermediate".to_string());
        let mode = match mode_str.to_lowercase().as_str() {
            "intermediate" => PricingMode::Intermediate { intermediate },
            "whitelist" | "whitelisted" => {
                let pools: Vec<String> = env::var("WHITELISTED_POOLS")
                    .unwrap_or_else(|_| "1,678".to_string())
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect();
                if pools.is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "WHITELISTED_POOLS must list at least one pool".to_string(),
                    ));
                }
                PricingMode::WhitelistedPools {
                    atom: env::var("ATOM_DENOM").unwrap_or_else(|_| ATOM_DENOM.to_string()),
                    osmo: intermediate,
                    pools,
                }
            }
            other => {
                return Err(ConfigError::InvalidValue(format!(
                    "USD_PRICING_MODE must be 'intermediate' or 'whitelist', got '{}'",
                    other
                )))
            }
        };

        Ok(Self { usdc_denom, mode })
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::intermediate(USDC_DENOM, UOSMO)
    }
}

/// Configuration for pipeline runtime
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `.sql` migrations
    pub schema_dir: String,

    /// JSONL file of swap events
    pub events_path: String,

    /// Keep tailing `events_path` after reaching EOF
    pub follow_events: bool,

    /// Poll interval while following, milliseconds
    pub poll_interval_ms: u64,

    /// Channel buffer size between event source and ingestion worker
    pub channel_buffer: usize,

    /// Optional JSON file extending the built-in denom registry
    pub denom_registry_path: Option<String>,

    pub pricing: PricingConfig,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `CANDLEFLOW_DB_PATH` (default: data/candleflow.db)
    /// - `CANDLEFLOW_SCHEMA_DIR` (default: sql)
    /// - `SWAP_EVENTS_PATH` (default: streams/swaps.jsonl)
    /// - `FOLLOW_EVENTS` (default: false)
    /// - `EVENT_POLL_INTERVAL_MS` (default: 500)
    /// - `STREAMER_CHANNEL_BUFFER` (default: 10000)
    /// - `DENOM_REGISTRY_PATH` (optional)
    /// - pricing variables, see [`PricingConfig::from_env`]
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel_buffer = env::var("STREAMER_CHANNEL_BUFFER")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10_000);

        if channel_buffer == 0 {
            return Err(ConfigError::InvalidValue(
                "STREAMER_CHANNEL_BUFFER must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            db_path: env::var("CANDLEFLOW_DB_PATH")
                .unwrap_or_else(|_| "data/candleflow.db".to_string()),

            schema_dir: env::var("CANDLEFLOW_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            events_path: env::var("SWAP_EVENTS_PATH")
                .unwrap_or_else(|_| "streams/swaps.jsonl".to_string()),

            follow_events: env::var("FOLLOW_EVENTS")
                .ok()
                .and_then(|s| s.to_lowercase().parse().ok())
                .unwrap_or(false),

            poll_interval_ms: env::var("EVENT_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),

            channel_buffer,

            denom_registry_path: env::var("DENOM_REGISTRY_PATH").ok(),

            pricing: PricingConfig::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 12] = [
        "CANDLEFLOW_DB_PATH",
        "CANDLEFLOW_SCHEMA_DIR",
        "SWAP_EVENTS_PATH",
        "FOLLOW_EVENTS",
        "EVENT_POLL_INTERVAL_MS",
        "STREAMER_CHANNEL_BUFFER",
        "DENOM_REGISTRY_PATH",
        "USD_PRICING_MODE",
        "USDC_DENOM",
        "INTERMEDIATE_DENOM",
        "ATOM_DENOM",
        "WHITELISTED_POOLS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_parse_backend() {
        let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(BackendType::parse_backend(&args(&["bin"])), BackendType::Sqlite);
        assert_eq!(
            BackendType::parse_backend(&args(&["bin", "--backend", "memory"])),
            BackendType::Memory
        );
        assert_eq!(
            BackendType::parse_backend(&args(&["bin", "--backend", "jsonl"])),
            BackendType::Sqlite
        );
        assert_eq!(BackendType::parse_backend(&args(&["bin", "--backend"])), BackendType::Sqlite);
    }

    // Env vars are process-global: keep every env-mutating case in one test
    #[test]
    fn test_config_from_env() {
        clear_env();

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.db_path, "data/candleflow.db");
        assert_eq!(config.schema_dir, "sql");
        assert_eq!(config.events_path, "streams/swaps.jsonl");
        assert!(!config.follow_events);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.channel_buffer, 10_000);
        assert_eq!(config.denom_registry_path, None);
        assert_eq!(config.pricing, PricingConfig::default());

        env::set_var("CANDLEFLOW_DB_PATH", "/tmp/test.db");
        env::set_var("FOLLOW_EVENTS", "TRUE");
        env::set_var("STREAMER_CHANNEL_BUFFER", "5000");
        env::set_var("USD_PRICING_MODE", "whitelist");
        env::set_var("WHITELISTED_POOLS", " 1 , 678,,");

        let config = PipelineConfig::from_env().unwrap();
        assert_eq!(config.db_path, "/tmp/test.db");
        assert!(config.follow_events);
        assert_eq!(config.channel_buffer, 5_000);
        match config.pricing.mode {
            PricingMode::WhitelistedPools { atom, osmo, pools } => {
                assert_eq!(atom, ATOM_DENOM);
                assert_eq!(osmo, UOSMO);
                assert_eq!(pools, vec!["1".to_string(), "678".to_string()]);
            }
            other => panic!("expected whitelist mode, got {:?}", other),
        }

        env::set_var("USD_PRICING_MODE", "oracle");
        assert!(matches!(
            PricingConfig::from_env(),
            Err(ConfigError::InvalidValue(_))
        ));

        env::set_var("USD_PRICING_MODE", "intermediate");
        env::set_var("STREAMER_CHANNEL_BUFFER", "0");
        assert!(PipelineConfig::from_env().is_err());

        clear_env();
    }
}
