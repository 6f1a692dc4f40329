//! Server configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `ENCOUNTERD_*` environment variables.

use std::net::SocketAddr;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::{Dice, TurnTracking};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "encounterd.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// None = in-memory
    pub db_path: Option<String>,
    /// How the turn pointer follows roster changes
    pub turn_tracking: TurnTracking,
    /// Fixed seed for reproducible rolls
    pub dice_seed: Option<u64>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            turn_tracking: TurnTracking::default(),
            dice_seed: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Figment with defaults, the given TOML file and the environment
    pub fn figment(file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file.as_ref()))
            .merge(Env::prefixed("ENCOUNTERD_"))
    }

    /// Load configuration; a missing file is not an error
    pub fn load(file: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment(file).extract()
    }

    /// Dice for this server, seeded when configured
    pub fn dice(&self) -> Dice {
        match self.dice_seed {
            Some(seed) => Dice::seeded(seed),
            None => Dice::from_entropy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load("missing.toml")?;
            assert_eq!(config.bind_addr.port(), 8080);
            assert!(config.db_path.is_none());
            assert_eq!(config.turn_tracking, TurnTracking::Participant);
            assert_eq!(config.log_format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "encounterd.toml",
                r#"
                bind_addr = "0.0.0.0:9000"
                db_path = "combat.db"
                turn_tracking = "index"
                "#,
            )?;
            jail.set_env("ENCOUNTERD_DICE_SEED", "42");
            jail.set_env("ENCOUNTERD_BIND_ADDR", "127.0.0.1:9100");

            let config = Config::load(DEFAULT_CONFIG_FILE)?;
            assert_eq!(config.bind_addr.port(), 9100);
            assert_eq!(config.db_path.as_deref(), Some("combat.db"));
            assert_eq!(config.turn_tracking, TurnTracking::Index);
            assert_eq!(config.dice_seed, Some(42));
            Ok(())
        });
    }
}
