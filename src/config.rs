use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of consecutive requests a user stays on one strategy
    #[serde(default = "default_stickiness_window")]
    pub stickiness_window: u32,

    /// Number of books returned when a request does not name `k`
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Seed for the experiment's random source. Unset means seeded from entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,

    /// JSON file with the catalog table. Unset uses the built-in demo data.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// JSON file with the checkout table. Unset uses the built-in demo data.
    #[serde(default)]
    pub checkouts_path: Option<PathBuf>,

    /// How many of a user's most recent books feed the next-book strategy
    ///
    /// 1 follows only the last book read. Set 3 to pool successors over the
    /// last three books, which lets a reader whose last book has no known
    /// successor still get transition-based picks from earlier reads.
    #[serde(default = "default_recent_books")]
    pub transition_recent_books: usize,

    // Traffic bids. Zero leaves the strategy unregistered.
    #[serde(default = "default_next_book_bid")]
    pub next_book_bid: f64,

    #[serde(default = "default_unit_bid")]
    pub popularity_bid: f64,

    #[serde(default = "default_unit_bid")]
    pub librarian_picks_bid: f64,

    #[serde(default = "default_unit_bid")]
    pub layered_fallback_bid: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_stickiness_window() -> u32 {
    5
}

fn default_k() -> usize {
    3
}

fn default_recent_books() -> usize {
    1
}

fn default_next_book_bid() -> f64 {
    2.0
}

fn default_unit_bid() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            stickiness_window: default_stickiness_window(),
            default_k: default_k(),
            rng_seed: None,
            catalog_path: None,
            checkouts_path: None,
            transition_recent_books: default_recent_books(),
            next_book_bid: default_next_book_bid(),
            popularity_bid: default_unit_bid(),
            librarian_picks_bid: default_unit_bid(),
            layered_fallback_bid: default_unit_bid(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Bids for the built-in strategies, in registration order
    pub fn strategy_bids(&self) -> [(&'static str, f64); 4] {
        [
            ("next_book", self.next_book_bid),
            ("popularity", self.popularity_bid),
            ("librarian_picks", self.librarian_picks_bid),
            ("layered_fallback", self.layered_fallback_bid),
        ]
    }

    /// Rejects settings the experiment manager cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.stickiness_window == 0 {
            return Err(AppError::Config(
                "STICKINESS_WINDOW must be at least 1".to_string(),
            ));
        }

        for (name, bid) in self.strategy_bids() {
            if !bid.is_finite() || bid < 0.0 {
                return Err(AppError::Config(format!(
                    "bid for {} must be a non-negative number, got {}",
                    name, bid
                )));
            }
        }

        if self.strategy_bids().iter().all(|(_, bid)| *bid == 0.0) {
            return Err(AppError::Config(
                "at least one strategy needs a positive bid".to_string(),
            ));
        }

        if self.transition_recent_books == 0 {
            return Err(AppError::Config(
                "TRANSITION_RECENT_BOOKS must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stickiness_window, 5);
        assert_eq!(config.default_k, 3);
        assert_eq!(config.strategy_bids()[0], ("next_book", 2.0));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = Config {
            stickiness_window: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_all_zero_bids_rejected() {
        let config = Config {
            next_book_bid: 0.0,
            popularity_bid: 0.0,
            librarian_picks_bid: 0.0,
            layered_fallback_bid: 0.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_negative_bid_rejected() {
        let config = Config {
            popularity_bid: -1.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_pairs() {
        let vars = vec![
            ("PORT".to_string(), "8080".to_string()),
            ("STICKINESS_WINDOW".to_string(), "2".to_string()),
            ("RNG_SEED".to_string(), "7".to_string()),
            ("LAYERED_FALLBACK_BID".to_string(), "0".to_string()),
        ];
        let config: Config = envy::from_iter(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.stickiness_window, 2);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.layered_fallback_bid, 0.0);
        assert_eq!(config.host, "127.0.0.1");
    }
}
