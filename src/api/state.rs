use std::sync::Arc;

use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::Config,
    error::{AppError, AppResult},
    services::{
        strategies::{self, StrategyOptions},
        ExperimentManager, Presenter, TemplatePresenter,
    },
    store::{self, ReferenceData, ReferenceStore},
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub experiment: Arc<ExperimentManager>,
    pub presenter: Arc<dyn Presenter>,
}

impl AppState {
    /// Loads the reference tables and registers every strategy with a positive bid
    pub fn from_config(config: &Config) -> AppResult<Self> {
        config.validate()?;
        let data = store::load_reference_data(config)?;
        Self::with_data(config, data)
    }

    /// Builds state over already loaded tables
    pub fn with_data(config: &Config, data: ReferenceData) -> AppResult<Self> {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let experiment =
            ExperimentManager::new(ReferenceStore::new(data), config.stickiness_window, rng)?;

        let options = StrategyOptions {
            default_k: config.default_k,
            recent_books: config.transition_recent_books,
        };

        for (name, bid) in config.strategy_bids() {
            if bid == 0.0 {
                tracing::info!(strategy = name, "Strategy disabled by zero bid");
                continue;
            }
            let function = strategies::builtin(name)
                .ok_or_else(|| AppError::Internal(format!("unknown built-in strategy {}", name)))?;
            experiment.register(name, bid, function, options.clone())?;
        }

        Ok(Self {
            experiment: Arc::new(experiment),
            presenter: Arc::new(TemplatePresenter),
        })
    }

    /// Swaps in a different presenter
    pub fn with_presenter(mut self, presenter: Arc<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }
}
