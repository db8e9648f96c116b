pub mod experiment;
pub mod presentation;
pub mod strategies;
pub mod transitions;

pub use experiment::{ExperimentError, ExperimentManager, Recommendation};
pub use presentation::{Presenter, TemplatePresenter};
pub use transitions::TransitionTable;
