//! Hyperparameter search and model evaluation
//!
//! A [`ModelSearchEngine`] splits a table once, then tunes a strategy's
//! [`Pipeline`] with [`GridSearch`] and reports a [`SearchResult`], either
//! from a single hold-out evaluation or from nested cross-validation.

mod config;
mod engine;
mod grid_search;
mod pipeline;
mod result;

pub use config::SearchConfig;
pub use engine::ModelSearchEngine;
pub use grid_search::{CandidateScore, GridSearch, GridSearchResult};
pub use pipeline::Pipeline;
pub use result::{comparison_to_dataframe, ModelComparison, SearchResult};
