pub mod config;
pub mod data_loader;
pub mod encoding;
pub mod error;
pub mod feature_engineering;
pub mod importance;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod records;
pub mod selection;
pub mod submission;

pub use config::Config;
pub use data_loader::DataLoader;
pub use encoding::{CategoricalEncoder, UnseenCategoryPolicy};
pub use error::{ClaimCostError, Result};
pub use feature_engineering::FeatureEngineer;
pub use models::{GBDTModel, HyperParams, ModelFamily, Regressor};
pub use pipeline::{Pipeline, RunSummary};
pub use selection::ModelSelector;
pub use submission::PredictionWriter;
