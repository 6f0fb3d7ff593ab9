//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Mean-variance and prediction-weighted allocation plus historical performance evaluation.

pub mod markowitz;
pub mod performance;
pub mod predictive;
pub mod types;

pub use markowitz::optimize_markowitz;
pub use performance::evaluate;
pub use predictive::LinearPredictor;
pub use predictive::ModelMap;
pub use predictive::ReturnPredictor;
pub use predictive::load_linear_models;
pub use predictive::optimize_predictive;
pub use predictive::predict_returns;
pub use predictive::weights_from_predictions;
pub use types::Allocation;
pub use types::Performance;
pub use types::PredictionMap;
pub use types::StrategyKind;
pub use types::WeightVector;
