//! Forecasting network: LSTM encoder, physics head and residual penalty

mod dense;
mod forecast;
mod lstm;
mod param;
pub mod physics;
mod weights;

pub use dense::Dense;
pub use forecast::{ForecastModel, ForwardCache, ModelConfig};
pub use lstm::LstmLayer;
pub use param::Param;
pub use physics::{physics_residual, physics_residual_grad};
pub use weights::{ModelWeights, ParameterInfo};
