//! Optimizers and gradient clipping

mod adam;
mod clip;
mod optimizer;

pub use adam::Adam;
pub use clip::{clip_grad_norm, global_grad_norm};
pub use optimizer::Optimizer;
