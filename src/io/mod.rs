//! Versioned artifact persistence
//!
//! A training run produces one [`ArtifactBundle`]: model weights, the input
//! and target scaler parameters, and run metadata. [`ArtifactStore`] writes
//! bundles as immutable `runs/<run_id>/` directories with a SHA-256 manifest
//! and moves a `LATEST` pointer forward only after a bundle is complete.

mod bundle;
mod store;

pub use bundle::{ArtifactBundle, Manifest, Metadata, ScalerDocument};
pub use store::{ArtifactRef, ArtifactStore};

#[cfg(test)]
pub(crate) use bundle::sample_bundle;
