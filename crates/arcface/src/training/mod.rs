//! Training pipeline: margin loss, grouped optimizers, per-epoch metrics,
//! and the epoch loop with validation-driven checkpointing.

pub mod loss;
pub mod metrics;
pub mod optimizer;
pub mod trainer;
