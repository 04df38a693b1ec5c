//! ArcFace training for kinship verification.
//!
//! A ResNet backbone maps face crops to embeddings; an additive
//! angular-margin head turns embeddings into family logits for
//! cross-entropy training. After each epoch the backbone is validated on
//! held-out kin pairs: cosine scores, a Youden-optimal threshold, accuracy
//! and expected calibration error. Only the backbone is checkpointed; the
//! head exists for training only.

pub mod checkpoint;
pub mod error;
pub mod inference;
pub mod model;
mod progress;
pub mod training;
pub mod validation;

pub use error::ArcFaceError;
