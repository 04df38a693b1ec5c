//! Dataset collaborators for kinship training on Families In the Wild (FIW).
//!
//! Provides the family index used to build the classification pool, kin pair
//! lists for validation, image decoding on a small worker pool, and the
//! [`TrainSource`] / [`PairSource`] traits the trainer consumes. Images are
//! delivered as host-side `f32` batches; tensor conversion happens in the
//! `arcface` crate.

pub mod error;
pub mod families;
pub mod loader;
pub mod pairs;
pub mod source;
pub mod train;
pub mod types;
pub mod val;

pub use error::DatasetError;
pub use families::FamilyIndex;
pub use loader::{ImageBatch, ImageLoader};
pub use pairs::read_pairs;
pub use source::{LabeledBatch, PairBatch, PairSource, TrainSource};
pub use train::ClassifierTrain;
pub use types::{FaceSample, KinPair, KinRelation};
pub use val::PairSet;
