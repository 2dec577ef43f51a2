//! blightcheck Core
//!
//! Core types and error handling shared across blightcheck components.
//!
//! This crate provides:
//! - Fixed-shape input and output types for the classifier
//!   (256x256 RGB pixel grid, batch of one, 3-way score vector)
//! - The class label table and argmax resolution
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    argmax, ClassLabels, ClassScores, ImageBatch, PixelGrid, Prediction, CHANNELS, INPUT_SIZE,
    NUM_CLASSES, PLANT_DISEASE_LABELS,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassLabels, ClassScores, ImageBatch, PixelGrid, Prediction};
}
