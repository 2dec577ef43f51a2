//! blightcheck Classifiers
//!
//! Image classification for potato leaf disease detection.
//!
//! - [`preprocess`] decodes uploads into fixed 256x256 RGB grids
//! - [`plant_disease`] holds the Candle CNN and its classifier
//! - [`host`] owns the loaded model for the lifetime of the process
//!
//! Inference runs on CPU by default; CUDA and Metal are selectable when
//! Candle is built with them.

pub mod classifier;
pub mod host;
pub mod model_loader;
pub mod plant_disease;
pub mod preprocess;

pub use classifier::ImageClassifier;
pub use host::ModelHost;
pub use model_loader::{DeviceType, LoadedModel, ModelConfig, ModelFormat, DEFAULT_MODEL_PATH};
pub use plant_disease::{PlantDiseaseClassifier, PlantDiseaseCnn};
pub use preprocess::{decode_image, prepare_batch};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::ImageClassifier;
    pub use crate::host::ModelHost;
    pub use crate::model_loader::{DeviceType, ModelConfig};
    pub use crate::plant_disease::PlantDiseaseClassifier;
}
