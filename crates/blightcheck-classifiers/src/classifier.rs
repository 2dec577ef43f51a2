//! Classifier trait

use async_trait::async_trait;
use blightcheck_core::{ClassScores, ImageBatch, Result};

/// Trait for all image classifiers
///
/// Implementations must be safe to call from many requests at once;
/// the host shares one instance across the whole process.
#[async_trait]
pub trait ImageClassifier: Send + Sync {
    /// Score a batch of one image, one score per class
    async fn infer(&self, batch: ImageBatch) -> Result<ClassScores>;

    /// Get the classifier name
    fn name(&self) -> &str;
}
