//! Process-wide model host
//!
//! Owns the one classifier and the label table. Built once at startup,
//! then shared read-only by every request.

use crate::classifier::ImageClassifier;
use crate::model_loader::ModelConfig;
use crate::plant_disease::PlantDiseaseClassifier;
use crate::preprocess;
use blightcheck_core::{
    ClassLabels, ClassScores, Error, ImageBatch, PixelGrid, Prediction, Result,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct ModelHost {
    classifier: Arc<dyn ImageClassifier>,
    labels: ClassLabels,
}

impl ModelHost {
    pub fn new(classifier: Arc<dyn ImageClassifier>, labels: ClassLabels) -> Self {
        Self { classifier, labels }
    }

    /// Load the plant disease model with its label table
    ///
    /// Missing, corrupt, or mis-shaped weights are an error; the caller
    /// should treat this as fatal.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        info!(path = %config.path.display(), device = %config.device, "Loading model");
        let classifier = PlantDiseaseClassifier::from_config(config)?;
        Ok(Self::new(Arc::new(classifier), ClassLabels::plant_disease()))
    }

    /// Dry run on a black image to prove the model produces usable scores
    pub async fn verify(&self) -> Result<()> {
        let batch = ImageBatch::single(PixelGrid::filled([0, 0, 0]));
        let scores = self.infer(batch).await?;
        ensure_finite(&scores)?;
        info!(
            classifier = self.classifier.name(),
            labels = ?self.labels.iter().collect::<Vec<_>>(),
            "Model verified"
        );
        Ok(())
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Raw scores for a batch of one
    pub async fn infer(&self, batch: ImageBatch) -> Result<ClassScores> {
        self.classifier.infer(batch).await
    }

    /// Decode an upload, score it, and pick the winning label
    pub async fn predict<B>(&self, upload: B) -> Result<Prediction>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let start = Instant::now();

        let batch = tokio::task::spawn_blocking(move || preprocess::prepare_batch(upload.as_ref()))
            .await
            .map_err(|e| Error::internal(format!("Preprocessing task failed: {}", e)))??;

        let scores = self.infer(batch).await?;
        ensure_finite(&scores)?;

        let prediction = self.labels.resolve(&scores);
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            latency_us = start.elapsed().as_micros() as u64,
            "Prediction complete"
        );

        Ok(prediction)
    }
}

fn ensure_finite(scores: &ClassScores) -> Result<()> {
    if scores.is_finite() {
        Ok(())
    } else {
        Err(Error::model(format!(
            "Model produced non-finite scores: {:?}",
            scores.as_slice()
        )))
    }
}

impl std::fmt::Debug for ModelHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHost")
            .field("classifier", &self.classifier.name())
            .field("labels", &self.labels)
            .finish()
    }
}
