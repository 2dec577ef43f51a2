//! Potato leaf disease classifier
//!
//! A small Candle CNN scoring a 256x256 RGB leaf photo as Early Blight,
//! Late Blight or Healthy.
//!
//! Network, input `(1, 3, 256, 256)` holding raw 0..255 values:
//!
//! ```text
//! rescale x1/255
//! conv1 3->32, conv2 32->64, conv3..conv6 64->64   (3x3 valid, relu, maxpool 2)
//! flatten 64*2*2 -> dense1 256->64 relu -> dense2 64->3 softmax
//! ```
//!
//! Weights are looked up as `conv{1..6}.{weight,bias}` (OIHW) and
//! `dense{1,2}.{weight,bias}` (out x in). Flattening is channel-major, so
//! weights exported from a channels-last framework need `dense1.weight`
//! permuted to CHW feature order.

use crate::classifier::ImageClassifier;
use crate::model_loader::{LoadedModel, ModelConfig};
use async_trait::async_trait;
use blightcheck_core::{ClassScores, Error, ImageBatch, Result, NUM_CLASSES};
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder};
use std::time::Instant;

const CONV_CHANNELS: [(usize, usize); 6] = [
    (3, 32),
    (32, 64),
    (64, 64),
    (64, 64),
    (64, 64),
    (64, 64),
];
const KERNEL_SIZE: usize = 3;
const FLAT_FEATURES: usize = 64 * 2 * 2;
const HIDDEN_UNITS: usize = 64;

/// The convolutional network
#[derive(Debug, Clone)]
pub struct PlantDiseaseCnn {
    convs: Vec<Conv2d>,
    dense1: Linear,
    dense2: Linear,
}

impl PlantDiseaseCnn {
    /// Build the network, checking every weight's name and shape
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let convs = CONV_CHANNELS
            .iter()
            .enumerate()
            .map(|(i, &(in_channels, out_channels))| {
                conv2d(
                    in_channels,
                    out_channels,
                    KERNEL_SIZE,
                    Conv2dConfig::default(),
                    vb.pp(format!("conv{}", i + 1)),
                )
            })
            .collect::<candle_core::Result<Vec<_>>>()?;

        let dense1 = linear(FLAT_FEATURES, HIDDEN_UNITS, vb.pp("dense1"))?;
        let dense2 = linear(HIDDEN_UNITS, NUM_CLASSES, vb.pp("dense2"))?;

        Ok(Self {
            convs,
            dense1,
            dense2,
        })
    }
}

impl Module for PlantDiseaseCnn {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mut xs = xs.affine(1.0 / 255.0, 0.0)?;
        for conv in &self.convs {
            xs = conv.forward(&xs)?.relu()?.max_pool2d(2)?;
        }

        let xs = xs.flatten_from(1)?;
        let xs = self.dense1.forward(&xs)?.relu()?;
        let xs = self.dense2.forward(&xs)?;
        candle_nn::ops::softmax(&xs, D::Minus1)
    }
}

/// Convert an HWC `u8` batch into an NCHW `f32` tensor
pub fn batch_to_tensor(batch: &ImageBatch, device: &Device) -> candle_core::Result<Tensor> {
    let [n, h, w, c] = ImageBatch::shape();
    let data: Vec<f32> = batch
        .images()
        .iter()
        .flat_map(|image| image.as_slice().iter().map(|&v| f32::from(v)))
        .collect();

    Tensor::from_vec(data, (n, h, w, c), device)?
        .permute((0, 3, 1, 2))?
        .contiguous()
}

/// Classifier running [`PlantDiseaseCnn`] on Candle
#[derive(Debug, Clone)]
pub struct PlantDiseaseClassifier {
    name: String,
    model: PlantDiseaseCnn,
    device: Device,
}

impl PlantDiseaseClassifier {
    /// Load weights from disk and build the network
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let loaded = LoadedModel::load(config)?;
        Self::from_loaded(&loaded)
    }

    /// Build the network from already loaded weights
    pub fn from_loaded(loaded: &LoadedModel) -> Result<Self> {
        let model = PlantDiseaseCnn::new(loaded.var_builder().clone()).map_err(|e| {
            Error::model(format!(
                "Weights in {:?} do not fit the plant disease network: {}",
                loaded.weights_path(),
                e
            ))
        })?;

        let name = loaded
            .weights_path()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("plant-disease")
            .to_string();

        Ok(Self::new(name, model, loaded.device().clone()))
    }

    pub fn new(name: impl Into<String>, model: PlantDiseaseCnn, device: Device) -> Self {
        Self {
            name: name.into(),
            model,
            device,
        }
    }

    /// Run the forward pass on the calling thread
    pub fn forward_scores(&self, batch: &ImageBatch) -> Result<ClassScores> {
        let start = Instant::now();

        let input = batch_to_tensor(batch, &self.device)
            .map_err(|e| Error::model(format!("Failed to build input tensor: {}", e)))?;
        let output = self
            .model
            .forward(&input)
            .map_err(|e| Error::model(format!("Forward pass failed: {}", e)))?;
        let scores: Vec<f32> = output
            .squeeze(0)
            .and_then(|t| t.to_vec1())
            .map_err(|e| Error::model(format!("Failed to read model output: {}", e)))?;

        tracing::trace!(latency_us = start.elapsed().as_micros() as u64, "forward pass");
        ClassScores::from_slice(&scores)
    }
}

#[async_trait]
impl ImageClassifier for PlantDiseaseClassifier {
    async fn infer(&self, batch: ImageBatch) -> Result<ClassScores> {
        let classifier = self.clone();
        tokio::task::spawn_blocking(move || classifier.forward_scores(&batch))
            .await
            .map_err(|e| Error::internal(format!("Inference task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        &self.name
    }
}
