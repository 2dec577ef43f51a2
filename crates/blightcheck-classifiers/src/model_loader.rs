//! Model loading for the Candle-based classifier

use blightcheck_core::{Error, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location of the model artifact, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "../model/plant_disease_model_v1.safetensors";

/// Configuration for loading the model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the weights file
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceType,

    /// Weights format; guessed from the file extension when unset
    #[serde(default)]
    pub format: Option<ModelFormat>,
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceType {
    /// CPU inference (always available)
    #[default]
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

/// Model file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFormat {
    /// SafeTensors format (recommended)
    SafeTensors,
    /// PyTorch format
    PyTorch,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            device: DeviceType::Cpu,
            format: None,
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration from local path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set model format
    pub fn with_format(mut self, format: ModelFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Explicit format, or the one implied by the file extension
    pub fn resolved_format(&self) -> Result<ModelFormat> {
        match self.format {
            Some(format) => Ok(format),
            None => ModelFormat::from_path(&self.path),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

impl ModelFormat {
    /// Guess the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "safetensors" => Ok(Self::SafeTensors),
            "pt" | "pth" | "bin" => Ok(Self::PyTorch),
            "h5" | "keras" => Err(Error::config(format!(
                "{} is a Keras model; export its weights to SafeTensors first",
                path.display()
            ))),
            _ => Err(Error::config(format!(
                "Cannot tell model format of {:?}; set it explicitly",
                path
            ))),
        }
    }
}

impl FromStr for DeviceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let (kind, index) = match s.split_once(':') {
            Some((kind, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| Error::config(format!("Invalid device index in '{}'", s)))?;
                (kind, index)
            }
            None => (s.as_str(), 0),
        };

        match kind {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda(index)),
            "metal" => Ok(Self::Metal(index)),
            other => Err(Error::config(format!("Unknown device '{}'", other))),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(idx) => write!(f, "cuda:{}", idx),
            Self::Metal(idx) => write!(f, "metal:{}", idx),
        }
    }
}

impl TryFrom<String> for DeviceType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceType> for String {
    fn from(device: DeviceType) -> Self {
        device.to_string()
    }
}

/// Weights loaded onto a device, ready to build the network from
pub struct LoadedModel {
    /// VarBuilder for loading model weights
    var_builder: VarBuilder<'static>,

    /// Device the model is on
    device: Device,

    /// Model weights path (for reference)
    weights_path: PathBuf,
}

impl LoadedModel {
    /// Load model weights from configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let weights_path = Self::resolve_model_path(config)?;
        let format = config.resolved_format()?;
        let device = Self::create_device(config.device)?;

        let var_builder = match format {
            ModelFormat::SafeTensors => {
                let tensors = candle_core::safetensors::load(&weights_path, &device)
                    .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))?;
                VarBuilder::from_tensors(tensors, DType::F32, &device)
            }
            ModelFormat::PyTorch => VarBuilder::from_pth(&weights_path, DType::F32, &device)
                .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e)))?,
        };

        tracing::debug!(path = %weights_path.display(), ?format, device = %config.device, "weights loaded");

        Ok(Self {
            var_builder,
            device,
            weights_path,
        })
    }

    /// Resolve model path, failing early if the artifact is missing
    fn resolve_model_path(config: &ModelConfig) -> Result<PathBuf> {
        if !config.path.is_file() {
            return Err(Error::config(format!(
                "Model file not found: {:?}",
                config.path
            )));
        }
        Ok(config.path.clone())
    }

    /// Create Candle device from device type
    fn create_device(device_type: DeviceType) -> Result<Device> {
        match device_type {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            DeviceType::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }

    /// Get reference to VarBuilder for building model layers
    pub fn var_builder(&self) -> &VarBuilder<'static> {
        &self.var_builder
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Get weights path
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_local() {
        let config = ModelConfig::from_local("/path/to/model.safetensors")
            .with_device(DeviceType::Cpu);

        assert_eq!(config.path, PathBuf::from("/path/to/model.safetensors"));
        assert_eq!(config.resolved_format().unwrap(), ModelFormat::SafeTensors);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ModelFormat::from_path(Path::new("m.pth")).unwrap(),
            ModelFormat::PyTorch
        );
        assert_eq!(
            ModelFormat::from_path(Path::new("M.SAFETENSORS")).unwrap(),
            ModelFormat::SafeTensors
        );
        assert!(ModelFormat::from_path(Path::new("plant_disease_model_v1.h5")).is_err());
        assert!(ModelFormat::from_path(Path::new("weights")).is_err());
    }

    #[test]
    fn test_explicit_format_wins() {
        let config = ModelConfig::from_local("weights").with_format(ModelFormat::PyTorch);
        assert_eq!(config.resolved_format().unwrap(), ModelFormat::PyTorch);
    }

    #[test]
    fn test_device_parsing() {
        assert_eq!("cpu".parse::<DeviceType>().unwrap(), DeviceType::Cpu);
        assert_eq!("CUDA:1".parse::<DeviceType>().unwrap(), DeviceType::Cuda(1));
        assert_eq!("metal".parse::<DeviceType>().unwrap(), DeviceType::Metal(0));
        assert!("tpu".parse::<DeviceType>().is_err());
        assert!("cuda:x".parse::<DeviceType>().is_err());
    }

    #[test]
    fn test_device_display_round_trips() {
        for device in [DeviceType::Cpu, DeviceType::Cuda(2), DeviceType::Metal(0)] {
            assert_eq!(device.to_string().parse::<DeviceType>().unwrap(), device);
        }
    }

    #[test]
    fn test_missing_model_is_config_error() {
        let config = ModelConfig::from_local("/nonexistent/plant_disease_model_v1.safetensors");
        let err = LoadedModel::load(&config).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
