//! Server configuration

use blightcheck_classifiers::ModelConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen host (name or address)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Model artifact and inference device
    #[serde(default)]
    pub model: ModelConfig,

    /// Largest accepted request body on /predict
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &crate::Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", config_path, e))?
        } else {
            Self::default()
        };

        // Apply CLI overrides
        if let Some(host) = &cli.host {
            config.host = host.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        if let Some(model) = &cli.model {
            config.model.path = model.clone();
        }

        if let Some(device) = cli.device {
            config.model.device = device;
        }

        if let Some(limit) = cli.max_upload_bytes {
            config.max_upload_bytes = limit;
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model: ModelConfig::default(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3002
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use blightcheck_classifiers::DeviceType;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("blightcheck").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");

        let config = ServerConfig::load(path.to_str().unwrap(), &cli(&[])).unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3002);
        assert_eq!(
            config.model.path,
            PathBuf::from("../model/plant_disease_model_v1.safetensors")
        );
        assert_eq!(config.model.device, DeviceType::Cpu);
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_file_values_are_used() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blightcheck.yaml");
        std::fs::write(
            &path,
            "host: 0.0.0.0\nport: 8000\nmodel:\n  path: /models/leaf.safetensors\n  device: cuda:1\n",
        )
        .unwrap();

        let config = ServerConfig::load(path.to_str().unwrap(), &cli(&[])).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.model.path, PathBuf::from("/models/leaf.safetensors"));
        assert_eq!(config.model.device, DeviceType::Cuda(1));
        assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_cli_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blightcheck.yaml");
        std::fs::write(&path, "port: 8000\n").unwrap();

        let config = ServerConfig::load(
            path.to_str().unwrap(),
            &cli(&["--port", "9100", "--model", "weights.pth", "--device", "cpu"]),
        )
        .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.model.path, PathBuf::from("weights.pth"));
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blightcheck.yaml");
        std::fs::write(&path, "port: [not a number\n").unwrap();

        assert!(ServerConfig::load(path.to_str().unwrap(), &cli(&[])).is_err());
    }

    #[test]
    fn test_unknown_device_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blightcheck.yaml");
        std::fs::write(&path, "model:\n  device: tpu\n").unwrap();

        assert!(ServerConfig::load(path.to_str().unwrap(), &cli(&[])).is_err());
    }
}
