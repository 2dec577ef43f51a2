//! Model loading tests
//!
//! Writes SafeTensors artifacts to a temp dir with Candle's VarMap and
//! loads them back through the same path the server uses at startup.

use blightcheck_classifiers::{
    ImageClassifier, ModelConfig, ModelHost, PlantDiseaseClassifier, PlantDiseaseCnn,
};
use blightcheck_core::{Error, ImageBatch, PixelGrid, PLANT_DISEASE_LABELS};
use candle_core::{DType, Device};
use candle_nn::{Init, VarBuilder, VarMap};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Save a randomly initialised network and return its path
fn write_random_model(dir: &Path) -> PathBuf {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    PlantDiseaseCnn::new(vb).unwrap();

    let path = dir.join("plant_disease_model_v1.safetensors");
    varmap.save(&path).unwrap();
    path
}

fn leaf_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_load_saved_model() {
    let dir = TempDir::new().unwrap();
    let path = write_random_model(dir.path());

    let classifier = PlantDiseaseClassifier::from_config(&ModelConfig::from_local(&path)).unwrap();
    assert_eq!(classifier.name(), "plant_disease_model_v1");

    let scores = classifier
        .infer(ImageBatch::single(PixelGrid::filled([90, 160, 70])))
        .await
        .unwrap();

    // softmax output
    let sum: f32 = scores.as_slice().iter().sum();
    assert!((sum - 1.0).abs() < 1e-4, "scores sum to {}", sum);
    assert!(scores.as_slice().iter().all(|s| (0.0..=1.0).contains(s)));
}

#[tokio::test]
async fn test_host_predictions_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let path = write_random_model(dir.path());
    let host = ModelHost::load(&ModelConfig::from_local(&path)).unwrap();
    host.verify().await.unwrap();

    let upload = leaf_png(320, 240);
    let first = host.predict(upload.clone()).await.unwrap();
    let second = host.predict(upload).await.unwrap();

    assert_eq!(first, second);
    assert!(PLANT_DISEASE_LABELS.contains(&first.label.as_str()));
    assert!((0.0..=1.0).contains(&first.confidence));
}

#[tokio::test]
async fn test_any_image_size_fits_the_model() {
    let dir = TempDir::new().unwrap();
    let path = write_random_model(dir.path());
    let host = ModelHost::load(&ModelConfig::from_local(&path)).unwrap();

    for (width, height) in [(1, 1), (255, 257), (1024, 64)] {
        let result = host.predict(leaf_png(width, height)).await;
        assert!(result.is_ok(), "{}x{} failed: {:?}", width, height, result.err());
    }
}

#[test]
fn test_missing_artifact_fails_startup() {
    let dir = TempDir::new().unwrap();
    let config = ModelConfig::from_local(dir.path().join("missing.safetensors"));

    let err = ModelHost::load(&config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_corrupt_artifact_fails_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.safetensors");
    std::fs::write(&path, b"this is not a safetensors header").unwrap();

    let err = ModelHost::load(&ModelConfig::from_local(&path)).unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}

#[test]
fn test_incompatible_artifact_fails_startup() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wrong_shape.safetensors");

    let varmap = VarMap::new();
    varmap
        .get((4, 4), "conv1.weight", Init::Const(0.0), DType::F32, &Device::Cpu)
        .unwrap();
    varmap.save(&path).unwrap();

    let err = ModelHost::load(&ModelConfig::from_local(&path)).unwrap_err();
    assert!(matches!(err, Error::Model(_)));
}

#[test]
fn test_keras_artifact_is_rejected_with_hint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plant_disease_model_v1.h5");
    std::fs::write(&path, b"\x89HDF\r\n\x1a\n").unwrap();

    let err = ModelHost::load(&ModelConfig::from_local(&path)).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("SafeTensors"));
}
