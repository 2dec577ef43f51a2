//! Image preprocessing
//!
//! Turns uploaded bytes into the fixed 256x256 RGB grid the model expects.
//! The resize is unconditional: whatever the upload's dimensions, the grid
//! handed to the model always has the input shape.

use blightcheck_core::{Error, ImageBatch, PixelGrid, Result, INPUT_SIZE};
use image::imageops::{self, FilterType};

/// Resampling filter used for the resize (bicubic)
pub const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Decode, convert to RGB, and resize to 256x256
///
/// Any format the `image` crate recognises from its magic bytes is
/// accepted. Alpha channels are dropped, not composited.
pub fn decode_image(bytes: &[u8]) -> Result<PixelGrid> {
    let decoded = image::load_from_memory(bytes).map_err(|e| Error::invalid_image(e.to_string()))?;
    tracing::trace!(
        width = decoded.width(),
        height = decoded.height(),
        "decoded upload"
    );

    let rgb = decoded.to_rgb8();
    let size = INPUT_SIZE as u32;
    let resized = imageops::resize(&rgb, size, size, RESIZE_FILTER);
    let (width, height) = resized.dimensions();

    PixelGrid::from_rgb(width, height, resized.into_raw())
}

/// Decode an upload straight into a batch of one
pub fn prepare_batch(bytes: &[u8]) -> Result<ImageBatch> {
    decode_image(bytes).map(ImageBatch::single)
}
