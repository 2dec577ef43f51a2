//! Core types for blightcheck
//!
//! Shapes that the model contract depends on are encoded in the types:
//! a [`PixelGrid`] can only hold a 256x256 RGB image, and [`ClassScores`]
//! always has one slot per label in the [`ClassLabels`] table.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Width and height the model expects, in pixels
pub const INPUT_SIZE: usize = 256;

/// Colour channels per pixel (RGB)
pub const CHANNELS: usize = 3;

/// Number of classes the model scores
pub const NUM_CLASSES: usize = 3;

/// Labels of the plant-disease model, in output order
pub const PLANT_DISEASE_LABELS: [&str; NUM_CLASSES] = ["Early Blight", "Late Blight", "Healthy"];

const GRID_LEN: usize = INPUT_SIZE * INPUT_SIZE * CHANNELS;

/// A 256x256 RGB image, row-major with interleaved channels (HWC)
#[derive(Clone, PartialEq, Eq)]
pub struct PixelGrid {
    data: Box<[u8]>,
}

impl PixelGrid {
    /// Wrap an interleaved RGB buffer, rejecting anything that is not 256x256x3
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let (w, h) = (width as usize, height as usize);
        if w != INPUT_SIZE || h != INPUT_SIZE {
            return Err(Error::shape(
                format!("{INPUT_SIZE}x{INPUT_SIZE}x{CHANNELS}"),
                format!("{w}x{h}x{CHANNELS}"),
            ));
        }
        if data.len() != GRID_LEN {
            return Err(Error::shape(
                format!("{GRID_LEN} bytes"),
                format!("{} bytes", data.len()),
            ));
        }

        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    /// Grid filled with a single colour
    pub fn filled(rgb: [u8; CHANNELS]) -> Self {
        let data: Vec<u8> = rgb.iter().copied().cycle().take(GRID_LEN).collect();
        Self {
            data: data.into_boxed_slice(),
        }
    }

    /// Shape as (height, width, channels)
    pub const fn shape() -> (usize, usize, usize) {
        (INPUT_SIZE, INPUT_SIZE, CHANNELS)
    }

    /// Raw HWC bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// RGB value at column `x`, row `y`
    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; CHANNELS]> {
        if x >= INPUT_SIZE || y >= INPUT_SIZE {
            return None;
        }
        let offset = (y * INPUT_SIZE + x) * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }
}

impl fmt::Debug for PixelGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelGrid")
            .field("shape", &Self::shape())
            .finish_non_exhaustive()
    }
}

/// A batch holding exactly one image, shape (1, 256, 256, 3)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBatch {
    image: PixelGrid,
}

impl ImageBatch {
    /// Wrap a single image in a length-1 batch
    pub fn single(image: PixelGrid) -> Self {
        Self { image }
    }

    /// Always 1
    pub fn len(&self) -> usize {
        1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Shape as (batch, height, width, channels)
    pub const fn shape() -> [usize; 4] {
        [1, INPUT_SIZE, INPUT_SIZE, CHANNELS]
    }

    /// Images in the batch
    pub fn images(&self) -> &[PixelGrid] {
        std::slice::from_ref(&self.image)
    }
}

/// Raw model output, one score per class
///
/// Scores are not assumed to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScores([f32; NUM_CLASSES]);

impl ClassScores {
    pub fn new(scores: [f32; NUM_CLASSES]) -> Self {
        Self(scores)
    }

    /// Build from a model output vector, rejecting the wrong width
    pub fn from_slice(scores: &[f32]) -> Result<Self> {
        let scores: [f32; NUM_CLASSES] = scores.try_into().map_err(|_| {
            Error::shape(
                format!("{NUM_CLASSES} class scores"),
                format!("{} class scores", scores.len()),
            )
        })?;
        Ok(Self(scores))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// True when no score is NaN or infinite
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|s| s.is_finite())
    }

    /// Index and value of the highest score
    pub fn argmax(&self) -> (usize, f32) {
        // NUM_CLASSES > 0, so argmax always finds something
        argmax(&self.0).unwrap_or((0, self.0[0]))
    }
}

/// Index and value of the largest element, earliest index on ties
///
/// NaN never compares greater, so it only wins if it sits at index 0.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut indexed = values.iter().copied().enumerate();
    let first = indexed.next()?;
    Some(indexed.fold(first, |best, (index, value)| {
        if value > best.1 {
            (index, value)
        } else {
            best
        }
    }))
}

/// Ordered label table, index-aligned with the model's output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLabels([&'static str; NUM_CLASSES]);

impl ClassLabels {
    pub const fn new(labels: [&'static str; NUM_CLASSES]) -> Self {
        Self(labels)
    }

    /// Labels of the potato leaf disease model
    pub const fn plant_disease() -> Self {
        Self(PLANT_DISEASE_LABELS)
    }

    pub fn get(&self, index: usize) -> Option<&'static str> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    /// Map scores to the winning label and its raw score
    pub fn resolve(&self, scores: &ClassScores) -> Prediction {
        let (index, confidence) = scores.argmax();
        Prediction {
            // ClassScores and ClassLabels share NUM_CLASSES
            label: self.0[index].to_string(),
            confidence,
        }
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::plant_disease()
    }
}

/// The answer returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted class label
    #[serde(rename = "class")]
    pub label: String,

    /// Maximum raw score, not a calibrated probability
    pub confidence: f32,
}
