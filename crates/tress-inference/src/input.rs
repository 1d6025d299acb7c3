//! Validated input tensors for the analysis model
//!
//! Preprocessing (decode, resize, normalize) happens upstream; this type
//! is the boundary where the runtime enforces its input contract. A
//! constructed [`AnalysisInput`] is guaranteed well-shaped and in range,
//! so the forward pass never has to re-check.

use crate::error::{ModelError, ModelResult};

/// Hard ceiling on input size, independent of configured dimensions.
/// 64 MB of f32s is far beyond any supported resolution; anything larger
/// is a malformed or hostile request.
pub const MAX_INPUT_BYTES: usize = 64 * 1024 * 1024;

/// One normalized image frame, `height × width × 3` channels, f32 in [0, 1].
///
/// Consumed once per request; not reused across requests.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    data: Vec<f32>,
    height: usize,
    width: usize,
}

impl AnalysisInput {
    /// Build an input tensor, validating shape, byte budget, and value range.
    pub fn new(data: Vec<f32>, height: usize, width: usize) -> ModelResult<Self> {
        if height == 0 || width == 0 {
            return Err(ModelError::Validation(format!(
                "input dimensions must be non-zero, got {height}x{width}"
            )));
        }

        let expected = height * width * 3;
        if data.len() != expected {
            return Err(ModelError::Validation(format!(
                "expected {expected} elements for {height}x{width}x3, got {}",
                data.len()
            )));
        }

        let bytes = data.len() * std::mem::size_of::<f32>();
        if bytes > MAX_INPUT_BYTES {
            return Err(ModelError::Validation(format!(
                "input of {bytes} bytes exceeds the {MAX_INPUT_BYTES}-byte budget"
            )));
        }

        if let Some(bad) = data.iter().find(|v| !(0.0..=1.0).contains(*v) || v.is_nan()) {
            return Err(ModelError::Validation(format!(
                "input values must be normalized to [0, 1], found {bad}"
            )));
        }

        Ok(Self {
            data,
            height,
            width,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw little-endian byte view of the tensor, used for content
    /// fingerprinting. Byte-identical frames produce byte-identical output.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() * 4);
        for v in &self.data {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    /// Check this input against the dimensions a model was configured for.
    pub fn check_dims(&self, height: usize, width: usize) -> ModelResult<()> {
        if self.height != height || self.width != width {
            return Err(ModelError::Validation(format!(
                "model expects {height}x{width} input, got {}x{}",
                self.height, self.width
            )));
        }
        Ok(())
    }
}
