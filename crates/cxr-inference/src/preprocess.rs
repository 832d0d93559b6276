//! Image preprocessing.
//!
//! Pure functions with no shared state: safe to run on any number of
//! blocking threads in parallel and testable without a model.

use image::imageops::{self, FilterType};
use image::GenericImageView;
use ndarray::Array4;

use crate::error::{InferenceError, InferenceResult};

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 128;

/// Model input: `[1, 128, 128, 1]` (NHWC) grayscale intensities in [0, 1].
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
    original_width: u32,
    original_height: u32,
}

impl ImageTensor {
    /// All-zeros input, used for warmup.
    pub fn zeros() -> Self {
        let size = INPUT_SIZE as usize;
        Self {
            data: Array4::zeros((1, size, size, 1)),
            original_width: INPUT_SIZE,
            original_height: INPUT_SIZE,
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    /// Shape and row-major values, as handed to the runtime.
    pub fn to_shape_and_values(&self) -> (Vec<usize>, Vec<f32>) {
        (self.data.shape().to_vec(), self.data.iter().copied().collect())
    }

    pub fn original_width(&self) -> u32 {
        self.original_width
    }

    pub fn original_height(&self) -> u32 {
        self.original_height
    }

    /// Original dimensions formatted as `WxH`.
    pub fn image_size(&self) -> String {
        format!("{}x{}", self.original_width, self.original_height)
    }
}

/// Decode an uploaded image and convert it to the model input.
///
/// Grayscale, stretched to 128x128 (aspect ratio is not preserved),
/// scaled by 1/255.
pub fn preprocess(bytes: &[u8]) -> InferenceResult<ImageTensor> {
    if bytes.is_empty() {
        return Err(InferenceError::invalid_image("Empty upload"));
    }

    let img = image::load_from_memory(bytes).map_err(|e| {
        InferenceError::invalid_image(format!("Could not decode the image: {}", e))
    })?;
    let (original_width, original_height) = img.dimensions();
    if original_width == 0 || original_height == 0 {
        return Err(InferenceError::invalid_image("Image has no pixels"));
    }

    let gray = img.to_luma8();
    let resized = imageops::resize(&gray, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let data = Array4::from_shape_fn((1, size, size, 1), |(_, y, x, _)| {
        f32::from(resized.get_pixel(x as u32, y as u32)[0]) / 255.0
    });

    Ok(ImageTensor {
        data,
        original_width,
        original_height,
    })
}
