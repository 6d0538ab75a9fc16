use image::imageops::FilterType;
use ndarray::Array4;
use thiserror::Error;

/// Spatial resolution the classifier was trained on.
pub const INPUT_SIZE: u32 = 160;

const CHANNELS: usize = 3;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Normalized NHWC tensor of shape (1, 160, 160, 3) with values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput(Array4<f32>);

impl ModelInput {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    /// Elements in NHWC row-major order, the layout the graph expects.
    pub fn to_flat_vec(&self) -> Vec<f32> {
        self.0.iter().copied().collect()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.0
    }
}

/// Decodes `image_data`, stretches it to 160x160 with nearest-neighbour
/// sampling (aspect ratio is not preserved) and scales pixels into [0, 1].
pub fn preprocess(image_data: &[u8]) -> Result<ModelInput, PreprocessError> {
    let img = image::load_from_memory(image_data)?;
    let rgb = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Nearest)
        .to_rgb8();

    let size = INPUT_SIZE as usize;
    let tensor = Array4::from_shape_fn((1, size, size, CHANNELS), |(_, y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    });
    Ok(ModelInput(tensor))
}
