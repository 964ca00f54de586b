//! Image-to-tensor transform matching the one the classifier was trained with:
//! resize the shorter side to 256, center crop 224x224, scale to [0, 1] and
//! normalize with the ImageNet channel statistics. Any drift here degrades
//! accuracy silently, so the constants are fixed.

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

use crate::errors::PreprocessError;

pub const RESIZE_SHORTER_SIDE: u32 = 256;
pub const CROP_SIZE: u32 = 224;
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];
/// Longest side over shortest side. Bounds the resized buffer to
/// 256 x 4096 pixels whatever the upload's shape.
pub const MAX_ASPECT_RATIO: u32 = 16;

/// Normalized CHW pixel data for a single RGB image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: u32,
    width: u32,
}

impl ImageTensor {
    pub const CHANNELS: u32 = 3;

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// `[channels, height, width]`
    pub fn shape(&self) -> [usize; 3] {
        [
            Self::CHANNELS as usize,
            self.height as usize,
            self.width as usize,
        ]
    }

    /// Value at channel `c`, row `y`, column `x`.
    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        let (h, w) = (self.height as usize, self.width as usize);
        if c >= Self::CHANNELS as usize || y >= h || x >= w {
            return None;
        }
        self.data.get(c * h * w + y * w + x).copied()
    }
}

/// Decodes an upload and converts it to 8-bit RGB.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    Ok(match img {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    })
}

/// Full training-time transform.
pub fn preprocess(image: &RgbImage) -> Result<ImageTensor, PreprocessError> {
    let resized = resize_shorter_side(image, RESIZE_SHORTER_SIDE)?;
    let cropped = center_crop(&resized, CROP_SIZE);
    Ok(to_normalized_tensor(&cropped))
}

/// Scales so the shorter side equals `target`, keeping the aspect ratio.
/// The longer side is truncated, not rounded.
pub fn resize_shorter_side(image: &RgbImage, target: u32) -> Result<RgbImage, PreprocessError> {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = resized_dimensions(width, height, target)?;

    if (new_width, new_height) == (width, height) {
        return Ok(image.clone());
    }
    // Triangle is bilinear with the support widened when downscaling.
    Ok(imageops::resize(image, new_width, new_height, FilterType::Triangle))
}

/// Output size of [`resize_shorter_side`], checked before anything is allocated.
pub fn resized_dimensions(
    width: u32,
    height: u32,
    target: u32,
) -> Result<(u32, u32), PreprocessError> {
    let (short, long) = (width.min(height), width.max(height));
    if short == 0 {
        return Err(PreprocessError::Empty);
    }
    let too_wide = PreprocessError::ExtremeAspectRatio {
        width,
        height,
        max_ratio: MAX_ASPECT_RATIO,
    };
    if u64::from(long) > u64::from(short) * u64::from(MAX_ASPECT_RATIO) {
        return Err(too_wide);
    }

    let scaled = u64::from(target) * u64::from(long) / u64::from(short);
    let scaled = u32::try_from(scaled).map_err(|_| too_wide)?.max(1);
    Ok(if width <= height {
        (target, scaled)
    } else {
        (scaled, target)
    })
}

/// Crops a centered `size` x `size` square. Images smaller than `size` are
/// zero-padded around the center first.
pub fn center_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width < size || height < size {
        let mut padded = RgbImage::new(width.max(size), height.max(size));
        let x = (padded.width() - width) / 2;
        let y = (padded.height() - height) / 2;
        imageops::overlay(&mut padded, image, i64::from(x), i64::from(y));
        return center_crop(&padded, size);
    }

    let left = crop_offset(width, size);
    let top = crop_offset(height, size);
    image.view(left, top, size, size).to_image()
}

/// Half the excess, rounding exact halves to the even neighbour.
fn crop_offset(dim: u32, size: u32) -> u32 {
    (f64::from(dim - size) / 2.0).round_ties_even() as u32
}

pub fn to_normalized_tensor(image: &RgbImage) -> ImageTensor {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; plane * ImageTensor::CHANNELS as usize];

    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for c in 0..ImageTensor::CHANNELS as usize {
            let scaled = f32::from(pixel[c]) / 255.0;
            data[c * plane + offset] = (scaled - CHANNEL_MEAN[c]) / CHANNEL_STD[c];
        }
    }

    ImageTensor {
        data,
        height,
        width,
    }
}
