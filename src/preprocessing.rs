// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame preprocessing for the pose model.
//!
//! Frames are letterboxed into the model input size (aspect ratio kept, gray
//! padding centered on both sides), then converted to a normalized NCHW tensor.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

use crate::error::{PipelineError, Result};

/// Letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Result of preprocessing a frame, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Frame tensor in NCHW format, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Original frame dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Letterbox geometry for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Width of the resized frame inside the canvas.
    pub new_w: u32,
    /// Height of the resized frame inside the canvas.
    pub new_h: u32,
    /// Left padding in pixels.
    pub pad_left: u32,
    /// Top padding in pixels.
    pub pad_top: u32,
    /// Scale factors (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
}

/// Compute the letterbox geometry that fits a frame into `target_size`.
///
/// # Arguments
///
/// * `orig_width` - Original frame width.
/// * `orig_height` - Original frame height.
/// * `target_size` - Model input size as (height, width).
#[must_use]
pub fn letterbox_params(orig_width: u32, orig_height: u32, target_size: (usize, usize)) -> Letterbox {
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    let (orig_h, orig_w) = (orig_height.max(1) as f32, orig_width.max(1) as f32);

    let scale = (target_h / orig_h).min(target_w / orig_w);

    let new_w = ((orig_w * scale).round() as u32).max(1);
    let new_h = ((orig_h * scale).round() as u32).max(1);

    let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
    let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

    Letterbox {
        new_w,
        new_h,
        pad_left,
        pad_top,
        scale: (new_h as f32 / orig_h, new_w as f32 / orig_w),
    }
}

/// Letterbox a frame and convert it to a model input tensor.
///
/// # Errors
///
/// Returns [`PipelineError::Image`] if the frame cannot be resized.
pub fn preprocess_image(image: &DynamicImage, target_size: (usize, usize)) -> Result<PreprocessResult> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
        return Err(PipelineError::Image("frame has zero size".to_string()));
    }
    let lb = letterbox_params(src_w, src_h, target_size);

    let src = Image::from_vec_u8(src_w, src_h, image.to_rgb8().into_raw(), PixelType::U8x3)
        .map_err(|e| PipelineError::Image(format!("invalid frame buffer: {e}")))?;
    let mut dst = Image::new(lb.new_w, lb.new_h, PixelType::U8x3);
    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| PipelineError::Image(format!("failed to resize frame: {e}")))?;

    let resized = RgbImage::from_raw(lb.new_w, lb.new_h, dst.into_vec())
        .ok_or_else(|| PipelineError::Image("resized buffer has the wrong size".to_string()))?;

    let mut canvas = RgbImage::from_pixel(
        target_size.1 as u32,
        target_size.0 as u32,
        Rgb(LETTERBOX_COLOR),
    );
    image::imageops::replace(
        &mut canvas,
        &resized,
        i64::from(lb.pad_left),
        i64::from(lb.pad_top),
    );

    Ok(PreprocessResult {
        tensor: image_to_tensor(&canvas),
        orig_shape: (src_h, src_w),
        scale: lb.scale,
        padding: (lb.pad_top as f32, lb.pad_left as f32),
    })
}

/// Convert an RGB image to a normalized NCHW tensor.
///
/// # Returns
///
/// Array4 with shape (1, 3, H, W) and values in [0, 1].
#[must_use]
pub fn image_to_tensor(image: &RgbImage) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let (w, h) = (width as usize, height as usize);

    let mut tensor = Array4::zeros((1, 3, h, w));
    for (i, px) in image.pixels().enumerate() {
        let (y, x) = (i / w, i % w);
        for c in 0..3 {
            tensor[[0, c, y, x]] = f32::from(px[c]) / 255.0;
        }
    }
    tensor
}

/// Map a point from model input space back to original frame space.
///
/// # Arguments
///
/// * `point` - (x, y) in letterboxed model space.
/// * `scale` - Scale factors (`scale_y`, `scale_x`) from preprocessing.
/// * `padding` - Padding (`pad_top`, `pad_left`) from preprocessing.
#[must_use]
pub fn scale_point(point: (f32, f32), scale: (f32, f32), padding: (f32, f32)) -> (f32, f32) {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;
    ((point.0 - pad_left) / scale_x, (point.1 - pad_top) / scale_y)
}

/// Map a box `[x1, y1, x2, y2]` from model input space back to frame space.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (x1, y1) = scale_point((coords[0], coords[1]), scale, padding);
    let (x2, y2) = scale_point((coords[2], coords[3]), scale, padding);
    [x1, y1, x2, y2]
}

/// Clip box coordinates to frame bounds `(height, width)`.
#[must_use]
pub const fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}
