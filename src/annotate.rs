// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark overlay drawing.
//!
//! Draws the detected landmarks and the limb connections of one frame on top
//! of the decoded image. Only landmarks whose visibility reaches
//! [`VISIBILITY_THRESHOLD`] are drawn.

#![allow(clippy::cast_possible_truncation)]

use image::{DynamicImage, Rgb};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::landmarks::FrameLandmarks;

/// Minimum visibility for a landmark to be drawn.
pub const VISIBILITY_THRESHOLD: f64 = 0.5;

/// Ultralytics Pose Color Palette
pub const POSE_COLORS: [[u8; 3]; 20] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [255, 178, 102], // #ffb266
    [230, 230, 0],   // #e6e600
    [255, 153, 255], // #ff99ff
    [153, 204, 255], // #99ccff
    [255, 102, 255], // #ff66ff
    [255, 51, 255],  // #ff33ff
    [102, 178, 255], // #66b2ff
    [51, 153, 255],  // #3399ff
    [255, 153, 153], // #ff9999
    [255, 102, 102], // #ff6666
    [255, 51, 51],   // #ff3333
    [153, 255, 153], // #99ff99
    [102, 255, 102], // #66ff66
    [51, 255, 51],   // #33ff33
    [0, 255, 0],     // #00ff00
    [0, 0, 255],     // #0000ff
    [255, 0, 0],     // #ff0000
    [255, 255, 255], // #ffffff
];

/// Palette index per COCO limb (legs, torso, arms, face).
const LIMB_COLOR_INDICES: [usize; 19] = [
    0, 0, 0, 0, 7, 7, 7, 9, 9, 9, 9, 9, 16, 16, 16, 16, 16, 16, 16,
];

/// Palette index per COCO keypoint (face, arms, legs).
const KPT_COLOR_INDICES: [usize; 17] = [16, 16, 16, 16, 16, 9, 9, 9, 9, 9, 9, 0, 0, 0, 0, 0, 0];

fn palette(index: usize) -> Rgb<u8> {
    Rgb(POSE_COLORS[index % POSE_COLORS.len()])
}

fn limb_color(limb: usize) -> Rgb<u8> {
    palette(LIMB_COLOR_INDICES.get(limb).copied().unwrap_or(limb))
}

fn keypoint_color(id: u32) -> Rgb<u8> {
    let id = id as usize;
    palette(KPT_COLOR_INDICES.get(id).copied().unwrap_or(id))
}

/// Draw landmarks and connections on a copy of `image`.
///
/// # Arguments
///
/// * `image` - Decoded frame.
/// * `landmarks` - Observations of this frame, normalized to the frame size.
/// * `connections` - Landmark id pairs to join with a line.
#[must_use]
pub fn annotate_frame(
    image: &DynamicImage,
    landmarks: &FrameLandmarks,
    connections: &[[u32; 2]],
) -> DynamicImage {
    let mut img = image.to_rgb8();
    if landmarks.is_empty() {
        return DynamicImage::ImageRgb8(img);
    }

    let (width, height) = img.dimensions();
    let (w, h) = (f64::from(width), f64::from(height));
    let radius = (width.min(height) / 160).max(2) as i32;

    let pixel = |id: u32| {
        landmarks
            .get(id)
            .filter(|obs| obs.visibility >= VISIBILITY_THRESHOLD)
            .map(|obs| ((obs.x * w) as f32, (obs.y * h) as f32))
    };

    for (limb, &[a, b]) in connections.iter().enumerate() {
        if let (Some(start), Some(end)) = (pixel(a), pixel(b)) {
            draw_line_segment_mut(&mut img, start, end, limb_color(limb));
        }
    }

    for obs in landmarks {
        if let Some((x, y)) = pixel(obs.id) {
            draw_filled_circle_mut(
                &mut img,
                (x.round() as i32, y.round() as i32),
                radius,
                keypoint_color(obs.id),
            );
        }
    }

    DynamicImage::ImageRgb8(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::JointObservation;
    use crate::pose::COCO_CONNECTIONS;
    use image::RgbImage;

    fn blank(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(w, h))
    }

    #[test]
    fn test_empty_frame_unchanged() {
        let img = blank(32, 32);
        let out = annotate_frame(&img, &FrameLandmarks::empty(), &COCO_CONNECTIONS);
        assert_eq!(out.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_draws_visible_landmarks() {
        let frame = FrameLandmarks::new(vec![
            JointObservation::new(5, 0.25, 0.5, 0.0, 0.9),
            JointObservation::new(6, 0.75, 0.5, 0.0, 0.9),
            JointObservation::new(0, 0.5, 0.1, 0.0, 0.1),
        ])
        .unwrap();
        let out = annotate_frame(&blank(64, 64), &frame, &COCO_CONNECTIONS).to_rgb8();

        // Limb 7 joins shoulders 5 and 6 along row 32.
        assert_eq!(*out.get_pixel(32, 32), limb_color(7));
        // Keypoint 5 is drawn at its own position.
        assert_eq!(*out.get_pixel(16, 32), keypoint_color(5));
        // The nose is below the visibility threshold.
        assert_eq!(*out.get_pixel(32, 6), Rgb([0, 0, 0]));
    }
}
