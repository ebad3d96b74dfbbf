// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Small geometry helpers.

/// Calculate `IoU` (Intersection over Union) between two bounding boxes
///
/// # Arguments
///
/// * `box1` - First bounding box [x1, y1, x2, y2]
/// * `box2` - Second bounding box [x1, y1, x2, y2]
///
/// # Returns
///
/// `IoU` value between 0.0 and 1.0
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = box_area(box1) + box_area(box2) - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Area of a box `[x1, y1, x2, y2]`, zero when degenerate.
#[must_use]
pub fn box_area(bbox: &[f32; 4]) -> f32 {
    (bbox[2] - bbox[0]).max(0.0) * (bbox[3] - bbox[1]).max(0.0)
}

/// Normalize a pixel coordinate to [0, 1] of the given extent.
#[must_use]
pub fn normalize(value: f32, extent: u32) -> f64 {
    if extent == 0 {
        0.0
    } else {
        f64::from(value) / f64::from(extent)
    }
}
