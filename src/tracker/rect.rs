/// Axis-aligned bounding box in pixel space.
///
/// Stored as corners (x1, y1, x2, y2). The Kalman filter observes boxes in
/// the SORT measurement layout `[cx, cy, s, r]`: center, area (scale) and
/// aspect ratio (w/h).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Rect {
    /// Create a Rect from corner coordinates.
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a Rect from top-left corner and dimensions.
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::from_tlbr(x, y, x + width, y + height)
    }

    /// Rebuild a box from a `[cx, cy, s, r]` measurement.
    ///
    /// A negative scale or aspect yields NaN sides; callers check
    /// [`Rect::is_finite`] before using the result.
    pub fn from_z(z: [f64; 4]) -> Self {
        let [cx, cy, s, r] = z;
        let w = (s * r).sqrt();
        let h = s / w;
        Self::from_tlbr(
            (cx - w / 2.0) as f32,
            (cy - h / 2.0) as f32,
            (cx + w / 2.0) as f32,
            (cy + h / 2.0) as f32,
        )
    }

    /// Convert to the `[cx, cy, s, r]` measurement.
    pub fn to_z(&self) -> [f64; 4] {
        let w = self.width() as f64;
        let h = self.height() as f64;
        let (cx, cy) = self.center();
        [cx as f64, cy as f64, w * h, w / h]
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Area of the box; inverted boxes count as empty.
    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.to_tlbr().iter().all(|v| v.is_finite())
    }

    /// Calculate Intersection over Union (IoU) with another bounding box.
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter_width = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let inter_height = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter_area = inter_width * inter_height;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }
}

use ndarray::Array2;

/// Calculate IoU matrix between two sets of bounding boxes.
///
/// Returns a matrix of shape (M, N) where M is the length of `boxes_a`
/// and N is the length of `boxes_b`.
pub fn iou_batch(boxes_a: &[Rect], boxes_b: &[Rect]) -> Array2<f32> {
    let mut ious = Array2::zeros((boxes_a.len(), boxes_b.len()));
    for (i, a) in boxes_a.iter().enumerate() {
        for (j, b) in boxes_b.iter().enumerate() {
            ious[[i, j]] = a.iou(b);
        }
    }
    ious
}
