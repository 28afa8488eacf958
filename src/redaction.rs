//! Frame buffers and in-place region blurring.

use std::borrow::Cow;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::box_filter;
use ndarray::{Array3, s};

use crate::error::{Error, Result};
use crate::tracker::Rect;

/// BGR pixel buffer laid out as `(height, width, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pixels: Array3<u8>,
}

impl Frame {
    /// Black frame of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: Array3::zeros((height, width, 3)),
        }
    }

    /// Wrap an interleaved BGR byte buffer.
    pub fn from_bgr(width: usize, height: usize, data: Vec<u8>) -> Result<Self> {
        let expected = width * height * 3;
        if data.len() != expected {
            return Err(Error::FrameSize {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        let pixels =
            Array3::from_shape_vec((height, width, 3), data).map_err(|_| Error::FrameSize {
                width,
                height,
                expected,
                got: expected,
            })?;
        Ok(Self { pixels })
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut Array3<u8> {
        &mut self.pixels
    }

    /// Copy a region into an `image` buffer. Channels keep their BGR order.
    pub fn crop(&self, region: PixelRegion) -> RgbImage {
        let view = self
            .pixels
            .slice(s![region.y0..region.y1, region.x0..region.x1, ..]);
        RgbImage::from_fn(region.width() as u32, region.height() as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([view[[y, x, 0]], view[[y, x, 1]], view[[y, x, 2]]])
        })
    }

    /// Write a buffer taken with [`Self::crop`] back over the same region.
    /// Pixels of `patch` beyond the region are ignored.
    pub fn paste(&mut self, region: PixelRegion, patch: &RgbImage) {
        let mut view = self
            .pixels
            .slice_mut(s![region.y0..region.y1, region.x0..region.x1, ..]);
        let (rows, cols, _) = view.dim();
        for (x, y, pixel) in patch.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            if y < rows && x < cols {
                for (c, &value) in pixel.0.iter().enumerate() {
                    view[[y, x, c]] = value;
                }
            }
        }
    }

    /// Interleaved BGR bytes, borrowed when the buffer is contiguous.
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self.pixels.as_slice() {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(self.pixels.iter().copied().collect()),
        }
    }
}

/// Pixel rectangle `[x0, x1) x [y0, y1)` inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelRegion {
    /// Truncate a box to whole pixels and clamp it to the frame. Returns
    /// `None` when nothing of the box is left inside.
    pub fn clamp(rect: &Rect, width: usize, height: usize) -> Option<Self> {
        let clamp_axis = |v: f32, limit: usize| (v as i64).clamp(0, limit as i64) as usize;
        let region = Self {
            x0: clamp_axis(rect.x1, width),
            y0: clamp_axis(rect.y1, height),
            x1: clamp_axis(rect.x2, width),
            y1: clamp_axis(rect.y2, height),
        };
        (region.x1 > region.x0 && region.y1 > region.y0).then_some(region)
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// Normalised box filter applied to tracked regions.
///
/// Each region is cropped out of the frame before filtering, so the window
/// only ever sees region pixels; at the region border it repeats the edge
/// pixel. The window side is `kernel` rounded up to the next odd number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurRenderer {
    kernel: usize,
}

impl Default for BlurRenderer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl BlurRenderer {
    pub fn new(kernel: usize) -> Self {
        Self {
            kernel: kernel.max(1),
        }
    }

    pub fn kernel(&self) -> usize {
        self.kernel
    }

    /// Clamp every box to the frame and, when `enabled`, blur it in place.
    /// Returns the number of regions blurred.
    pub fn render<'a, I>(&self, frame: &mut Frame, boxes: I, enabled: bool) -> usize
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        let (width, height) = (frame.width(), frame.height());
        let mut blurred = 0;
        for rect in boxes {
            let Some(region) = PixelRegion::clamp(rect, width, height) else {
                continue;
            };
            if enabled {
                self.blur_region(frame, region);
                blurred += 1;
            }
        }
        blurred
    }

    /// Box-filter one region in place. The region must lie inside the frame.
    pub fn blur_region(&self, frame: &mut Frame, region: PixelRegion) {
        let radius = (self.kernel / 2) as u32;
        let mut patch = frame.crop(region);
        let (width, height) = patch.dimensions();

        for c in 0..3 {
            let channel =
                GrayImage::from_fn(width, height, |x, y| Luma([patch.get_pixel(x, y)[c]]));
            let filtered = box_filter(&channel, radius, radius);
            for (x, y, value) in filtered.enumerate_pixels() {
                patch.get_pixel_mut(x, y)[c] = value[0];
            }
        }
        frame.paste(region, &patch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: usize, height: usize) -> Frame {
        let data = (0..width * height * 3).map(|i| (i * 7 % 251) as u8).collect();
        Frame::from_bgr(width, height, data).unwrap()
    }

    #[test]
    fn test_frame_size_checked() {
        assert!(matches!(
            Frame::from_bgr(4, 4, vec![0; 10]),
            Err(Error::FrameSize { expected: 48, .. })
        ));
        let frame = Frame::new(6, 4);
        assert_eq!((frame.width(), frame.height()), (6, 4));
        assert_eq!(frame.to_bytes().len(), 72);
    }

    #[test]
    fn test_crop_and_paste() {
        let mut frame = gradient_frame(8, 6);
        let region = PixelRegion {
            x0: 2,
            y0: 1,
            x1: 5,
            y1: 4,
        };
        let patch = frame.crop(region);
        assert_eq!(patch.dimensions(), (3, 3));
        assert_eq!(patch.get_pixel(0, 0).0[2], frame.pixels()[[1, 2, 2]]);

        let before = frame.clone();
        frame.paste(region, &patch);
        assert_eq!(frame, before);

        frame.paste(region, &RgbImage::from_pixel(3, 3, Rgb([1, 2, 3])));
        assert_eq!(frame.pixels()[[3, 4, 1]], 2);
        assert_eq!(frame.pixels()[[4, 4, 1]], before.pixels()[[4, 4, 1]]);
    }

    #[test]
    fn test_clamp_region() {
        let rect = Rect::from_tlbr(-10.5, 5.9, 30.2, 500.0);
        let region = PixelRegion::clamp(&rect, 20, 100).unwrap();
        assert_eq!(
            region,
            PixelRegion {
                x0: 0,
                y0: 5,
                x1: 20,
                y1: 100
            }
        );
    }

    #[test]
    fn test_clamp_outside_is_none() {
        assert!(PixelRegion::clamp(&Rect::from_tlbr(-50.0, -50.0, -10.0, -10.0), 20, 20).is_none());
        assert!(PixelRegion::clamp(&Rect::from_tlbr(30.0, 0.0, 40.0, 10.0), 20, 20).is_none());
        assert!(PixelRegion::clamp(&Rect::from_tlbr(5.0, 5.0, 5.5, 9.0), 20, 20).is_none());
        assert!(PixelRegion::clamp(&Rect::from_tlbr(f32::NAN, 0.0, 5.0, 5.0), 20, 20).is_some());
    }

    #[test]
    fn test_blur_uniform_region_unchanged() {
        let mut frame = Frame::from_bgr(8, 8, vec![90; 8 * 8 * 3]).unwrap();
        let before = frame.clone();
        let renderer = BlurRenderer::new(3);
        assert_eq!(renderer.render(&mut frame, &[Rect::from_tlbr(1.0, 1.0, 7.0, 7.0)], true), 1);
        assert_eq!(frame, before);
    }

    #[test]
    fn test_blur_averages_within_region() {
        let mut frame = Frame::new(3, 1);
        frame.pixels_mut()[[0, 1, 0]] = 90;
        BlurRenderer::new(3).blur_region(
            &mut frame,
            PixelRegion {
                x0: 0,
                y0: 0,
                x1: 3,
                y1: 1,
            },
        );
        // Edge windows repeat the border pixel, so every window sums to 90.
        assert_eq!(frame.pixels()[[0, 0, 0]], 30);
        assert_eq!(frame.pixels()[[0, 1, 0]], 30);
        assert_eq!(frame.pixels()[[0, 2, 0]], 30);
        assert_eq!(frame.pixels()[[0, 1, 1]], 0);
    }

    #[test]
    fn test_blur_stays_inside_region() {
        let mut frame = gradient_frame(32, 24);
        let before = frame.clone();
        let rect = Rect::from_tlbr(4.0, 6.0, 20.0, 18.0);
        BlurRenderer::new(5).render(&mut frame, &[rect], true);

        let region = PixelRegion::clamp(&rect, 32, 24).unwrap();
        let mut changed = false;
        for ((y, x, c), &value) in frame.pixels().indexed_iter() {
            let inside = (region.y0..region.y1).contains(&y) && (region.x0..region.x1).contains(&x);
            if inside {
                changed |= value != before.pixels()[[y, x, c]];
            } else {
                assert_eq!(value, before.pixels()[[y, x, c]], "pixel ({x}, {y}) modified");
            }
        }
        assert!(changed);
    }

    #[test]
    fn test_disabled_leaves_pixels() {
        let mut frame = gradient_frame(16, 16);
        let before = frame.clone();
        let blurred =
            BlurRenderer::default().render(&mut frame, &[Rect::from_tlbr(0.0, 0.0, 16.0, 16.0)], false);
        assert_eq!(blurred, 0);
        assert_eq!(frame, before);
    }

    #[test]
    fn test_box_past_frame_edge() {
        let mut frame = gradient_frame(10, 10);
        let rect = Rect::from_tlbr(5.0, 5.0, 400.0, 400.0);
        assert_eq!(BlurRenderer::new(4).render(&mut frame, &[rect], true), 1);
    }
}
