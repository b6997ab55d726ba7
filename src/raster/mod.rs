//! Raster utilities
//!
//! Working representation for decoded images. Every transform returns a new
//! buffer; nothing here mutates shared pixel data. Pixels are RGBA bytes.

use crate::error::{AnalysisError, Result};
use image::GenericImageView;

/// An immutable RGBA pixel buffer.
#[derive(Debug, Clone)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterBuffer {
    /// Wrap raw RGBA bytes. Both dimensions must be nonzero and the length
    /// exactly `width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnalysisError::Config(format!(
                "raster dimensions {}x{} must be nonzero",
                width, height
            )));
        }
        let expected = (width as usize) * (height as usize) * 4;
        if data.len() != expected {
            return Err(AnalysisError::Config(format!(
                "raster data length {} does not match {}x{} RGBA",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, data })
    }

    /// Expand a single-channel gray plane into an opaque RGBA buffer.
    /// The plane is truncated or zero-padded to `width * height`.
    pub fn from_gray_plane(width: u32, height: u32, plane: &[u8]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for i in 0..pixels {
            let v = plane.get(i).copied().unwrap_or(0);
            data.extend_from_slice(&[v, v, v, 255]);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode encoded image bytes (PNG, JPEG, GIF, WebP...) into a buffer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)?;
        let (width, height) = img.dimensions();
        let rgba = img.to_rgba8();
        Ok(Self {
            width,
            height,
            data: rgba.into_raw(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luma (perceptual brightness) of the pixel at (x, y), 0-255.
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let idx = ((y * self.width + x) * 4) as usize;
        let r = self.data[idx] as f32;
        let g = self.data[idx + 1] as f32;
        let b = self.data[idx + 2] as f32;
        (0.299 * r + 0.587 * g + 0.114 * b) as u8
    }

    /// RGB channels of the pixel at (x, y).
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = ((y * self.width + x) * 4) as usize;
        (self.data[idx], self.data[idx + 1], self.data[idx + 2])
    }

    /// Resize to exact target dimensions using bilinear interpolation.
    pub fn resize(&self, new_width: u32, new_height: u32) -> RasterBuffer {
        if new_width == self.width && new_height == self.height {
            return self.clone();
        }

        let mut result = vec![0u8; (new_width as usize) * (new_height as usize) * 4];

        let w = self.width as usize;
        let h = self.height as usize;
        let nw = new_width as usize;
        let x_ratio = self.width as f32 / new_width as f32;
        let y_ratio = self.height as f32 / new_height as f32;

        for ny in 0..new_height as usize {
            for nx in 0..nw {
                let src_x = nx as f32 * x_ratio;
                let src_y = ny as f32 * y_ratio;

                let x0 = (src_x.floor() as usize).min(w - 1);
                let y0 = (src_y.floor() as usize).min(h - 1);
                let x1 = (x0 + 1).min(w - 1);
                let y1 = (y0 + 1).min(h - 1);

                let x_weight = src_x - src_x.floor();
                let y_weight = src_y - src_y.floor();

                let dst_idx = (ny * nw + nx) * 4;

                for c in 0..4 {
                    let p00 = self.data[(y0 * w + x0) * 4 + c] as f32;
                    let p10 = self.data[(y0 * w + x1) * 4 + c] as f32;
                    let p01 = self.data[(y1 * w + x0) * 4 + c] as f32;
                    let p11 = self.data[(y1 * w + x1) * 4 + c] as f32;

                    let top = p00 * (1.0 - x_weight) + p10 * x_weight;
                    let bottom = p01 * (1.0 - x_weight) + p11 * x_weight;
                    let value = top * (1.0 - y_weight) + bottom * y_weight;

                    result[dst_idx + c] = value.clamp(0.0, 255.0) as u8;
                }
            }
        }

        RasterBuffer {
            width: new_width,
            height: new_height,
            data: result,
        }
    }

    /// Resize preserving aspect ratio so the width does not exceed `max_width`.
    /// Returns a clone if already narrow enough.
    pub fn downsample_to_width(&self, max_width: u32) -> RasterBuffer {
        if self.width <= max_width {
            return self.clone();
        }
        let scale = max_width as f32 / self.width as f32;
        let new_height = ((self.height as f32 * scale) as u32).max(1);
        self.resize(max_width, new_height)
    }

    /// Crop a fractional region out of the buffer. Degenerate regions that
    /// round to zero pixels yield a 1x1 crop rather than an empty buffer.
    pub fn crop(&self, region: &FractionalRegion) -> RasterBuffer {
        let (x, y, cw, ch) = region.to_pixels(self.width, self.height);

        let mut data = Vec::with_capacity((cw as usize) * (ch as usize) * 4);
        for row in y..(y + ch) {
            let start = ((row * self.width + x) * 4) as usize;
            let end = start + (cw * 4) as usize;
            data.extend_from_slice(&self.data[start..end]);
        }

        RasterBuffer {
            width: cw,
            height: ch,
            data,
        }
    }

    /// Encode to PNG bytes (used by the subprocess engine).
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let img = image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| AnalysisError::Config("raster buffer is internally inconsistent".to_string()))?;
        let mut out = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut out);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}

/// Resolution-independent region descriptor, all fields in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FractionalRegion {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl FractionalRegion {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// The whole image.
    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Check the region invariants: non-negative origin, positive size,
    /// fully contained in the unit square.
    pub fn validate(&self) -> Result<()> {
        let ok = self.x >= 0.0
            && self.y >= 0.0
            && self.w > 0.0
            && self.h > 0.0
            && self.x + self.w <= 1.0 + f32::EPSILON
            && self.y + self.h <= 1.0 + f32::EPSILON;
        if ok {
            Ok(())
        } else {
            Err(AnalysisError::Config(format!(
                "fractional region out of bounds: x={} y={} w={} h={}",
                self.x, self.y, self.w, self.h
            )))
        }
    }

    /// Convert to a clamped pixel rectangle `(x, y, w, h)` for a buffer of
    /// the given dimensions. Width and height are at least 1.
    pub fn to_pixels(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = ((self.x * width as f32) as u32).min(width.saturating_sub(1));
        let y = ((self.y * height as f32) as u32).min(height.saturating_sub(1));
        let w = ((self.w * width as f32).round() as u32).clamp(1, width - x);
        let h = ((self.h * height as f32).round() as u32).clamp(1, height - y);
        (x, y, w, h)
    }

    /// Aspect ratio as height / width. Used to decide line vs block layout.
    pub fn aspect(&self) -> f32 {
        if self.w <= 0.0 {
            return f32::INFINITY;
        }
        self.h / self.w
    }

    /// Intersection-over-union with another region.
    pub fn iou(&self, other: &FractionalRegion) -> f32 {
        let ix0 = self.x.max(other.x);
        let iy0 = self.y.max(other.y);
        let ix1 = (self.x + self.w).min(other.x + other.w);
        let iy1 = (self.y + self.h).min(other.y + other.h);

        let iw = (ix1 - ix0).max(0.0);
        let ih = (iy1 - iy0).max(0.0);
        let intersection = iw * ih;

        let union = self.w * self.h + other.w * other.h - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_buffer(width: u32, height: u32, rgba: [u8; 4]) -> RasterBuffer {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        RasterBuffer::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn test_from_rgba_rejects_wrong_length() {
        let result = RasterBuffer::from_rgba(2, 2, vec![0u8; 15]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_rgba_rejects_zero_dimensions() {
        assert!(RasterBuffer::from_rgba(0, 0, Vec::new()).is_err());
        assert!(RasterBuffer::from_rgba(0, 4, Vec::new()).is_err());
        assert!(RasterBuffer::from_rgba(4, 0, Vec::new()).is_err());
    }

    #[test]
    fn test_luma_channels() {
        let buf = solid_buffer(1, 1, [255, 0, 0, 255]);
        // 0.299 * 255 = 76
        assert_eq!(buf.luma_at(0, 0), 76);
    }

    #[test]
    fn test_resize_dimensions() {
        let buf = solid_buffer(4, 4, [100, 100, 100, 255]);
        let resized = buf.resize(2, 2);
        assert_eq!(resized.width(), 2);
        assert_eq!(resized.height(), 2);
        assert_eq!(resized.data().len(), 2 * 2 * 4);
        // Solid image stays solid
        assert_eq!(resized.rgb_at(1, 1), (100, 100, 100));
    }

    #[test]
    fn test_downsample_noop_when_narrow() {
        let buf = solid_buffer(10, 5, [0, 0, 0, 255]);
        let out = buf.downsample_to_width(320);
        assert_eq!(out.width(), 10);
        assert_eq!(out.height(), 5);
    }

    #[test]
    fn test_downsample_preserves_aspect() {
        let buf = solid_buffer(100, 50, [0, 0, 0, 255]);
        let out = buf.downsample_to_width(50);
        assert_eq!(out.width(), 50);
        assert_eq!(out.height(), 25);
    }

    #[test]
    fn test_crop_quarter() {
        let mut data = vec![0u8; 4 * 4 * 4];
        // Bottom-right quadrant white
        for y in 2..4u32 {
            for x in 2..4u32 {
                let idx = ((y * 4 + x) * 4) as usize;
                data[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        let buf = RasterBuffer::from_rgba(4, 4, data).unwrap();
        let crop = buf.crop(&FractionalRegion::new(0.5, 0.5, 0.5, 0.5));
        assert_eq!(crop.width(), 2);
        assert_eq!(crop.height(), 2);
        assert_eq!(crop.rgb_at(0, 0), (255, 255, 255));
    }

    #[test]
    fn test_region_validate_bounds() {
        assert!(FractionalRegion::new(0.0, 0.0, 1.0, 1.0).validate().is_ok());
        assert!(FractionalRegion::new(0.5, 0.0, 0.6, 0.5).validate().is_err());
        assert!(FractionalRegion::new(0.0, 0.0, 0.0, 0.5).validate().is_err());
        assert!(FractionalRegion::new(-0.1, 0.0, 0.5, 0.5).validate().is_err());
    }

    #[test]
    fn test_region_iou_identical() {
        let r = FractionalRegion::new(0.1, 0.1, 0.5, 0.5);
        assert!((r.iou(&r) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_region_iou_disjoint() {
        let a = FractionalRegion::new(0.0, 0.0, 0.2, 0.2);
        let b = FractionalRegion::new(0.8, 0.8, 0.2, 0.2);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_aspect_line_vs_block() {
        let line = FractionalRegion::new(0.0, 0.0, 1.0, 0.1);
        let block = FractionalRegion::new(0.0, 0.0, 0.5, 0.5);
        assert!(line.aspect() <= 0.18);
        assert!(block.aspect() > 0.18);
    }

    #[test]
    fn test_png_roundtrip() {
        let buf = solid_buffer(3, 3, [10, 20, 30, 255]);
        let png = buf.to_png().unwrap();
        let decoded = RasterBuffer::decode(&png).unwrap();
        assert_eq!(decoded.width(), 3);
        assert_eq!(decoded.rgb_at(1, 1), (10, 20, 30));
    }
}
