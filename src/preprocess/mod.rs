//! Preprocessing pipeline
//!
//! Builds multiple enhanced variants ("passes") of a region before
//! recognition. Some banner text recognizes best unprocessed, some only
//! after channel isolation or hard binarization, so the raw pass is always
//! kept as a baseline and the orchestrator tries a bounded set per region.
//!
//! All filters work on a single-channel gray plane and convert back to an
//! RGBA buffer at the end, so the rest of the pipeline only ever sees
//! [`RasterBuffer`].

use crate::raster::RasterBuffer;

/// Otsu fallback for degenerate (single-level) histograms.
const OTSU_DEFAULT: u8 = 160;
/// Maximum attempts scheduled per region.
const MAX_ATTEMPTS_PER_REGION: usize = 5;
/// Aspect ratio (h/w) at or below which a region counts as a single line.
pub const LINE_ASPECT: f32 = 0.18;

/// Pure per-pixel grayscale conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrayscaleMode {
    /// max(R, G, B); keeps saturated text bright regardless of hue.
    MaxChannel,
    /// Perceptual luma weighting.
    Luma,
    Red,
    Green,
    Blue,
    /// Synthetic channel tuned for orange/yellow banner backgrounds.
    Yellow,
}

impl GrayscaleMode {
    /// All modes, in the order passes are generated.
    pub const ALL: [GrayscaleMode; 6] = [
        GrayscaleMode::MaxChannel,
        GrayscaleMode::Luma,
        GrayscaleMode::Red,
        GrayscaleMode::Green,
        GrayscaleMode::Blue,
        GrayscaleMode::Yellow,
    ];

    /// Stable identifier used in pass ids and logs.
    pub fn name(&self) -> &'static str {
        match self {
            GrayscaleMode::MaxChannel => "max",
            GrayscaleMode::Luma => "luma",
            GrayscaleMode::Red => "red",
            GrayscaleMode::Green => "green",
            GrayscaleMode::Blue => "blue",
            GrayscaleMode::Yellow => "yellow",
        }
    }

    /// Convert one RGB pixel to a gray value.
    pub fn gray(&self, r: u8, g: u8, b: u8) -> u8 {
        match self {
            GrayscaleMode::MaxChannel => r.max(g).max(b),
            GrayscaleMode::Luma => {
                (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8
            }
            GrayscaleMode::Red => r,
            GrayscaleMode::Green => g,
            GrayscaleMode::Blue => b,
            GrayscaleMode::Yellow => {
                let v = ((r as f32 + g as f32) / 2.0) * 1.4 - b as f32 * 0.2;
                v.clamp(0.0, 255.0) as u8
            }
        }
    }
}

/// One enhanced variant of a region.
#[derive(Debug, Clone)]
pub struct PreprocessPass {
    /// Stable identifier ("raw", "blue", "hard-yellow", ...).
    pub id: String,
    pub buffer: RasterBuffer,
}

/// Knobs carried over from [`crate::config::AnalysisSettings`].
#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    pub enabled: bool,
    pub hard_threshold: bool,
    pub sharpen: bool,
    /// Box blur repetitions before thresholding, 0-3.
    pub blur_radius: u8,
    pub contrast: f32,
    pub brightness: i16,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            hard_threshold: true,
            sharpen: false,
            blur_radius: 1,
            contrast: 1.15,
            brightness: 0,
        }
    }
}

/// Build the ordered pass list for a region buffer.
///
/// Always starts with the unmodified "raw" pass. With preprocessing enabled,
/// soft (contrast-adjusted grayscale) passes follow for every mode, then
/// hard (Otsu-binarized) passes when enabled.
pub fn build_passes(buffer: &RasterBuffer, opts: &PreprocessOptions) -> Vec<PreprocessPass> {
    let mut passes = vec![PreprocessPass {
        id: "raw".to_string(),
        buffer: buffer.clone(),
    }];

    if !opts.enabled {
        return passes;
    }

    for mode in GrayscaleMode::ALL {
        let mut plane = gray_plane(buffer, mode);
        adjust_contrast_brightness(&mut plane, opts.contrast, opts.brightness);
        passes.push(PreprocessPass {
            id: mode.name().to_string(),
            buffer: plane_to_buffer(&plane, buffer.width(), buffer.height()),
        });
    }

    if opts.hard_threshold {
        for mode in GrayscaleMode::ALL {
            let mut plane = gray_plane(buffer, mode);
            if opts.sharpen {
                plane = sharpen_plane(&plane, buffer.width(), buffer.height());
            }
            for _ in 0..opts.blur_radius.min(3) {
                plane = box_blur_plane(&plane, buffer.width(), buffer.height());
            }
            // Threshold last: smoothing after binarization would only
            // reintroduce gray.
            let threshold = compute_otsu_threshold(&plane);
            binarize(&mut plane, threshold);
            passes.push(PreprocessPass {
                id: format!("hard-{}", mode.name()),
                buffer: plane_to_buffer(&plane, buffer.width(), buffer.height()),
            });
        }
    }

    passes
}

/// The single aggressive variant used when a full schedule came up
/// nearly empty: max-channel grayscale, hard Otsu threshold, no smoothing.
pub fn fallback_pass(buffer: &RasterBuffer) -> PreprocessPass {
    let mut plane = gray_plane(buffer, GrayscaleMode::MaxChannel);
    let threshold = compute_otsu_threshold(&plane);
    binarize(&mut plane, threshold);
    PreprocessPass {
        id: "hard-max".to_string(),
        buffer: plane_to_buffer(&plane, buffer.width(), buffer.height()),
    }
}

/// Select the bounded attempt set for a region.
///
/// Line-shaped regions (single row of text) and block-shaped regions have
/// different preferred orderings, learned from which passes tend to win on
/// each shape. Missing pass ids are skipped.
pub fn pick_attempts<'a>(
    passes: &'a [PreprocessPass],
    is_line: bool,
    aggressive: bool,
) -> Vec<&'a PreprocessPass> {
    let preferred: Vec<&str> = if is_line {
        let mut ids = vec!["raw", "blue", "max"];
        if aggressive {
            ids.push("hard-blue");
        }
        ids.push("yellow");
        ids
    } else {
        let mut ids = vec!["raw", "max", "yellow", "blue"];
        if aggressive {
            ids.push("hard-yellow");
        } else {
            ids.push("red");
        }
        ids
    };

    preferred
        .iter()
        .filter_map(|id| passes.iter().find(|p| p.id == *id))
        .take(MAX_ATTEMPTS_PER_REGION)
        .collect()
}

/// Otsu's method: the gray level maximizing between-class variance.
///
/// Degenerate histograms (all-black, all-white, single level) return a
/// stable default instead of an arbitrary extreme.
pub fn compute_otsu_threshold(plane: &[u8]) -> u8 {
    let mut histogram = [0u32; 256];
    for &v in plane {
        histogram[v as usize] += 1;
    }

    let total = plane.len() as u64;
    if total == 0 {
        return OTSU_DEFAULT;
    }

    let mut sum = 0u64;
    for (i, &count) in histogram.iter().enumerate() {
        sum += (i as u64) * (count as u64);
    }

    let mut sum_background = 0u64;
    let mut weight_background = 0u64;
    let mut max_variance = 0.0f64;
    let mut threshold = None;

    for (i, &count) in histogram.iter().enumerate() {
        weight_background += count as u64;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += (i as u64) * (count as u64);

        let mean_background = sum_background as f64 / weight_background as f64;
        let mean_foreground = (sum - sum_background) as f64 / weight_foreground as f64;
        let variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            threshold = Some(i as u8);
        }
    }

    threshold.unwrap_or(OTSU_DEFAULT)
}

/// Extract a single-channel gray plane under the given mode.
fn gray_plane(buffer: &RasterBuffer, mode: GrayscaleMode) -> Vec<u8> {
    let data = buffer.data();
    let mut plane = Vec::with_capacity(data.len() / 4);
    for chunk in data.chunks_exact(4) {
        plane.push(mode.gray(chunk[0], chunk[1], chunk[2]));
    }
    plane
}

/// Contrast around the midpoint, then brightness offset, clamped to bytes.
fn adjust_contrast_brightness(plane: &mut [u8], contrast: f32, brightness: i16) {
    if (contrast - 1.0).abs() < 0.01 && brightness == 0 {
        return;
    }
    for v in plane.iter_mut() {
        let adjusted = (*v as f32 - 128.0) * contrast + 128.0 + brightness as f32;
        *v = adjusted.clamp(0.0, 255.0) as u8;
    }
}

/// 3x3 sharpen: center x5 minus the 4-neighborhood. Edges are left as-is.
fn sharpen_plane(plane: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut result = plane.to_vec();

    if w < 3 || h < 3 {
        return result;
    }

    for y in 1..(h - 1) {
        for x in 1..(w - 1) {
            let center = plane[y * w + x] as i32;
            let top = plane[(y - 1) * w + x] as i32;
            let bottom = plane[(y + 1) * w + x] as i32;
            let left = plane[y * w + x - 1] as i32;
            let right = plane[y * w + x + 1] as i32;

            let sharpened = center * 5 - top - bottom - left - right;
            result[y * w + x] = sharpened.clamp(0, 255) as u8;
        }
    }

    result
}

/// One 3x3 box blur iteration. Edges are left as-is.
fn box_blur_plane(plane: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;
    let mut result = plane.to_vec();

    if w < 3 || h < 3 {
        return result;
    }

    for y in 1..(h - 1) {
        for x in 1..(w - 1) {
            let mut sum = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    sum += plane[(y + dy - 1) * w + (x + dx - 1)] as u32;
                }
            }
            result[y * w + x] = (sum / 9) as u8;
        }
    }

    result
}

fn binarize(plane: &mut [u8], threshold: u8) {
    for v in plane.iter_mut() {
        *v = if *v >= threshold { 255 } else { 0 };
    }
}

fn plane_to_buffer(plane: &[u8], width: u32, height: u32) -> RasterBuffer {
    RasterBuffer::from_gray_plane(width, height, plane)
}
