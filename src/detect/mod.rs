//! Text region detection
//!
//! Estimates where readable text sits in a banner by clustering grid cells
//! with high edge density. Text is busy: tight alternation of light glyphs
//! and dark background produces strong local luma gradients, while flat
//! artwork and photos mostly do not.
//!
//! All scores are computed on a small downsampled working buffer so cost
//! stays flat regardless of input resolution.

use crate::raster::{FractionalRegion, RasterBuffer};
use tracing::debug;

/// Working width for detection; inputs are downsampled to at most this.
const DETECT_WIDTH: u32 = 320;
/// Cells per grid axis.
const GRID: usize = 8;
/// Pixel sampling stride inside each cell.
const STRIDE: u32 = 2;
/// Density floor below which a cell can never be active.
const MIN_DENSITY_CUTOFF: f32 = 0.03;
/// Density a universal band must reach to be admitted.
const BAND_DENSITY_FLOOR: f32 = 0.035;
/// Regions overlapping more than this are considered duplicates.
const DEDUPE_IOU: f32 = 0.7;

/// Top title band: banners often carry a headline across the upper third.
const TITLE_BAND: FractionalRegion = FractionalRegion {
    x: 0.0,
    y: 0.0,
    w: 1.0,
    h: 0.30,
};
/// Bottom band: call-to-action buttons cluster near the lower edge.
const CTA_BAND: FractionalRegion = FractionalRegion {
    x: 0.0,
    y: 0.66,
    w: 1.0,
    h: 0.34,
};

/// Propose candidate text regions, highest cumulative edge density first.
///
/// Returns up to `max_regions` clustered regions plus the universal
/// title/CTA bands when those carry enough edge density of their own.
/// Empty result means the caller should fall back to full-image analysis.
pub fn detect_regions(
    buffer: &RasterBuffer,
    edge_threshold: u8,
    max_regions: usize,
) -> Vec<FractionalRegion> {
    let work = buffer.downsample_to_width(DETECT_WIDTH);
    let densities = cell_densities(&work, edge_threshold);

    let cutoff = density_cutoff(&densities);
    let active: Vec<bool> = densities.iter().map(|&d| d >= cutoff).collect();

    let clusters = cluster_cells(&active);
    let mut scored: Vec<(FractionalRegion, f32)> = clusters
        .iter()
        .filter(|cells| cells.len() > 1)
        .map(|cells| {
            let density: f32 = cells.iter().map(|&(cx, cy)| densities[cy * GRID + cx]).sum();
            (cluster_to_region(cells), density)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut regions: Vec<FractionalRegion> = Vec::new();
    for (region, _) in scored {
        if regions.len() >= max_regions {
            break;
        }
        if regions.iter().all(|r| r.iou(&region) <= DEDUPE_IOU) {
            regions.push(region);
        }
    }

    // Universal bands recover banners whose text splits top/bottom instead
    // of clustering, but only when the band itself shows some edge signal.
    for band in [TITLE_BAND, CTA_BAND] {
        let band_density = estimate_text_likelihood(&work.crop(&band), edge_threshold);
        if band_density > BAND_DENSITY_FLOOR && regions.iter().all(|r| r.iou(&band) <= DEDUPE_IOU) {
            regions.push(band);
        }
    }

    debug!(
        "detected {} candidate regions (cutoff {:.3})",
        regions.len(),
        cutoff
    );
    regions
}

/// Cheap go/no-go score: overall edge density of the buffer in `[0, 1]`.
///
/// Shares the edge definition with [`detect_regions`] but skips clustering.
pub fn estimate_text_likelihood(buffer: &RasterBuffer, edge_threshold: u8) -> f32 {
    let work = buffer.downsample_to_width(DETECT_WIDTH);
    let (edges, samples) = count_edges(
        &work,
        0,
        0,
        work.width(),
        work.height(),
        edge_threshold,
    );
    if samples == 0 {
        return 0.0;
    }
    (edges as f32 / samples as f32).clamp(0.0, 1.0)
}

/// Count edge pixels in a rectangle, sampling at [`STRIDE`].
fn count_edges(
    buffer: &RasterBuffer,
    x0: u32,
    y0: u32,
    w: u32,
    h: u32,
    threshold: u8,
) -> (u32, u32) {
    let mut edges = 0u32;
    let mut samples = 0u32;

    // Gradient needs a pixel to the right and below.
    let x_end = (x0 + w).min(buffer.width().saturating_sub(1));
    let y_end = (y0 + h).min(buffer.height().saturating_sub(1));

    let mut y = y0;
    while y < y_end {
        let mut x = x0;
        while x < x_end {
            let here = buffer.luma_at(x, y) as i32;
            let dx = (buffer.luma_at(x + 1, y) as i32 - here).abs();
            let dy = (buffer.luma_at(x, y + 1) as i32 - here).abs();
            if dx + dy >= threshold as i32 {
                edges += 1;
            }
            samples += 1;
            x += STRIDE;
        }
        y += STRIDE;
    }

    (edges, samples)
}

/// Per-cell edge densities over an 8x8 partition, row-major.
fn cell_densities(buffer: &RasterBuffer, threshold: u8) -> Vec<f32> {
    let w = buffer.width();
    let h = buffer.height();
    let mut densities = vec![0.0f32; GRID * GRID];

    for cy in 0..GRID {
        for cx in 0..GRID {
            let x0 = (cx as u32 * w) / GRID as u32;
            let x1 = ((cx as u32 + 1) * w) / GRID as u32;
            let y0 = (cy as u32 * h) / GRID as u32;
            let y1 = ((cy as u32 + 1) * h) / GRID as u32;

            let (edges, samples) = count_edges(buffer, x0, y0, x1 - x0, y1 - y0, threshold);
            densities[cy * GRID + cx] = if samples > 0 {
                edges as f32 / samples as f32
            } else {
                0.0
            };
        }
    }

    densities
}

/// Activity cutoff: 60% of the top-6th-percentile density, floored so a
/// uniformly flat image activates nothing.
fn density_cutoff(densities: &[f32]) -> f32 {
    let mut sorted = densities.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let idx = (sorted.len() * 6 / 100).min(sorted.len().saturating_sub(1));
    (sorted[idx] * 0.6).max(MIN_DENSITY_CUTOFF)
}

/// Group active cells into 4-connected clusters via BFS.
fn cluster_cells(active: &[bool]) -> Vec<Vec<(usize, usize)>> {
    let mut visited = vec![false; GRID * GRID];
    let mut clusters = Vec::new();

    for start in 0..GRID * GRID {
        if !active[start] || visited[start] {
            continue;
        }

        let mut cells = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(start);
        visited[start] = true;

        while let Some(idx) = queue.pop_front() {
            let (cx, cy) = (idx % GRID, idx / GRID);
            cells.push((cx, cy));

            let mut push = |nx: usize, ny: usize| {
                let nidx = ny * GRID + nx;
                if active[nidx] && !visited[nidx] {
                    visited[nidx] = true;
                    queue.push_back(nidx);
                }
            };
            if cx > 0 {
                push(cx - 1, cy);
            }
            if cx + 1 < GRID {
                push(cx + 1, cy);
            }
            if cy > 0 {
                push(cx, cy - 1);
            }
            if cy + 1 < GRID {
                push(cx, cy + 1);
            }
        }

        clusters.push(cells);
    }

    clusters
}

/// Bounding box of a cluster, padded by one grid cell, in fractional space.
fn cluster_to_region(cells: &[(usize, usize)]) -> FractionalRegion {
    let min_x = cells.iter().map(|c| c.0).min().unwrap_or(0);
    let max_x = cells.iter().map(|c| c.0).max().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.1).min().unwrap_or(0);
    let max_y = cells.iter().map(|c| c.1).max().unwrap_or(0);

    let x0 = min_x.saturating_sub(1) as f32 / GRID as f32;
    let y0 = min_y.saturating_sub(1) as f32 / GRID as f32;
    let x1 = ((max_x + 2).min(GRID)) as f32 / GRID as f32;
    let y1 = ((max_y + 2).min(GRID)) as f32 / GRID as f32;

    FractionalRegion::new(x0, y0, x1 - x0, y1 - y0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterBuffer;

    fn flat_image(width: u32, height: u32) -> RasterBuffer {
        let data = vec![200u8; (width * height * 4) as usize];
        RasterBuffer::from_rgba(width, height, data).unwrap()
    }

    /// Checkerboard in a sub-rectangle; everything else flat gray.
    fn textish_image(
        width: u32,
        height: u32,
        rx: u32,
        ry: u32,
        rw: u32,
        rh: u32,
    ) -> RasterBuffer {
        let mut data = vec![128u8; (width * height * 4) as usize];
        for i in (3..data.len()).step_by(4) {
            data[i] = 255;
        }
        for y in ry..(ry + rh).min(height) {
            for x in rx..(rx + rw).min(width) {
                let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                let idx = ((y * width + x) * 4) as usize;
                data[idx] = v;
                data[idx + 1] = v;
                data[idx + 2] = v;
            }
        }
        RasterBuffer::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn test_flat_image_has_no_regions() {
        let img = flat_image(160, 160);
        let regions = detect_regions(&img, 70, 3);
        assert!(regions.is_empty());
    }

    #[test]
    fn test_flat_image_low_likelihood() {
        let img = flat_image(160, 160);
        assert!(estimate_text_likelihood(&img, 70) < 0.01);
    }

    #[test]
    fn test_checkerboard_high_likelihood() {
        let img = textish_image(160, 160, 0, 0, 160, 160);
        assert!(estimate_text_likelihood(&img, 70) > 0.5);
    }

    #[test]
    fn test_detects_busy_block() {
        // Busy block in the middle-left of the image
        let img = textish_image(320, 320, 40, 120, 120, 80);
        let regions = detect_regions(&img, 70, 3);
        assert!(!regions.is_empty());
        // The densest region should overlap the busy block
        let block = FractionalRegion::new(40.0 / 320.0, 120.0 / 320.0, 120.0 / 320.0, 80.0 / 320.0);
        assert!(regions[0].iou(&block) > 0.1);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let img = textish_image(320, 200, 16, 16, 200, 60);
        let a = detect_regions(&img, 70, 3);
        let b = detect_regions(&img, 70, 3);
        assert_eq!(a.len(), b.len());
        for (ra, rb) in a.iter().zip(b.iter()) {
            assert_eq!(ra, rb);
        }
    }

    #[test]
    fn test_regions_satisfy_invariants() {
        let img = textish_image(320, 320, 0, 0, 320, 100);
        for region in detect_regions(&img, 70, 4) {
            assert!(region.validate().is_ok(), "invalid region {:?}", region);
        }
    }

    #[test]
    fn test_respects_max_regions_for_clusters() {
        // Two separate busy areas, ask for one cluster at most; universal
        // bands may still be appended on top of the cluster cap.
        let mut img = textish_image(320, 320, 0, 0, 100, 100);
        let mut data = img.data().to_vec();
        for y in 220..320u32 {
            for x in 220..320u32 {
                let v = if (x + y) % 2 == 0 { 0 } else { 255 };
                let idx = ((y * 320 + x) * 4) as usize;
                data[idx] = v;
                data[idx + 1] = v;
                data[idx + 2] = v;
            }
        }
        img = RasterBuffer::from_rgba(320, 320, data).unwrap();

        let regions = detect_regions(&img, 70, 1);
        let non_band = regions
            .iter()
            .filter(|r| **r != TITLE_BAND && **r != CTA_BAND)
            .count();
        assert!(non_band <= 1);
    }

    #[test]
    fn test_density_cutoff_floor() {
        let densities = vec![0.0f32; GRID * GRID];
        assert_eq!(density_cutoff(&densities), MIN_DENSITY_CUTOFF);
    }
}
