// ============================================================================
// RENDER SURFACES - output raster, original preview and selection overlays
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::selection::{Selection, SelectionOverlay, SelectionRegion};

/// Overlay stroke color.
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
/// Overlay stroke width in native pixels.
pub const OVERLAY_LINE_WIDTH: f32 = 2.0;
/// Dash and gap length for region outlines.
pub const DASH_LENGTH: f32 = 5.0;

/// A drawable raster that is resized to whatever gets presented on it.
#[derive(Clone, Debug)]
pub struct RenderSurface {
    image: RgbaImage,
    /// Bumped on every content change so texture caches know to re-upload.
    revision: u64,
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self { image: RgbaImage::new(0, 0), revision: 0 }
    }
}

impl RenderSurface {
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    /// Resize to `rendered`, dropping previous content, then copy it in at (0, 0).
    pub fn present(&mut self, rendered: &RgbaImage) {
        let (w, h) = rendered.dimensions();
        self.image = RgbaImage::new(w, h);
        image::imageops::replace(&mut self.image, rendered, 0, 0);
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.image = RgbaImage::new(0, 0);
        self.revision += 1;
    }

    pub fn draw_overlay(&mut self, overlay: &SelectionOverlay) {
        match overlay {
            SelectionOverlay::Marker { center, radius } => {
                stroke_circle(&mut self.image, center.x, center.y, *radius, OVERLAY_LINE_WIDTH, OVERLAY_COLOR)
            }
            SelectionOverlay::DashedRect(r) => {
                stroke_dashed_rect(&mut self.image, r, OVERLAY_LINE_WIDTH, DASH_LENGTH, OVERLAY_COLOR)
            }
        }
        self.revision += 1;
    }
}

/// What the "original" panel shows: the whole source for a point selection,
/// the part under the rectangle for a region selection.
pub fn original_preview(source: &RgbaImage, selection: Option<&Selection>) -> RgbaImage {
    match selection {
        Some(Selection::Region(r)) => match r.clip_to(source.width(), source.height()) {
            Some((x, y, w, h)) => image::imageops::crop_imm(source, x, y, w, h).to_image(),
            None => RgbaImage::new(0, 0),
        },
        _ => source.clone(),
    }
}

/// Ring of width `line_width` centered on the circle's edge.
pub fn stroke_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, line_width: f32, color: Rgba<u8>) {
    let half = line_width / 2.0;
    let reach = radius + half;
    let Some((x0, y0, x1, y1)) = pixel_bounds(img, cx - reach, cy - reach, cx + reach, cy + reach) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let d = (dx * dx + dy * dy).sqrt();
            if (d - radius).abs() <= half {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Rectangle outline with `dash`-long strokes separated by equal gaps, measured
/// clockwise from the top-left corner.
pub fn stroke_dashed_rect(img: &mut RgbaImage, rect: &SelectionRegion, line_width: f32, dash: f32, color: Rgba<u8>) {
    let half = line_width / 2.0;
    let (left, top) = (rect.x, rect.y);
    let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
    let Some((x0, y0, x1, y1)) = pixel_bounds(img, left - half, top - half, right + half, bottom + half) else {
        return;
    };
    let period = dash * 2.0;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let along = if (py - top).abs() <= half && px >= left - half && px <= right + half {
                px - left
            } else if (px - right).abs() <= half && py >= top - half && py <= bottom + half {
                rect.width + (py - top)
            } else if (py - bottom).abs() <= half && px >= left - half && px <= right + half {
                rect.width + rect.height + (right - px)
            } else if (px - left).abs() <= half && py >= top - half && py <= bottom + half {
                2.0 * rect.width + rect.height + (bottom - py)
            } else {
                continue;
            };
            if along.max(0.0) % period < dash {
                img.put_pixel(x, y, color);
            }
        }
    }
}

/// Integer pixel range [x0, x1) × [y0, y1) covering the float box, clipped to the image.
fn pixel_bounds(img: &RgbaImage, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Option<(u32, u32, u32, u32)> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || max_x < 0.0 || max_y < 0.0 {
        return None;
    }
    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(w);
    let y1 = (max_y.ceil().max(0.0) as u32).min(h);
    (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ImagePoint;
    use crate::selection::{PointSelector, RegionSelector, SelectionProvider};

    fn solid(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    #[test]
    fn present_resizes_and_discards_previous_content() {
        let mut surface = RenderSurface::default();
        surface.present(&solid(40, 30, 10));
        surface.present(&solid(8, 6, 200));
        assert_eq!(surface.dimensions(), (8, 6));
        assert!(surface.image().pixels().all(|p| p[0] == 200));
        assert_eq!(surface.revision(), 2);
    }

    #[test]
    fn marker_ring_hits_edge_not_center() {
        let mut surface = RenderSurface::default();
        surface.present(&solid(400, 300, 0));
        let sel = PointSelector.select(ImagePoint::new(100.0, 150.0));
        surface.draw_overlay(&sel.overlay());
        let img = surface.image();
        assert_eq!(*img.get_pixel(105, 150), OVERLAY_COLOR);
        assert_eq!(*img.get_pixel(100, 150), Rgba([0, 0, 0, 255]));
        assert_eq!(*img.get_pixel(120, 150), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn dashed_outline_alternates() {
        let mut img = solid(200, 200, 0);
        let rect = SelectionRegion { x: 50.0, y: 50.0, width: 100.0, height: 100.0 };
        stroke_dashed_rect(&mut img, &rect, 2.0, 5.0, OVERLAY_COLOR);
        // Top edge: first dash covers x in [50, 55), gap [55, 60)
        assert_eq!(*img.get_pixel(52, 50), OVERLAY_COLOR);
        assert_eq!(*img.get_pixel(57, 50), Rgba([0, 0, 0, 255]));
        // Interior untouched
        assert_eq!(*img.get_pixel(100, 100), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn overlay_outside_image_is_ignored() {
        let mut img = solid(10, 10, 0);
        stroke_circle(&mut img, -50.0, -50.0, 5.0, 2.0, OVERLAY_COLOR);
        assert!(img.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn region_preview_is_the_crop() {
        let src = RgbaImage::from_fn(400, 300, |x, _| Rgba([(x % 256) as u8, 0, 0, 255]));
        let sel = RegionSelector::default().select(ImagePoint::new(100.0, 150.0));
        let crop = original_preview(&src, Some(&sel));
        assert_eq!(crop.dimensions(), (100, 100));
        assert_eq!(crop.get_pixel(0, 0)[0], 50);

        let whole = original_preview(&src, None);
        assert_eq!(whole.dimensions(), (400, 300));
    }
}
