// ============================================================================
// COORDINATE MAPPER - screen-space pointer positions ↔ native image pixels
// ============================================================================
//
// The displayed image is usually scaled to fit its panel, so a pointer
// position has to be rescaled by (native size / on-screen size). The display
// box changes whenever the window is resized, so callers pass the current box
// on every interaction instead of caching a scale factor.
// ============================================================================

/// On-screen bounding box of the displayed image, in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    /// False while the image has not been laid out yet (zero or nonsense size).
    pub fn is_laid_out(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

impl From<egui::Rect> for DisplayBox {
    fn from(rect: egui::Rect) -> Self {
        Self::new(rect.min.x, rect.min.y, rect.width(), rect.height())
    }
}

/// A position in native image pixel space. Fractional values are valid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Convert a pointer position to native image coordinates.
///
/// Returns `None` when the display box has no usable size, so callers never
/// see the result of a division by zero.
pub fn screen_to_image(
    client_x: f32,
    client_y: f32,
    display: DisplayBox,
    native_width: u32,
    native_height: u32,
) -> Option<ImagePoint> {
    if !display.is_laid_out() {
        return None;
    }
    let x = (client_x - display.left) * (native_width as f32 / display.width);
    let y = (client_y - display.top) * (native_height as f32 / display.height);
    Some(ImagePoint::new(x, y))
}

/// Inverse of [`screen_to_image`], used to draw overlays on top of the displayed image.
pub fn image_to_screen(
    point: ImagePoint,
    display: DisplayBox,
    native_width: u32,
    native_height: u32,
) -> Option<(f32, f32)> {
    if !display.is_laid_out() || native_width == 0 || native_height == 0 {
        return None;
    }
    Some((
        display.left + point.x * (display.width / native_width as f32),
        display.top + point.y * (display.height / native_height as f32),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half_size_box() -> DisplayBox {
        // 400×300 image shown at half size, offset by (20, 40)
        DisplayBox::new(20.0, 40.0, 200.0, 150.0)
    }

    #[test]
    fn scales_by_native_over_display() {
        let p = screen_to_image(70.0, 115.0, half_size_box(), 400, 300).unwrap();
        assert!((p.x - 100.0).abs() < 1e-4);
        assert!((p.y - 150.0).abs() < 1e-4);
    }

    #[test]
    fn keeps_fractional_coordinates() {
        let p = screen_to_image(20.25, 40.0, half_size_box(), 400, 300).unwrap();
        assert!((p.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn unlaid_out_box_yields_none() {
        let zero_w = DisplayBox::new(0.0, 0.0, 0.0, 100.0);
        let zero_h = DisplayBox::new(0.0, 0.0, 100.0, 0.0);
        let nan = DisplayBox::new(0.0, 0.0, f32::NAN, 100.0);
        assert!(screen_to_image(5.0, 5.0, zero_w, 400, 300).is_none());
        assert!(screen_to_image(5.0, 5.0, zero_h, 400, 300).is_none());
        assert!(screen_to_image(5.0, 5.0, nan, 400, 300).is_none());
    }

    #[test]
    fn in_bounds_pointer_maps_inside_native_image() {
        let display = DisplayBox::new(13.0, 7.0, 333.0, 177.0);
        let (nw, nh) = (1024u32, 512u32);
        for i in 0..=20 {
            for j in 0..=20 {
                let cx = display.left + display.width * i as f32 / 20.0;
                let cy = display.top + display.height * j as f32 / 20.0;
                let p = screen_to_image(cx, cy, display, nw, nh).unwrap();
                assert!(p.x >= -1e-3 && p.x <= nw as f32 + 1e-3, "x out of range: {}", p.x);
                assert!(p.y >= -1e-3 && p.y <= nh as f32 + 1e-3, "y out of range: {}", p.y);
            }
        }
    }

    #[test]
    fn inverse_mapping_returns_to_screen() {
        let display = half_size_box();
        let (sx, sy) = image_to_screen(ImagePoint::new(100.0, 150.0), display, 400, 300).unwrap();
        assert!((sx - 70.0).abs() < 1e-4);
        assert!((sy - 115.0).abs() < 1e-4);
    }

    #[test]
    fn from_egui_rect() {
        let rect = egui::Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(30.0, 40.0));
        assert_eq!(DisplayBox::from(rect), DisplayBox::new(10.0, 20.0, 30.0, 40.0));
    }
}
