// ============================================================================
// SELECTION - point and fixed-size region strategies behind one provider trait
// ============================================================================

use crate::mapper::{self, DisplayBox, ImagePoint};

/// Radius of the marker circle drawn at a selected point, in native pixels.
pub const MARKER_RADIUS: f32 = 5.0;

/// Side length of the square region placed around a click, in native pixels.
pub const REGION_SIZE: f32 = 100.0;

/// A single selected pixel position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionPoint {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned rectangle in native pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SelectionRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SelectionRegion {
    /// Square of side `size` centered on `at`, with the top-left clamped to be non-negative.
    pub fn centered_on(at: ImagePoint, size: f32) -> Self {
        let half = size / 2.0;
        Self {
            x: (at.x - half).max(0.0),
            y: (at.y - half).max(0.0),
            width: size,
            height: size,
        }
    }

    pub fn centroid(&self) -> ImagePoint {
        ImagePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Integer pixel bounds of the part of the region that lies inside the image.
    /// Returns (x, y, w, h), or `None` if nothing overlaps.
    pub fn clip_to(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.floor().max(0.0) as u32;
        let y0 = self.y.floor().max(0.0) as u32;
        let x1 = ((self.x + self.width).ceil().max(0.0) as u32).min(image_width);
        let y1 = ((self.y + self.height).ceil().max(0.0) as u32).min(image_height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// The current selection. Replaced wholesale, never edited in place.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Selection {
    Point(SelectionPoint),
    Region(SelectionRegion),
}

impl Selection {
    /// Warp center derived from the selection.
    pub fn center(&self) -> ImagePoint {
        match self {
            Selection::Point(p) => ImagePoint::new(p.x, p.y),
            Selection::Region(r) => r.centroid(),
        }
    }

    /// How the selection is drawn on top of the output.
    pub fn overlay(&self) -> SelectionOverlay {
        match *self {
            Selection::Point(p) => SelectionOverlay::Marker {
                center: ImagePoint::new(p.x, p.y),
                radius: MARKER_RADIUS,
            },
            Selection::Region(r) => SelectionOverlay::DashedRect(r),
        }
    }
}

/// Visual marker for a selection, in native pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectionOverlay {
    Marker { center: ImagePoint, radius: f32 },
    DashedRect(SelectionRegion),
}

/// Which selection strategy a click uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Point,
    Region,
}

impl SelectionMode {
    pub const ALL: [SelectionMode; 2] = [SelectionMode::Point, SelectionMode::Region];

    pub fn label(&self) -> &'static str {
        match self {
            SelectionMode::Point => "Point",
            SelectionMode::Region => "Region",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Point => "point",
            SelectionMode::Region => "region",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "point" => Some(SelectionMode::Point),
            "region" | "rect" => Some(SelectionMode::Region),
            _ => None,
        }
    }

    pub fn provider(&self) -> Box<dyn SelectionProvider> {
        match self {
            SelectionMode::Point => Box::new(PointSelector),
            SelectionMode::Region => Box::new(RegionSelector::default()),
        }
    }
}

/// Turns a native-pixel click into a [`Selection`].
pub trait SelectionProvider {
    fn mode(&self) -> SelectionMode;

    fn select(&self, at: ImagePoint) -> Selection;

    /// Map a pointer position through the display box, then select.
    /// `None` while the image has no on-screen size.
    fn select_at_pointer(
        &self,
        client_x: f32,
        client_y: f32,
        display: DisplayBox,
        native_width: u32,
        native_height: u32,
    ) -> Option<Selection> {
        mapper::screen_to_image(client_x, client_y, display, native_width, native_height)
            .map(|p| self.select(p))
    }
}

/// Selects exactly the clicked point.
#[derive(Clone, Copy, Debug, Default)]
pub struct PointSelector;

impl SelectionProvider for PointSelector {
    fn mode(&self) -> SelectionMode {
        SelectionMode::Point
    }

    fn select(&self, at: ImagePoint) -> Selection {
        Selection::Point(SelectionPoint { x: at.x, y: at.y })
    }
}

/// Selects a fixed-size square around the clicked point.
#[derive(Clone, Copy, Debug)]
pub struct RegionSelector {
    pub size: f32,
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self { size: REGION_SIZE }
    }
}

impl SelectionProvider for RegionSelector {
    fn mode(&self) -> SelectionMode {
        SelectionMode::Region
    }

    fn select(&self, at: ImagePoint) -> Selection {
        Selection::Region(SelectionRegion::centered_on(at, self.size))
    }
}
