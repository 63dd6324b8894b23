//! Transition geometry
//!
//! Pure functions computing the on-screen rectangle an image occupies for a
//! given content mode, plus the maximum permissible zoom scale. These drive
//! both the detail-view layout and the present/dismiss transition frames.

use std::sync::Arc;

use crate::cache::ImagePayload;

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A size in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is not a positive, finite number.
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
            || !self.width.is_finite()
            || !self.height.is_finite()
    }
}

/// An axis-aligned rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    pub fn offset_by(&self, dx: f32, dy: f32) -> Rect {
        Rect {
            origin: Point::new(self.origin.x + dx, self.origin.y + dy),
            size: self.size,
        }
    }
}

/// Policy for fitting an image into a viewport.
///
/// Deliberately independent of any UI framework; adapters translate to the
/// rendering layer's native enum at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentMode {
    /// Letterbox, no cropping.
    Fit,
    /// Uniform scale-up, cropped to fill the viewport.
    Fill,
}

/// Frame an image occupies within `viewport` under the given content mode.
///
/// `Fit` returns the viewport unchanged (the rendering layer letterboxes).
/// `Fill` scales the image up uniformly until it covers the viewport and
/// centers the overflow, unless an explicit `origin` override is given.
pub fn compute_frame(
    viewport: Rect,
    mode: ContentMode,
    image_size: Size,
    origin: Option<Point>,
) -> Rect {
    match mode {
        ContentMode::Fit => viewport,
        ContentMode::Fill => {
            if image_size.is_degenerate() {
                return viewport;
            }
            let r = (viewport.size.width / image_size.width)
                .max(viewport.size.height / image_size.height);
            let w = image_size.width * r;
            let h = image_size.height * r;
            Rect::new(
                origin
                    .map(|o| o.x)
                    .unwrap_or(viewport.origin.x - (w - viewport.size.width) / 2.0),
                origin
                    .map(|o| o.y)
                    .unwrap_or(viewport.origin.y - (h - viewport.size.height) / 2.0),
                w,
                h,
            )
        }
    }
}

/// Maximum zoom scale for an image shown in `viewport`.
///
/// Always allows at least 2x, and further zoom proportional to native
/// resolution for images larger than the viewport.
pub fn max_zoom_scale(viewport: Size, image_size: Size) -> f32 {
    if viewport.is_degenerate() {
        return 2.0;
    }
    2.0_f32.max((image_size.width / viewport.width).max(image_size.height / viewport.height))
}

/// An image together with the content mode it is displayed in and an optional
/// high-resolution variant. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ImageFrameInfo {
    pub image: Arc<ImagePayload>,
    pub content_mode: ContentMode,
    pub high_res_url: Option<String>,
}

impl ImageFrameInfo {
    pub fn new(image: Arc<ImagePayload>, content_mode: ContentMode) -> Self {
        Self {
            image,
            content_mode,
            high_res_url: None,
        }
    }

    pub fn with_high_res(mut self, url: impl Into<String>) -> Self {
        self.high_res_url = Some(url.into());
        self
    }

    pub fn image_size(&self) -> Size {
        self.image.size()
    }

    /// Frame of this image within `viewport`, optionally overriding the
    /// content mode (used when re-projecting a source view's rect through a
    /// different mode than this image's own).
    pub fn frame_in(&self, viewport: Rect, origin: Option<Point>, mode: Option<ContentMode>) -> Rect {
        compute_frame(
            viewport,
            mode.unwrap_or(self.content_mode),
            self.image_size(),
            origin,
        )
    }

    pub fn max_zoom_scale(&self, viewport: Size) -> f32 {
        max_zoom_scale(viewport, self.image_size())
    }
}
