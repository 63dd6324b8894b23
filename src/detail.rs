//! Detail view model
//!
//! Framework-free state for the zoomable detail view: layout of the image
//! within the viewport, zoom/scroll tracking, the double-tap zoom toggle and
//! the optional high-resolution upgrade. The UI shell renders from this
//! state and feeds gestures back into it and the transition controller.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ImagePayload;
use crate::client::FetchClient;
use crate::geometry::{ImageFrameInfo, Point, Rect, Size};
use crate::transition::DetailScrollState;

/// Side of the square region a double tap zooms into.
const DOUBLE_TAP_ZOOM_EDGE: f32 = 80.0;

/// What the rendering layer should do in response to a double tap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomAction {
    /// Zoom so that this rect fills the viewport.
    ZoomTo(Rect),
    /// Return to the unzoomed state.
    Reset,
}

/// Zoomable detail view state for one photo.
pub struct DetailViewState {
    info: ImageFrameInfo,
    viewport: Rect,
    image_frame: Rect,
    content_size: Size,
    max_zoom_scale: f32,
    zoom_scale: f32,
    content_offset: Point,
}

impl DetailViewState {
    pub fn new(info: ImageFrameInfo, viewport: Rect) -> Self {
        let mut state = Self {
            info,
            viewport,
            image_frame: Rect::default(),
            content_size: Size::default(),
            max_zoom_scale: 2.0,
            zoom_scale: 1.0,
            content_offset: Point::ZERO,
        };
        state.layout();
        state
    }

    /// Recompute layout from the viewport: the image frame anchors at the
    /// viewport origin, the scrollable content matches it, and the maximum
    /// zoom follows the image's native resolution.
    fn layout(&mut self) {
        self.image_frame = self.info.frame_in(self.viewport, Some(Point::ZERO), None);
        self.content_size = self.image_frame.size;
        self.max_zoom_scale = self.info.max_zoom_scale(self.viewport.size);
    }

    pub fn frame_info(&self) -> &ImageFrameInfo {
        &self.info
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn image_frame(&self) -> Rect {
        self.image_frame
    }

    pub fn content_size(&self) -> Size {
        self.content_size
    }

    pub fn max_zoom_scale(&self) -> f32 {
        self.max_zoom_scale
    }

    pub fn zoom_scale(&self) -> f32 {
        self.zoom_scale
    }

    /// The scroll view zoomed or scrolled; track the new state and recenter
    /// the image frame within the scrolled content.
    pub fn did_zoom(&mut self, zoom_scale: f32, content_size: Size, content_offset: Point) {
        self.zoom_scale = zoom_scale;
        self.content_size = content_size;
        self.content_offset = content_offset;
        self.image_frame = self.info.frame_in(
            Rect {
                origin: Point::ZERO,
                size: content_size,
            },
            Some(Point::ZERO),
            None,
        );
    }

    /// Double-tap toggle: zoom into a small square around the tap point, or
    /// reset if already zoomed.
    pub fn double_tap(&self, at: Point) -> ZoomAction {
        if self.zoom_scale == 1.0 {
            let half = DOUBLE_TAP_ZOOM_EDGE / 2.0;
            ZoomAction::ZoomTo(Rect::new(
                at.x - half,
                at.y - half,
                DOUBLE_TAP_ZOOM_EDGE,
                DOUBLE_TAP_ZOOM_EDGE,
            ))
        } else {
            ZoomAction::Reset
        }
    }

    /// Snapshot consumed by the transition controller's dismiss geometry.
    pub fn scroll_state(&self) -> DetailScrollState {
        DetailScrollState {
            zoom_scale: self.zoom_scale,
            content_offset: self.content_offset,
            content_size: self.content_size,
        }
    }

    /// Fetch the high-resolution variant, if any, and swap it in. Returns
    /// whether the image was upgraded; failures keep the current image.
    pub async fn load_high_res<C: FetchClient>(&mut self, client: &C, timeout: Duration) -> bool {
        let url = match &self.info.high_res_url {
            Some(url) => url.clone(),
            None => return false,
        };

        let bytes = match client.fetch(&url, &[], Some(timeout)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("High-res fetch failed for {}: {}", url, e);
                return false;
            }
        };

        match ImagePayload::decode(&bytes) {
            Some(payload) => {
                self.info.image = Arc::new(payload);
                self.layout();
                log::debug!("Upgraded {} to high-res", url);
                true
            }
            None => false,
        }
    }
}
