//! Interactive transition controller
//!
//! Orchestrates the two-phase animation between a thumbnail's on-screen rect
//! and the full-screen detail view. The controller owns the transition state
//! machine and emits keyframe descriptors ([`TransitionAnimation`]); the UI
//! shell executes them. The interactive dismiss consumes continuous pan
//! deltas and decides at gesture release whether to commit or spring back.

use crate::geometry::{ContentMode, ImageFrameInfo, Point, Rect, Size};

/// Progress beyond which a released pan commits the dismiss.
const COMMIT_PROGRESS: f32 = 0.25;
/// Gesture speed (px/s) beyond which a released pan commits regardless of
/// progress.
const COMMIT_SPEED: f32 = 1000.0;
/// Duration of the cancel spring-back.
const SPRING_BACK_DURATION: f32 = 0.3;

/// Timing curve for transition animations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationCurve {
    Linear,
    Spring { damping: f32, initial_velocity: f32 },
}

/// Error type for transition operations
#[derive(Debug)]
pub enum TransitionError {
    /// The source view's rect has no area, so there is no geometry to
    /// animate from.
    EmptySourceRect,
    /// The image has no pixels; frames cannot be computed.
    EmptyImage,
    /// The requested operation is not legal in the current phase.
    InvalidPhase(TransitionPhase),
    /// A programmatic dismiss was requested while an interactive pan is in
    /// progress; the two dismiss paths are mutually exclusive.
    InteractiveDismissActive,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::EmptySourceRect => write!(f, "Source rect has no area"),
            TransitionError::EmptyImage => write!(f, "Image has no pixels"),
            TransitionError::InvalidPhase(phase) => {
                write!(f, "Operation not valid in phase {:?}", phase)
            }
            TransitionError::InteractiveDismissActive => {
                write!(f, "An interactive dismiss is in progress")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Geometry and timing for one presentation, built once when the detail view
/// is presented and consumed by both the present and dismiss phases.
#[derive(Debug, Clone)]
pub struct TransitionContext {
    source_rect: Rect,
    converted_rect: Rect,
    duration: f32,
    curve: AnimationCurve,
    swipe_to_dismiss: bool,
}

impl TransitionContext {
    /// Build a context from the source view's on-screen rect.
    ///
    /// When the source view's content mode differs from the destination
    /// image's, the source rect is re-projected through the frame
    /// calculation under the source's mode, so a fill-mode thumbnail and a
    /// fit-mode detail view line up visually. Construction fails fast on
    /// degenerate geometry instead of deferring to a runtime unwrap.
    pub fn new(
        frame_info: &ImageFrameInfo,
        source_rect: Rect,
        source_mode: ContentMode,
    ) -> Result<Self, TransitionError> {
        if source_rect.size.is_degenerate() {
            return Err(TransitionError::EmptySourceRect);
        }
        if frame_info.image_size().is_degenerate() {
            return Err(TransitionError::EmptyImage);
        }

        let converted_rect = if source_mode != frame_info.content_mode {
            frame_info.frame_in(source_rect, None, Some(source_mode))
        } else {
            source_rect
        };

        Ok(Self {
            source_rect,
            converted_rect,
            duration: 0.35,
            curve: AnimationCurve::Linear,
            swipe_to_dismiss: true,
        })
    }

    pub fn with_duration(mut self, seconds: f32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn with_curve(mut self, curve: AnimationCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_swipe_to_dismiss(mut self, enabled: bool) -> Self {
        self.swipe_to_dismiss = enabled;
        self
    }

    pub fn source_rect(&self) -> Rect {
        self.source_rect
    }

    pub fn converted_rect(&self) -> Rect {
        self.converted_rect
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn curve(&self) -> AnimationCurve {
        self.curve
    }

    pub fn swipe_to_dismiss(&self) -> bool {
        self.swipe_to_dismiss
    }
}

/// Phases of one presentation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Presenting,
    Presented,
    DismissingProgrammatic,
    DismissingInteractive,
    Dismissed,
}

/// Scroll state of the detail view, fed into dismissal geometry and the pan
/// acceptance guard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetailScrollState {
    pub zoom_scale: f32,
    pub content_offset: Point,
    pub content_size: Size,
}

impl DetailScrollState {
    /// A freshly presented detail view: no zoom, no scroll.
    pub fn at_rest(content_size: Size) -> Self {
        Self {
            zoom_scale: 1.0,
            content_offset: Point::ZERO,
            content_size,
        }
    }
}

/// Keyframe pair the UI layer animates between.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionAnimation {
    pub from_frame: Rect,
    pub to_frame: Rect,
    pub from_background_alpha: f32,
    pub to_background_alpha: f32,
    pub duration: f32,
    pub curve: AnimationCurve,
}

/// Per-update output of an interactive pan: where the content should sit and
/// how opaque the background should be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanFrame {
    pub center: Point,
    pub background_alpha: f32,
}

/// Cancelled pan: animate back to this center and alpha over `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringBack {
    pub center: Point,
    pub background_alpha: f32,
    pub duration: f32,
}

/// Decision at pan release.
#[derive(Debug, Clone, PartialEq)]
pub enum PanOutcome {
    /// Thresholds met: run the dismiss animation, then call
    /// [`TransitionController::finish_dismiss`].
    Commit(TransitionAnimation),
    /// Thresholds not met: restore the content and keep the view presented.
    SpringBack(SpringBack),
}

struct PanState {
    origin: Point,
    center: Point,
    background_alpha: f32,
    scroll: DetailScrollState,
}

/// State machine for one presentation of the detail view.
///
/// Only one transition may be active at a time; a controller that reaches
/// `Dismissed` is done and a new presentation builds a new controller with a
/// fresh [`TransitionContext`].
pub struct TransitionController {
    info: ImageFrameInfo,
    context: TransitionContext,
    viewport: Rect,
    phase: TransitionPhase,
    pan: Option<PanState>,
}

impl TransitionController {
    pub fn new(info: ImageFrameInfo, context: TransitionContext, viewport: Rect) -> Self {
        Self {
            info,
            context,
            viewport,
            phase: TransitionPhase::Idle,
            pan: None,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn context(&self) -> &TransitionContext {
        &self.context
    }

    /// Frame the image occupies once fully presented.
    pub fn destination_frame(&self) -> Rect {
        self.info.frame_in(self.viewport, Some(Point::ZERO), None)
    }

    /// Start the present phase: background fades in while the image proxy
    /// moves from the converted source rect to the destination frame.
    pub fn begin_present(&mut self) -> Result<TransitionAnimation, TransitionError> {
        if self.phase != TransitionPhase::Idle {
            return Err(TransitionError::InvalidPhase(self.phase));
        }
        self.phase = TransitionPhase::Presenting;
        log::debug!("Transition: presenting");
        Ok(TransitionAnimation {
            from_frame: self.context.converted_rect,
            to_frame: self.destination_frame(),
            from_background_alpha: 0.0,
            to_background_alpha: 1.0,
            duration: self.context.duration,
            curve: self.context.curve,
        })
    }

    /// The present animation finished; the real detail view replaces the
    /// proxy.
    pub fn finish_present(&mut self) -> Result<(), TransitionError> {
        if self.phase != TransitionPhase::Presenting {
            return Err(TransitionError::InvalidPhase(self.phase));
        }
        self.phase = TransitionPhase::Presented;
        Ok(())
    }

    /// Start a programmatic dismiss (tap to close). Rejected while an
    /// interactive pan is in progress.
    pub fn begin_dismiss(
        &mut self,
        scroll: DetailScrollState,
    ) -> Result<TransitionAnimation, TransitionError> {
        if self.pan.is_some() || self.phase == TransitionPhase::DismissingInteractive {
            return Err(TransitionError::InteractiveDismissActive);
        }
        if self.phase != TransitionPhase::Presented {
            return Err(TransitionError::InvalidPhase(self.phase));
        }
        self.phase = TransitionPhase::DismissingProgrammatic;
        log::debug!("Transition: dismissing");
        Ok(TransitionAnimation {
            from_frame: self.dismiss_source_frame(&scroll),
            to_frame: self.context.converted_rect,
            from_background_alpha: 1.0,
            to_background_alpha: 0.0,
            duration: self.context.duration,
            curve: self.context.curve,
        })
    }

    /// The dismiss animation finished; the source view becomes visible
    /// again.
    pub fn finish_dismiss(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            TransitionPhase::DismissingProgrammatic | TransitionPhase::DismissingInteractive => {
                self.phase = TransitionPhase::Dismissed;
                self.pan = None;
                Ok(())
            }
            phase => Err(TransitionError::InvalidPhase(phase)),
        }
    }

    /// Whether a pan starting with `translation` may begin a swipe dismiss.
    ///
    /// Rejected when zoomed in, and for fill-mode content when the view is
    /// horizontally scrolled or the pan moves away from the leading edge.
    pub fn can_begin_pan(&self, scroll: &DetailScrollState, translation: Point) -> bool {
        if !self.context.swipe_to_dismiss {
            return false;
        }
        if scroll.zoom_scale != 1.0 {
            return false;
        }
        if self.info.content_mode == ContentMode::Fill
            && (scroll.content_offset.x > 0.0 || translation.x <= 0.0)
        {
            return false;
        }
        true
    }

    /// Start tracking an interactive dismiss. Returns whether tracking
    /// began.
    pub fn pan_began(&mut self, scroll: DetailScrollState, translation: Point) -> bool {
        if self.phase != TransitionPhase::Presented || !self.can_begin_pan(&scroll, translation) {
            return false;
        }
        let center = self.viewport.center();
        self.pan = Some(PanState {
            origin: center,
            center,
            background_alpha: 1.0,
            scroll,
        });
        self.phase = TransitionPhase::DismissingInteractive;
        true
    }

    /// Consume one pan delta. The caller resets the gesture's translation
    /// after each call, so deltas are incremental.
    pub fn pan_changed(&mut self, translation: Point) -> Option<PanFrame> {
        let viewport = self.viewport.size;
        let pan = self.pan.as_mut()?;
        pan.center = Point::new(pan.center.x + translation.x, pan.center.y + translation.y);
        let progress = Self::progress(pan, viewport);
        pan.background_alpha = 1.0 - progress;
        Some(PanFrame {
            center: pan.center,
            background_alpha: pan.background_alpha,
        })
    }

    /// The pan ended with the given velocity (px/s). Commits the dismiss
    /// when progress or speed crosses its threshold, otherwise springs back
    /// and returns the controller to `Presented`.
    pub fn pan_ended(&mut self, velocity: Point) -> Option<PanOutcome> {
        let viewport = self.viewport.size;
        let pan = self.pan.take()?;

        let progress = Self::progress(&pan, viewport);
        let speed = (velocity.x * velocity.x + velocity.y * velocity.y).sqrt();

        if progress > COMMIT_PROGRESS || speed > COMMIT_SPEED {
            let dx = pan.center.x - pan.origin.x;
            let dy = pan.center.y - pan.origin.y;
            log::debug!(
                "Pan commit: progress {:.2}, speed {:.0} px/s",
                progress,
                speed
            );
            Some(PanOutcome::Commit(TransitionAnimation {
                from_frame: self.dismiss_source_frame(&pan.scroll).offset_by(dx, dy),
                to_frame: self.context.converted_rect,
                from_background_alpha: pan.background_alpha,
                to_background_alpha: 0.0,
                duration: self.context.duration,
                curve: self.context.curve,
            }))
        } else {
            log::debug!("Pan cancelled at progress {:.2}", progress);
            self.phase = TransitionPhase::Presented;
            Some(PanOutcome::SpringBack(SpringBack {
                center: pan.origin,
                background_alpha: 1.0,
                duration: SPRING_BACK_DURATION,
            }))
        }
    }

    fn progress(pan: &PanState, viewport: Size) -> f32 {
        let dx = (pan.center.x - pan.origin.x).abs();
        let dy = (pan.center.y - pan.origin.y).abs();
        (dx / viewport.width).max(dy / viewport.height)
    }

    /// Where the image content currently sits on screen, accounting for zoom
    /// and scroll. This is the dismiss animation's starting frame.
    fn dismiss_source_frame(&self, scroll: &DetailScrollState) -> Rect {
        if scroll.zoom_scale == 1.0 && self.info.content_mode == ContentMode::Fit {
            self.viewport
        } else {
            Rect::new(
                -scroll.content_offset.x,
                -scroll.content_offset.y,
                scroll.content_size.width,
                scroll.content_size.height,
            )
        }
    }
}
