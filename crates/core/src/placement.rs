//! Pointer-driven placement, selection, drag and resize of annotations
//!
//! The controller turns display-space pointer events into store commits. Drag and
//! resize only track transient display positions until pointer-up, when a single
//! `update` is committed. All coordinate math goes through [`crate::geometry`].

use std::fmt::Write as _;

use thiserror::Error;

use crate::annotation::{
    estimate_text_size, Annotation, AnnotationId, AnnotationPatch, AnnotationPayload,
    NewAnnotation, Tool,
};
use crate::config::SignerConfig;
use crate::geometry::{
    anchor_to_box_origin, box_origin_to_anchor, clamp_to_page, display_rect, drag_delta,
    BoxSize, DisplayOffset, DisplayPoint, DisplayRect, DisplayTransform, DocumentPoint,
    GeometryError, PageBounds,
};
use crate::page::PageMetadataProvider;
use crate::store::{AnnotationStore, StoreError};
use crate::view::ViewState;

/// Pointer event on a page's overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Zero-based page index
    pub page_index: u32,
    /// Position relative to the page's top-left corner, in CSS pixels
    pub position: DisplayPoint,
}

impl PointerEvent {
    pub fn new(page_index: u32, x: f32, y: f32) -> Self {
        Self {
            page_index,
            position: DisplayPoint::new(x, y),
        }
    }
}

/// Corner of an annotation box in document space (Y up)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeHandle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 4] = [
        ResizeHandle::TopLeft,
        ResizeHandle::TopRight,
        ResizeHandle::BottomLeft,
        ResizeHandle::BottomRight,
    ];

    /// Outward direction of the corner on each axis
    fn direction(self) -> (f32, f32) {
        match self {
            ResizeHandle::TopLeft => (-1.0, 1.0),
            ResizeHandle::TopRight => (1.0, 1.0),
            ResizeHandle::BottomLeft => (-1.0, -1.0),
            ResizeHandle::BottomRight => (1.0, -1.0),
        }
    }

    /// Document position of this corner for a box with the given origin
    pub fn corner(self, origin: DocumentPoint, size: BoxSize) -> DocumentPoint {
        let (sx, sy) = self.direction();
        DocumentPoint::new(
            if sx > 0.0 { origin.x + size.width } else { origin.x },
            if sy > 0.0 { origin.y + size.height } else { origin.y },
        )
    }
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] GeometryError),

    #[error("no page bounds for page {0}")]
    MissingPageBounds(u32),

    #[error("signature tool armed without a signature image")]
    MissingSignatureImage,

    #[error("no text placement is pending")]
    NoPendingText,

    #[error("text annotation content is empty")]
    EmptyText,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementState {
    Idle,
    Armed(Tool),
    PendingText {
        page_index: u32,
        position: DocumentPoint,
    },
    Dragging(AnnotationId),
    Resizing(AnnotationId, ResizeHandle),
}

/// Result of a pointer-down
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlacementOutcome {
    Placed(AnnotationId),
    AwaitingText,
    DragStarted(AnnotationId),
    ResizeStarted(AnnotationId, ResizeHandle),
    Deselected,
}

/// Transient feedback for an in-progress gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionPreview {
    /// Translate the element by `offset` pixels from its committed position
    Move {
        id: AnnotationId,
        offset: DisplayOffset,
    },
    /// Draw the element in `rect`
    Resize { id: AnnotationId, rect: DisplayRect },
}

#[derive(Debug, Clone)]
struct Gesture {
    original: Annotation,
    start: DisplayPoint,
    current: DisplayPoint,
    transform: DisplayTransform,
}

#[derive(Debug, Clone)]
enum Interaction {
    Idle,
    Armed(Tool),
    PendingText {
        page_index: u32,
        position: DocumentPoint,
        bounds: PageBounds,
    },
    Dragging(Gesture),
    Resizing {
        gesture: Gesture,
        handle: ResizeHandle,
    },
}

/// Interaction state machine for one document view
#[derive(Debug)]
pub struct PlacementController {
    state: Interaction,
    view: ViewState,
    config: SignerConfig,
    signature_image: Option<Vec<u8>>,
}

impl PlacementController {
    pub fn new(config: SignerConfig) -> Self {
        Self {
            state: Interaction::Idle,
            view: ViewState::default(),
            config,
            signature_image: None,
        }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Replace the view state; in-progress gestures keep the transform they started with
    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
    }

    /// Encoded image used by the signature tool
    pub fn set_signature_image(&mut self, image: Vec<u8>) {
        self.signature_image = Some(image);
    }

    pub fn has_signature_image(&self) -> bool {
        self.signature_image.as_ref().is_some_and(|img| !img.is_empty())
    }

    pub fn state(&self) -> PlacementState {
        match &self.state {
            Interaction::Idle => PlacementState::Idle,
            Interaction::Armed(tool) => PlacementState::Armed(*tool),
            Interaction::PendingText {
                page_index,
                position,
                ..
            } => PlacementState::PendingText {
                page_index: *page_index,
                position: *position,
            },
            Interaction::Dragging(gesture) => PlacementState::Dragging(gesture.original.id),
            Interaction::Resizing { gesture, handle } => {
                PlacementState::Resizing(gesture.original.id, *handle)
            }
        }
    }

    pub fn arm(&mut self, tool: Tool) {
        self.state = Interaction::Armed(tool);
    }

    pub fn disarm(&mut self) {
        if matches!(self.state, Interaction::Armed(_)) {
            self.state = Interaction::Idle;
        }
    }

    /// Drop any in-progress interaction without touching the store
    pub fn cancel(&mut self) {
        if !matches!(self.state, Interaction::Armed(_)) {
            self.state = Interaction::Idle;
        }
    }

    pub fn pointer_down(
        &mut self,
        store: &mut AnnotationStore,
        pages: &dyn PageMetadataProvider,
        event: PointerEvent,
    ) -> Result<PlacementOutcome, PlacementError> {
        // A new press abandons unfinished gestures and pending text
        let armed = match self.state {
            Interaction::Armed(tool) => Some(tool),
            _ => None,
        };
        if armed.is_none() {
            self.state = Interaction::Idle;
        }

        let transform = self.resolve_transform(pages, event.page_index)?;

        if let Some((annotation, handle)) = self.hit_handle(store, &transform, event) {
            let id = annotation.id;
            self.state = Interaction::Resizing {
                gesture: Gesture {
                    original: annotation,
                    start: event.position,
                    current: event.position,
                    transform,
                },
                handle,
            };
            return Ok(PlacementOutcome::ResizeStarted(id, handle));
        }

        if let Some(id) = hit_test(store, &transform, &self.config, event) {
            store.select(Some(id))?;
            let original = store.get(id).cloned().ok_or(StoreError::NotFound(id))?;
            self.state = Interaction::Dragging(Gesture {
                original,
                start: event.position,
                current: event.position,
                transform,
            });
            return Ok(PlacementOutcome::DragStarted(id));
        }

        match armed {
            Some(tool) => self.place(store, &transform, tool, event),
            None => {
                store.select(None)?;
                Ok(PlacementOutcome::Deselected)
            }
        }
    }

    /// Track the pointer during a drag or resize. No store access.
    pub fn pointer_move(&mut self, position: DisplayPoint) {
        match &mut self.state {
            Interaction::Dragging(gesture) | Interaction::Resizing { gesture, .. } => {
                gesture.current = position;
            }
            _ => {}
        }
    }

    pub fn preview(&self) -> Option<InteractionPreview> {
        match &self.state {
            Interaction::Dragging(gesture) => Some(InteractionPreview::Move {
                id: gesture.original.id,
                offset: DisplayOffset {
                    dx: gesture.current.x - gesture.start.x,
                    dy: gesture.current.y - gesture.start.y,
                },
            }),
            Interaction::Resizing { gesture, handle } => {
                let (position, size) = self.resolve_resize(gesture, *handle);
                let anchor = gesture.original.anchor();
                Some(InteractionPreview::Resize {
                    id: gesture.original.id,
                    rect: display_rect(&gesture.transform, position, size, anchor),
                })
            }
            _ => None,
        }
    }

    /// Finish a drag or resize, committing at most one update
    ///
    /// Returns the id of the annotation that changed, if any.
    pub fn pointer_up(
        &mut self,
        store: &mut AnnotationStore,
        position: DisplayPoint,
    ) -> Result<Option<AnnotationId>, PlacementError> {
        match std::mem::replace(&mut self.state, Interaction::Idle) {
            Interaction::Dragging(mut gesture) => {
                gesture.current = position;
                let delta = drag_delta(&gesture.transform, gesture.start, gesture.current);
                if delta.is_zero() {
                    return Ok(None);
                }

                let original = &gesture.original;
                let size = original.box_size(self.config.font_size);
                let moved = clamp_to_page(
                    original.position.offset(delta),
                    size,
                    original.anchor(),
                    gesture.transform.page_bounds(),
                );
                if moved == original.position {
                    return Ok(None);
                }

                store.update(original.id, AnnotationPatch::position(moved))?;
                log::debug!(
                    "moved annotation {} by ({:.2}, {:.2}) to ({:.2}, {:.2})",
                    original.id,
                    delta.dx,
                    delta.dy,
                    moved.x,
                    moved.y
                );
                Ok(Some(original.id))
            }
            Interaction::Resizing {
                mut gesture,
                handle,
            } => {
                gesture.current = position;
                if gesture.start.distance_to(&gesture.current) <= f32::EPSILON {
                    return Ok(None);
                }

                let (moved, size) = self.resolve_resize(&gesture, handle);
                let original = &gesture.original;
                if moved == original.position && Some(size) == original.size {
                    return Ok(None);
                }

                store.update(
                    original.id,
                    AnnotationPatch::position(moved).with_size(size),
                )?;
                log::debug!(
                    "resized annotation {} to {:.2}x{:.2} at ({:.2}, {:.2})",
                    original.id,
                    size.width,
                    size.height,
                    moved.x,
                    moved.y
                );
                Ok(Some(original.id))
            }
            other => {
                self.state = other;
                Ok(None)
            }
        }
    }

    /// Commit a pending text annotation
    pub fn submit_text(
        &mut self,
        store: &mut AnnotationStore,
        text: &str,
    ) -> Result<AnnotationId, PlacementError> {
        let Interaction::PendingText {
            page_index,
            position,
            bounds,
        } = self.state
        else {
            return Err(PlacementError::NoPendingText);
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(PlacementError::EmptyText);
        }

        let size =
            estimate_text_size(text, self.config.font_size).with_floor(self.config.min_annotation_size);
        let position = clamp_to_page(position, size, Tool::Text.anchor(), &bounds);
        let id = store.add(
            NewAnnotation::new(
                page_index,
                position,
                AnnotationPayload::Text {
                    text: text.to_string(),
                },
            )
            .with_size(size),
        );
        store.select(Some(id))?;
        self.state = Interaction::Idle;
        Ok(id)
    }

    fn place(
        &mut self,
        store: &mut AnnotationStore,
        transform: &DisplayTransform,
        tool: Tool,
        event: PointerEvent,
    ) -> Result<PlacementOutcome, PlacementError> {
        let point = transform.to_document(event.position);
        let bounds = *transform.page_bounds();

        let (payload, size) = match tool {
            Tool::Text => {
                let position = clamp_to_page(point, tool.default_size(), tool.anchor(), &bounds);
                self.state = Interaction::PendingText {
                    page_index: event.page_index,
                    position,
                    bounds,
                };
                return Ok(PlacementOutcome::AwaitingText);
            }
            Tool::Signature => {
                let image = self
                    .signature_image
                    .clone()
                    .filter(|img| !img.is_empty())
                    .ok_or(PlacementError::MissingSignatureImage)?;
                (AnnotationPayload::Signature { image }, tool.default_size())
            }
            Tool::Date => {
                let text = self.today();
                let size = estimate_text_size(&text, self.config.font_size);
                (AnnotationPayload::Date { text }, size)
            }
            Tool::Check => (AnnotationPayload::Check, tool.default_size()),
        };

        let size = size.with_floor(self.config.min_annotation_size);
        let position = clamp_to_page(point, size, tool.anchor(), &bounds);
        log::debug!(
            "placing {:?} at display ({:.1}, {:.1}) -> document ({:.2}, {:.2})",
            tool,
            event.position.x,
            event.position.y,
            position.x,
            position.y
        );

        let id = store.add(NewAnnotation::new(event.page_index, position, payload).with_size(size));
        store.select(Some(id))?;
        self.state = Interaction::Idle;
        Ok(PlacementOutcome::Placed(id))
    }

    fn resolve_transform(
        &self,
        pages: &dyn PageMetadataProvider,
        page_index: u32,
    ) -> Result<DisplayTransform, PlacementError> {
        let bounds = pages
            .page_bounds(page_index)
            .ok_or(PlacementError::MissingPageBounds(page_index))?;
        Ok(self.view.transform_for(bounds)?)
    }

    fn hit_handle(
        &self,
        store: &AnnotationStore,
        transform: &DisplayTransform,
        event: PointerEvent,
    ) -> Option<(Annotation, ResizeHandle)> {
        let selected = store.selected()?;
        if selected.page_index != event.page_index || !selected.tool().is_resizable() {
            return None;
        }

        let size = selected.box_size(self.config.font_size);
        let origin = anchor_to_box_origin(selected.position, size, selected.anchor());
        ResizeHandle::ALL
            .into_iter()
            .find(|handle| {
                let corner = transform.to_display(handle.corner(origin, size));
                corner.distance_to(&event.position) <= self.config.handle_radius
            })
            .map(|handle| (selected.clone(), handle))
    }

    /// Proposed anchor position and size for a resize gesture
    fn resolve_resize(&self, gesture: &Gesture, handle: ResizeHandle) -> (DocumentPoint, BoxSize) {
        let original = &gesture.original;
        let anchor = original.anchor();
        let bounds = gesture.transform.page_bounds();
        let size = original.box_size(self.config.font_size);
        let origin = anchor_to_box_origin(original.position, size, anchor);

        let delta = drag_delta(&gesture.transform, gesture.start, gesture.current);
        let (sx, sy) = handle.direction();
        let scale_x = (size.width + sx * delta.dx) / size.width;
        let scale_y = (size.height + sy * delta.dy) / size.height;

        // The axis that moved more drives the uniform scale
        let mut factor = if (scale_x - 1.0).abs() >= (scale_y - 1.0).abs() {
            scale_x
        } else {
            scale_y
        };
        let fit = (bounds.width / size.width).min(bounds.height / size.height);
        if fit.is_finite() {
            factor = factor.min(fit);
        }
        let floor = self.config.min_annotation_size / size.width.min(size.height);
        factor = factor.max(floor);

        let new_size = size.scaled(factor);
        let new_origin = DocumentPoint::new(
            if sx > 0.0 { origin.x } else { origin.x + size.width - new_size.width },
            if sy > 0.0 { origin.y } else { origin.y + size.height - new_size.height },
        );
        let position = box_origin_to_anchor(new_origin, new_size, anchor);
        (clamp_to_page(position, new_size, anchor, bounds), new_size)
    }

    fn today(&self) -> String {
        let now = chrono::Local::now();
        let mut text = String::new();
        if write!(text, "{}", now.format(&self.config.date_format)).is_err() {
            log::warn!(
                "invalid date format {:?}, using default",
                self.config.date_format
            );
            text = now.format("%m/%d/%Y").to_string();
        }
        text
    }
}

/// Topmost annotation whose (touch-inflated) display box contains the event
pub fn hit_test(
    store: &AnnotationStore,
    transform: &DisplayTransform,
    config: &SignerConfig,
    event: PointerEvent,
) -> Option<AnnotationId> {
    store
        .list(event.page_index)
        .into_iter()
        .rev()
        .find(|annotation| {
            let rect = display_rect(
                transform,
                annotation.position,
                annotation.box_size(config.font_size),
                annotation.anchor(),
            )
            .inflate_to(config.min_touch_target);
            rect.contains(event.position)
        })
        .map(|annotation| annotation.id)
}
