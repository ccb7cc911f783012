//! PDF Signer Core Library
//!
//! Coordinate geometry, annotation model and placement state machine shared by
//! the interactive overlay and the stamping pipeline.

pub mod annotation;
pub mod config;
pub mod geometry;
pub mod page;
pub mod placement;
pub mod store;
pub mod view;

pub use annotation::{
    estimate_text_size, Annotation, AnnotationId, AnnotationPatch, AnnotationPayload,
    NewAnnotation, Tool,
};
pub use config::{ConfigError, SignerConfig};
pub use geometry::{
    anchor_to_box_origin, box_origin_to_anchor, clamp_to_page, display_rect,
    display_transform_for_anchor, drag_delta, fits_on_page, Anchor, BoxSize, DisplayOffset,
    DisplayPoint, DisplayRect, DisplayTransform, DocumentDelta, DocumentPoint, GeometryError,
    PageBounds,
};
pub use page::{PageMetadataProvider, StaticPages};
pub use placement::{
    hit_test, InteractionPreview, PlacementController, PlacementError, PlacementOutcome,
    PlacementState, PointerEvent, ResizeHandle,
};
pub use store::{AnnotationChange, AnnotationStore, ChangeKind, StoreError};
pub use view::ViewState;
