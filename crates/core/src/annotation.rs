//! Annotation data model
//!
//! Annotations are stored in document space. The anchor and default size of each
//! kind are fixed by its payload and never stored.

use serde::{Deserialize, Serialize};

use crate::geometry::{Anchor, BoxSize, DocumentPoint};

/// Unique identifier for an annotation
///
/// Generated at creation with UUID v4 and never reused.
pub type AnnotationId = uuid::Uuid;

/// Average glyph advance as a fraction of the font size
pub const TEXT_WIDTH_FACTOR: f32 = 0.6;

/// Line box height as a fraction of the font size (12pt → 16pt)
pub const TEXT_HEIGHT_FACTOR: f32 = 4.0 / 3.0;

/// Annotation tool selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Signature,
    Text,
    Date,
    Check,
}

impl Tool {
    pub fn anchor(self) -> Anchor {
        match self {
            Tool::Signature | Tool::Check => Anchor::Center,
            Tool::Text | Tool::Date => Anchor::BaselineLeft,
        }
    }

    /// Default box size in points before any content is known
    pub fn default_size(self) -> BoxSize {
        match self {
            Tool::Signature => BoxSize::new(160.0, 60.0),
            Tool::Check => BoxSize::new(20.0, 20.0),
            Tool::Text | Tool::Date => BoxSize::new(100.0, 16.0),
        }
    }

    /// Whether the box can be resized with corner handles
    ///
    /// Only image-based marks resize; text follows its content and checks keep
    /// their fixed size.
    pub fn is_resizable(self) -> bool {
        matches!(self, Tool::Signature)
    }
}

/// Kind-specific content of an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationPayload {
    /// Encoded raster image (PNG or JPEG). Empty means the image is missing.
    Signature {
        #[serde(default, with = "base64_bytes")]
        image: Vec<u8>,
    },
    Text { text: String },
    Date { text: String },
    Check,
}

impl AnnotationPayload {
    pub fn tool(&self) -> Tool {
        match self {
            AnnotationPayload::Signature { .. } => Tool::Signature,
            AnnotationPayload::Text { .. } => Tool::Text,
            AnnotationPayload::Date { .. } => Tool::Date,
            AnnotationPayload::Check => Tool::Check,
        }
    }

    pub fn anchor(&self) -> Anchor {
        self.tool().anchor()
    }

    /// Text content for text and date payloads
    pub fn text(&self) -> Option<&str> {
        match self {
            AnnotationPayload::Text { text } | AnnotationPayload::Date { text } => Some(text),
            AnnotationPayload::Signature { .. } | AnnotationPayload::Check => None,
        }
    }
}

/// Estimate the box of a single line of text
pub fn estimate_text_size(text: &str, font_size: f32) -> BoxSize {
    let chars = text.chars().count().max(1) as f32;
    BoxSize::new(
        chars * font_size * TEXT_WIDTH_FACTOR,
        font_size * TEXT_HEIGHT_FACTOR,
    )
}

/// A placed mark on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    /// Zero-based page index
    pub page_index: u32,
    /// Anchor point in document space
    pub position: DocumentPoint,
    /// Explicit box size; text boxes may leave it to estimation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<BoxSize>,
    pub payload: AnnotationPayload,
    /// Creation order, assigned by the store and never reassigned
    pub order: u32,
}

impl Annotation {
    pub fn anchor(&self) -> Anchor {
        self.payload.anchor()
    }

    pub fn tool(&self) -> Tool {
        self.payload.tool()
    }

    /// Effective box size: the stored size, else an estimate for text or the tool default
    pub fn box_size(&self, font_size: f32) -> BoxSize {
        if let Some(size) = self.size {
            return size;
        }
        match self.payload.text() {
            Some(text) => estimate_text_size(text, font_size),
            None => self.tool().default_size(),
        }
    }

    /// Apply a patch, returning whether anything changed
    pub fn apply(&mut self, patch: &AnnotationPatch) -> bool {
        let before = self.clone();
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = Some(size);
        }
        if let Some(new_text) = &patch.text {
            match &mut self.payload {
                AnnotationPayload::Text { text } | AnnotationPayload::Date { text } => {
                    *text = new_text.clone();
                }
                AnnotationPayload::Signature { .. } | AnnotationPayload::Check => {}
            }
        }
        *self != before
    }
}

/// Fields supplied when creating an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    pub page_index: u32,
    pub position: DocumentPoint,
    #[serde(default)]
    pub size: Option<BoxSize>,
    pub payload: AnnotationPayload,
}

impl NewAnnotation {
    pub fn new(page_index: u32, position: DocumentPoint, payload: AnnotationPayload) -> Self {
        Self {
            page_index,
            position,
            size: None,
            payload,
        }
    }

    pub fn with_size(mut self, size: BoxSize) -> Self {
        self.size = Some(size);
        self
    }
}

/// Partial update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationPatch {
    pub position: Option<DocumentPoint>,
    pub size: Option<BoxSize>,
    pub text: Option<String>,
}

impl AnnotationPatch {
    pub fn position(position: DocumentPoint) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn with_size(mut self, size: BoxSize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        // Accept data URLs as produced by signature pads
        let encoded = match encoded.split_once(";base64,") {
            Some((_, data)) => data,
            None => encoded.as_str(),
        };
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
