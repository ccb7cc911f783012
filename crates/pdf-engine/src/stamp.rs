//! Bakes annotations into a copy of the original document.
//!
//! Positions go through the same `clamp_to_page` and `anchor_to_box_origin`
//! used by the on-screen overlay, so a stamped mark lands exactly where it was
//! displayed. Recoverable problems with individual annotations are collected as
//! [`StampWarning`]s; only an unreadable input or a failed write aborts.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdf_signer_core::{
    anchor_to_box_origin, clamp_to_page, fits_on_page, Annotation, AnnotationId,
    AnnotationPayload, DocumentPoint, PageBounds, SignerConfig,
};
use thiserror::Error;

use crate::page_tree::{self, PageInfo};
use crate::source::DocumentSource;

const FONT_PREFIX: &str = "SgnHelv";
const IMAGE_PREFIX: &str = "SgnImg";

#[derive(Debug, Clone, PartialEq)]
pub struct StampOptions {
    /// Font size for text and date annotations, in points
    pub font_size: f32,
    /// Stroke width of check marks, in points
    pub check_stroke_width: f32,
}

impl Default for StampOptions {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            check_stroke_width: 2.0,
        }
    }
}

impl StampOptions {
    pub fn from_config(config: &SignerConfig) -> Self {
        Self {
            font_size: config.font_size,
            ..Self::default()
        }
    }
}

/// Recoverable issue with one annotation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StampWarning {
    #[error("signature {id} has no image; skipped")]
    MissingImage { id: AnnotationId },

    #[error("signature {id} image could not be decoded ({reason}); skipped")]
    UndecodableImage { id: AnnotationId, reason: String },

    #[error("annotation {id} is larger than page {page_index} and extends past its edge")]
    OffPage { id: AnnotationId, page_index: u32 },

    #[error("annotation {id} targets page {page_index} but the document has {page_count} pages; skipped")]
    PageOutOfRange {
        id: AnnotationId,
        page_index: u32,
        page_count: u32,
    },
}

#[derive(Debug, Error)]
pub enum StampError {
    #[error("failed to read original document: {0}")]
    Source(#[from] std::io::Error),

    #[error("failed to load original document: {0}")]
    Load(#[source] lopdf::Error),

    #[error("malformed page structure: {0}")]
    Structure(#[source] lopdf::Error),

    #[error("failed to encode stamped content: {0}")]
    Encode(#[source] lopdf::Error),

    #[error("failed to write stamped document: {0}")]
    Write(String),
}

#[derive(Debug, Clone)]
pub struct StampOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<StampWarning>,
    /// Annotations actually drawn
    pub stamped: usize,
}

/// Stamp annotations onto `original` with the given options
pub fn stamp(
    original: &[u8],
    annotations: &[Annotation],
    options: &StampOptions,
) -> Result<StampOutput, StampError> {
    StampingPipeline::new(options.clone()).stamp(original, annotations)
}

#[derive(Debug, Clone, Default)]
pub struct StampingPipeline {
    options: StampOptions,
}

/// Decoded signature ready for embedding
struct EncodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Vec<u8>,
}

/// Drawing and resources accumulated for one page
#[derive(Default)]
struct PageStamp {
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
    font: Option<String>,
    drawn: usize,
}

impl StampingPipeline {
    pub fn new(options: StampOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StampOptions {
        &self.options
    }

    pub fn stamp_source(
        &self,
        source: &dyn DocumentSource,
        annotations: &[Annotation],
    ) -> Result<StampOutput, StampError> {
        let bytes = source.load_bytes()?;
        self.stamp(&bytes, annotations)
    }

    pub fn stamp(&self, original: &[u8], annotations: &[Annotation]) -> Result<StampOutput, StampError> {
        let mut doc = Document::load_mem(original).map_err(StampError::Load)?;
        let pages = doc.get_pages();
        let page_count = pages.len() as u32;
        let mut warnings = Vec::new();

        let mut by_page: BTreeMap<u32, Vec<&Annotation>> = BTreeMap::new();
        for annotation in annotations {
            if annotation.page_index >= page_count {
                warnings.push(StampWarning::PageOutOfRange {
                    id: annotation.id,
                    page_index: annotation.page_index,
                    page_count,
                });
                continue;
            }
            by_page.entry(annotation.page_index).or_default().push(annotation);
        }

        let mut images: HashMap<&[u8], ObjectId> = HashMap::new();
        let mut font_id: Option<ObjectId> = None;
        let mut stamped = 0;

        for (page_index, list) in by_page {
            let Some(&page_id) = pages.get(&(page_index + 1)) else {
                continue;
            };
            let info = page_tree::read_page_info(&doc, page_id);
            let taken = existing_resource_names(&mut doc, page_id)?;
            let mut names = NameAllocator::new(taken);
            let mut page = PageStamp::default();

            for annotation in list {
                self.draw_annotation(
                    &mut doc,
                    &info,
                    annotation,
                    &mut page,
                    &mut names,
                    &mut images,
                    &mut warnings,
                );
            }

            if page.drawn == 0 {
                continue;
            }
            if page.font.is_some() && font_id.is_none() {
                font_id = Some(doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                }));
            }

            stamped += page.drawn;
            self.commit_page(&mut doc, page_id, &info, page, font_id)?;
        }

        doc.compress();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|err| StampError::Write(err.to_string()))?;

        for warning in &warnings {
            log::warn!("{}", warning);
        }
        log::info!(
            "stamped {} of {} annotations ({} warnings)",
            stamped,
            annotations.len(),
            warnings.len()
        );

        Ok(StampOutput {
            bytes,
            warnings,
            stamped,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_annotation<'a>(
        &self,
        doc: &mut Document,
        info: &PageInfo,
        annotation: &'a Annotation,
        page: &mut PageStamp,
        names: &mut NameAllocator,
        images: &mut HashMap<&'a [u8], ObjectId>,
        warnings: &mut Vec<StampWarning>,
    ) {
        let bounds = PageBounds::new(info.width, info.height);
        let anchor = annotation.anchor();
        let size = annotation.box_size(self.options.font_size);
        let position = clamp_to_page(annotation.position, size, anchor, &bounds);
        let origin = anchor_to_box_origin(position, size, anchor);

        if !fits_on_page(size, &bounds) {
            warnings.push(StampWarning::OffPage {
                id: annotation.id,
                page_index: annotation.page_index,
            });
        }

        log::debug!(
            "stamping {:?} {} at origin ({:.2}, {:.2}) size {:.2}x{:.2}",
            annotation.tool(),
            annotation.id,
            origin.x,
            origin.y,
            size.width,
            size.height
        );

        match &annotation.payload {
            AnnotationPayload::Signature { image } => {
                if image.is_empty() {
                    warnings.push(StampWarning::MissingImage { id: annotation.id });
                    return;
                }
                let image_id = match images.get(image.as_slice()) {
                    Some(id) => *id,
                    None => match decode_image(image) {
                        Ok(decoded) => {
                            let id = embed_image(doc, decoded);
                            images.insert(image.as_slice(), id);
                            id
                        }
                        Err(reason) => {
                            warnings.push(StampWarning::UndecodableImage {
                                id: annotation.id,
                                reason,
                            });
                            return;
                        }
                    },
                };

                let name = match page.images.iter().find(|(_, id)| *id == image_id) {
                    Some((name, _)) => name.clone(),
                    None => {
                        let name = names.next(IMAGE_PREFIX);
                        page.images.push((name.clone(), image_id));
                        name
                    }
                };
                page.operations.extend(image_operations(&name, origin, size.width, size.height));
            }
            AnnotationPayload::Text { text } | AnnotationPayload::Date { text } => {
                let font = page
                    .font
                    .get_or_insert_with(|| names.next(FONT_PREFIX))
                    .clone();
                page.operations
                    .extend(text_operations(&font, self.options.font_size, origin, text));
            }
            AnnotationPayload::Check => {
                page.operations.extend(check_operations(
                    origin,
                    size.width,
                    size.height,
                    self.options.check_stroke_width,
                ));
            }
        }
        page.drawn += 1;
    }

    fn commit_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        info: &PageInfo,
        page: PageStamp,
        font_id: Option<ObjectId>,
    ) -> Result<(), StampError> {
        let mut operations = vec![Operation::new("q", vec![])];
        if info.has_offset_origin() {
            operations.push(Operation::new(
                "cm",
                reals(&[1.0, 0.0, 0.0, 1.0, info.origin_x, info.origin_y]),
            ));
        }
        operations.extend(page.operations);
        operations.push(Operation::new("Q", vec![]));
        let content = Content { operations }.encode().map_err(StampError::Encode)?;

        let resources = page_tree::page_resources_mut(doc, page_id).map_err(StampError::Structure)?;
        if !page.images.is_empty() {
            let xobjects =
                page_tree::resource_category(resources, "XObject").map_err(StampError::Structure)?;
            for (name, id) in &page.images {
                xobjects.set(name.as_str(), Object::Reference(*id));
            }
        }
        if let (Some(name), Some(id)) = (&page.font, font_id) {
            let fonts = page_tree::resource_category(resources, "Font").map_err(StampError::Structure)?;
            fonts.set(name.as_str(), Object::Reference(id));
        }

        append_isolated_content(doc, page_id, content)
    }
}

/// Names already used in the page's Font and XObject resources
fn existing_resource_names(doc: &mut Document, page_id: ObjectId) -> Result<HashSet<Vec<u8>>, StampError> {
    let resources = page_tree::page_resources_mut(doc, page_id).map_err(StampError::Structure)?;
    let mut taken = HashSet::new();
    for category in [&b"Font"[..], &b"XObject"[..]] {
        if let Ok(Object::Dictionary(dict)) = resources.get(category) {
            taken.extend(dict.iter().map(|(key, _)| key.clone()));
        }
    }
    Ok(taken)
}

struct NameAllocator {
    taken: HashSet<Vec<u8>>,
    counter: usize,
}

impl NameAllocator {
    fn new(taken: HashSet<Vec<u8>>) -> Self {
        Self { taken, counter: 0 }
    }

    fn next(&mut self, prefix: &str) -> String {
        loop {
            self.counter += 1;
            let candidate = format!("{}{}", prefix, self.counter);
            if self.taken.insert(candidate.as_bytes().to_vec()) {
                return candidate;
            }
        }
    }
}

fn decode_image(bytes: &[u8]) -> Result<EncodedImage, String> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|err| err.to_string())?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }
    Ok(EncodedImage {
        width,
        height,
        rgb,
        alpha,
    })
}

/// Add an RGB image XObject with a DeviceGray soft mask
fn embed_image(doc: &mut Document, image: EncodedImage) -> ObjectId {
    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        image.alpha,
    ));
    doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        image.rgb,
    ))
}

fn reals(values: &[f32]) -> Vec<Object> {
    values.iter().map(|v| Object::Real(*v)).collect()
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn image_operations(xobject: &str, origin: DocumentPoint, width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("cm", reals(&[width, 0.0, 0.0, height, origin.x, origin.y])),
        Operation::new("Do", vec![name(xobject)]),
        Operation::new("Q", vec![]),
    ]
}

fn text_operations(font: &str, font_size: f32, origin: DocumentPoint, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("rg", reals(&[0.0, 0.0, 0.0])),
        Operation::new("Tf", vec![name(font), Object::Real(font_size)]),
        Operation::new("Td", reals(&[origin.x, origin.y])),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Two strokes: up-left arm to the low point, then the long arm to the top right
fn check_operations(origin: DocumentPoint, width: f32, height: f32, stroke: f32) -> Vec<Operation> {
    let point = |fx: f32, fy: f32| reals(&[origin.x + width * fx, origin.y + height * fy]);
    vec![
        Operation::new("q", vec![]),
        Operation::new("RG", reals(&[0.0, 0.0, 0.0])),
        Operation::new("w", vec![Object::Real(stroke)]),
        Operation::new("J", vec![Object::Integer(1)]),
        Operation::new("j", vec![Object::Integer(1)]),
        Operation::new("m", point(0.0, 0.5)),
        Operation::new("l", point(0.4, 0.2)),
        Operation::new("l", point(1.0, 0.9)),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Latin-1 subset of WinAnsi; anything else becomes `?`
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Append `content` so it runs with a clean graphics state
///
/// The existing content is wrapped in `q`/`Q` so an unbalanced CTM in the
/// original cannot displace the stamp.
fn append_isolated_content(doc: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<(), StampError> {
    let existing: Vec<Object> = match doc
        .get_dictionary(page_id)
        .map_err(StampError::Structure)?
        .get(b"Contents")
    {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of streams is spliced in place
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    let mut body = Vec::new();
    if !existing.is_empty() {
        let save = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        contents.push(Object::Reference(save));
        contents.extend(existing);
        body.extend_from_slice(b"\nQ\n");
    }
    body.extend(content);
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), body));
    contents.push(Object::Reference(stamp_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(StampError::Structure)?
        .set("Contents", Object::Array(contents));
    Ok(())
}
