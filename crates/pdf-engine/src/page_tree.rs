//! Page attribute lookup with inheritance through the page tree

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdf_signer_core::PageBounds;

/// Letter size, used when no MediaBox can be found
pub const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Guards against cyclic `Parent` chains
const MAX_TREE_DEPTH: usize = 64;

/// Geometry of one page as declared in the document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageInfo {
    /// Lower-left corner of the MediaBox
    pub origin_x: f32,
    pub origin_y: f32,
    pub width: f32,
    pub height: f32,
    /// Clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotation: u16,
}

impl PageInfo {
    pub fn bounds(&self) -> PageBounds {
        PageBounds::new(self.width, self.height).with_rotation(i32::from(self.rotation))
    }

    pub fn has_offset_origin(&self) -> bool {
        self.origin_x != 0.0 || self.origin_y != 0.0
    }
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Look up `key` on the page or the nearest ancestor that defines it
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        if depth > MAX_TREE_DEPTH {
            log::warn!("page tree deeper than {} levels, giving up on {:?}", MAX_TREE_DEPTH, id);
            return None;
        }
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let array = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = resolve(doc, item)?.as_float().ok()?;
    }
    let [x0, y0, x1, y1] = values;
    Some([x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
}

/// Read MediaBox and Rotate, falling back to Letter and no rotation
pub fn read_page_info(doc: &Document, page_id: ObjectId) -> PageInfo {
    let (origin_x, origin_y, width, height) = match media_box(doc, page_id) {
        Some([x0, y0, x1, y1]) => (x0, y0, x1 - x0, y1 - y0),
        None => (0.0, 0.0, DEFAULT_PAGE_SIZE.0, DEFAULT_PAGE_SIZE.1),
    };

    let rotate = inherited(doc, page_id, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);
    let rotation = match rotate.rem_euclid(360) {
        r @ (0 | 90 | 180 | 270) => r as u16,
        other => {
            log::warn!("ignoring non-quarter page rotation {}", other);
            0
        }
    };

    PageInfo {
        origin_x,
        origin_y,
        width,
        height,
        rotation,
    }
}

/// Give the page its own resource dictionary and return it
///
/// Inherited or shared resources are copied onto the page, and `Font` and
/// `XObject` sub-dictionaries held by reference are inlined, so additions
/// never leak into other pages.
pub fn page_resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, lopdf::Error> {
    let mut resources = inherited(doc, page_id, b"Resources")
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);

    for category in [&b"Font"[..], &b"XObject"[..]] {
        let inlined = match resources.get(category) {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok().cloned(),
            _ => None,
        };
        if let Some(dict) = inlined {
            resources.set(category.to_vec(), Object::Dictionary(dict));
        }
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    page.get_mut(b"Resources")?.as_dict_mut()
}

/// The named sub-dictionary of a resource dictionary, created if absent
pub fn resource_category<'a>(
    resources: &'a mut Dictionary,
    category: &str,
) -> Result<&'a mut Dictionary, lopdf::Error> {
    if !matches!(resources.get(category.as_bytes()), Ok(Object::Dictionary(_))) {
        resources.set(category, Object::Dictionary(Dictionary::new()));
    }
    resources.get_mut(category.as_bytes())?.as_dict_mut()
}
