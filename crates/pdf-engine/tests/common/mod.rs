#![allow(dead_code)]

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Letter pages whose MediaBox and F1 font are inherited from the Pages node
pub fn sample_pdf(page_count: usize) -> Vec<u8> {
    build_pdf(page_count, [0.0, 0.0, 612.0, 792.0])
}

pub fn build_pdf(page_count: usize, media_box: [f32; 4]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::with_capacity(page_count);
    for page in 0..page_count {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Hello page {}", page + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
            "MediaBox" => media_box.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    bytes
}

/// One Letter page whose `Contents` is a reference to an array of streams
pub fn pdf_with_indirect_contents_array() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let stroke_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m 10 10 l S".to_vec()));
    let contents_id = doc.add_object(Object::Array(vec![Object::Reference(stroke_id)]));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => contents_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => 1,
            "Kids" => vec![Object::Reference(page_id)],
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    bytes
}

/// Half-transparent red PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 0, 0, 128]));
    let mut cursor = Cursor::new(Vec::new());
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("png should encode");
    cursor.into_inner()
}

pub fn load(bytes: &[u8]) -> Document {
    Document::load_mem(bytes).expect("stamped output should parse")
}

pub fn page_id(doc: &Document, page_number: u32) -> ObjectId {
    *doc.get_pages().get(&page_number).expect("page exists")
}

/// Decoded operations of every content stream on a page, in order
pub fn page_operations(doc: &Document, page_number: u32) -> Vec<Operation> {
    let content = doc
        .get_page_content(page_id(doc, page_number))
        .expect("page content should be readable");
    Content::decode(&content)
        .expect("page content should decode")
        .operations
}

pub fn operands(op: &Operation) -> Vec<f32> {
    op.operands
        .iter()
        .map(|operand| operand.as_float().expect("numeric operand"))
        .collect()
}

pub fn find_all<'a>(ops: &'a [Operation], operator: &str) -> Vec<&'a Operation> {
    ops.iter().filter(|op| op.operator == operator).collect()
}

/// Resource sub-dictionary on the page itself
pub fn page_resource<'a>(doc: &'a Document, page_number: u32, category: &str) -> &'a lopdf::Dictionary {
    let page = doc.get_dictionary(page_id(doc, page_number)).unwrap();
    let resources = match page.get(b"Resources").unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        Object::Dictionary(dict) => dict,
        other => panic!("unexpected resources {:?}", other),
    };
    match resources.get(category.as_bytes()).unwrap() {
        Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
        Object::Dictionary(dict) => dict,
        other => panic!("unexpected {} {:?}", category, other),
    }
}

pub fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "{:?} vs {:?}", actual, expected);
    }
}
