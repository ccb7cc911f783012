mod common;

use common::*;
use lopdf::Object;
use pdf_engine::{
    stamp, LopdfDocument, MemorySource, StampError, StampOptions, StampWarning, StampingPipeline,
};
use pdf_signer_core::{
    Annotation, AnnotationPayload, AnnotationStore, BoxSize, DocumentPoint, NewAnnotation,
};

fn annotations(new: Vec<NewAnnotation>) -> Vec<Annotation> {
    let mut store = AnnotationStore::default();
    for annotation in new {
        store.add(annotation);
    }
    store.snapshot()
}

fn signature(page: u32, x: f32, y: f32, image: Vec<u8>) -> NewAnnotation {
    NewAnnotation::new(page, DocumentPoint::new(x, y), AnnotationPayload::Signature { image })
}

fn text(page: u32, x: f32, y: f32, value: &str) -> NewAnnotation {
    NewAnnotation::new(
        page,
        DocumentPoint::new(x, y),
        AnnotationPayload::Text {
            text: value.to_string(),
        },
    )
}

#[test]
fn signature_is_drawn_at_its_box_origin() {
    let original = sample_pdf(1);
    let marks = annotations(vec![signature(0, 100.0, 100.0, png_bytes(8, 4))]);

    let output = stamp(&original, &marks, &StampOptions::default()).unwrap();
    assert!(output.warnings.is_empty());
    assert_eq!(output.stamped, 1);

    let doc = load(&output.bytes);
    let ops = page_operations(&doc, 1);
    let cms = find_all(&ops, "cm");
    assert_eq!(cms.len(), 1);
    assert_close(&operands(cms[0]), &[160.0, 0.0, 0.0, 60.0, 20.0, 70.0]);

    let draws = find_all(&ops, "Do");
    assert_eq!(draws.len(), 1);
    let name = draws[0].operands[0].as_name().unwrap().to_vec();

    let xobjects = page_resource(&doc, 1, "XObject");
    let image_id = xobjects.get(&name).unwrap().as_reference().unwrap();
    let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
    assert_eq!(image.dict.get(b"Subtype").unwrap().as_name().unwrap(), b"Image");
    assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 8);
    assert!(image.dict.has(b"SMask"));
}

#[test]
fn identical_images_are_embedded_once() {
    let original = sample_pdf(2);
    let png = png_bytes(4, 4);
    let marks = annotations(vec![
        signature(0, 100.0, 100.0, png.clone()),
        signature(0, 300.0, 300.0, png.clone()),
        signature(1, 100.0, 100.0, png),
    ]);

    let output = stamp(&original, &marks, &StampOptions::default()).unwrap();
    assert_eq!(output.stamped, 3);

    let doc = load(&output.bytes);
    let images = doc
        .objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            stream
                .dict
                .get(b"ColorSpace")
                .and_then(Object::as_name)
                .is_ok_and(|name| name == b"DeviceRGB")
        })
        .count();
    assert_eq!(images, 1);
    assert_eq!(page_resource(&doc, 1, "XObject").len(), 1);
}

#[test]
fn corrupt_image_is_skipped_with_one_warning() {
    let original = sample_pdf(1);
    let marks = annotations(vec![
        signature(0, 100.0, 100.0, b"not an image".to_vec()),
        text(0, 50.0, 500.0, "Jane Doe"),
        NewAnnotation::new(0, DocumentPoint::new(300.0, 300.0), AnnotationPayload::Check),
    ]);

    let output = stamp(&original, &marks, &StampOptions::default()).unwrap();
    assert_eq!(output.warnings.len(), 1);
    assert!(matches!(
        output.warnings[0],
        StampWarning::UndecodableImage { id, .. } if id == marks[0].id
    ));
    assert_eq!(output.stamped, 2);

    let ops = page_operations(&load(&output.bytes), 1);
    assert!(find_all(&ops, "Do").is_empty());
    assert_eq!(find_all(&ops, "S").len(), 1);
}

#[test]
fn empty_signature_warns_missing_image() {
    let marks = annotations(vec![signature(0, 100.0, 100.0, Vec::new())]);
    let output = stamp(&sample_pdf(1), &marks, &StampOptions::default()).unwrap();
    assert_eq!(
        output.warnings,
        vec![StampWarning::MissingImage { id: marks[0].id }]
    );
    assert_eq!(output.stamped, 0);
}

#[test]
fn unparseable_input_is_fatal() {
    let marks = annotations(vec![text(0, 10.0, 10.0, "x")]);
    let err = stamp(b"not a pdf at all", &marks, &StampOptions::default()).unwrap_err();
    assert!(matches!(err, StampError::Load(_)));
}

#[test]
fn annotation_past_last_page_is_skipped() {
    let marks = annotations(vec![
        text(4, 10.0, 10.0, "nowhere"),
        text(0, 10.0, 10.0, "here"),
    ]);
    let output = stamp(&sample_pdf(2), &marks, &StampOptions::default()).unwrap();

    assert_eq!(
        output.warnings,
        vec![StampWarning::PageOutOfRange {
            id: marks[0].id,
            page_index: 4,
            page_count: 2,
        }]
    );
    assert_eq!(output.stamped, 1);
}

#[test]
fn oversized_annotation_is_pinned_and_flagged() {
    let original = build_pdf(1, [0.0, 0.0, 100.0, 100.0]);
    let marks = annotations(vec![signature(0, 50.0, 50.0, png_bytes(2, 2))
        .with_size(BoxSize::new(160.0, 60.0))]);

    let output = stamp(&original, &marks, &StampOptions::default()).unwrap();
    assert_eq!(
        output.warnings,
        vec![StampWarning::OffPage {
            id: marks[0].id,
            page_index: 0,
        }]
    );

    let ops = page_operations(&load(&output.bytes), 1);
    let cm = find_all(&ops, "cm")[0];
    assert_close(&operands(cm), &[160.0, 0.0, 0.0, 60.0, 0.0, 20.0]);
}

#[test]
fn positions_are_clamped_like_the_overlay() {
    let marks = annotations(vec![signature(0, 780.0, 780.0, png_bytes(2, 2))]);
    let output = stamp(&sample_pdf(1), &marks, &StampOptions::default()).unwrap();
    assert!(output.warnings.is_empty());

    let ops = page_operations(&load(&output.bytes), 1);
    let cm = find_all(&ops, "cm")[0];
    assert_close(&operands(cm), &[160.0, 0.0, 0.0, 60.0, 452.0, 732.0]);
}

#[test]
fn text_uses_helvetica_alongside_existing_fonts() {
    let marks = annotations(vec![text(0, 72.0, 100.0, "Signed (here)")]);
    let output = stamp(&sample_pdf(1), &marks, &StampOptions::default()).unwrap();

    let doc = load(&output.bytes);
    let ops = page_operations(&doc, 1);

    let td = find_all(&ops, "Td");
    // The fixture's own text plus ours
    assert_eq!(td.len(), 2);
    assert_close(&operands(td[1]), &[72.0, 100.0]);

    let tj = find_all(&ops, "Tj");
    match &tj[1].operands[0] {
        Object::String(bytes, _) => assert_eq!(bytes, b"Signed (here)"),
        other => panic!("unexpected Tj operand {:?}", other),
    }

    let tf = find_all(&ops, "Tf")[1];
    let font_name = tf.operands[0].as_name().unwrap().to_vec();
    assert_close(&[tf.operands[1].as_float().unwrap()], &[12.0]);

    let fonts = page_resource(&doc, 1, "Font");
    assert!(fonts.has(b"F1"), "inherited font must survive");
    let font_id = fonts.get(&font_name).unwrap().as_reference().unwrap();
    let font = doc.get_dictionary(font_id).unwrap();
    assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
}

#[test]
fn custom_font_size_is_used() {
    let marks = annotations(vec![NewAnnotation::new(
        0,
        DocumentPoint::new(72.0, 100.0),
        AnnotationPayload::Date {
            text: "10/19/2026".into(),
        },
    )]);
    let options = StampOptions {
        font_size: 18.0,
        ..StampOptions::default()
    };
    let output = StampingPipeline::new(options).stamp(&sample_pdf(1), &marks).unwrap();

    let ops = page_operations(&load(&output.bytes), 1);
    let tf = find_all(&ops, "Tf")[1];
    assert_close(&[tf.operands[1].as_float().unwrap()], &[18.0]);
}

#[test]
fn check_mark_is_a_stroked_path() {
    let marks = annotations(vec![NewAnnotation::new(
        0,
        DocumentPoint::new(100.0, 200.0),
        AnnotationPayload::Check,
    )]);
    let output = stamp(&sample_pdf(1), &marks, &StampOptions::default()).unwrap();
    let ops = page_operations(&load(&output.bytes), 1);

    // Check marks are centered: the 20pt box starts at (90, 190)
    let start = find_all(&ops, "m")[0];
    assert_close(&operands(start), &[90.0, 200.0]);
    let lines = find_all(&ops, "l");
    assert_eq!(lines.len(), 2);
    assert_close(&operands(lines[0]), &[98.0, 194.0]);
    assert_close(&operands(lines[1]), &[110.0, 208.0]);
    assert_close(&operands(find_all(&ops, "w")[0]), &[2.0]);
    assert_eq!(find_all(&ops, "S").len(), 1);
}

#[test]
fn original_content_is_preserved_and_isolated() {
    let marks = annotations(vec![text(0, 10.0, 10.0, "x")]);
    let output = stamp(&sample_pdf(1), &marks, &StampOptions::default()).unwrap();
    let ops = page_operations(&load(&output.bytes), 1);

    let operators: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
    assert_eq!(operators.first(), Some(&"q"));
    assert_eq!(operators.last(), Some(&"Q"));
    let hello = ops
        .iter()
        .position(|op| {
            op.operator == "Tj"
                && matches!(&op.operands[0], Object::String(bytes, _) if bytes == b"Hello page 1")
        })
        .expect("original text is kept");
    assert_eq!(operators[hello + 1], "ET");
    assert_eq!(operators[hello + 2], "Q");

    let saves = operators.iter().filter(|op| **op == "q").count();
    let restores = operators.iter().filter(|op| **op == "Q").count();
    assert_eq!(saves, restores);
}

#[test]
fn indirect_contents_array_is_spliced() {
    let marks = annotations(vec![NewAnnotation::new(
        0,
        DocumentPoint::new(300.0, 300.0),
        AnnotationPayload::Check,
    )]);
    let output = stamp(&pdf_with_indirect_contents_array(), &marks, &StampOptions::default()).unwrap();
    let doc = load(&output.bytes);

    let page = doc.get_dictionary(page_id(&doc, 1)).unwrap();
    let contents = page.get(b"Contents").unwrap().as_array().unwrap();
    for item in contents {
        let id = item.as_reference().expect("contents holds references");
        assert!(doc.get_object(id).unwrap().as_stream().is_ok(), "{:?} is not a stream", id);
    }

    let ops = page_operations(&doc, 1);
    let moves = find_all(&ops, "m");
    assert_eq!(moves.len(), 2);
    assert_close(&operands(moves[0]), &[0.0, 0.0]);
    assert_close(&operands(moves[1]), &[290.0, 300.0]);
    assert_eq!(find_all(&ops, "S").len(), 2);
    assert_eq!(find_all(&ops, "q").len(), find_all(&ops, "Q").len());
}

#[test]
fn untouched_pages_keep_their_content() {
    let marks = annotations(vec![text(1, 10.0, 10.0, "second")]);
    let output = stamp(&sample_pdf(2), &marks, &StampOptions::default()).unwrap();
    let doc = load(&output.bytes);

    let first = page_operations(&doc, 1);
    assert!(find_all(&first, "q").is_empty());
    assert_eq!(find_all(&first, "Tj").len(), 1);
    assert_eq!(find_all(&page_operations(&doc, 2), "Tj").len(), 2);
}

#[test]
fn offset_media_box_translates_the_stamp() {
    let original = build_pdf(1, [50.0, 30.0, 662.0, 822.0]);
    let marks = annotations(vec![text(0, 10.0, 10.0, "offset")]);
    let output = stamp(&original, &marks, &StampOptions::default()).unwrap();

    let ops = page_operations(&load(&output.bytes), 1);
    let cm = find_all(&ops, "cm");
    assert_eq!(cm.len(), 1);
    assert_close(&operands(cm[0]), &[1.0, 0.0, 0.0, 1.0, 50.0, 30.0]);
}

#[test]
fn stamped_output_reopens_with_same_geometry() {
    let original = sample_pdf(3);
    let marks = annotations(vec![
        signature(2, 300.0, 400.0, png_bytes(16, 6)),
        text(0, 72.0, 72.0, "Approved"),
    ]);
    let pipeline = StampingPipeline::default();
    let output = pipeline
        .stamp_source(&MemorySource::new(original.clone()), &marks)
        .unwrap();

    let before = LopdfDocument::open(original).unwrap();
    let after = LopdfDocument::open(output.bytes).unwrap();
    assert_eq!(after.page_count(), 3);
    assert_eq!(before.pages(), after.pages());
}

#[test]
fn no_annotations_still_produces_a_valid_copy() {
    let output = stamp(&sample_pdf(1), &[], &StampOptions::default()).unwrap();
    assert_eq!(output.stamped, 0);
    assert_eq!(find_all(&page_operations(&load(&output.bytes), 1), "Tj").len(), 1);
}
