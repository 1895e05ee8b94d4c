//! Low-level page edits with lopdf
//!
//! Stamped content goes into a new content stream appended to the page. The
//! page's existing streams are bracketed with `q`/`Q` so their graphics state
//! cannot leak into the stamp.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::Write;

use consent_core::signature::DecodedImage;
use consent_core::RenderError;

/// Resource name of the stamping font on each page
pub const FONT_NAME: &str = "ConsentHelv";
/// Resource name of the signature image
pub const SIGNATURE_NAME: &str = "ConsentSig";

const DEFAULT_PAGE_HEIGHT: f32 = 792.0;
const MAX_TREE_DEPTH: usize = 32;

fn malformed(e: lopdf::Error) -> RenderError {
    RenderError::MalformedTemplate(e.to_string())
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

/// Look up a page attribute, following `Parent` links for inherited values
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_object(page_id).and_then(Object::as_dict).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(resolve(doc, value).clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_object(parent).and_then(Object::as_dict).ok()?;
    }
    None
}

/// Height of the page's MediaBox in points
pub fn page_height(doc: &Document, page_id: ObjectId) -> f32 {
    match inherited_attribute(doc, page_id, b"MediaBox") {
        Some(Object::Array(bounds)) if bounds.len() == 4 => {
            match (number(&bounds[1]), number(&bounds[3])) {
                (Some(y1), Some(y2)) => (y2 - y1).abs(),
                _ => DEFAULT_PAGE_HEIGHT,
            }
        }
        _ => DEFAULT_PAGE_HEIGHT,
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, RenderError> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(malformed)
}

/// Make sure the page owns a Resources entry; returns its object id when
/// the entry is an indirect reference
fn ensure_resources(doc: &mut Document, page_id: ObjectId) -> Result<Option<ObjectId>, RenderError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(malformed)?;
    match page.get(b"Resources") {
        Ok(Object::Reference(id)) => return Ok(Some(*id)),
        Ok(Object::Dictionary(_)) => return Ok(None),
        _ => {}
    }

    let inherited = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };
    page_dict_mut(doc, page_id)?.set("Resources", inherited);
    Ok(None)
}

fn resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
    resources_id: Option<ObjectId>,
) -> Result<&mut Dictionary, RenderError> {
    match resources_id {
        Some(id) => doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(malformed),
        None => page_dict_mut(doc, page_id)?
            .get_mut(b"Resources")
            .and_then(Object::as_dict_mut)
            .map_err(malformed),
    }
}

/// Register `value` as `/category/name` in the page's resources
pub fn set_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    value: Object,
) -> Result<(), RenderError> {
    let resources_id = ensure_resources(doc, page_id)?;

    let category_ref = match resources_mut(doc, page_id, resources_id)?.get(category.as_bytes()) {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(id) = category_ref {
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(malformed)?
            .set(name, value);
        return Ok(());
    }

    let resources = resources_mut(doc, page_id, resources_id)?;
    let has_inline = matches!(resources.get(category.as_bytes()), Ok(Object::Dictionary(_)));
    if has_inline {
        if let Ok(Object::Dictionary(entries)) = resources.get_mut(category.as_bytes()) {
            entries.set(name, value);
        }
    } else {
        let mut entries = Dictionary::new();
        entries.set(name, value);
        resources.set(category, entries);
    }
    Ok(())
}

/// Add the standard Helvetica font used for stamped text
pub fn add_font(doc: &mut Document, page_id: ObjectId) -> Result<(), RenderError> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    set_resource(doc, page_id, "Font", FONT_NAME, Object::Reference(font_id))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, RenderError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| RenderError::InvalidInput(format!("image compression failed: {}", e)))
}

/// Add the signature as an image XObject, with its alpha plane as SMask
pub fn add_signature_image(
    doc: &mut Document,
    page_id: ObjectId,
    image: &DecodedImage,
) -> Result<(), RenderError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => image.width as i64,
        "Height" => image.height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if let Some(alpha) = &image.alpha {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width as i64,
                "Height" => image.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(alpha)?,
        );
        let smask_id = doc.add_object(smask);
        dict.set("SMask", Object::Reference(smask_id));
    }

    let image_id = doc.add_object(Stream::new(dict, deflate(&image.rgb)?));
    set_resource(
        doc,
        page_id,
        "XObject",
        SIGNATURE_NAME,
        Object::Reference(image_id),
    )
}

/// Encode text for a WinAnsi literal string; unmappable characters become `?`
pub fn win_ansi(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// Operations that print `text` at `(x, y)` in user space
pub fn text_operations(text: &str, x: f32, y: f32, font_size: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![FONT_NAME.into(), font_size.into()]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![win_ansi(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Operations that paint the signature XObject into a box
pub fn image_operations(x: f32, y: f32, width: f32, height: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                width.into(),
                0.into(),
                0.into(),
                height.into(),
                x.into(),
                y.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(SIGNATURE_NAME.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
    ]
}

/// Append `operations` to the page after isolating existing content
pub fn append_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<(), RenderError> {
    let mut all = vec![Operation::new("Q", vec![]), Operation::new("q", vec![])];
    all.extend(operations);
    all.push(Operation::new("Q", vec![]));
    let encoded = Content { operations: all }
        .encode()
        .map_err(malformed)?;

    let save_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let stamp_id = doc.add_object(Stream::new(Dictionary::new(), encoded));

    let page = page_dict_mut(doc, page_id)?;
    let existing = match page.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
        Ok(Object::Array(streams)) => streams.clone(),
        _ => Vec::new(),
    };
    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(stamp_id));
    page.set("Contents", contents);
    Ok(())
}
