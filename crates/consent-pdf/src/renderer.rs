//! Template stamping
//!
//! The template is read from disk on every render so an updated form takes
//! effect without a restart. Rendering is pure CPU work; callers on an async
//! runtime should run it on a blocking thread.

use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::debug;

use consent_core::signature::decode_png;
use consent_core::{DocumentRenderer, RenderError, SubmissionRecord};

use crate::layout::FieldLayout;
use crate::stamp;

/// [`DocumentRenderer`] backed by a PDF template file
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_path: PathBuf,
    layout: FieldLayout,
}

impl TemplateRenderer {
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            layout: FieldLayout::default(),
        }
    }

    pub fn with_layout(mut self, layout: FieldLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }
}

impl DocumentRenderer for TemplateRenderer {
    fn render(&self, record: &SubmissionRecord) -> Result<Vec<u8>, RenderError> {
        let template =
            std::fs::read(&self.template_path).map_err(|e| RenderError::TemplateUnreadable {
                path: self.template_path.display().to_string(),
                reason: e.to_string(),
            })?;
        render_template(&template, record, &self.layout)
    }
}

/// Stamp `record` onto the first page of `template`
///
/// Empty values are skipped. A drawn signature is placed inside the layout's
/// signature box, preserving its aspect ratio. The same inputs always give
/// the same bytes.
pub fn render_template(
    template: &[u8],
    record: &SubmissionRecord,
    layout: &FieldLayout,
) -> Result<Vec<u8>, RenderError> {
    let mut doc =
        Document::load_mem(template).map_err(|e| RenderError::MalformedTemplate(e.to_string()))?;

    let page_id = doc
        .get_pages()
        .into_values()
        .next()
        .ok_or_else(|| RenderError::MalformedTemplate("template has no pages".to_string()))?;
    let page_height = stamp::page_height(&doc, page_id);

    let mut operations = Vec::new();
    for (field, point) in &layout.fields {
        let text = field.value(record);
        if text.is_empty() {
            continue;
        }
        let (x, y) = point.to_pdf(page_height);
        operations.extend(stamp::text_operations(&text, x, y, layout.font_size));
    }
    stamp::add_font(&mut doc, page_id)?;

    if let Some(png) = record.authorization.signature_image() {
        let image = decode_png(png)
            .map_err(|e| RenderError::InvalidInput(format!("signature image: {}", e)))?;
        let aspect = image.width as f32 / image.height.max(1) as f32;
        let (x, y, w, h) = layout.signature.fit(aspect, page_height);
        stamp::add_signature_image(&mut doc, page_id, &image)?;
        operations.extend(stamp::image_operations(x, y, w, h));
    }

    debug!(
        operations = operations.len(),
        mode = %record.mode(),
        "Stamping consent template"
    );
    stamp::append_content(&mut doc, page_id, operations)?;

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| RenderError::MalformedTemplate(format!("failed to write PDF: {}", e)))?;
    Ok(output)
}
