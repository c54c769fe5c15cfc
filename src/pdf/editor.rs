//! Editable PDF object model for seal overlays.
//!
//! [`SealEditor`] wraps a parsed `lopdf::Document` and only ever appends:
//! new XObjects, a font resource, extra content streams and Info entries.
//! Existing page content is wrapped in `q`/`Q` once so overlays always draw
//! in the default graphics state.

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::xobject::{ImageData, ImagePlacement};
use crate::error::{Error, Result};
use crate::model::{Placement, QrPosition};

/// US Letter, used when no `/MediaBox` is found up the page tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page tree depth limit when looking up inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Visible page area in user space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Lower-left x
    pub x: f32,
    /// Lower-left y
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

/// Appends visual seals to an existing PDF.
pub struct SealEditor {
    doc: Document,
    pages: Vec<ObjectId>,
    wrapped: HashSet<ObjectId>,
    font_id: Option<ObjectId>,
}

impl SealEditor {
    /// Parse `bytes`. Encrypted and page-less documents are rejected.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(Error::InvalidPdf("encrypted documents are not supported".to_string()));
        }
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        if pages.is_empty() {
            return Err(Error::InvalidPdf("document has no pages".to_string()));
        }
        Ok(Self {
            doc,
            pages,
            wrapped: HashSet::new(),
            font_id: None,
        })
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 0-based index for a 1-based page number, clamped to the document.
    pub fn clamp_page(&self, page: u32) -> usize {
        (page.max(1) as usize - 1).min(self.pages.len() - 1)
    }

    /// The `/MediaBox` of a page, following inheritance.
    pub fn page_box(&self, index: usize) -> Result<PageBox> {
        let page_id = self.page_id(index)?;
        let values = self
            .inherited(page_id, b"MediaBox")
            .and_then(|obj| self.resolve(&obj))
            .and_then(|obj| obj.as_array().ok().cloned())
            .and_then(|items| {
                let nums: Vec<f32> = items.iter().filter_map(|o| o.as_float().ok()).collect();
                (nums.len() == 4).then_some(nums)
            })
            .unwrap_or_else(|| DEFAULT_MEDIA_BOX.to_vec());

        let (x0, x1) = (values[0].min(values[2]), values[0].max(values[2]));
        let (y0, y1) = (values[1].min(values[3]), values[1].max(values[3]));
        Ok(PageBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Page-space rectangle for a signature placement. The box is clamped
    /// inside the page.
    pub fn placement_rect(&self, index: usize, placement: &Placement) -> Result<ImagePlacement> {
        let page = self.page_box(index)?;
        let width = (placement.width * placement.scale).min(page.width);
        let height = (placement.height * placement.scale).min(page.height);
        let left = (placement.x * page.width).clamp(0.0, page.width - width);
        let top = (placement.y * page.height).clamp(0.0, page.height - height);
        Ok(ImagePlacement::new(page.x + left, page.y + page.height - top - height, width, height)
            .rotated(placement.normalized_rotation()))
    }

    /// Square of side `size` in a page corner, `margin` points from the edges.
    pub fn corner_rect(
        &self,
        index: usize,
        position: QrPosition,
        size: f32,
        margin: f32,
    ) -> Result<ImagePlacement> {
        let page = self.page_box(index)?;
        let size = size
            .min(page.width - 2.0 * margin)
            .min(page.height - 2.0 * margin)
            .max(1.0);
        let left = page.x + margin;
        let right = page.x + page.width - margin - size;
        let bottom = page.y + margin;
        let top = page.y + page.height - margin - size;
        let (x, y) = match position {
            QrPosition::BottomRight => (right, bottom),
            QrPosition::BottomLeft => (left, bottom),
            QrPosition::TopRight => (right, top),
            QrPosition::TopLeft => (left, top),
        };
        Ok(ImagePlacement::new(x, y, size, size))
    }

    /// Add an image XObject (and its soft mask) and return its id.
    pub fn add_image(&mut self, image: &ImageData) -> ObjectId {
        let (mut stream, mask) = image.to_streams();
        if let Some(mask) = mask {
            let mask_id = self.doc.add_object(Object::Stream(mask));
            ImageData::link_soft_mask(&mut stream, mask_id);
        }
        self.doc.add_object(Object::Stream(stream))
    }

    /// Draw a previously added image into `rect`.
    pub fn draw_image(
        &mut self,
        index: usize,
        image_id: ObjectId,
        rect: &ImagePlacement,
    ) -> Result<()> {
        let page_id = self.page_id(index)?;
        let name = format!("SealIm{}", image_id.0);
        self.register_resource(page_id, b"XObject", &name, image_id)?;

        let (a, b, c, d, e, f) = rect.transform_matrix();
        let ops = format!(
            "q {} {} {} {} {} {} cm /{} Do Q\n",
            num(a),
            num(b),
            num(c),
            num(d),
            num(e),
            num(f),
            name
        );
        self.append_content(page_id, ops.into_bytes())
    }

    /// Draw an image scaled to fit inside `rect`, centered, keeping its aspect ratio.
    pub fn draw_image_fitted(
        &mut self,
        index: usize,
        image_id: ObjectId,
        image: &ImageData,
        rect: &ImagePlacement,
    ) -> Result<()> {
        let (w, h) = image.fit_to_box(rect.width, rect.height);
        let (cx, cy) = rect.center();
        let fitted = ImagePlacement::new(cx - w / 2.0, cy - h / 2.0, w, h).rotated(rect.rotation);
        self.draw_image(index, image_id, &fitted)
    }

    /// Draw centered text lines inside `rect`, optionally with a thin border.
    /// The font size shrinks to fit the box.
    pub fn draw_text_block(
        &mut self,
        index: usize,
        rect: &ImagePlacement,
        lines: &[String],
        border: bool,
    ) -> Result<()> {
        let page_id = self.page_id(index)?;
        let font = self.font_resource(page_id)?;

        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(1).max(1) as f32;
        let rows = lines.len().max(1) as f32;
        let size = (rect.height / (rows * 1.3))
            .min(rect.width / (longest * 0.55))
            .clamp(4.0, 14.0);
        let leading = size * 1.25;

        let (a, b, c, d, e, f) = rect.local_matrix();
        let mut ops = format!(
            "q {} {} {} {} {} {} cm\n",
            num(a),
            num(b),
            num(c),
            num(d),
            num(e),
            num(f)
        )
        .into_bytes();
        if border {
            ops.extend_from_slice(
                format!(
                    "0.15 0.25 0.55 RG 0.75 w 0.5 0.5 {} {} re S\n",
                    num(rect.width - 1.0),
                    num(rect.height - 1.0)
                )
                .as_bytes(),
            );
        }

        let block_height = leading * (rows - 1.0) + size;
        let mut baseline = (rect.height + block_height) / 2.0 - size;
        ops.extend_from_slice(b"0.1 0.1 0.1 rg\n");
        for line in lines {
            let width = line.chars().count() as f32 * size * 0.5;
            let x = ((rect.width - width) / 2.0).max(2.0);
            let start = format!("BT /{} {} Tf {} {} Td (", font, num(size), num(x), num(baseline));
            ops.extend_from_slice(start.as_bytes());
            ops.extend_from_slice(&encode_text(line));
            ops.extend_from_slice(b") Tj ET\n");
            baseline -= leading;
        }
        ops.extend_from_slice(b"Q\n");
        self.append_content(page_id, ops)
    }

    /// Draw one line of text with its baseline starting at `(x, y)`.
    pub fn draw_text(&mut self, index: usize, x: f32, y: f32, size: f32, text: &str) -> Result<()> {
        let page_id = self.page_id(index)?;
        let font = self.font_resource(page_id)?;
        let mut ops = format!(
            "q 0.2 0.2 0.2 rg BT /{} {} Tf {} {} Td (",
            font,
            num(size),
            num(x),
            num(y)
        )
        .into_bytes();
        ops.extend_from_slice(&encode_text(text));
        ops.extend_from_slice(b") Tj ET Q\n");
        self.append_content(page_id, ops)
    }

    /// Set a text entry in the document Info dictionary.
    pub fn set_info(&mut self, key: &str, value: &str) -> Result<()> {
        let existing = self.doc.trailer.get(b"Info").ok().cloned();
        let info_id = match existing {
            Some(Object::Reference(id)) => id,
            Some(Object::Dictionary(inline)) => self.doc.add_object(Object::Dictionary(inline)),
            _ => self.doc.add_object(Object::Dictionary(Dictionary::new())),
        };
        self.doc.trailer.set("Info", Object::Reference(info_id));
        let value = Object::String(encode_text(value), lopdf::StringFormat::Literal);
        self.doc
            .get_dictionary_mut(info_id)?
            .set(key.as_bytes().to_vec(), value);
        Ok(())
    }

    /// Number of distinct image XObjects, soft masks excluded.
    pub fn count_images(&self) -> usize {
        count_images(&self.doc)
    }

    /// Serialize the document.
    pub fn save(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        Ok(out)
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| Error::InvalidPdf(format!("page index {} out of range", index)))
    }

    fn resolve(&self, obj: &Object) -> Option<Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok().cloned(),
            other => Some(other.clone()),
        }
    }

    fn resolve_dict(&self, obj: &Object) -> Option<Dictionary> {
        self.resolve(obj).and_then(|o| o.as_dict().ok().cloned())
    }

    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = page_id;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let dict = self.doc.get_dictionary(current).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value.clone());
            }
            current = dict.get(b"Parent").and_then(|p| p.as_reference()).ok()?;
        }
        None
    }

    /// Copy the effective resources onto the page and add `name -> id`
    /// under `category`.
    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        name: &str,
        id: ObjectId,
    ) -> Result<()> {
        let mut resources = self
            .inherited(page_id, b"Resources")
            .and_then(|obj| self.resolve_dict(&obj))
            .unwrap_or_default();
        let mut entries = resources
            .get(category)
            .ok()
            .and_then(|obj| self.resolve_dict(obj))
            .unwrap_or_default();
        entries.set(name.as_bytes().to_vec(), Object::Reference(id));
        resources.set(category.to_vec(), Object::Dictionary(entries));
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    fn font_resource(&mut self, page_id: ObjectId) -> Result<String> {
        let font_id = match self.font_id {
            Some(id) => id,
            None => {
                let mut font = Dictionary::new();
                font.set("Type", Object::Name(b"Font".to_vec()));
                font.set("Subtype", Object::Name(b"Type1".to_vec()));
                font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
                font.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
                let id = self.doc.add_object(Object::Dictionary(font));
                self.font_id = Some(id);
                id
            },
        };
        let name = format!("SealF{}", font_id.0);
        self.register_resource(page_id, b"Font", &name, font_id)?;
        Ok(name)
    }

    fn append_content(&mut self, page_id: ObjectId, ops: Vec<u8>) -> Result<()> {
        let current = self.doc.get_dictionary(page_id)?.get(b"Contents").ok().cloned();
        let mut streams = match current {
            Some(Object::Reference(id)) => match self.doc.get_object(id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(id)],
            },
            Some(Object::Array(items)) => items,
            _ => Vec::new(),
        };

        if self.wrapped.insert(page_id) && !streams.is_empty() {
            let open = Stream::new(Dictionary::new(), b"q\n".to_vec());
            let close = Stream::new(Dictionary::new(), b"Q\n".to_vec());
            let open = self.doc.add_object(Object::Stream(open));
            let close = self.doc.add_object(Object::Stream(close));
            streams.insert(0, Object::Reference(open));
            streams.push(Object::Reference(close));
        }

        let overlay = self.doc.add_object(Object::Stream(Stream::new(Dictionary::new(), ops)));
        streams.push(Object::Reference(overlay));
        self.doc
            .get_dictionary_mut(page_id)?
            .set("Contents", Object::Array(streams));
        Ok(())
    }
}

/// Count image XObjects in a parsed document, soft masks excluded.
pub fn count_images(doc: &Document) -> usize {
    let masks: HashSet<ObjectId> = doc
        .objects
        .values()
        .filter_map(|obj| match obj {
            Object::Stream(stream) => stream.dict.get(b"SMask").and_then(|m| m.as_reference()).ok(),
            _ => None,
        })
        .collect();

    doc.objects
        .iter()
        .filter(|(id, obj)| {
            !masks.contains(*id)
                && matches!(obj, Object::Stream(stream)
                    if matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image"))
        })
        .count()
}

/// Format a number for a content stream.
fn num(v: f32) -> String {
    let s = format!("{:.3}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Encode text for a WinAnsi literal string. Latin-1 maps directly,
/// anything else becomes `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        let byte = match c as u32 {
            0x20..=0x7E => c as u8,
            0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        };
        if matches!(byte, b'(' | b')' | b'\\') {
            out.push(b'\\');
        }
        out.push(byte);
    }
    out
}
