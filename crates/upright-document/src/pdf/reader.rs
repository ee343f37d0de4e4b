// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — page geometry and positioned text-layer extraction using the
// `lopdf` crate.
//
// Text is located by replaying the page content stream: the graphics state
// (`cm`, `q`, `Q`) and text state (`BT`, `Tm`, `Td`, `TD`, `T*`, `TL`) are
// tracked, and every string shown with `Tj`, `TJ`, `'` or `"` is placed at
// the start of its text run. Form XObjects painted with `Do` are replayed in
// place. Glyph advances are not computed, so a run is kept or dropped as a
// whole.
//
// Positions are reported in the visible page frame: origin at the lower-left
// corner of the CropBox (or MediaBox), after the page's /Rotate is applied.

use std::path::Path;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, info, instrument, warn};
use upright_core::error::{Result, UprightError};
use upright_core::{PageGeometry, PageIndex, Viewport};

use crate::traits::TextLayerReader;

/// Page-tree inheritance depth after which a /Parent chain is treated as
/// cyclic.
const MAX_TREE_DEPTH: usize = 32;

/// Nesting limit for Form XObjects; also stops self-referencing forms.
const MAX_FORM_DEPTH: usize = 8;

/// Read-only access to an existing PDF's pages and text layer.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| UprightError::Open {
            path: path_ref.display().to_string(),
            detail: err.to_string(),
        })?;

        let reader = Self::from_document(document);
        debug!(pages = reader.page_count(), "PDF loaded");
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            UprightError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        let reader = Self::from_document(document);
        debug!(pages = reader.page_count(), "PDF loaded from bytes");
        Ok(reader)
    }

    fn from_document(document: Document) -> Self {
        // lopdf keys pages by 1-based page number; the map is ordered.
        let page_ids = document.get_pages().into_values().collect();
        Self { document, page_ids }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, page: PageIndex) -> Result<ObjectId> {
        self.page_ids.get(page.0).copied().ok_or_else(|| {
            UprightError::PdfError(format!(
                "page {} out of range (document has {} pages)",
                page,
                self.page_ids.len()
            ))
        })
    }

    fn page_dict(&self, id: ObjectId) -> Result<&Dictionary> {
        self.document
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|err| UprightError::PdfError(format!("cannot read page object {:?}: {}", id, err)))
    }

    /// Look up an inheritable page attribute, walking up the page tree.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Result<Option<&Object>> {
        let mut current = page_id;
        for _ in 0..MAX_TREE_DEPTH {
            let dict = self.page_dict(current)?;
            if let Ok(value) = dict.get(key) {
                return Ok(self.resolve(value));
            }
            match dict.get(b"Parent").and_then(Object::as_reference) {
                Ok(parent) => current = parent,
                Err(_) => return Ok(None),
            }
        }
        warn!(
            ?page_id,
            key = %String::from_utf8_lossy(key),
            "Page tree deeper than expected; ignoring attribute"
        );
        Ok(None)
    }

    /// The visible page frame: CropBox, else MediaBox, else US Letter,
    /// turned by /Rotate.
    fn frame(&self, page_id: ObjectId) -> Result<PageFrame> {
        let crop = self.inherited(page_id, b"CropBox")?.and_then(parse_rect);
        let media = self.inherited(page_id, b"MediaBox")?.and_then(parse_rect);
        let rotate = self
            .inherited(page_id, b"Rotate")?
            .and_then(|value| value.as_i64().ok())
            .unwrap_or(0);
        Ok(PageFrame::new(crop.or(media), rotate))
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Every text run on the page with its position in the visible page
    /// frame.
    #[instrument(skip(self), fields(page = %page))]
    pub fn text_runs(&self, page: PageIndex) -> Result<Vec<TextRun>> {
        let page_id = self.page_id(page)?;
        let frame = self.frame(page_id)?;
        let resources = self
            .inherited(page_id, b"Resources")?
            .and_then(|value| value.as_dict().ok());

        let raw = self.document.get_page_content(page_id).map_err(|err| {
            UprightError::PdfError(format!("cannot read content of page {}: {}", page, err))
        })?;

        let mut runs = Vec::new();
        self.replay(&raw, resources, &mut TextState::default(), &mut runs, 0)
            .map_err(|err| {
                UprightError::PdfError(format!("cannot decode content of page {}: {}", page, err))
            })?;

        for run in &mut runs {
            (run.x, run.y) = frame.to_page(run.x, run.y);
        }
        debug!(runs = runs.len(), "Text runs extracted");
        Ok(runs)
    }

    /// Replay one content stream, pushing runs in user space.
    fn replay<'a>(
        &'a self,
        raw: &[u8],
        resources: Option<&'a Dictionary>,
        state: &mut TextState,
        runs: &mut Vec<TextRun>,
        depth: usize,
    ) -> lopdf::Result<()> {
        let content = Content::decode(raw)?;
        for operation in &content.operations {
            let operands = &operation.operands;
            match operation.operator.as_str() {
                "q" => state.save(),
                "Q" => state.restore(),
                "cm" => {
                    if let Some(m) = matrix(operands) {
                        state.ctm = m.then(&state.ctm);
                    }
                }
                "BT" => state.begin_text(),
                "Tm" => {
                    if let Some(m) = matrix(operands) {
                        state.line_matrix = m;
                        state.text_matrix = m;
                    }
                }
                "Td" => {
                    if let [tx, ty] = operands.as_slice()
                        && let (Some(tx), Some(ty)) = (number(tx), number(ty))
                    {
                        state.next_line(tx, ty);
                    }
                }
                "TD" => {
                    if let [tx, ty] = operands.as_slice()
                        && let (Some(tx), Some(ty)) = (number(tx), number(ty))
                    {
                        state.leading = -ty;
                        state.next_line(tx, ty);
                    }
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        state.leading = leading;
                    }
                }
                "T*" => state.next_line(0.0, -state.leading),
                "Tj" => {
                    if let Some(text) = operands.first().and_then(decode_string) {
                        runs.push(state.run(text));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        let text: String = items.iter().filter_map(decode_string).collect();
                        runs.push(state.run(text));
                    }
                }
                "'" => {
                    state.next_line(0.0, -state.leading);
                    if let Some(text) = operands.first().and_then(decode_string) {
                        runs.push(state.run(text));
                    }
                }
                "\"" => {
                    state.next_line(0.0, -state.leading);
                    if let Some(text) = operands.get(2).and_then(decode_string) {
                        runs.push(state.run(text));
                    }
                }
                "Do" => {
                    if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                        self.replay_form(name, resources, state, runs, depth);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Replay the Form XObject `name` from `resources` in place of its `Do`.
    ///
    /// Image XObjects and unresolvable names are skipped. A broken form is
    /// logged and skipped; it never fails the page.
    fn replay_form<'a>(
        &'a self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        state: &TextState,
        runs: &mut Vec<TextRun>,
        depth: usize,
    ) {
        if depth >= MAX_FORM_DEPTH {
            warn!(depth, "Form XObjects nested too deeply; not entering");
            return;
        }
        let Some(stream) = resources
            .and_then(|dict| dict.get(b"XObject").ok())
            .and_then(|value| self.resolve(value))
            .and_then(|value| value.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|value| self.resolve(value))
            .and_then(|value| value.as_stream().ok())
        else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(b"Form")) {
            return;
        }

        let content = match stream.get_plain_content() {
            Ok(content) => content,
            Err(err) => {
                warn!(%err, "Cannot read form XObject content; skipping");
                return;
            }
        };
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|value| self.resolve(value))
            .and_then(|value| value.as_dict().ok())
            .or(resources);
        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|value| self.resolve(value))
            .and_then(|value| match value {
                Object::Array(items) => matrix(items),
                _ => None,
            })
            .unwrap_or(Matrix::IDENTITY);

        // A form runs in its own graphics state with a fresh text state.
        let mut inner = TextState {
            ctm: form_matrix.then(&state.ctm),
            ..TextState::default()
        };
        if let Err(err) = self.replay(&content, form_resources, &mut inner, runs, depth + 1) {
            warn!(%err, "Cannot decode form XObject content; skipping");
        }
    }
}

impl TextLayerReader for PdfReader {
    /// Visible page size: CropBox (or MediaBox, or US Letter) with width and
    /// height swapped on quarter-turn pages.
    fn geometry(&self, page: PageIndex) -> Result<PageGeometry> {
        let page_id = self.page_id(page)?;
        Ok(self.frame(page_id)?.geometry())
    }

    fn read_text(&self, page: PageIndex, viewport: &Viewport) -> Result<String> {
        if viewport.is_empty() {
            return Ok(String::new());
        }
        let text = self
            .text_runs(page)?
            .into_iter()
            .filter(|run| viewport.contains(run.x, run.y))
            .map(|run| run.text)
            .collect::<Vec<_>>()
            .join("\n");
        Ok(text)
    }
}

// -- Content-stream state -----------------------------------------------------

/// A string shown on the page, positioned at the start of its run.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Visible page rectangle in user space and its quarter-turn rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PageFrame {
    llx: f32,
    lly: f32,
    width: f32,
    height: f32,
    /// Clockwise display rotation: 0, 90, 180 or 270.
    rotate: u16,
}

impl PageFrame {
    fn new(rect: Option<[f32; 4]>, rotate: i64) -> Self {
        let [x0, y0, x1, y1] = rect.unwrap_or([0.0, 0.0, PageGeometry::LETTER.width, PageGeometry::LETTER.height]);
        let rotate = match rotate.rem_euclid(360) {
            quarter @ (0 | 90 | 180 | 270) => quarter as u16,
            other => {
                warn!(rotate = other, "/Rotate is not a multiple of 90; ignoring");
                0
            }
        };
        Self {
            llx: x0.min(x1),
            lly: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
            rotate,
        }
    }

    fn geometry(&self) -> PageGeometry {
        match self.rotate {
            90 | 270 => PageGeometry {
                width: self.height,
                height: self.width,
            },
            _ => PageGeometry {
                width: self.width,
                height: self.height,
            },
        }
    }

    /// Map a user-space point into the displayed page, y up.
    fn to_page(&self, x: f32, y: f32) -> (f32, f32) {
        let (u, v) = (x - self.llx, y - self.lly);
        match self.rotate {
            90 => (v, self.width - u),
            180 => (self.width - u, self.height - v),
            270 => (self.height - v, u),
            _ => (u, v),
        }
    }
}

/// PDF affine matrix `[a b c d e f]` (row-vector convention).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn translate(tx: f32, ty: f32) -> Self {
        Self([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Self) -> Self {
        let [a, b, c, d, e, f] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Self([
            a * a2 + b * c2,
            a * b2 + b * d2,
            c * a2 + d * c2,
            c * b2 + d * d2,
            e * a2 + f * c2 + e2,
            e * b2 + f * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }
}

#[derive(Debug, Clone)]
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            saved: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
        }
    }
}

impl TextState {
    fn save(&mut self) {
        self.saved.push(self.ctm);
    }

    fn restore(&mut self) {
        // Unbalanced Q is tolerated; the CTM stays as is.
        if let Some(ctm) = self.saved.pop() {
            self.ctm = ctm;
        }
    }

    fn begin_text(&mut self) {
        self.text_matrix = Matrix::IDENTITY;
        self.line_matrix = Matrix::IDENTITY;
    }

    fn next_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn run(&self, text: String) -> TextRun {
        let (x, y) = self.text_matrix.then(&self.ctm).apply(0.0, 0.0);
        TextRun { text, x, y }
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() != 6 {
        return None;
    }
    let mut values = [0.0f32; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(Matrix(values))
}

fn parse_rect(object: &Object) -> Option<[f32; 4]> {
    match object {
        Object::Array(items) if items.len() == 4 => {
            let mut rect = [0.0f32; 4];
            for (slot, item) in rect.iter_mut().zip(items) {
                *slot = number(item)?;
            }
            Some(rect)
        }
        _ => None,
    }
}

/// Decode a PDF string operand. Font encodings are not consulted: UTF-16BE
/// with a byte-order mark is decoded as such, anything else as Latin-1,
/// which is enough to tell whether a page carries text at all.
fn decode_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::Operation;
    use lopdf::{Stream, dictionary};

    /// Extra objects a fixture hangs off its pages.
    #[derive(Default)]
    pub(crate) struct PageExtras {
        /// Entries of the shared /Resources /XObject dictionary.
        pub xobjects: Dictionary,
        /// Attributes set on every page dictionary.
        pub page_attrs: Dictionary,
    }

    /// Build a PDF whose pages carry the given content operations. When
    /// `media_box` is set it is declared on the /Pages node only.
    pub(crate) fn pdf_with_pages(pages: &[Vec<Operation>], media_box: Option<[i64; 4]>) -> Vec<u8> {
        build_pdf(pages, media_box, |_| PageExtras::default())
    }

    /// One US Letter page whose content paints Form XObject `/Fm1`, which
    /// runs `form` under the optional form matrix.
    pub(crate) fn pdf_with_form(
        page: Vec<Operation>,
        form: Vec<Operation>,
        form_matrix: Option<[i64; 6]>,
    ) -> Vec<u8> {
        build_pdf(&[page], Some([0, 0, 612, 792]), |doc| {
            let mut dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
            };
            if let Some(m) = form_matrix {
                dict.set("Matrix", Object::Array(m.iter().map(|&v| Object::from(v)).collect()));
            }
            let content = Content { operations: form }.encode().unwrap();
            let form_id = doc.add_object(Stream::new(dict, content));
            PageExtras {
                xobjects: dictionary! { "Fm1" => form_id },
                ..Default::default()
            }
        })
    }

    /// `q /Fm1 Do Q`
    pub(crate) fn paint_form() -> Vec<Operation> {
        vec![
            Operation::new("q", vec![]),
            Operation::new("Do", vec!["Fm1".into()]),
            Operation::new("Q", vec![]),
        ]
    }

    fn build_pdf(
        pages: &[Vec<Operation>],
        media_box: Option<[i64; 4]>,
        extras: impl FnOnce(&mut Document) -> PageExtras,
    ) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let extras = extras(&mut doc);
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if !extras.xobjects.is_empty() {
            resources.set("XObject", extras.xobjects);
        }
        let resources_id = doc.add_object(resources);

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content {
                operations: operations.clone(),
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            for (key, value) in extras.page_attrs.iter() {
                page.set(key.clone(), value.clone());
            }
            kids.push(doc.add_object(page).into());
        }

        let mut pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages.len() as i64,
            "Resources" => resources_id,
        };
        if let Some([a, b, c, d]) = media_box {
            pages_dict.set(
                "MediaBox",
                Object::Array(vec![a.into(), b.into(), c.into(), d.into()]),
            );
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Letter page with the given attributes set on the page dictionary.
    fn pdf_with_page_attrs(ops: Vec<Operation>, page_attrs: Dictionary) -> Vec<u8> {
        build_pdf(&[ops], Some([0, 0, 612, 792]), |_| PageExtras {
            page_attrs,
            ..Default::default()
        })
    }

    /// `BT /F1 12 Tf x y Td (text) Tj ET`
    pub(crate) fn text_at(x: i64, y: i64, text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    fn letter_body() -> Viewport {
        PageGeometry::LETTER.body(100.0, 100.0)
    }

    #[test]
    fn body_text_is_read() {
        let bytes = pdf_with_pages(&[text_at(72, 400, "Body paragraph")], Some([0, 0, 612, 792]));
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 1);
        let text = reader.read_text(PageIndex(0), &letter_body()).unwrap();
        assert_eq!(text, "Body paragraph");
    }

    #[test]
    fn header_and_footer_text_is_outside_body() {
        let mut ops = text_at(72, 750, "Running header");
        ops.extend(text_at(72, 40, "Page 1"));
        let bytes = pdf_with_pages(&[ops], Some([0, 0, 612, 792]));
        let reader = PdfReader::from_bytes(&bytes).unwrap();

        let body = reader.read_text(PageIndex(0), &letter_body()).unwrap();
        assert!(body.trim().is_empty(), "body should be empty, got {body:?}");

        // The full page still sees both runs: the crop is only a view.
        let full = reader.read_text(PageIndex(0), &PageGeometry::LETTER.full()).unwrap();
        assert!(full.contains("Running header"));
        assert!(full.contains("Page 1"));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let bytes = pdf_with_pages(&[vec![]], Some([0, 0, 595, 842]));
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let geometry = reader.geometry(PageIndex(0)).unwrap();
        assert_eq!(geometry.width, 595.0);
        assert_eq!(geometry.height, 842.0);
    }

    #[test]
    fn missing_media_box_defaults_to_letter() {
        let bytes = pdf_with_pages(&[vec![]], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.geometry(PageIndex(0)).unwrap(), PageGeometry::LETTER);
    }

    #[test]
    fn text_matrix_and_cm_position_runs() {
        let ops = vec![
            Operation::new("q", vec![]),
            // Shift everything up by 600 points.
            Operation::new("cm", vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 600.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tm", vec![1.into(), 0.into(), 0.into(), 1.into(), 50.into(), 150.into()]),
            Operation::new("Tj", vec![Object::string_literal("moved")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![50.into(), 300.into()]),
            Operation::new("Tj", vec![Object::string_literal("plain")]),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_with_pages(&[ops], Some([0, 0, 612, 792]));
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].x, runs[0].y), (50.0, 750.0));
        // Q restored the identity CTM.
        assert_eq!((runs[1].x, runs[1].y), (50.0, 300.0));
    }

    #[test]
    fn leading_moves_lines_down() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("TL", vec![20.into()]),
            Operation::new("Tj", vec![Object::string_literal("first")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("second")]),
            Operation::new("'", vec![Object::string_literal("third")]),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_with_pages(&[ops], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let ys: Vec<f32> = reader
            .text_runs(PageIndex(0))
            .unwrap()
            .iter()
            .map(|run| run.y)
            .collect();
        assert_eq!(ys, vec![720.0, 700.0, 680.0]);
    }

    #[test]
    fn td_uppercase_sets_leading() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![0.into(), 700.into()]),
            Operation::new("TD", vec![72.into(), (-15).into()]),
            Operation::new("Tj", vec![Object::string_literal("a")]),
            Operation::new("T*", vec![]),
            Operation::new("Tj", vec![Object::string_literal("b")]),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_with_pages(&[ops], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!((runs[0].x, runs[0].y), (72.0, 685.0));
        assert_eq!((runs[1].x, runs[1].y), (72.0, 670.0));
    }

    #[test]
    fn tj_arrays_are_concatenated() {
        let ops = vec![
            Operation::new("BT", vec![]),
            Operation::new("Td", vec![72.into(), 400.into()]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Hel"),
                    (-120).into(),
                    Object::string_literal("lo"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ];
        let bytes = pdf_with_pages(&[ops], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.read_text(PageIndex(0), &letter_body()).unwrap(), "Hello");
    }

    #[test]
    fn empty_viewport_reads_nothing() {
        let bytes = pdf_with_pages(&[text_at(72, 400, "text")], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let viewport = PageGeometry::LETTER.body(500.0, 500.0);
        assert!(viewport.is_empty());
        assert_eq!(reader.read_text(PageIndex(0), &viewport).unwrap(), "");
    }

    #[test]
    fn pages_are_kept_in_order() {
        let bytes = pdf_with_pages(
            &[text_at(72, 400, "one"), text_at(72, 400, "two"), text_at(72, 400, "three")],
            None,
        );
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.page_count(), 3);
        let body = letter_body();
        assert_eq!(reader.read_text(PageIndex(1), &body).unwrap(), "two");
        assert_eq!(reader.read_text(PageIndex(2), &body).unwrap(), "three");
    }

    #[test]
    fn out_of_range_page_is_an_error() {
        let bytes = pdf_with_pages(&[vec![]], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert!(matches!(
            reader.geometry(PageIndex(4)),
            Err(UprightError::PdfError(_))
        ));
    }

    #[test]
    fn open_missing_file_is_an_open_error() {
        let err = PdfReader::open("/nonexistent/input.pdf").err().unwrap();
        assert!(matches!(err, UprightError::Open { .. }));
    }

    #[test]
    fn utf16_strings_are_decoded() {
        let object = Object::String(vec![0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69], lopdf::StringFormat::Hexadecimal);
        assert_eq!(decode_string(&object).as_deref(), Some("Hi"));
    }

    #[test]
    fn form_xobject_text_is_read() {
        let bytes = pdf_with_form(paint_form(), text_at(72, 400, "Inside a form"), None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(
            reader.read_text(PageIndex(0), &letter_body()).unwrap(),
            "Inside a form"
        );
    }

    #[test]
    fn form_matrix_and_page_cm_position_form_text() {
        let mut page = vec![Operation::new(
            "cm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), 10.into(), 0.into()],
        )];
        page.extend(paint_form());
        let bytes = pdf_with_form(page, text_at(72, 400, "lifted"), Some([1, 0, 0, 1, 0, 300]));
        let reader = PdfReader::from_bytes(&bytes).unwrap();

        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!((runs[0].x, runs[0].y), (82.0, 700.0));
        // Lifted into the header band.
        assert_eq!(reader.read_text(PageIndex(0), &letter_body()).unwrap(), "");
    }

    #[test]
    fn form_state_does_not_leak_into_page() {
        let mut page = paint_form();
        page.extend(text_at(72, 400, "after"));
        let form = vec![Operation::new(
            "cm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), 0.into(), 300.into()],
        )];
        let bytes = pdf_with_form(page, form, None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!((runs[0].x, runs[0].y), (72.0, 400.0));
    }

    #[test]
    fn self_referencing_form_stops_at_depth_limit() {
        let mut form = text_at(72, 400, "loop");
        form.extend(paint_form());
        let bytes = pdf_with_form(paint_form(), form, None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!(runs.len(), MAX_FORM_DEPTH);
    }

    #[test]
    fn unknown_xobject_name_is_ignored() {
        let mut page = vec![Operation::new("Do", vec!["Missing".into()])];
        page.extend(text_at(72, 400, "still here"));
        let bytes = pdf_with_form(page, vec![], None);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.read_text(PageIndex(0), &letter_body()).unwrap(), "still here");
    }

    #[test]
    fn crop_box_sets_geometry_and_origin() {
        let attrs = dictionary! {
            "CropBox" => Object::Array(vec![50.into(), 50.into(), 562.into(), 742.into()]),
        };
        let bytes = pdf_with_page_attrs(text_at(60, 70, "corner"), attrs);
        let reader = PdfReader::from_bytes(&bytes).unwrap();

        let geometry = reader.geometry(PageIndex(0)).unwrap();
        assert_eq!((geometry.width, geometry.height), (512.0, 692.0));
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!((runs[0].x, runs[0].y), (10.0, 20.0));
    }

    #[test]
    fn crop_box_moves_the_header_band() {
        // Visible height 500: the header band starts at y = 400.
        let attrs = dictionary! {
            "CropBox" => Object::Array(vec![0.into(), 0.into(), 612.into(), 500.into()]),
        };
        let bytes = pdf_with_page_attrs(text_at(72, 450, "masthead"), attrs);
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let body = reader.geometry(PageIndex(0)).unwrap().body(100.0, 100.0);
        assert_eq!(reader.read_text(PageIndex(0), &body).unwrap(), "");
    }

    #[test]
    fn quarter_turn_swaps_geometry_and_maps_positions() {
        let bytes = pdf_with_page_attrs(text_at(72, 400, "turned"), dictionary! { "Rotate" => 90 });
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        let geometry = reader.geometry(PageIndex(0)).unwrap();
        assert_eq!((geometry.width, geometry.height), (792.0, 612.0));
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!((runs[0].x, runs[0].y), (400.0, 540.0));
    }

    #[test]
    fn rotation_decides_which_edge_is_the_header() {
        // Near the unrotated left edge: body on an upright page, header once
        // the page is turned clockwise, footer when turned the other way.
        let ops = text_at(20, 400, "edge note");
        let read_body = |attrs: Dictionary| {
            let reader = PdfReader::from_bytes(&pdf_with_page_attrs(ops.clone(), attrs)).unwrap();
            let body = reader.geometry(PageIndex(0)).unwrap().body(100.0, 100.0);
            reader.read_text(PageIndex(0), &body).unwrap()
        };
        assert_eq!(read_body(dictionary! {}), "edge note");
        assert_eq!(read_body(dictionary! { "Rotate" => 90 }), "");
        assert_eq!(read_body(dictionary! { "Rotate" => -90 }), "");
    }

    #[test]
    fn half_turn_maps_positions() {
        let bytes = pdf_with_page_attrs(text_at(72, 400, "upside down"), dictionary! { "Rotate" => 180 });
        let reader = PdfReader::from_bytes(&bytes).unwrap();
        assert_eq!(reader.geometry(PageIndex(0)).unwrap(), PageGeometry::LETTER);
        let runs = reader.text_runs(PageIndex(0)).unwrap();
        assert_eq!((runs[0].x, runs[0].y), (540.0, 392.0));
    }
}
