//! Document Writer: turns a stream of [`LayoutInstruction`]s into a paginated PDF.
//!
//! # Model
//! - Positions are tracked top-down in points (`DocumentCursor::offset`) and
//!   converted to PDF bottom-up coordinates only when a line is drawn.
//! - Gaps are measured in lines of the most recently used font size, so the
//!   same `move_down(0.5)` is larger after a heading than after body text.
//! - A line that would cross the bottom margin starts a new page first. Gaps
//!   alone never open a page. Callers never see page boundaries.
//! - `close` consumes the writer; a finished document cannot be written to.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::render::markdown::LayoutInstruction;
use crate::render::metrics::{self, FontFace, ASCENT, LINE_HEIGHT};
use crate::render::RenderError;

/// Gap after a heading, before a heading that follows a list, and for blank lines.
const SECTION_GAP_LINES: f32 = 0.5;
/// Gap after every instruction.
const TRAILING_GAP_LINES: f32 = 0.3;
const BULLET_PREFIX: &str = "\u{2022} ";

/// Page geometry in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    /// Left indent for bullet and numbered items.
    pub list_indent: f32,
    pub body_size: f32,
    pub heading_sizes: [f32; 2],
}

impl Default for PageSetup {
    /// US letter with 50pt margins, 10pt body text.
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            margin: 50.0,
            list_indent: 20.0,
            body_size: 10.0,
            heading_sizes: [16.0, 14.0],
        }
    }
}

impl PageSetup {
    fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    fn bottom(&self) -> f32 {
        self.height - self.margin
    }

    fn heading_size(&self, level: u8) -> f32 {
        if level <= 1 {
            self.heading_sizes[0]
        } else {
            self.heading_sizes[1]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Justify,
}

/// How one block of text is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub size: f32,
    pub align: Align,
    pub indent: f32,
}

impl TextStyle {
    pub fn new(face: FontFace, size: f32) -> Self {
        Self {
            face,
            size,
            align: Align::Left,
            indent: 0.0,
        }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn indent(mut self, indent: f32) -> Self {
        self.indent = indent;
        self
    }
}

/// Writer-internal position state.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DocumentCursor {
    /// Zero-based index of the page being written.
    page: usize,
    /// Distance from the top edge of the page, in points.
    offset: f32,
    inside_list: bool,
    /// Size of the most recently drawn text; gaps scale with it.
    font_size: f32,
}

pub struct DocumentWriter {
    setup: PageSetup,
    pages: Vec<Vec<Operation>>,
    cursor: DocumentCursor,
}

impl DocumentWriter {
    pub fn open(setup: PageSetup) -> Self {
        Self {
            setup,
            pages: vec![Vec::new()],
            cursor: DocumentCursor {
                page: 0,
                offset: setup.margin,
                inside_list: false,
                font_size: setup.body_size,
            },
        }
    }

    #[cfg(test)]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn write(&mut self, instruction: &LayoutInstruction) {
        let body = TextStyle::new(FontFace::Regular, self.setup.body_size);

        match instruction {
            LayoutInstruction::Blank => {
                self.move_down(SECTION_GAP_LINES);
                self.cursor.inside_list = false;
            }
            LayoutInstruction::Heading { level, text } => {
                if self.cursor.inside_list {
                    self.move_down(SECTION_GAP_LINES);
                }
                let size = self.setup.heading_size(*level);
                self.write_text(text, TextStyle::new(FontFace::Bold, size));
                self.move_down(SECTION_GAP_LINES);
                self.cursor.inside_list = false;
            }
            LayoutInstruction::BulletItem(text) => {
                let line = format!("{BULLET_PREFIX}{text}");
                self.write_text(&line, body.indent(self.setup.list_indent));
                self.cursor.inside_list = true;
            }
            LayoutInstruction::NumberedItem(text) => {
                self.write_text(text, body.indent(self.setup.list_indent));
                self.cursor.inside_list = true;
            }
            LayoutInstruction::Paragraph(text) => {
                if self.cursor.inside_list {
                    self.move_down(SECTION_GAP_LINES);
                    self.cursor.inside_list = false;
                }
                self.write_text(text, body.align(Align::Justify));
            }
        }

        self.move_down(TRAILING_GAP_LINES);
    }

    /// Draws `text` as a wrapped block starting at the cursor.
    pub fn write_text(&mut self, text: &str, style: TextStyle) {
        self.cursor.font_size = style.size;

        let text = metrics::normalize_for_font(text);
        let available = self.setup.text_width() - style.indent;
        let lines = metrics::wrap(&text, style.face, style.size, available);
        let line_height = style.size * LINE_HEIGHT;
        let last = lines.len().saturating_sub(1);

        for (i, line) in lines.iter().enumerate() {
            if self.cursor.offset + line_height > self.setup.bottom() {
                self.new_page();
            }

            let width = metrics::measure(line, style.face, style.size);
            let mut x = self.setup.margin + style.indent;
            let mut word_spacing = 0.0_f32;
            match style.align {
                Align::Left => {}
                Align::Center => x += ((available - width) / 2.0).max(0.0),
                Align::Justify => {
                    let spaces = line.matches(' ').count();
                    if i < last && spaces > 0 {
                        word_spacing = ((available - width) / spaces as f32).max(0.0);
                    }
                }
            }

            let baseline = self.setup.height - self.cursor.offset - style.size * ASCENT;
            self.draw_line(line, style, x, baseline, word_spacing);
            self.cursor.offset += line_height;
        }
    }

    /// Advances the cursor by `lines` of the current font size.
    ///
    /// A gap may run past the bottom margin; the next drawn line opens the new
    /// page, so trailing gaps never leave an empty page behind.
    pub fn move_down(&mut self, lines: f32) {
        self.cursor.offset += lines * self.cursor.font_size * LINE_HEIGHT;
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor.page = self.pages.len() - 1;
        self.cursor.offset = self.setup.margin;
    }

    fn draw_line(&mut self, line: &str, style: TextStyle, x: f32, baseline: f32, word_spacing: f32) {
        let ops = &mut self.pages[self.cursor.page];
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![style.face.resource_name().into(), style.size.into()],
        ));
        ops.push(Operation::new("Tw", vec![word_spacing.into()]));
        ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(metrics::encode_win_ansi(line))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    /// Finalizes the document and returns the PDF bytes.
    pub fn close(self) -> Result<Vec<u8>, RenderError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = lopdf::Dictionary::new();
        for face in [FontFace::Regular, FontFace::Bold] {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource_name(), font_id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => fonts,
        });

        let page_count = self.pages.len();
        let mut kids: Vec<Object> = Vec::with_capacity(page_count);
        for operations in self.pages {
            let content = Content { operations }
                .encode()
                .map_err(|e| RenderError::Encode(format!("page content: {e}")))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                self.setup.width.into(),
                self.setup.height.into(),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Encode(format!("document serialization: {e}")))?;
        Ok(bytes)
    }
}
