use crate::render::font::{Font, FontStyle, Fonts, MM_PER_PT};
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;

/// Page dimensions in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub line_height: f32,
}

impl PageGeometry {
    /// Portrait A4 with 20 mm margins and 7 mm lines.
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
        margin: 20.0,
        line_height: 7.0,
    };

    pub fn printable_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// Cursor positions past this point start a new page.
    pub fn bottom_limit(&self) -> f32 {
        self.height - self.margin
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry::A4
    }
}

/// A drawing instruction; coordinates in millimetres from the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// Lines of text; the first baseline sits at `y`, the next ones one line
    /// height apart.
    Text {
        font: FontStyle,
        size: f32,
        x: f32,
        y: f32,
        lines: Vec<String>,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        gray: u8,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        gray: u8,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Every text line drawn on the page, in drawing order.
    pub fn text_lines(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().flat_map(|op| match op {
            DrawOp::Text { lines, .. } => lines.iter().map(String::as_str).collect::<Vec<_>>(),
            _ => Vec::new(),
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.text_lines().any(|line| line.contains(needle))
    }
}

/// Width of `text` in millimetres at `size` points.
pub fn width_of_text(text: &str, font: &Font, size: f32) -> f32 {
    let thousandths: f32 = text
        .chars()
        .map(|c| font.glyph_width(font.glyph_id(c)))
        .sum();
    thousandths / 1000.0 * size * MM_PER_PT
}

/// A run of text measured in millimetres.
#[derive(Debug)]
struct Word<'a> {
    text: &'a str,
    width: f64,
    /// Width of the space that followed the run in the source, if any.
    space: f64,
}

impl Fragment for Word<'_> {
    fn width(&self) -> f64 {
        self.width
    }

    fn whitespace_width(&self) -> f64 {
        self.space
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// Measure the space-separated words of `line`, cutting any word wider than
/// `max_width` between characters.
fn measure_words<'a>(line: &'a str, font: &Font, size: f32, max_width: f32) -> Vec<Word<'a>> {
    let space = f64::from(width_of_text(" ", font, size));
    let mut words = Vec::new();
    let mut parts = line.split(' ').peekable();

    while let Some(part) = parts.next() {
        let trailing = if parts.peek().is_some() { space } else { 0.0 };
        let width = width_of_text(part, font, size);
        if width <= max_width {
            words.push(Word {
                text: part,
                width: f64::from(width),
                space: trailing,
            });
            continue;
        }

        let mut start = 0;
        let mut run_width = 0.0;
        for (index, c) in part.char_indices() {
            let char_width = width_of_text(c.encode_utf8(&mut [0; 4]), font, size);
            if run_width + char_width > max_width && index > start {
                words.push(Word {
                    text: &part[start..index],
                    width: f64::from(run_width),
                    space: 0.0,
                });
                start = index;
                run_width = 0.0;
            }
            run_width += char_width;
        }
        words.push(Word {
            text: &part[start..],
            width: f64::from(run_width),
            space: trailing,
        });
    }

    words
}

/// Break `text` into lines no wider than `max_width` millimetres.
///
/// Existing newlines are kept; words are wrapped on spaces and a single word
/// wider than the limit is broken between characters.
pub fn split_text_to_size(text: &str, font: &Font, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();

    for source_line in text.split('\n') {
        let source_line = source_line.trim_end_matches('\r');
        let words = measure_words(source_line, font, size, max_width);
        for line in wrap_first_fit(&words, &[f64::from(max_width)]) {
            let mut joined = String::new();
            for (index, word) in line.iter().enumerate() {
                joined.push_str(word.text);
                if word.space > 0.0 && index + 1 < line.len() {
                    joined.push(' ');
                }
            }
            lines.push(joined);
        }
    }

    lines
}

/// Vertical cursor over a growing list of pages.
#[derive(Debug)]
pub struct Layout<'f> {
    fonts: &'f Fonts,
    geometry: PageGeometry,
    pages: Vec<Page>,
    y: f32,
    font: FontStyle,
    size: f32,
}

impl<'f> Layout<'f> {
    pub const DEFAULT_FONT: FontStyle = FontStyle::Regular;
    pub const DEFAULT_SIZE: f32 = 12.0;

    pub fn new(geometry: PageGeometry, fonts: &'f Fonts) -> Self {
        Layout {
            fonts,
            geometry,
            pages: vec![Page::default()],
            y: geometry.margin,
            font: Self::DEFAULT_FONT,
            size: Self::DEFAULT_SIZE,
        }
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn font(&self) -> (FontStyle, f32) {
        (self.font, self.size)
    }

    pub fn set_font(&mut self, font: FontStyle, size: f32) {
        self.font = font;
        self.size = size;
    }

    pub fn advance(&mut self, dy: f32) {
        self.y += dy;
    }

    /// Start a page; the cursor returns to the top margin and the font to
    /// the regular body face.
    pub fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = self.geometry.margin;
        self.font = Self::DEFAULT_FONT;
    }

    /// Break the page if the cursor has passed the bottom margin.
    pub fn break_if_past_bottom(&mut self) -> bool {
        if self.y > self.geometry.bottom_limit() {
            self.new_page();
            return true;
        }
        false
    }

    /// Wrap `text` in the current font and draw it at the cursor.
    ///
    /// Returns the number of lines drawn; the cursor does not move.
    pub fn wrapped_text(&mut self, text: &str, x: f32, max_width: f32) -> usize {
        let lines = split_text_to_size(text, self.fonts.get(self.font), self.size, max_width);
        self.text_lines(lines, x)
    }

    /// Draw pre-split lines at the cursor.
    pub fn text_lines(&mut self, lines: Vec<String>, x: f32) -> usize {
        let count = lines.len();
        let op = DrawOp::Text {
            font: self.font,
            size: self.size,
            x,
            y: self.y,
            lines,
        };
        self.push(op);
        count
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, gray: u8) {
        self.push(DrawOp::FillRect {
            x,
            y,
            width,
            height,
            gray,
        });
    }

    pub fn horizontal_line(&mut self, x1: f32, x2: f32, gray: u8) {
        let y = self.y;
        self.push(DrawOp::Line {
            x1,
            y1: y,
            x2,
            y2: y,
            gray,
        });
    }

    pub fn into_pages(self) -> Vec<Page> {
        self.pages
    }

    fn push(&mut self, op: DrawOp) {
        if let Some(page) = self.pages.last_mut() {
            page.ops.push(op);
        }
    }
}
