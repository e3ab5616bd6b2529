use crate::error::RenderError;
use crate::render::font::{Font, FontStyle, Fonts, MM_PER_PT};
use crate::render::layout::{DrawOp, Page, PageGeometry};
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo, UnicodeCmap};
use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};
use std::collections::BTreeMap;

const IDENTITY: SystemInfo = SystemInfo {
    registry: Str(b"Adobe"),
    ordering: Str(b"Identity"),
    supplement: 0,
};

/// An ordered set of laid-out pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    geometry: PageGeometry,
    pages: Vec<Page>,
}

impl Document {
    pub fn new(geometry: PageGeometry) -> Self {
        Document {
            geometry,
            pages: Vec::new(),
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn append(&mut self, pages: Vec<Page>) {
        self.pages.extend(pages);
    }

    /// A document always has at least one page.
    pub fn ensure_page(&mut self) {
        if self.pages.is_empty() {
            self.pages.push(Page::default());
        }
    }

    /// Characters drawn in each font, keyed by the glyph that shows them.
    fn used_glyphs(&self, fonts: &Fonts) -> BTreeMap<FontStyle, BTreeMap<u16, char>> {
        let mut used: BTreeMap<FontStyle, BTreeMap<u16, char>> = BTreeMap::new();
        for op in self.pages.iter().flat_map(|page| &page.ops) {
            if let DrawOp::Text { font, lines, .. } = op {
                let face = fonts.get(*font);
                let glyphs = used.entry(*font).or_default();
                for c in lines.iter().flat_map(|line| line.chars()) {
                    glyphs.entry(face.glyph_id(c)).or_insert(c);
                }
            }
        }
        used
    }

    /// Serialize to PDF bytes with the fonts in use embedded.
    pub fn to_pdf(&self) -> Result<Vec<u8>, RenderError> {
        let fonts = Fonts::embedded()?;
        let used = self.used_glyphs(fonts);

        let mut next_id = Ref::new(1);
        let catalog_id = next_id.bump();
        let tree_id = next_id.bump();
        let font_ids: Vec<(FontStyle, Ref)> =
            used.keys().map(|style| (*style, next_id.bump())).collect();
        let page_ids: Vec<(Ref, Ref)> = (0..self.pages.len().max(1))
            .map(|_| (next_id.bump(), next_id.bump()))
            .collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id)
            .kids(page_ids.iter().map(|(page_id, _)| *page_id))
            .count(page_ids.len() as i32);

        for (style, font_id) in &font_ids {
            let glyphs = used.get(style).cloned().unwrap_or_default();
            write_font(&mut pdf, &mut next_id, *font_id, fonts.get(*style), *style, &glyphs);
        }

        let width_pt = self.geometry.width / MM_PER_PT;
        let height_pt = self.geometry.height / MM_PER_PT;
        let blank = Page::default();

        for (index, (page_id, content_id)) in page_ids.iter().enumerate() {
            let mut page = pdf.page(*page_id);
            page.media_box(Rect::new(0.0, 0.0, width_pt, height_pt));
            page.parent(tree_id);
            page.contents(*content_id);
            {
                let mut resources = page.resources();
                let mut font_dict = resources.fonts();
                for (style, font_id) in &font_ids {
                    font_dict.pair(Name(style.resource_name().as_bytes()), *font_id);
                }
            }
            drop(page);

            let source = self.pages.get(index).unwrap_or(&blank);
            let content = self.page_content(source, fonts);
            pdf.stream(*content_id, &content);
        }

        Ok(pdf.finish())
    }

    fn page_content(&self, page: &Page, fonts: &Fonts) -> Vec<u8> {
        let height = self.geometry.height;
        let pt = |mm: f32| mm / MM_PER_PT;
        let mut content = Content::new();

        for op in &page.ops {
            match op {
                DrawOp::Text {
                    font,
                    size,
                    x,
                    y,
                    lines,
                } => {
                    content.set_fill_gray(0.0);
                    content.begin_text();
                    content.set_font(Name(font.resource_name().as_bytes()), *size);
                    for (line_index, line) in lines.iter().enumerate() {
                        let baseline = y + line_index as f32 * self.geometry.line_height;
                        content.set_text_matrix([1.0, 0.0, 0.0, 1.0, pt(*x), pt(height - baseline)]);
                        content.show(Str(&fonts.get(*font).encode(line)));
                    }
                    content.end_text();
                }
                DrawOp::FillRect {
                    x,
                    y,
                    width,
                    height: rect_height,
                    gray,
                } => {
                    content.set_fill_gray(f32::from(*gray) / 255.0);
                    content.rect(
                        pt(*x),
                        pt(height - y - rect_height),
                        pt(*width),
                        pt(*rect_height),
                    );
                    content.fill_nonzero();
                }
                DrawOp::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    gray,
                } => {
                    content.set_stroke_gray(f32::from(*gray) / 255.0);
                    content.set_line_width(0.5);
                    content.move_to(pt(*x1), pt(height - y1));
                    content.line_to(pt(*x2), pt(height - y2));
                    content.stroke();
                }
            }
        }

        content.finish()
    }
}

/// Embed `font` as a Type0 font over an Identity-H TrueType CID font.
///
/// Text is shown as two-byte glyph ids; `glyphs` supplies the widths and the
/// ToUnicode entries for the glyphs actually drawn.
fn write_font(
    pdf: &mut Pdf,
    next_id: &mut Ref,
    font_id: Ref,
    font: &Font,
    style: FontStyle,
    glyphs: &BTreeMap<u16, char>,
) {
    let cid_id = next_id.bump();
    let descriptor_id = next_id.bump();
    let file_id = next_id.bump();
    let cmap_id = next_id.bump();
    let name = Name(font.name().as_bytes());
    let face = &font.face;

    pdf.type0_font(font_id)
        .base_font(name)
        .encoding_predefined(Name(b"Identity-H"))
        .descendant_font(cid_id)
        .to_unicode(cmap_id);

    let mut cid = pdf.cid_font(cid_id);
    cid.subtype(CidFontType::Type2)
        .base_font(name)
        .system_info(IDENTITY)
        .font_descriptor(descriptor_id)
        .default_width(font.glyph_width(0))
        .cid_to_gid_map_predefined(Name(b"Identity"));
    {
        let mut widths = cid.widths();
        for glyph in glyphs.keys() {
            widths.consecutive(*glyph, [font.glyph_width(*glyph)]);
        }
    }
    drop(cid);

    let bbox = face.global_bounding_box();
    let units = |value: i16| font.to_thousandths(value.into());
    let mut flags = FontFlags::SYMBOLIC;
    if style == FontStyle::Mono {
        flags |= FontFlags::FIXED_PITCH;
    }
    let weight = f32::from(face.weight().to_number());
    pdf.font_descriptor(descriptor_id)
        .name(name)
        .flags(flags)
        .bbox(Rect::new(
            units(bbox.x_min),
            units(bbox.y_min),
            units(bbox.x_max),
            units(bbox.y_max),
        ))
        .italic_angle(face.italic_angle())
        .ascent(units(face.ascender()))
        .descent(units(face.descender()))
        .cap_height(units(face.capital_height().unwrap_or(face.ascender())))
        .stem_v(10.0 + 0.244 * (weight - 50.0))
        .font_file2(file_id);

    pdf.stream(file_id, font.data())
        .pair(Name(b"Length1"), font.data().len() as i32);

    let mut cmap = UnicodeCmap::new(Name(b"Custom"), IDENTITY);
    for (glyph, c) in glyphs {
        cmap.pair(*glyph, *c);
    }
    pdf.cmap(cmap_id, &cmap.finish());
}
