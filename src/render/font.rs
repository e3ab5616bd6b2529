//! TrueType fonts embedded in the binary.

use crate::error::FontError;
use std::fmt;
use std::sync::OnceLock;
use ttf_parser::{Face, GlyphId};

pub const MM_PER_PT: f32 = 25.4 / 72.0;

/// Faces the renderer draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontStyle {
    Regular,
    Bold,
    Mono,
}

impl FontStyle {
    pub fn all() -> &'static [FontStyle] {
        &[FontStyle::Regular, FontStyle::Bold, FontStyle::Mono]
    }

    /// Resource name used inside page content streams.
    pub fn resource_name(&self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
            FontStyle::Mono => "F3",
        }
    }
}

/// A parsed font together with the bytes it was parsed from.
pub struct Font {
    name: &'static str,
    data: &'static [u8],
    pub face: Face<'static>,
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font")
            .field("name", &self.name)
            .field("glyphs", &self.face.number_of_glyphs())
            .finish()
    }
}

impl Font {
    pub fn load(name: &'static str, data: &'static [u8]) -> Result<Font, FontError> {
        let face = Face::parse(data, 0).map_err(|source| FontError::Parse { name, source })?;
        Ok(Font { name, data, face })
    }

    /// PostScript name written into the document.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn data(&self) -> &'static [u8] {
        self.data
    }

    /// Glyph drawn for `c`; characters the font lacks map to `.notdef`.
    pub fn glyph_id(&self, c: char) -> u16 {
        self.face.glyph_index(c).map_or(0, |glyph| glyph.0)
    }

    /// Advance width of `glyph` in thousandths of the font size.
    pub fn glyph_width(&self, glyph: u16) -> f32 {
        let advance = self.face.glyph_hor_advance(GlyphId(glyph)).unwrap_or(0);
        self.to_thousandths(advance.into())
    }

    /// Convert a value in font units to thousandths of the font size.
    pub fn to_thousandths(&self, units: f32) -> f32 {
        units * 1000.0 / f32::from(self.face.units_per_em())
    }

    /// Glyph ids of `text` as big-endian pairs, the form Identity-H text expects.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .flat_map(|c| self.glyph_id(c).to_be_bytes())
            .collect()
    }
}

/// The regular, bold and monospace faces.
#[derive(Debug)]
pub struct Fonts {
    regular: Font,
    bold: Font,
    mono: Font,
}

impl Fonts {
    pub fn load() -> Result<Fonts, FontError> {
        let regular = Font::load(
            "DejaVuSans",
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSans.ttf")),
        )?;
        let bold = Font::load(
            "DejaVuSans-Bold",
            include_bytes!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/assets/fonts/DejaVuSans-Bold.ttf"
            )),
        )?;
        let mono = Font::load(
            "DejaVuSansMono",
            include_bytes!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/assets/fonts/DejaVuSansMono.ttf"
            )),
        )?;
        Ok(Fonts {
            regular,
            bold,
            mono,
        })
    }

    /// The embedded fonts, parsed on first use.
    pub fn embedded() -> Result<&'static Fonts, FontError> {
        static FONTS: OnceLock<Result<Fonts, FontError>> = OnceLock::new();
        FONTS.get_or_init(Fonts::load).as_ref().map_err(Clone::clone)
    }

    pub fn get(&self, style: FontStyle) -> &Font {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Mono => &self.mono,
        }
    }
}
