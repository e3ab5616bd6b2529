//! Lays out issues as pages of a printable document.

pub mod document;
pub mod export;
pub mod font;
pub mod layout;

use crate::error::RenderError;
use crate::github::issues::Issue;
use crate::markdown_parser::{self, BULLET, CODE_INDENT, RULE};
use document::Document;
use font::{FontStyle, Fonts};
use layout::{Layout, Page, PageGeometry};
use tracing::{debug, warn};

/// Shown in place of an empty body.
pub const NO_DESCRIPTION: &str = "No description provided.";

const TITLE_SIZE: f32 = 16.0;
const META_SIZE: f32 = 10.0;
const BODY_SIZE: f32 = 12.0;
const TITLE_GAP: f32 = 5.0;
const BLOCK_GAP: f32 = 3.0;
const CODE_INSET: f32 = 5.0;
const CODE_BACKGROUND: u8 = 245;
const RULE_GRAY: u8 = 200;

/// Turns an issue body into layout-ready text.
pub trait BodyConverter {
    fn convert(&self, body: &str) -> Result<String, RenderError>;
}

/// Converts markdown bodies; falls back to the raw body instead of failing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

impl BodyConverter for MarkdownConverter {
    fn convert(&self, body: &str) -> Result<String, RenderError> {
        Ok(markdown_parser::markdown_to_plain_text(body))
    }
}

/// How a body paragraph is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum Paragraph<'a> {
    Code(String),
    Bullet(&'a str),
    Rule,
    Plain(&'a str),
}

impl<'a> Paragraph<'a> {
    /// Classify a paragraph; the first matching form wins.
    pub fn classify(paragraph: &'a str) -> Self {
        if paragraph.starts_with(CODE_INDENT) || paragraph.starts_with('\t') {
            return Paragraph::Code(dedent(paragraph));
        }
        if paragraph.len() >= 6 && paragraph.starts_with("```") && paragraph.ends_with("```") {
            return Paragraph::Code(strip_fences(paragraph));
        }
        if paragraph.starts_with(BULLET) {
            return Paragraph::Bullet(paragraph);
        }
        if paragraph == RULE {
            return Paragraph::Rule;
        }
        Paragraph::Plain(paragraph.trim())
    }
}

fn dedent(code: &str) -> String {
    code.lines()
        .map(|line| {
            line.strip_prefix(CODE_INDENT)
                .or_else(|| line.strip_prefix('\t'))
                .unwrap_or(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .trim_end()
        .to_string()
}

fn strip_fences(code: &str) -> String {
    let inner = &code[3..code.len() - 3];
    // Drop an info string such as ```rust
    let inner = match inner.split_once('\n') {
        Some((info, rest)) if !info.trim().contains(' ') => rest,
        _ => inner,
    };
    inner.trim().to_string()
}

/// Format an ISO 8601 timestamp as e.g. `Jan 5, 2024`.
///
/// Unparseable input is shown as-is.
pub fn format_date(timestamp: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(timestamp)
        .map(|date| date.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|_| timestamp.to_string())
}

/// Issue pages plus the issues that could not be rendered.
#[derive(Debug)]
pub struct RenderedDocument {
    pub document: Document,
    pub failures: Vec<IssueFailure>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.document.page_count()
    }

    pub fn to_pdf(&self) -> Result<Vec<u8>, RenderError> {
        self.document.to_pdf()
    }
}

/// An issue skipped during batch rendering.
#[derive(Debug)]
pub struct IssueFailure {
    pub number: u64,
    pub error: RenderError,
}

pub struct DocumentRenderer<C = MarkdownConverter> {
    converter: C,
    geometry: PageGeometry,
}

impl DocumentRenderer<MarkdownConverter> {
    pub fn new() -> Self {
        Self::with_converter(MarkdownConverter)
    }
}

impl Default for DocumentRenderer<MarkdownConverter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: BodyConverter> DocumentRenderer<C> {
    pub fn with_converter(converter: C) -> Self {
        DocumentRenderer {
            converter,
            geometry: PageGeometry::A4,
        }
    }

    /// Render several issues into one document, each starting on its own page.
    ///
    /// An issue that fails to render is recorded and skipped.
    pub fn render(
        &self,
        issues: &[Issue],
        hide_metadata: bool,
    ) -> Result<RenderedDocument, RenderError> {
        self.render_with_progress(issues, hide_metadata, |_| {})
    }

    /// Like [`render`](Self::render), reporting the count of processed issues.
    pub fn render_with_progress<F>(
        &self,
        issues: &[Issue],
        hide_metadata: bool,
        mut on_progress: F,
    ) -> Result<RenderedDocument, RenderError>
    where
        F: FnMut(usize),
    {
        if issues.is_empty() {
            return Err(RenderError::EmptyInput);
        }

        let fonts = Fonts::embedded()?;
        let mut document = Document::new(self.geometry);
        let mut failures = Vec::new();

        for (index, issue) in issues.iter().enumerate() {
            match self.layout_issue(issue, hide_metadata, fonts) {
                Ok(pages) => document.append(pages),
                Err(error) => {
                    warn!(number = issue.number, error = %error, "Skipping issue that failed to render");
                    failures.push(IssueFailure {
                        number: issue.number,
                        error,
                    });
                }
            }
            on_progress(index + 1);
        }

        document.ensure_page();
        debug!(
            issues = issues.len(),
            pages = document.page_count(),
            failed = failures.len(),
            "Rendered document"
        );
        Ok(RenderedDocument { document, failures })
    }

    /// Render one issue; any failure aborts.
    pub fn render_single(
        &self,
        issue: &Issue,
        hide_metadata: bool,
    ) -> Result<RenderedDocument, RenderError> {
        let fonts = Fonts::embedded()?;
        let mut document = Document::new(self.geometry);
        document.append(self.layout_issue(issue, hide_metadata, fonts)?);
        Ok(RenderedDocument {
            document,
            failures: Vec::new(),
        })
    }

    fn layout_issue(
        &self,
        issue: &Issue,
        hide_metadata: bool,
        fonts: &Fonts,
    ) -> Result<Vec<Page>, RenderError> {
        let mut layout = Layout::new(self.geometry, fonts);
        let margin = self.geometry.margin;
        let max_width = self.geometry.printable_width();
        let line_height = self.geometry.line_height;

        layout.set_font(FontStyle::Bold, TITLE_SIZE);
        let title = format!("#{}: {}", issue.number, issue.title);
        let lines = layout.wrapped_text(&title, margin, max_width);
        layout.advance(lines as f32 * line_height + TITLE_GAP);

        if !hide_metadata {
            layout.set_font(FontStyle::Regular, META_SIZE);
            let opened = format!(
                "Opened by {} on {}",
                issue.user.login,
                format_date(&issue.created_at)
            );
            let lines = layout.wrapped_text(&opened, margin, max_width);
            layout.advance(lines as f32 * line_height);

            if !issue.labels.is_empty() {
                layout.advance(BLOCK_GAP);
                let names: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
                let labels = format!("Labels: {}", names.join(", "));
                let lines = layout.wrapped_text(&labels, margin, max_width);
                layout.advance(lines as f32 * line_height + BLOCK_GAP);
            }

            let status = vec![
                format!("Status: {}", issue.state.display_name()),
                format!("Last updated: {}", format_date(&issue.updated_at)),
            ];
            let lines = layout.text_lines(status, margin);
            layout.advance(lines as f32 * line_height);
        }

        layout.set_font(FontStyle::Regular, BODY_SIZE);
        let body = match issue.body_text().trim() {
            "" => String::new(),
            raw => self
                .converter
                .convert(raw)
                .map_err(|e| RenderError::Issue {
                    number: issue.number,
                    message: e.to_string(),
                })?,
        };
        let body = if body.trim().is_empty() {
            NO_DESCRIPTION.to_string()
        } else {
            body
        };

        for paragraph in body.split("\n\n") {
            if paragraph.trim().is_empty() {
                continue;
            }
            if layout.break_if_past_bottom() {
                layout.set_font(FontStyle::Regular, BODY_SIZE);
            }

            match Paragraph::classify(paragraph) {
                Paragraph::Code(code) => {
                    layout.set_font(FontStyle::Mono, BODY_SIZE);
                    let lines = layout::split_text_to_size(
                        &code,
                        fonts.get(FontStyle::Mono),
                        BODY_SIZE,
                        max_width - 2.0 * CODE_INSET,
                    );
                    let block_height = lines.len() as f32 * line_height;
                    let top = layout.y() - (line_height - 2.0);
                    layout.fill_rect(
                        margin - 2.0,
                        top,
                        max_width + 4.0,
                        block_height + 4.0,
                        CODE_BACKGROUND,
                    );
                    layout.text_lines(lines, margin + CODE_INSET);
                    layout.advance(block_height + 6.0);
                    layout.set_font(FontStyle::Regular, BODY_SIZE);
                }
                Paragraph::Bullet(text) => {
                    let lines =
                        layout.wrapped_text(text, margin + CODE_INSET, max_width - 2.0 * CODE_INSET);
                    layout.advance(lines as f32 * line_height + BLOCK_GAP);
                }
                Paragraph::Rule => {
                    layout.horizontal_line(margin, self.geometry.width - margin, RULE_GRAY);
                    layout.advance(line_height);
                }
                Paragraph::Plain(text) => {
                    let lines = layout.wrapped_text(text, margin, max_width);
                    layout.advance(lines as f32 * line_height + BLOCK_GAP);
                }
            }
        }

        Ok(layout.into_pages())
    }
}
