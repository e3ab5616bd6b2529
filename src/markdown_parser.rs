//! Markdown to layout-ready plain text.
//!
//! The conversion runs as an ordered list of named stages. Markdown is first
//! parsed into a flat [`Token`] stream, token stages rewrite that stream, the
//! stream is flattened to text, and text stages normalise the result. Stage
//! order matters: list items are prefixed while the stream is still tokenized,
//! so the later markup stripping never sees or removes them.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use tracing::warn;

/// Prefix given to every list item.
pub const BULLET: &str = "• ";
/// Paragraph standing for a horizontal rule.
pub const RULE: &str = "---";
/// Indentation marking a code block in the flattened text.
pub const CODE_INDENT: &str = "    ";

/// Intermediate markup between markdown events and plain text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    LineBreak,
    /// Closing paragraph, heading, table or list
    BlockEnd,
    ItemStart,
    ItemEnd,
    Rule,
    InlineCode(String),
    CodeBlock(String),
    CellEnd,
    RowEnd,
    /// Raw HTML found in the source
    Markup(String),
}

type TokenStage = fn(Vec<Token>) -> Vec<Token>;
type TextStage = fn(String) -> String;

const TOKEN_STAGES: &[(&str, TokenStage)] = &[("strip_markup", strip_markup)];

const TEXT_STAGES: &[(&str, TextStage)] = &[
    ("collapse_blank_lines", collapse_blank_lines),
    ("trim", trim),
];

/// Convert markdown to plain text, falling back to the raw input if the
/// conversion panics.
pub fn markdown_to_plain_text(markdown: &str) -> String {
    match std::panic::catch_unwind(|| convert(markdown)) {
        Ok(text) => text,
        Err(_) => {
            warn!("Markdown conversion failed, using raw text");
            markdown.to_string()
        }
    }
}

/// Run every stage over `markdown`.
pub fn convert(markdown: &str) -> String {
    let tokens = TOKEN_STAGES
        .iter()
        .fold(tokenize(markdown), |tokens, (_, stage)| stage(tokens));
    TEXT_STAGES
        .iter()
        .fold(flatten(&tokens), |text, (_, stage)| stage(text))
}

/// Names of the stages in execution order.
pub fn stage_names() -> Vec<&'static str> {
    std::iter::once("tokenize")
        .chain(TOKEN_STAGES.iter().map(|(name, _)| *name))
        .chain(std::iter::once("flatten"))
        .chain(TEXT_STAGES.iter().map(|(name, _)| *name))
        .collect()
}

/// Parse GitHub-flavoured markdown into a token stream.
pub fn tokenize(markdown: &str) -> Vec<Token> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let mut tokens = Vec::new();
    let mut code_block: Option<String> = None;
    let mut image_depth = 0usize;
    let mut item_depth = 0usize;

    for event in Parser::new_ext(markdown, options) {
        if let Some(code) = code_block.as_mut() {
            match event {
                Event::End(TagEnd::CodeBlock) => {
                    let code = code_block.take().unwrap_or_default();
                    tokens.push(Token::CodeBlock(code));
                }
                Event::Text(text) | Event::Html(text) => code.push_str(&text),
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(_)) => code_block = Some(String::new()),
            Event::Start(Tag::Image { .. }) => image_depth += 1,
            Event::End(TagEnd::Image) => image_depth = image_depth.saturating_sub(1),
            _ if image_depth > 0 => {}
            Event::Start(Tag::List(_)) if item_depth > 0 => tokens.push(Token::LineBreak),
            Event::Start(Tag::Item) => {
                item_depth += 1;
                tokens.push(Token::ItemStart);
            }
            Event::End(TagEnd::Item) => {
                item_depth = item_depth.saturating_sub(1);
                tokens.push(Token::ItemEnd);
            }
            Event::End(TagEnd::List(_)) if item_depth == 0 => tokens.push(Token::BlockEnd),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Table) => tokens.push(Token::BlockEnd),
            Event::End(TagEnd::TableCell) => tokens.push(Token::CellEnd),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                tokens.push(Token::RowEnd)
            }
            Event::Text(text) => tokens.push(Token::Text(text.into_string())),
            Event::Code(code) => tokens.push(Token::InlineCode(code.into_string())),
            Event::Html(html) | Event::InlineHtml(html) => {
                tokens.push(Token::Markup(html.into_string()))
            }
            Event::SoftBreak | Event::HardBreak => tokens.push(Token::LineBreak),
            Event::Rule => {
                tokens.push(Token::Rule);
                tokens.push(Token::BlockEnd);
            }
            Event::TaskListMarker(checked) => tokens.push(Token::Text(
                if checked { "[x] " } else { "[ ] " }.to_string(),
            )),
            _ => {}
        }
    }

    tokens
}

/// Replace raw HTML with the text it encloses.
fn strip_markup(tokens: Vec<Token>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Markup(html) => Token::Text(strip_tags(&html)),
            other => other,
        })
        .collect()
}

/// Remove everything between `<` and the next `>`.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' if !in_tag => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Render the token stream as text.
pub fn flatten(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::LineBreak => out.push('\n'),
            Token::BlockEnd => out.push_str("\n\n"),
            Token::ItemStart => out.push_str(BULLET),
            Token::ItemEnd => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Token::Rule => {
                out.push('\n');
                out.push_str(RULE);
                out.push('\n');
            }
            Token::InlineCode(code) => {
                out.push('`');
                out.push_str(code);
                out.push('`');
            }
            Token::CodeBlock(code) => {
                out.push_str("\n\n");
                for line in code.trim_end_matches('\n').lines() {
                    out.push_str(CODE_INDENT);
                    out.push_str(line);
                    out.push('\n');
                }
                out.push('\n');
            }
            Token::CellEnd => out.push_str(" | "),
            Token::RowEnd => {
                let trimmed = out.trim_end_matches(" | ").len();
                out.truncate(trimmed);
                out.push('\n');
            }
            Token::Markup(html) => out.push_str(html),
        }
    }
    out
}

/// Collapse runs of three or more line breaks (whitespace between them
/// included) into exactly one blank line.
///
/// Blank lines inside an indented code block carry the code indent and are
/// kept as they are.
fn collapse_blank_lines(text: String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = String::new();
    let mut newlines = 0usize;

    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            pending.push(c);
        } else if newlines > 0 && c.is_whitespace() {
            pending.push(c);
        } else {
            flush_break(&mut out, &mut pending, newlines);
            newlines = 0;
            out.push(c);
        }
    }
    flush_break(&mut out, &mut pending, newlines);
    out
}

fn flush_break(out: &mut String, pending: &mut String, newlines: usize) {
    if newlines >= 3 && !is_code_gap(pending) {
        // Keep indentation that belongs to the next line.
        let indent = pending.rsplit('\n').next().unwrap_or("");
        out.push_str("\n\n");
        out.push_str(indent);
    } else {
        out.push_str(pending);
    }
    pending.clear();
}

/// Every line of the run, including the one it leads into, is indented code.
fn is_code_gap(pending: &str) -> bool {
    pending
        .split('\n')
        .skip(1)
        .all(|line| line.starts_with(CODE_INDENT))
}

fn trim(text: String) -> String {
    // Leading whitespace of an indented code block is significant.
    let start = text
        .char_indices()
        .find(|(_, c)| *c != '\n' && *c != '\r')
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[start..];
    if head.starts_with(CODE_INDENT) {
        head.trim_end().to_string()
    } else {
        head.trim().to_string()
    }
}
