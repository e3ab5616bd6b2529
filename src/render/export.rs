use crate::error::RenderError;
use crate::github::issues::Issue;
use crate::render::{BodyConverter, DocumentRenderer, IssueFailure};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SLUG_CHARS: usize = 30;

/// The first 30 characters of `title` with everything but ASCII letters and
/// digits replaced by `-`.
pub fn slug(title: &str) -> String {
    title
        .chars()
        .take(SLUG_CHARS)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

pub fn single_issue_filename(issue: &Issue) -> String {
    format!("issue-{}-{}.pdf", issue.number, slug(&issue.title))
}

pub fn batch_filename(date: NaiveDate) -> String {
    format!("github-issues-{}.pdf", date.format("%Y-%m-%d"))
}

/// A document written to disk.
#[derive(Debug)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub pages: usize,
    pub failures: Vec<IssueFailure>,
}

/// Render `issues` into one batch file inside `dir`.
pub fn export_all<C, F>(
    renderer: &DocumentRenderer<C>,
    issues: &[Issue],
    hide_metadata: bool,
    dir: &Path,
    date: NaiveDate,
    on_progress: F,
) -> Result<ExportedFile, RenderError>
where
    C: BodyConverter,
    F: FnMut(usize),
{
    let rendered = renderer.render_with_progress(issues, hide_metadata, on_progress)?;
    let path = dir.join(batch_filename(date));
    fs::write(&path, rendered.to_pdf()?)?;
    info!(path = %path.display(), pages = rendered.page_count(), "Wrote batch document");

    Ok(ExportedFile {
        path,
        pages: rendered.page_count(),
        failures: rendered.failures,
    })
}

/// Render one issue into its own file inside `dir`.
pub fn export_single<C: BodyConverter>(
    renderer: &DocumentRenderer<C>,
    issue: &Issue,
    hide_metadata: bool,
    dir: &Path,
) -> Result<ExportedFile, RenderError> {
    let rendered = renderer.render_single(issue, hide_metadata)?;
    let path = dir.join(single_issue_filename(issue));
    fs::write(&path, rendered.to_pdf()?)?;
    info!(path = %path.display(), number = issue.number, "Wrote issue document");

    Ok(ExportedFile {
        path,
        pages: rendered.page_count(),
        failures: Vec::new(),
    })
}
