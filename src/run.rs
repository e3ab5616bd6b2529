use crate::cli::parser::{self, Command, ExportArgs};
use crate::config::{self, ConfigKey};
use crate::filter;
use crate::github::client::HttpPageSource;
use crate::github::fetch::{FetchSettings, IssueFetcher, IssuePageSource};
use crate::github::issues::{Credentials, Issue};
use crate::output;
use crate::render::DocumentRenderer;
use crate::render::export;
use anyhow::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Entry point shared by the binary and the acceptance tests.
pub async fn run(
    args: Vec<String>,
    mut stdout_additional: Option<&mut dyn Write>,
) -> anyhow::Result<()> {
    let command = parser::parse_args(&args);
    match command {
        Command::Help => output::println(parser::USAGE, &mut stdout_additional)?,
        Command::Unknown(message) => {
            return Err(anyhow::anyhow!(
                "{message}\nUse `issues2pdf help` for usage."
            ));
        }
        command => {
            let config = config::load_project_config(&std::env::current_dir()?)?;
            let token = config::token_from(std::env::var(config::TOKEN_ENV).ok())?;
            let source = HttpPageSource::new(config::api_base_url(&config))?;
            let fetcher = IssueFetcher::new(source, FetchSettings::from_config(&config));
            execute(command, &fetcher, &token, &config, export_date(), &mut stdout_additional)
                .await?;
        }
    }
    Ok(())
}

/// UTC date stamped into batch filenames.
fn export_date() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Run a repository command against `fetcher`.
pub async fn execute<S: IssuePageSource>(
    command: Command,
    fetcher: &IssueFetcher<S>,
    token: &str,
    config: &HashMap<ConfigKey, Value>,
    today: chrono::NaiveDate,
    stdout_additional: &mut Option<&mut dyn Write>,
) -> anyhow::Result<()> {
    match command {
        Command::List { repo, filter } => {
            let issues = fetch(fetcher, &repo, token).await?;
            let view = filter.apply(&issues);
            for issue in view.issues() {
                output::println(&list_line(issue), stdout_additional)?;
            }
            output::println(
                &format!("{} of {} issues shown ({})", view.len(), issues.len(), filter.state),
                stdout_additional,
            )?;
        }
        Command::Labels { repo } => {
            let issues = fetch(fetcher, &repo, token).await?;
            for label in filter::unique_labels(&issues) {
                output::println(&label, stdout_additional)?;
            }
        }
        Command::Export(args) => {
            let hide_metadata = args.hide_metadata || config::hide_metadata(config);
            let issues = fetch(fetcher, &args.repo, token).await?;
            export_view(&args, &issues, hide_metadata, today, stdout_additional)?;
        }
        Command::Help | Command::Unknown(_) => {
            return Err(anyhow::anyhow!("Not a repository command"));
        }
    }
    Ok(())
}

async fn fetch<S: IssuePageSource>(
    fetcher: &IssueFetcher<S>,
    repo: &str,
    token: &str,
) -> anyhow::Result<Vec<Issue>> {
    let credentials = Credentials {
        repo: repo.to_string(),
        token: token.to_string(),
    };
    fetcher
        .fetch(&credentials)
        .await
        .with_context(|| format!("Failed to fetch issues from {repo}"))
}

fn list_line(issue: &Issue) -> String {
    let mut line = format!("#{} [{}] {}", issue.number, issue.state.display_name(), issue.title);
    if !issue.labels.is_empty() {
        let names: Vec<&str> = issue.labels.iter().map(|l| l.name.as_str()).collect();
        line.push_str(&format!(" ({})", names.join(", ")));
    }
    line
}

fn export_view(
    args: &ExportArgs,
    issues: &[Issue],
    hide_metadata: bool,
    today: chrono::NaiveDate,
    stdout_additional: &mut Option<&mut dyn Write>,
) -> anyhow::Result<()> {
    let view = args.filter.apply(issues).select(&args.issues);
    if view.is_empty() {
        return Err(anyhow::anyhow!("No issues match the selection"));
    }

    let dir = PathBuf::from(args.output.as_deref().unwrap_or("."));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let renderer = DocumentRenderer::new();

    if args.single {
        for issue in view.issues() {
            let exported = export::export_single(&renderer, issue, hide_metadata, &dir)
                .with_context(|| format!("Failed to export issue #{}", issue.number))?;
            output::println(
                &format!("✓ Exported issue #{} to {}", issue.number, exported.path.display()),
                stdout_additional,
            )?;
        }
        return Ok(());
    }

    let total = view.len();
    let exported = export::export_all(&renderer, view.issues(), hide_metadata, &dir, today, |done| {
        debug!(done, total, "Rendered issue");
    })
    .context("Failed to export issues")?;

    for failure in &exported.failures {
        output::println(
            &format!("Skipped issue #{}: {}", failure.number, failure.error),
            stdout_additional,
        )?;
    }
    output::println(
        &format!(
            "✓ Exported {} issues ({} pages) to {}",
            total - exported.failures.len(),
            exported.pages,
            exported.path.display()
        ),
        stdout_additional,
    )?;
    Ok(())
}
