use crate::filter::{IssueFilter, StateFilter};

/// Options of the `export` command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportArgs {
    pub repo: String,
    pub filter: IssueFilter,
    /// Issue numbers to export; empty exports the whole view
    pub issues: Vec<u64>,
    pub hide_metadata: bool,
    pub single: bool,
    pub output: Option<String>,
}

/// Enum representing CLI commands
#[derive(Debug, PartialEq)]
pub enum Command {
    List { repo: String, filter: IssueFilter },
    Labels { repo: String },
    Export(ExportArgs),
    Help,
    Unknown(String),
}

const INVALID_REPO: &str = "Invalid repository format. Please use <owner>/<repo>.";

fn is_valid_repo(repo: &str) -> bool {
    let parts: Vec<&str> = repo.split('/').collect();
    parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty()
}

/// Parse command line arguments and return a Command
///
/// # Arguments
/// * `args` - Command line arguments (including program name)
///
/// # Returns
/// * `Command` - The parsed command
pub fn parse_args(args: &[String]) -> Command {
    let Some(cmd) = args.get(1) else {
        return Command::Help;
    };

    match cmd.as_str() {
        "help" | "--help" | "-h" => Command::Help,
        "list" | "labels" | "export" => {
            let Some(repo) = args.get(2) else {
                return Command::Unknown(format!(
                    "Missing repository argument. Usage: issues2pdf {cmd} <owner>/<repo>"
                ));
            };
            if !is_valid_repo(repo) {
                return Command::Unknown(INVALID_REPO.to_string());
            }
            match parse_options(cmd, repo, &args[3..]) {
                Ok(command) => command,
                Err(message) => Command::Unknown(message),
            }
        }
        other => Command::Unknown(other.to_string()),
    }
}

fn parse_options(cmd: &str, repo: &str, options: &[String]) -> Result<Command, String> {
    let mut export = ExportArgs {
        repo: repo.to_string(),
        ..Default::default()
    };
    let mut iter = options.iter();

    while let Some(option) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("Missing value for {name}"))
        };
        match (cmd, option.as_str()) {
            ("list" | "export", "--state") => {
                export.filter.state = value("--state")?.parse::<StateFilter>()?;
            }
            ("list" | "export", "--label") => export.filter.labels.push(value("--label")?),
            ("list" | "export", "--exclude-pull-requests") => {
                export.filter.exclude_pull_requests = true;
            }
            ("export", "--issue") => {
                let raw = value("--issue")?;
                let number = raw
                    .trim_start_matches('#')
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid issue number '{raw}'"))?;
                export.issues.push(number);
            }
            ("export", "--hide-metadata") => export.hide_metadata = true,
            ("export", "--single") => export.single = true,
            ("export", "--output") => export.output = Some(value("--output")?),
            (_, unknown) => return Err(format!("Unknown option '{unknown}' for {cmd}")),
        }
    }

    Ok(match cmd {
        "list" => Command::List {
            repo: export.repo,
            filter: export.filter,
        },
        "labels" => Command::Labels { repo: export.repo },
        _ => Command::Export(export),
    })
}

pub const USAGE: &str = "\
Usage:
  issues2pdf list   <owner>/<repo> [--state open|closed|all] [--label NAME]...
                    [--exclude-pull-requests]
  issues2pdf labels <owner>/<repo>
  issues2pdf export <owner>/<repo> [--state open|closed|all] [--label NAME]...
                    [--exclude-pull-requests] [--issue N]... [--hide-metadata]
                    [--single] [--output DIR]
  issues2pdf help

The access token is read from the GITHUB_TOKEN environment variable.";
