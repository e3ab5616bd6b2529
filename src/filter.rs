use crate::github::issues::{Issue, IssueState};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Which issues a view shows by state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StateFilter {
    #[default]
    Open,
    Closed,
    All,
}

impl StateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateFilter::Open => "open",
            StateFilter::Closed => "closed",
            StateFilter::All => "all",
        }
    }

    pub fn matches(&self, state: IssueState) -> bool {
        match self {
            StateFilter::Open => state == IssueState::Open,
            StateFilter::Closed => state == IssueState::Closed,
            StateFilter::All => true,
        }
    }
}

impl FromStr for StateFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(StateFilter::Open),
            "closed" => Ok(StateFilter::Closed),
            "all" => Ok(StateFilter::All),
            other => Err(format!(
                "Invalid state '{other}'. Expected one of: open, closed, all"
            )),
        }
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Criteria for deriving a view from the fetched issues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub state: StateFilter,
    /// An issue matches if it carries any of these; empty matches all.
    pub labels: Vec<String>,
    pub exclude_pull_requests: bool,
}

impl IssueFilter {
    pub fn matches(&self, issue: &Issue) -> bool {
        if self.exclude_pull_requests && issue.is_pull_request() {
            return false;
        }
        self.state.matches(issue.state)
            && (self.labels.is_empty() || self.labels.iter().any(|name| issue.has_label(name)))
    }

    pub fn apply(&self, issues: &[Issue]) -> IssueView {
        IssueView {
            issues: issues
                .iter()
                .filter(|issue| self.matches(issue))
                .cloned()
                .collect(),
        }
    }
}

/// Immutable snapshot of the issues currently shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueView {
    issues: Vec<Issue>,
}

impl IssueView {
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Narrow the view to the given issue numbers, keeping view order.
    ///
    /// An empty selection keeps every issue.
    pub fn select(&self, numbers: &[u64]) -> IssueView {
        if numbers.is_empty() {
            return self.clone();
        }
        IssueView {
            issues: self
                .issues
                .iter()
                .filter(|issue| numbers.contains(&issue.number))
                .cloned()
                .collect(),
        }
    }
}

/// Distinct label names across `issues`, sorted.
pub fn unique_labels(issues: &[Issue]) -> Vec<String> {
    issues
        .iter()
        .flat_map(|issue| issue.labels.iter().map(|label| label.name.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::issues::{IssueLabel, IssueUser, PullRequestLink};

    fn issue(number: u64, state: IssueState, labels: &[&str]) -> Issue {
        Issue {
            id: number,
            number,
            title: format!("Issue {number}"),
            body: None,
            state,
            created_at: "2024-01-05T10:00:00Z".to_string(),
            updated_at: "2024-01-05T10:00:00Z".to_string(),
            user: IssueUser {
                login: "octocat".to_string(),
                avatar_url: String::new(),
            },
            labels: labels
                .iter()
                .map(|name| IssueLabel {
                    name: name.to_string(),
                    color: String::new(),
                })
                .collect(),
            pull_request: None,
        }
    }

    fn sample() -> Vec<Issue> {
        vec![
            issue(1, IssueState::Open, &["bug"]),
            issue(2, IssueState::Closed, &["bug", "ui"]),
            issue(3, IssueState::Open, &["docs"]),
            issue(4, IssueState::Open, &[]),
        ]
    }

    fn numbers(view: &IssueView) -> Vec<u64> {
        view.issues().iter().map(|i| i.number).collect()
    }

    #[test]
    fn test_state_filter_parse() {
        assert_eq!("open".parse::<StateFilter>(), Ok(StateFilter::Open));
        assert_eq!("closed".parse::<StateFilter>(), Ok(StateFilter::Closed));
        assert_eq!("all".parse::<StateFilter>(), Ok(StateFilter::All));
        assert!("merged".parse::<StateFilter>().is_err());
        assert_eq!(StateFilter::default(), StateFilter::Open);
    }

    #[test]
    fn test_state_tabs() {
        let issues = sample();
        let by_state = |state| {
            numbers(
                &IssueFilter {
                    state,
                    ..Default::default()
                }
                .apply(&issues),
            )
        };
        assert_eq!(by_state(StateFilter::Open), vec![1, 3, 4]);
        assert_eq!(by_state(StateFilter::Closed), vec![2]);
        assert_eq!(by_state(StateFilter::All), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_label_filter_matches_any() {
        let filter = IssueFilter {
            state: StateFilter::All,
            labels: vec!["ui".to_string(), "docs".to_string()],
            exclude_pull_requests: false,
        };
        assert_eq!(numbers(&filter.apply(&sample())), vec![2, 3]);
    }

    #[test]
    fn test_pull_requests_can_be_excluded() {
        let mut issues = sample();
        issues[0].pull_request = Some(PullRequestLink { url: None });

        let mut filter = IssueFilter {
            state: StateFilter::All,
            ..Default::default()
        };
        assert_eq!(filter.apply(&issues).len(), 4);

        filter.exclude_pull_requests = true;
        assert_eq!(numbers(&filter.apply(&issues)), vec![2, 3, 4]);
    }

    #[test]
    fn test_select_keeps_view_order() {
        let view = IssueFilter {
            state: StateFilter::All,
            ..Default::default()
        }
        .apply(&sample());

        assert_eq!(numbers(&view.select(&[3, 1])), vec![1, 3]);
        assert_eq!(numbers(&view.select(&[])), vec![1, 2, 3, 4]);
        assert!(view.select(&[99]).is_empty());
    }

    #[test]
    fn test_unique_labels_sorted() {
        assert_eq!(unique_labels(&sample()), vec!["bug", "docs", "ui"]);
        assert!(unique_labels(&[]).is_empty());
    }
}
