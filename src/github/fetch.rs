use crate::error::FetchError;
use crate::github::issues::{Credentials, Issue, RepoRef};
use crate::github::rate_limit::RateLimitInfo;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest page size the listing endpoint accepts.
pub const MAX_PER_PAGE: u32 = 100;

/// Tunables for pagination and rate-limit handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub per_page: u32,
    /// Pause after every page, to stay clear of secondary limits
    pub request_delay: Duration,
    /// Added on top of every wait computed from a reset timestamp
    pub reset_buffer: Duration,
    /// Rate-limited responses tolerated over a whole fetch
    pub max_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        FetchSettings {
            per_page: MAX_PER_PAGE,
            request_delay: Duration::from_millis(100),
            reset_buffer: Duration::from_millis(100),
            max_retries: 3,
        }
    }
}

/// Parameters of one page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    pub repo: &'a RepoRef,
    pub token: &'a str,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    pub issues: Vec<Issue>,
    pub rate_limit: RateLimitInfo,
}

/// Why a page request failed.
#[derive(Debug)]
pub enum PageFailure {
    /// HTTP 403 or 429, possibly carrying wait hints
    RateLimited {
        status: u16,
        rate_limit: RateLimitInfo,
        message: String,
    },
    /// Anything else: transport errors, other statuses, bad payloads
    Api { message: String },
}

/// Source of issue pages; the HTTP client implements it, tests script it.
pub trait IssuePageSource {
    fn fetch_page(
        &self,
        request: PageRequest<'_>,
    ) -> impl Future<Output = Result<PageResponse, PageFailure>> + Send;
}

/// States of the pagination loop.
#[derive(Debug)]
pub enum FetchState {
    Requesting { page: u32 },
    Waiting { duration: Duration, next: Box<FetchState> },
    Retrying { page: u32 },
    Succeeded,
    Failed(FetchError),
}

/// Transition logic of a fetch, free of I/O and clocks.
#[derive(Debug)]
pub struct FetchMachine {
    settings: FetchSettings,
    retries: u32,
    issues: Vec<Issue>,
    seen: HashSet<u64>,
}

impl FetchMachine {
    pub fn new(settings: FetchSettings) -> Self {
        FetchMachine {
            settings,
            retries: 0,
            issues: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }

    /// Accumulate a page and decide what follows it.
    pub fn page_received(&mut self, page: u32, response: PageResponse, now_ms: i64) -> FetchState {
        if response.issues.is_empty() {
            debug!(page, "Empty page, pagination complete");
            return FetchState::Succeeded;
        }

        let received = response.issues.len();
        for issue in response.issues {
            if self.seen.insert(issue.id) {
                self.issues.push(issue);
            } else {
                debug!(id = issue.id, number = issue.number, "Dropping duplicate issue");
            }
        }
        debug!(page, received, total = self.issues.len(), "Page accumulated");

        let quota_wait = response
            .rate_limit
            .quota_wait(now_ms, self.settings.reset_buffer);
        if let Some(wait) = quota_wait {
            warn!(
                wait_secs = wait.as_secs_f64(),
                "Rate limit nearly exhausted, waiting for reset"
            );
        }

        FetchState::Waiting {
            duration: quota_wait.unwrap_or_default() + self.settings.request_delay,
            next: Box::new(FetchState::Requesting { page: page + 1 }),
        }
    }

    /// Classify a failed page request.
    pub fn page_failed(&mut self, page: u32, failure: PageFailure, now_ms: i64) -> FetchState {
        let (status, rate_limit, message) = match failure {
            PageFailure::Api { message } => return FetchState::Failed(FetchError::Api(message)),
            PageFailure::RateLimited {
                status,
                rate_limit,
                message,
            } => (status, rate_limit, message),
        };

        self.retries += 1;
        if self.retries > self.settings.max_retries {
            warn!(page, retries = self.retries, "Giving up after repeated rate limiting");
            return FetchState::Failed(FetchError::RetriesExhausted {
                attempts: self.retries,
            });
        }

        let wait = match rate_limit.retry_after_wait() {
            Some(wait) => {
                warn!(page, status, wait_secs = wait.as_secs(), "Secondary rate limit hit");
                Some(wait)
            }
            None => rate_limit
                .reset_wait(now_ms, self.settings.reset_buffer)
                .inspect(|wait| {
                    warn!(
                        page,
                        status,
                        wait_secs = wait.as_secs_f64(),
                        "Rate limit exceeded, waiting for reset"
                    );
                }),
        };

        match wait {
            Some(duration) => FetchState::Waiting {
                duration,
                next: Box::new(FetchState::Retrying { page }),
            },
            None => FetchState::Failed(FetchError::Api(format!("HTTP {status}: {message}"))),
        }
    }
}

fn system_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Retrieves every issue of a repository, one page at a time.
pub struct IssueFetcher<S> {
    source: S,
    settings: FetchSettings,
    clock: fn() -> i64,
}

impl<S: IssuePageSource> IssueFetcher<S> {
    pub fn new(source: S, settings: FetchSettings) -> Self {
        IssueFetcher {
            source,
            settings,
            clock: system_clock_ms,
        }
    }

    /// Replace the wall clock (epoch milliseconds) used for reset waits.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch all issues, open and closed, in server order.
    ///
    /// Either the complete list is returned or an error; partial results are
    /// never surfaced.
    pub async fn fetch(&self, credentials: &Credentials) -> Result<Vec<Issue>, FetchError> {
        let repo: RepoRef = credentials.repo.parse()?;
        let per_page = self.settings.per_page.clamp(1, MAX_PER_PAGE);

        let mut machine = FetchMachine::new(self.settings.clone());
        let mut state = FetchState::Requesting { page: 1 };

        loop {
            state = match state {
                FetchState::Requesting { page } | FetchState::Retrying { page } => {
                    debug!(repo = %repo, page, per_page, "Requesting issues page");
                    let request = PageRequest {
                        repo: &repo,
                        token: &credentials.token,
                        page,
                        per_page,
                    };
                    match self.source.fetch_page(request).await {
                        Ok(response) => machine.page_received(page, response, (self.clock)()),
                        Err(failure) => machine.page_failed(page, failure, (self.clock)()),
                    }
                }
                FetchState::Waiting { duration, next } => {
                    if !duration.is_zero() {
                        tokio::time::sleep(duration).await;
                    }
                    *next
                }
                FetchState::Succeeded => {
                    let issues = machine.into_issues();
                    info!(repo = %repo, count = issues.len(), "Fetched issues");
                    return Ok(issues);
                }
                FetchState::Failed(err) => return Err(err),
            };
        }
    }
}
