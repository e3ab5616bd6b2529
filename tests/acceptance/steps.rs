use crate::{Issues2PdfWorld, ScriptedReply};
use cucumber::{given, then, when};
use issues2pdf::github::fetch::{
    FetchSettings, IssueFetcher, IssuePageSource, PageFailure, PageRequest, PageResponse,
};
use issues2pdf::github::issues::{Credentials, Issue, IssueState, IssueUser};
use issues2pdf::github::rate_limit::RateLimitInfo;
use issues2pdf::render::DocumentRenderer;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const NOW_MS: i64 = 1_700_000_000_000;

fn fixed_clock() -> i64 {
    NOW_MS
}

fn make_issue(number: u64, title: &str, body: Option<String>) -> Issue {
    Issue {
        id: 10_000 + number,
        number,
        title: title.to_string(),
        body,
        state: IssueState::Open,
        created_at: "2024-01-05T10:00:00Z".to_string(),
        updated_at: "2024-01-06T10:00:00Z".to_string(),
        user: IssueUser {
            login: "octocat".to_string(),
            avatar_url: String::new(),
        },
        labels: vec![],
        pull_request: None,
    }
}

/// Replays scripted replies in order, then serves empty pages.
struct ScriptedSource {
    replies: Mutex<VecDeque<Result<PageResponse, PageFailure>>>,
    pages: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedSource {
    fn new(script: &[ScriptedReply], pages: Arc<Mutex<Vec<u32>>>) -> Self {
        let mut next_number = 1;
        let replies = script
            .iter()
            .map(|reply| match reply {
                ScriptedReply::Page {
                    count,
                    remaining,
                    reset_in_secs,
                } => {
                    let issues = (0..*count)
                        .map(|_| {
                            let issue = make_issue(next_number, &format!("Issue {next_number}"), None);
                            next_number += 1;
                            issue
                        })
                        .collect();
                    Ok(PageResponse {
                        issues,
                        rate_limit: RateLimitInfo {
                            remaining: *remaining,
                            reset_at: reset_in_secs.map(|secs| NOW_MS / 1000 + secs),
                            retry_after: None,
                        },
                    })
                }
                ScriptedReply::Throttled { retry_after } => Err(PageFailure::RateLimited {
                    status: 403,
                    rate_limit: RateLimitInfo {
                        retry_after: Some(*retry_after),
                        ..Default::default()
                    },
                    message: "You have exceeded a secondary rate limit".to_string(),
                }),
            })
            .collect();

        ScriptedSource {
            replies: Mutex::new(replies),
            pages,
        }
    }
}

impl IssuePageSource for ScriptedSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<PageResponse, PageFailure> {
        self.pages.lock().unwrap().push(request.page);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PageResponse::default()))
    }
}

#[given(regex = r"^a repository with (\d+) issues$")]
async fn given_repository_with_issues(world: &mut Issues2PdfWorld, total: usize) {
    let mut left = total;
    while left > 0 {
        let count = left.min(100);
        world.script.push(ScriptedReply::Page {
            count,
            remaining: Some(4999),
            reset_in_secs: Some(3600),
        });
        left -= count;
    }
}

#[given(regex = r"^a page of (\d+) issues$")]
async fn given_page(world: &mut Issues2PdfWorld, count: usize) {
    world.script.push(ScriptedReply::Page {
        count,
        remaining: None,
        reset_in_secs: None,
    });
}

#[given(
    regex = r"^a page of (\d+) issues with (\d+) requests remaining resetting in (\d+) seconds$"
)]
async fn given_page_with_quota(
    world: &mut Issues2PdfWorld,
    count: usize,
    remaining: u64,
    reset_in_secs: i64,
) {
    world.script.push(ScriptedReply::Page {
        count,
        remaining: Some(remaining),
        reset_in_secs: Some(reset_in_secs),
    });
}

#[given(regex = r"^a throttled response asking to retry after (\d+) seconds$")]
async fn given_throttled(world: &mut Issues2PdfWorld, retry_after: u64) {
    world.script.push(ScriptedReply::Throttled { retry_after });
}

#[given(regex = r"^(\d+) throttled responses asking to retry after (\d+) seconds$")]
async fn given_many_throttled(world: &mut Issues2PdfWorld, times: usize, retry_after: u64) {
    for _ in 0..times {
        world.script.push(ScriptedReply::Throttled { retry_after });
    }
}

#[when(regex = r#"^I fetch issues for "(.*)"$"#)]
async fn when_fetch(world: &mut Issues2PdfWorld, repo: String) {
    let pages = Arc::new(Mutex::new(Vec::new()));
    let source = ScriptedSource::new(&world.script, Arc::clone(&pages));
    let fetcher = IssueFetcher::new(source, FetchSettings::default()).with_clock(fixed_clock);
    let credentials = Credentials {
        repo,
        token: "test-token".to_string(),
    };

    // Waits run on a paused clock so scenarios finish instantly.
    let (result, elapsed) = tokio::task::spawn_blocking(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .expect("Failed to build runtime");
        runtime.block_on(async move {
            let started = tokio::time::Instant::now();
            let result = fetcher.fetch(&credentials).await;
            (result, started.elapsed())
        })
    })
    .await
    .expect("Fetch task panicked");

    world.requested_pages = pages.lock().unwrap().clone();
    world.elapsed = elapsed;
    world.fetch_result = Some(result.map_err(|e| e.to_string()));
}

#[then(regex = r"^(\d+) issues are returned$")]
async fn then_issues_returned(world: &mut Issues2PdfWorld, expected: usize) {
    match world.fetch_result.as_ref().expect("No fetch was run") {
        Ok(issues) => {
            assert_eq!(issues.len(), expected);
            let numbers: Vec<u64> = issues.iter().map(|issue| issue.number).collect();
            let ordered: Vec<u64> = (1..=expected as u64).collect();
            assert_eq!(numbers, ordered, "issues must keep server order");
        }
        Err(e) => panic!("Fetch failed: {e}"),
    }
}

#[then(regex = r#"^the fetch fails with "(.*)"$"#)]
async fn then_fetch_fails(world: &mut Issues2PdfWorld, message: String) {
    match world.fetch_result.as_ref().expect("No fetch was run") {
        Ok(issues) => panic!("Expected failure, got {} issues", issues.len()),
        Err(e) => assert_eq!(e, &message),
    }
}

#[then(regex = r#"^pages "(.*)" were requested$"#)]
async fn then_pages_requested(world: &mut Issues2PdfWorld, pages: String) {
    let expected: Vec<u32> = pages
        .split(',')
        .map(|page| page.trim().parse().expect("Invalid page number"))
        .collect();
    assert_eq!(world.requested_pages, expected);
}

#[then("no page was requested")]
async fn then_no_page_requested(world: &mut Issues2PdfWorld) {
    assert!(
        world.requested_pages.is_empty(),
        "Requested pages: {:?}",
        world.requested_pages
    );
}

#[then(regex = r"^the fetch waited at least ([\d.]+) seconds$")]
async fn then_fetch_waited(world: &mut Issues2PdfWorld, seconds: f64) {
    assert!(
        world.elapsed.as_secs_f64() >= seconds,
        "Waited only {:?}",
        world.elapsed
    );
}

#[given(regex = r#"^issue (\d+) titled "(.*)" with body "(.*)"$"#)]
async fn given_issue_with_body(world: &mut Issues2PdfWorld, number: u64, title: String, body: String) {
    let body = body.replace("\\n", "\n");
    world.issues.push(make_issue(number, &title, Some(body)));
}

#[given(regex = r#"^issue (\d+) titled "(.*)" with (\d+) paragraphs$"#)]
async fn given_issue_with_paragraphs(
    world: &mut Issues2PdfWorld,
    number: u64,
    title: String,
    count: usize,
) {
    let body = (1..=count)
        .map(|i| format!("Paragraph {i}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    world.issues.push(make_issue(number, &title, Some(body)));
}

#[given(regex = r#"^issue (\d+) titled "(.*)" with no body$"#)]
async fn given_issue_without_body(world: &mut Issues2PdfWorld, number: u64, title: String) {
    world.issues.push(make_issue(number, &title, None));
}

#[when("I render the issues")]
async fn when_render(world: &mut Issues2PdfWorld) {
    world.rendered = Some(
        DocumentRenderer::new()
            .render(&world.issues, false)
            .map_err(|e| e.to_string()),
    );
}

#[when("I render the issues without metadata")]
async fn when_render_without_metadata(world: &mut Issues2PdfWorld) {
    world.rendered = Some(
        DocumentRenderer::new()
            .render(&world.issues, true)
            .map_err(|e| e.to_string()),
    );
}

fn page_contains(world: &Issues2PdfWorld, page: usize, text: &str) -> bool {
    let rendered = match world.rendered.as_ref().expect("Nothing was rendered") {
        Ok(rendered) => rendered,
        Err(e) => panic!("Rendering failed: {e}"),
    };
    rendered.document.pages()[page - 1].contains_text(text)
}

#[then(regex = r"^the document has (\d+) pages$")]
async fn then_page_count(world: &mut Issues2PdfWorld, expected: usize) {
    match world.rendered.as_ref().expect("Nothing was rendered") {
        Ok(rendered) => assert_eq!(rendered.page_count(), expected),
        Err(e) => panic!("Rendering failed: {e}"),
    }
}

#[then(regex = r#"^page (\d+) contains "(.*)"$"#)]
async fn then_page_contains(world: &mut Issues2PdfWorld, page: usize, text: String) {
    assert!(page_contains(world, page, &text), "page {page} lacks {text:?}");
}

#[then(regex = r#"^page (\d+) does not contain "(.*)"$"#)]
async fn then_page_lacks(world: &mut Issues2PdfWorld, page: usize, text: String) {
    assert!(!page_contains(world, page, &text), "page {page} has {text:?}");
}

#[then(regex = r#"^rendering fails with "(.*)"$"#)]
async fn then_render_fails(world: &mut Issues2PdfWorld, message: String) {
    match world.rendered.as_ref().expect("Nothing was rendered") {
        Ok(rendered) => panic!("Expected failure, got {} pages", rendered.page_count()),
        Err(e) => assert_eq!(e, &message),
    }
}

#[then(regex = r#"^the PDF output starts with "(.*)"$"#)]
async fn then_pdf_starts_with(world: &mut Issues2PdfWorld, prefix: String) {
    match world.rendered.as_ref().expect("Nothing was rendered") {
        Ok(rendered) => {
            let bytes = rendered.to_pdf().expect("Failed to serialize PDF");
            assert!(bytes.starts_with(prefix.as_bytes()));
        }
        Err(e) => panic!("Rendering failed: {e}"),
    }
}
