use crate::github::fetch::{IssuePageSource, PageFailure, PageRequest, PageResponse};
use crate::github::issues::Issue;
use crate::github::rate_limit::RateLimitInfo;
use reqwest::StatusCode;

/// GitHub API endpoints
pub mod endpoints {
    pub const API_BASE_URL: &str = "https://api.github.com";

    pub fn repo_issues(base_url: &str, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}/issues",
            base_url.trim_end_matches('/'),
            owner,
            repo
        )
    }
}

const USER_AGENT: &str = "issues2pdf";
const ACCEPT: &str = "application/vnd.github.v3+json";

/// Page source backed by the REST issue-listing endpoint.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPageSource {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = anyhow::Context::context(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build(),
            "Failed to create HTTP client",
        )?;
        Ok(HttpPageSource::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        HttpPageSource {
            client,
            base_url: base_url.into(),
        }
    }
}

impl IssuePageSource for HttpPageSource {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<PageResponse, PageFailure> {
        let url = endpoints::repo_issues(&self.base_url, &request.repo.owner, &request.repo.name);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("state", "all".to_string()),
                ("per_page", request.per_page.to_string()),
                ("page", request.page.to_string()),
            ])
            .bearer_auth(request.token)
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .map_err(|e| PageFailure::Api {
                message: format!("Request failed: {e}"),
            })?;

        let status = response.status();
        let rate_limit = RateLimitInfo::from_headers(response.headers());

        if status.is_success() {
            let issues = response
                .json::<Vec<Issue>>()
                .await
                .map_err(|e| PageFailure::Api {
                    message: format!("Failed to parse issues response: {e}"),
                })?;
            return Ok(PageResponse { issues, rate_limit });
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());

        Err(classify_failure(status, rate_limit, message))
    }
}

/// 403 and 429 are treated as throttling; every other status is final.
pub fn classify_failure(status: StatusCode, rate_limit: RateLimitInfo, message: String) -> PageFailure {
    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => PageFailure::RateLimited {
            status: status.as_u16(),
            rate_limit,
            message,
        },
        StatusCode::UNAUTHORIZED => PageFailure::Api {
            message: format!("Token invalid or expired (HTTP {status}: {message})"),
        },
        StatusCode::NOT_FOUND => PageFailure::Api {
            message: format!(
                "Repository not found or not accessible with this token (HTTP {status}: {message})"
            ),
        },
        _ => PageFailure::Api {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::issues::RepoRef;

    #[test]
    fn test_repo_issues_url() {
        assert_eq!(
            endpoints::repo_issues(endpoints::API_BASE_URL, "octocat", "hello"),
            "https://api.github.com/repos/octocat/hello/issues"
        );
        assert_eq!(
            endpoints::repo_issues("http://localhost:8080/", "o", "r"),
            "http://localhost:8080/repos/o/r/issues"
        );
    }

    #[test]
    fn test_classify_throttling_statuses() {
        let info = RateLimitInfo {
            retry_after: Some(60),
            ..Default::default()
        };
        for status in [StatusCode::FORBIDDEN, StatusCode::TOO_MANY_REQUESTS] {
            match classify_failure(status, info, "limited".to_string()) {
                PageFailure::RateLimited {
                    status: code,
                    rate_limit,
                    ..
                } => {
                    assert_eq!(code, status.as_u16());
                    assert_eq!(rate_limit, info);
                }
                other => panic!("unexpected classification: {other:?}"),
            }
        }
    }

    #[test]
    fn test_classify_other_statuses_as_api_errors() {
        let failure = classify_failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            RateLimitInfo::default(),
            "boom".to_string(),
        );
        match failure {
            PageFailure::Api { message } => {
                assert!(message.contains("500"));
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }

    }

    #[test]
    fn test_classify_keeps_server_message() {
        let body = r#"{"message":"Bad credentials"}"#;
        match classify_failure(StatusCode::UNAUTHORIZED, RateLimitInfo::default(), body.to_string()) {
            PageFailure::Api { message } => {
                assert!(message.starts_with("Token invalid or expired"), "{message}");
                assert!(message.contains("401"), "{message}");
                assert!(message.contains("Bad credentials"), "{message}");
            }
            other => panic!("unexpected classification: {other:?}"),
        }

        let body = r#"{"message":"Not Found"}"#;
        match classify_failure(StatusCode::NOT_FOUND, RateLimitInfo::default(), body.to_string()) {
            PageFailure::Api { message } => {
                assert!(message.starts_with("Repository not found"), "{message}");
                assert!(message.contains("Not Found"), "{message}");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    /// Answers one request with `response` and hands back the request head.
    async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8(head).unwrap()
        });
        (base_url, handle)
    }

    fn http_response(status: &str, headers: &[(&str, &str)], body: &str) -> String {
        let mut response = format!("HTTP/1.1 {status}\r\n");
        for (name, value) in headers {
            response.push_str(&format!("{name}: {value}\r\n"));
        }
        response.push_str(&format!(
            "content-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        ));
        response
    }

    fn local_source(base_url: String) -> HttpPageSource {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        HttpPageSource::with_client(client, base_url)
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then_some(value.trim())
        })
    }

    #[tokio::test]
    async fn test_fetch_page_sends_request_and_reads_rate_limit() {
        let (base_url, server) = serve_once(http_response(
            "200 OK",
            &[("x-ratelimit-remaining", "1"), ("x-ratelimit-reset", "123")],
            "[]",
        ))
        .await;
        let source = local_source(base_url);
        let repo: RepoRef = "o/r".parse().unwrap();

        let page = source
            .fetch_page(PageRequest {
                repo: &repo,
                token: "tok",
                page: 3,
                per_page: 100,
            })
            .await
            .unwrap();

        let head = server.await.unwrap();
        assert_eq!(
            head.lines().next(),
            Some("GET /repos/o/r/issues?state=all&per_page=100&page=3 HTTP/1.1")
        );
        assert_eq!(header(&head, "authorization"), Some("Bearer tok"));
        assert_eq!(header(&head, "accept"), Some("application/vnd.github.v3+json"));
        assert_eq!(header(&head, "user-agent"), Some("issues2pdf"));
        assert!(page.issues.is_empty());
        assert_eq!(
            page.rate_limit,
            RateLimitInfo {
                remaining: Some(1),
                reset_at: Some(123),
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_page_classifies_throttled_response() {
        let (base_url, server) = serve_once(http_response(
            "403 Forbidden",
            &[("retry-after", "7"), ("x-ratelimit-remaining", "0")],
            r#"{"message":"You have exceeded a secondary rate limit"}"#,
        ))
        .await;
        let source = local_source(base_url);
        let repo: RepoRef = "o/r".parse().unwrap();

        let failure = source
            .fetch_page(PageRequest {
                repo: &repo,
                token: "tok",
                page: 1,
                per_page: 100,
            })
            .await
            .unwrap_err();
        server.await.unwrap();

        match failure {
            PageFailure::RateLimited {
                status,
                rate_limit,
                message,
            } => {
                assert_eq!(status, 403);
                assert_eq!(rate_limit.retry_after, Some(7));
                assert_eq!(rate_limit.remaining, Some(0));
                assert!(message.contains("secondary rate limit"), "{message}");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_page_parses_issues() {
        let body = r#"[{"id":11,"number":1,"title":"First","body":null,"state":"open",
            "created_at":"2024-01-05T10:00:00Z","updated_at":"2024-01-05T10:00:00Z",
            "user":{"login":"octocat","avatar_url":""},"labels":[]}]"#;
        let (base_url, server) = serve_once(http_response("200 OK", &[], body)).await;
        let source = local_source(base_url);
        let repo: RepoRef = "o/r".parse().unwrap();

        let page = source
            .fetch_page(PageRequest {
                repo: &repo,
                token: "tok",
                page: 1,
                per_page: 100,
            })
            .await
            .unwrap();
        server.await.unwrap();

        assert_eq!(page.issues.len(), 1);
        assert_eq!(page.issues[0].title, "First");
        assert_eq!(page.rate_limit, RateLimitInfo::default());
    }
}
