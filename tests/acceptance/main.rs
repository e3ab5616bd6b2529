use cucumber::World;
use issues2pdf::github::issues::Issue;
use issues2pdf::render::RenderedDocument;
use std::time::Duration;

/// One scripted reply of the in-memory page source.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Page {
        count: usize,
        remaining: Option<u64>,
        reset_in_secs: Option<i64>,
    },
    Throttled {
        retry_after: u64,
    },
}

#[derive(Debug, Default, World)]
pub struct Issues2PdfWorld {
    pub script: Vec<ScriptedReply>,
    pub requested_pages: Vec<u32>,
    pub fetch_result: Option<Result<Vec<Issue>, String>>,
    pub elapsed: Duration,
    pub issues: Vec<Issue>,
    pub rendered: Option<Result<RenderedDocument, String>>,
}

#[tokio::main]
async fn main() {
    Issues2PdfWorld::run("features").await;
}

mod steps;
