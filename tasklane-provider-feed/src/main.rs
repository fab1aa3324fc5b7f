//! tasklane-provider-feed - serves items from a local JSON feed file
//!
//! This binary implements the tasklane provider protocol, reading one JSON request per
//! line on stdin and answering on stdout. Connect it with:
//!
//! ```toml
//! [[connection]]
//! provider = "jira"
//! command = "tasklane-provider-feed"
//! feed = "~/feeds/jira.json"
//! page_size = 25
//! ```

mod feed;

use std::io::{self, BufRead, Write};

use serde::Deserialize;
use tasklane_core::remote::protocol::{Command, Request, Response};
use tasklane_core::{AdapterError, ErrorKind};

#[derive(Debug, Deserialize)]
struct FetchPageParams {
    feed: String,
    #[serde(default)]
    page_size: Option<usize>,
    #[serde(default)]
    cursor: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(request),
            Err(e) => Response::error(&format!("Failed to parse request: {}", e), ErrorKind::Unknown),
        }?;

        writeln!(stdout, "{}", response)?;
        stdout.flush()?;
    }

    Ok(())
}

fn handle_request(request: Request) -> serde_json::Result<String> {
    match request.command {
        Command::FetchPage => handle_fetch_page(request.params),
    }
}

fn handle_fetch_page(params: serde_json::Value) -> serde_json::Result<String> {
    let params: FetchPageParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return Response::error(&format!("Invalid params: {}", e), ErrorKind::Unknown),
    };

    let page = feed::Feed::load(&feed::expand_home(&params.feed)).and_then(|feed| {
        let page_size = params.page_size.unwrap_or(feed::DEFAULT_PAGE_SIZE);
        feed.page(params.cursor.as_deref(), page_size)
    });

    match page {
        Ok(page) => Response::success(page),
        Err(AdapterError { kind, message }) => Response::error(&message, kind),
    }
}
