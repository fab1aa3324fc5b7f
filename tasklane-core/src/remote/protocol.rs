//! Defines the JSON protocol used for communication between tasklane
//! and provider binaries over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::ErrorKind;
use crate::provider::Page;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    FetchPage,
}

/// Request sent from tasklane to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider back to tasklane.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        #[serde(default)]
        kind: ErrorKind,
    },
}

impl<T: Serialize> Response<T> {
    pub fn success(data: T) -> serde_json::Result<String> {
        serde_json::to_string(&Response::Success { data })
    }
}

impl Response<()> {
    pub fn error(msg: &str, kind: ErrorKind) -> serde_json::Result<String> {
        serde_json::to_string(&Response::<()>::Error {
            error: msg.to_string(),
            kind,
        })
    }
}

/// Fetch one page of the provider's item listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchPage {
    /// Connection parameters (feed path, account, project key, ...)
    #[serde(flatten)]
    pub connection: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl ProviderCommand for FetchPage {
    type Response = Page;
    fn command() -> Command {
        Command::FetchPage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_carries_kind() {
        let json = Response::error("quota exceeded", ErrorKind::RateLimited).unwrap();
        let parsed: Response<Page> = serde_json::from_str(&json).unwrap();
        match parsed {
            Response::Error { error, kind } => {
                assert_eq!(error, "quota exceeded");
                assert_eq!(kind, ErrorKind::RateLimited);
            }
            Response::Success { .. } => panic!("expected error response"),
        }
    }

    #[test]
    fn error_kind_defaults_to_unknown() {
        let parsed: Response<Page> =
            serde_json::from_str(r#"{"status":"error","error":"boom"}"#).unwrap();
        assert!(matches!(parsed, Response::Error { kind: ErrorKind::Unknown, .. }));
    }

    #[test]
    fn fetch_page_flattens_connection_params() {
        let mut connection = serde_json::Map::new();
        connection.insert("feed".into(), serde_json::json!("/tmp/jira.json"));
        let cmd = FetchPage {
            connection,
            cursor: Some("page:50".into()),
        };
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(value["feed"], "/tmp/jira.json");
        assert_eq!(value["cursor"], "page:50");
    }
}
