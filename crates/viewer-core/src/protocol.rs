//! Wire schemas of the page counter endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value the status endpoint reports when it knows no page for a document.
pub const SENTINEL_ERROR: i64 = -1;

/// Decoded body of `GET /status/{document}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    Page(u32),
    /// The sentinel, a non-numeric body, or a number that cannot be a page.
    Unknown { raw: String },
}

impl RemoteStatus {
    /// Decodes a status body.
    ///
    /// Accepts a JSON integer or a JSON string holding one. Anything else,
    /// including [`SENTINEL_ERROR`], is `Unknown`.
    pub fn parse(body: &str) -> Self {
        let raw = body.trim();
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Number(number)) => number.as_i64(),
            Ok(Value::String(text)) => text.trim().parse::<i64>().ok(),
            _ => None,
        };

        match value.filter(|v| *v != SENTINEL_ERROR).and_then(|v| u32::try_from(v).ok()) {
            Some(page) if page >= 1 => Self::Page(page),
            _ => Self::Unknown { raw: raw.to_owned() },
        }
    }

    pub fn page(&self) -> Option<u32> {
        match self {
            Self::Page(page) => Some(*page),
            Self::Unknown { .. } => None,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(page) => write!(f, "{page}"),
            Self::Unknown { raw } => write!(f, "unknown ({raw})"),
        }
    }
}

/// Body of `POST /view/{document}/set_page`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPageRequest {
    pub token: String,
    pub pdf_name: String,
    pub new_page: u32,
}

/// Question put to the user when the server counter moved under us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesyncPrompt {
    pub local_page: u32,
    pub remote_page: u32,
}

impl fmt::Display for DesyncPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Desynced! Jump to the page stored remotely? \
             (local is at page {}, server is at page {})",
            self.local_page, self.remote_page
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_bodies() {
        assert_eq!(RemoteStatus::parse("7"), RemoteStatus::Page(7));
        assert_eq!(RemoteStatus::parse(" 12\n"), RemoteStatus::Page(12));
        assert_eq!(RemoteStatus::parse("\"3\""), RemoteStatus::Page(3));
    }

    #[test]
    fn sentinel_and_garbage_are_unknown() {
        for body in ["-1", "", "abc", "null", "2.5", "0", "-4", "99999999999", "[1]"] {
            assert!(
                matches!(RemoteStatus::parse(body), RemoteStatus::Unknown { .. }),
                "{body:?} should be unknown"
            );
        }
    }

    #[test]
    fn set_page_body_matches_endpoint_schema() {
        let request =
            SetPageRequest { token: String::new(), pdf_name: "book".to_owned(), new_page: 6 };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({ "token": "", "pdf_name": "book", "new_page": 6 }));
    }

    #[test]
    fn prompt_shows_both_pages() {
        let text = DesyncPrompt { local_page: 5, remote_page: 7 }.to_string();
        assert!(text.contains("local is at page 5"));
        assert!(text.contains("server is at page 7"));
    }
}
