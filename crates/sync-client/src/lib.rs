//! HTTP access to the shared page counter and the document bytes.
//!
//! Requests are blocking `ureq` calls. The async trait implementations move
//! them onto tokio's blocking pool so the viewer's event loop keeps running
//! while a request is in flight.

use std::io::Read;
use std::time::Duration;

use tracing::debug;
use url::Url;
use viewer_core::{CounterError, DocumentSource, PageCounter, RemoteStatus, SetPageRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_DOCUMENT_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid server URL '{url}': {reason}")]
pub struct InvalidServerUrl {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct HttpPageCounter {
    base: Url,
    agent: ureq::Agent,
    max_document_bytes: u64,
}

impl HttpPageCounter {
    pub fn new(base_url: &str) -> Result<Self, InvalidServerUrl> {
        let invalid = |reason: String| InvalidServerUrl { url: base_url.to_owned(), reason };

        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot have path segments".to_owned()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .user_agent(concat!("pagesync/", env!("CARGO_PKG_VERSION")))
            .build();

        Ok(Self { base, agent, max_document_bytes: MAX_DOCUMENT_BYTES })
    }

    /// Downloads larger than `bytes` fail instead of being cut short.
    pub fn with_document_limit(mut self, bytes: u64) -> Self {
        self.max_document_bytes = bytes;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn status_url(&self, document: &str) -> String {
        self.route(&["status", document])
    }

    pub fn set_page_url(&self, document: &str) -> String {
        self.route(&["view", document, "set_page"])
    }

    pub fn document_url(&self, document: &str) -> String {
        self.route(&["get_pdf", document])
    }

    /// Appends `segments` to the base path, percent-encoding each one.
    fn route(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.into()
    }

    pub fn fetch_status_blocking(&self, document: &str) -> Result<RemoteStatus, CounterError> {
        let url = self.status_url(document);
        debug!(%url, "fetching page status");

        let body = self
            .agent
            .get(&url)
            .set("Accept", "application/json")
            .call()
            .map_err(map_error)?
            .into_string()
            .map_err(|e| CounterError::InvalidResponse(e.to_string()))?;

        Ok(RemoteStatus::parse(&body))
    }

    /// Writes the counter. The response body is ignored.
    pub fn set_page_blocking(&self, request: &SetPageRequest) -> Result<(), CounterError> {
        let url = self.set_page_url(&request.pdf_name);
        debug!(%url, page = request.new_page, "persisting page");

        let body = serde_json::to_string(request)
            .map_err(|e| CounterError::InvalidResponse(e.to_string()))?;

        self.agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body)
            .map_err(map_error)?;

        Ok(())
    }

    pub fn fetch_document_blocking(&self, document: &str) -> Result<Vec<u8>, CounterError> {
        let url = self.document_url(document);
        debug!(%url, "downloading document");

        let response = self.agent.get(&url).call().map_err(map_error)?;

        let limit = self.max_document_bytes;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| CounterError::Network(e.to_string()))?;

        if bytes.len() as u64 > limit {
            return Err(CounterError::InvalidResponse(format!(
                "document exceeds {limit} bytes at {url}"
            )));
        }
        if bytes.is_empty() {
            return Err(CounterError::InvalidResponse(format!("empty document body from {url}")));
        }

        Ok(bytes)
    }
}

impl PageCounter for HttpPageCounter {
    async fn fetch_status(&self, document: &str) -> Result<RemoteStatus, CounterError> {
        let client = self.clone();
        let document = document.to_owned();
        run_blocking(move || client.fetch_status_blocking(&document)).await
    }

    async fn set_page(&self, request: &SetPageRequest) -> Result<(), CounterError> {
        let client = self.clone();
        let request = request.clone();
        run_blocking(move || client.set_page_blocking(&request)).await
    }
}

impl DocumentSource for HttpPageCounter {
    async fn fetch_document(&self, document: &str) -> Result<Vec<u8>, CounterError> {
        let client = self.clone();
        let document = document.to_owned();
        run_blocking(move || client.fetch_document_blocking(&document)).await
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, CounterError>
where
    F: FnOnce() -> Result<T, CounterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CounterError::Network(format!("request task failed: {e}")))?
}

fn map_error(err: ureq::Error) -> CounterError {
    match err {
        ureq::Error::Status(status, _) => CounterError::Http { status },
        ureq::Error::Transport(transport) => CounterError::Network(transport.to_string()),
    }
}
