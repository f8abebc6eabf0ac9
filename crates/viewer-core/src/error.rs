#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server answered with HTTP status {status}")]
    Http { status: u16 },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct RenderError(pub String);

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("invalid initial state: page {local_page} of {page_count}")]
    InvalidInitialState { local_page: u32, page_count: u32 },
    #[error("remote page counter unavailable: {0}")]
    Counter(#[from] CounterError),
    #[error("remote page counter holds no usable page ({raw})")]
    InvalidRemoteCounter { raw: String },
    #[error("failed to render page {page}")]
    Render {
        page: u32,
        #[source]
        source: RenderError,
    },
}
