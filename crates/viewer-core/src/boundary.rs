//! Collaborators the core talks to: the remote counter, the document source,
//! the rasterizer, the user, and the page labels.
//!
//! Every method takes `&self`; implementations keep their own interior state.
//! Futures are not required to be `Send` because the viewer is single-threaded.

#![allow(async_fn_in_trait)]

use std::rc::Rc;

use crate::error::{CounterError, RenderError};
use crate::protocol::{DesyncPrompt, RemoteStatus, SetPageRequest};

/// Server-held page counter shared by every viewer of a document.
pub trait PageCounter {
    async fn fetch_status(&self, document: &str) -> Result<RemoteStatus, CounterError>;

    async fn set_page(&self, request: &SetPageRequest) -> Result<(), CounterError>;
}

/// Source of the raw document bytes.
pub trait DocumentSource {
    async fn fetch_document(&self, document: &str) -> Result<Vec<u8>, CounterError>;
}

/// Rasterizes one page onto the drawing surface.
pub trait PageRenderer {
    async fn render(&self, page: u32, scale: f32) -> Result<(), RenderError>;
}

/// Answers the "jump to the remote page?" question.
pub trait DecisionProvider {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool;
}

/// Write-only page labels.
pub trait PageDisplay {
    fn show_current_page(&self, page: u32);

    fn show_page_count(&self, page_count: u32);
}

impl<T: PageCounter> PageCounter for Rc<T> {
    async fn fetch_status(&self, document: &str) -> Result<RemoteStatus, CounterError> {
        (**self).fetch_status(document).await
    }

    async fn set_page(&self, request: &SetPageRequest) -> Result<(), CounterError> {
        (**self).set_page(request).await
    }
}

impl<T: DocumentSource> DocumentSource for Rc<T> {
    async fn fetch_document(&self, document: &str) -> Result<Vec<u8>, CounterError> {
        (**self).fetch_document(document).await
    }
}

impl<T: PageRenderer> PageRenderer for Rc<T> {
    async fn render(&self, page: u32, scale: f32) -> Result<(), RenderError> {
        (**self).render(page, scale).await
    }
}

impl<T: DecisionProvider> DecisionProvider for Rc<T> {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool {
        (**self).confirm(prompt).await
    }
}

impl<T: PageDisplay> PageDisplay for Rc<T> {
    fn show_current_page(&self, page: u32) {
        (**self).show_current_page(page)
    }

    fn show_page_count(&self, page_count: u32) {
        (**self).show_page_count(page_count)
    }
}

/// Decision provider with a fixed answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDecision(pub bool);

impl DecisionProvider for FixedDecision {
    async fn confirm(&self, _prompt: &DesyncPrompt) -> bool {
        self.0
    }
}
