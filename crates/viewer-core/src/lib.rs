//! Page synchronization core for the shared document viewer.
//!
//! Two components share one [`ViewerState`]:
//!
//! - [`RenderScheduler`] keeps at most one rasterization in flight and
//!   coalesces requests that arrive meanwhile into the latest page.
//! - [`PageSyncController`] reconciles the local page with the server-held
//!   counter before every step, asking the user when the two disagree, then
//!   persists the new page and hands it to the scheduler.
//!
//! Everything runs on one thread; collaborators are plugged in through the
//! traits in [`boundary`].
//!
//! # Example
//!
//! ```ignore
//! let state = ViewerState::new(1, page_count)?.shared();
//! let scheduler = RenderScheduler::new(state, renderer, display, DeviceClass::Desktop.scale());
//! let controller = PageSyncController::new("book", "", counter, decider, scheduler);
//!
//! controller.start().await?;
//! controller.request_advance(NavigationIntent::Next).await?;
//! ```

pub mod boundary;
mod error;
mod protocol;
mod scheduler;
mod state;
mod surface;
mod sync;

#[cfg(test)]
mod test_support;

pub use boundary::{
    DecisionProvider, DocumentSource, FixedDecision, PageCounter, PageDisplay, PageRenderer,
};
pub use error::{CounterError, RenderError, ViewerError};
pub use protocol::{DesyncPrompt, RemoteStatus, SetPageRequest, SENTINEL_ERROR};
pub use scheduler::{EnqueueOutcome, RenderScheduler};
pub use state::{NavigationIntent, SharedViewerState, ViewerState};
pub use surface::DeviceClass;
pub use sync::{resume_page, AdvanceOutcome, PageSyncController, SyncPhase};
