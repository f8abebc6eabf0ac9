//! Read-reconcile-write navigation against the shared page counter.

use std::cell::Cell;
use std::fmt;

use tracing::{debug, info, warn};

use crate::boundary::{DecisionProvider, PageCounter, PageDisplay, PageRenderer};
use crate::error::ViewerError;
use crate::protocol::{DesyncPrompt, RemoteStatus, SetPageRequest};
use crate::scheduler::{EnqueueOutcome, RenderScheduler};
use crate::state::{NavigationIntent, SharedViewerState};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    #[default]
    Idle,
    FetchingStatus,
    Error,
    Reconciling,
    ComputingNewPage,
    Persisting,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingStatus => "fetching-status",
            Self::Error => "error",
            Self::Reconciling => "reconciling",
            Self::ComputingNewPage => "computing-new-page",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The step would leave the document; nothing was fetched or written.
    AtBoundary,
    Moved {
        page: u32,
        /// The user accepted the remote page, which replaced the step.
        jumped: bool,
        /// The counter write succeeded.
        persisted: bool,
        render: EnqueueOutcome,
    },
}

/// Page to open a document at, given what the server currently holds.
///
/// Falls back to the first page when the counter is unknown and clamps a
/// counter that points past the end.
pub fn resume_page(status: &RemoteStatus, page_count: u32) -> u32 {
    status.page().map_or(1, |page| page.clamp(1, page_count.max(1)))
}

pub struct PageSyncController<C, P, R, D> {
    state: SharedViewerState,
    document: String,
    token: String,
    counter: C,
    decider: P,
    scheduler: RenderScheduler<R, D>,
    phase: Cell<SyncPhase>,
}

impl<C, P, R, D> PageSyncController<C, P, R, D>
where
    C: PageCounter,
    P: DecisionProvider,
    R: PageRenderer,
    D: PageDisplay,
{
    /// The controller shares the scheduler's state handle.
    pub fn new(
        document: impl Into<String>,
        token: impl Into<String>,
        counter: C,
        decider: P,
        scheduler: RenderScheduler<R, D>,
    ) -> Self {
        Self {
            state: scheduler.state().clone(),
            document: document.into(),
            token: token.into(),
            counter,
            decider,
            scheduler,
            phase: Cell::new(SyncPhase::Idle),
        }
    }

    pub fn local_page(&self) -> u32 {
        self.state.borrow().local_page()
    }

    /// Most recently entered phase across all in-flight navigations.
    pub fn phase(&self) -> SyncPhase {
        self.phase.get()
    }

    pub fn scheduler(&self) -> &RenderScheduler<R, D> {
        &self.scheduler
    }

    /// Show the page count and render the current page.
    pub async fn start(&self) -> Result<EnqueueOutcome, ViewerError> {
        let (page, page_count) = {
            let state = self.state.borrow();
            (state.local_page(), state.page_count())
        };

        self.scheduler.display().show_page_count(page_count);
        info!(document = %self.document, page, page_count, "showing document");
        self.scheduler.enqueue(page).await
    }

    /// Move one page in `direction` after reconciling with the server counter.
    pub async fn request_advance(
        &self,
        direction: NavigationIntent,
    ) -> Result<AdvanceOutcome, ViewerError> {
        let (local, page_count) = {
            let state = self.state.borrow();
            (state.local_page(), state.page_count())
        };

        if direction.step(local, page_count).is_none() {
            debug!(%direction, local, page_count, "already at document boundary");
            return Ok(AdvanceOutcome::AtBoundary);
        }

        self.enter(SyncPhase::FetchingStatus);
        let status = match self.counter.fetch_status(&self.document).await {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    document = %self.document,
                    error = %err,
                    "status fetch failed, navigation aborted"
                );
                self.abort();
                return Err(err.into());
            }
        };

        let Some(remote) = status.page().filter(|page| *page <= page_count) else {
            warn!(
                document = %self.document,
                %status,
                "remote counter unusable, navigation aborted"
            );
            self.abort();
            return Err(ViewerError::InvalidRemoteCounter { raw: raw_status(&status) });
        };

        let local = self.state.borrow().local_page();
        let jumped = if remote != local {
            self.enter(SyncPhase::Reconciling);
            let prompt = DesyncPrompt { local_page: local, remote_page: remote };
            let accepted = self.decider.confirm(&prompt).await;
            info!(local, remote, accepted, "desync resolved");
            accepted
        } else {
            false
        };

        self.enter(SyncPhase::ComputingNewPage);
        let new_page = if jumped {
            remote
        } else {
            let current = self.state.borrow().local_page();
            match direction.step(current, page_count) {
                Some(page) => page,
                None => {
                    debug!(%direction, current, "boundary reached by a concurrent navigation");
                    self.enter(SyncPhase::Idle);
                    return Ok(AdvanceOutcome::AtBoundary);
                }
            }
        };
        self.state.borrow_mut().set_local_page(new_page);

        self.enter(SyncPhase::Persisting);
        let request = SetPageRequest {
            token: self.token.clone(),
            pdf_name: self.document.clone(),
            new_page,
        };
        let persist = async {
            match self.counter.set_page(&request).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(
                        document = %self.document,
                        page = new_page,
                        error = %err,
                        "failed to persist page"
                    );
                    false
                }
            }
        };
        let (persisted, render) = tokio::join!(persist, self.scheduler.enqueue(new_page));
        self.enter(SyncPhase::Idle);

        let render = render?;
        info!(document = %self.document, page = new_page, jumped, persisted, "navigation complete");
        Ok(AdvanceOutcome::Moved { page: new_page, jumped, persisted, render })
    }

    fn enter(&self, phase: SyncPhase) {
        debug!(from = %self.phase.get(), to = %phase, "sync phase");
        self.phase.set(phase);
    }

    fn abort(&self) {
        self.enter(SyncPhase::Error);
        self.enter(SyncPhase::Idle);
    }
}

fn raw_status(status: &RemoteStatus) -> String {
    match status {
        RemoteStatus::Page(page) => page.to_string(),
        RemoteStatus::Unknown { raw } => raw.clone(),
    }
}
