//! Serialized, coalescing page rendering.
//!
//! At most one rasterization is in flight. Requests that arrive meanwhile
//! overwrite a single pending slot, so a burst of navigation renders only the
//! page requested last once the current render completes.

use tracing::{debug, error, warn};

use crate::boundary::{PageDisplay, PageRenderer};
use crate::error::{RenderError, ViewerError};
use crate::state::SharedViewerState;

/// Result of a single [`RenderScheduler::enqueue`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// This call drove the render chain; `page` is the last page it rendered.
    Rendered { page: u32 },
    /// A render was already running; the page now waits in the pending slot.
    Coalesced { replaced: Option<u32> },
}

pub struct RenderScheduler<R, D> {
    state: SharedViewerState,
    renderer: R,
    display: D,
    scale: f32,
}

impl<R, D> RenderScheduler<R, D>
where
    R: PageRenderer,
    D: PageDisplay,
{
    /// Create a scheduler rendering at a fixed `scale`.
    pub fn new(state: SharedViewerState, renderer: R, display: D, scale: f32) -> Self {
        Self { state, renderer, display, scale }
    }

    pub fn state(&self) -> &SharedViewerState {
        &self.state
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn is_rendering(&self) -> bool {
        self.state.borrow().is_rendering()
    }

    /// Request that `page` be shown.
    ///
    /// The current-page label is updated right away. If nothing is rendering,
    /// this call renders `page` and then every page left in the pending slot
    /// until the slot is empty. Otherwise `page` replaces the pending page and
    /// the call returns immediately.
    ///
    /// A failed render is logged and never leaves the scheduler stuck. The
    /// error is returned only when it hit the last page of the chain.
    pub async fn enqueue(&self, page: u32) -> Result<EnqueueOutcome, ViewerError> {
        {
            let state = self.state.borrow();
            if !state.contains(page) {
                return Err(ViewerError::PageOutOfRange { page, page_count: state.page_count() });
            }
        }

        self.display.show_current_page(page);

        {
            let mut state = self.state.borrow_mut();
            if let Some(rendering) = state.rendering_page() {
                let replaced = state.coalesce(page);
                debug!(page, rendering, ?replaced, "render in progress, page coalesced");
                return Ok(EnqueueOutcome::Coalesced { replaced });
            }

            state.begin_render(page);
        }

        let mut page = page;
        loop {
            debug!(page, scale = self.scale, "rendering page");
            let result = self.renderer.render(page, self.scale).await;

            let next = self.state.borrow_mut().finish_render();

            match (next, result) {
                (Some(next), result) => {
                    if let Err(err) = result {
                        warn!(
                            page,
                            next,
                            error = %err,
                            "render failed, continuing with pending page"
                        );
                    }
                    self.display.show_current_page(next);
                    self.state.borrow_mut().begin_render(next);
                    page = next;
                }
                (None, Ok(())) => return Ok(EnqueueOutcome::Rendered { page }),
                (None, Err(err)) => return Err(self.render_failed(page, err)),
            }
        }
    }

    fn render_failed(&self, page: u32, source: RenderError) -> ViewerError {
        error!(page, error = %source, "render failed");
        ViewerError::Render { page, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ViewerState;
    use crate::test_support::{GatedRenderer, RecordingDisplay};
    use std::rc::Rc;
    use tokio::task::yield_now;

    fn scheduler(
        page_count: u32,
        renderer: Rc<GatedRenderer>,
    ) -> RenderScheduler<Rc<GatedRenderer>, Rc<RecordingDisplay>> {
        let state = ViewerState::new(1, page_count).unwrap().shared();
        RenderScheduler::new(state, renderer, Rc::new(RecordingDisplay::default()), 1.4)
    }

    #[tokio::test]
    async fn idle_enqueue_renders_immediately() {
        let renderer = Rc::new(GatedRenderer::open());
        let scheduler = scheduler(10, renderer.clone());

        let outcome = scheduler.enqueue(3).await.unwrap();

        assert_eq!(outcome, EnqueueOutcome::Rendered { page: 3 });
        assert_eq!(renderer.calls(), vec![(3, 1.4)]);
        assert!(!scheduler.is_rendering());
        assert_eq!(scheduler.display().current_pages(), vec![3]);
    }

    #[tokio::test]
    async fn burst_while_rendering_renders_only_the_latest_page_next() {
        let renderer = Rc::new(GatedRenderer::closed());
        let scheduler = scheduler(10, renderer.clone());

        let driver = scheduler.enqueue(1);
        let burst = async {
            while !scheduler.is_rendering() {
                yield_now().await;
            }

            let second = scheduler.enqueue(2).await.unwrap();
            let third = scheduler.enqueue(3).await.unwrap();
            let fourth = scheduler.enqueue(4).await.unwrap();
            assert_eq!(scheduler.state().borrow().pending_page(), Some(4));

            renderer.release(10);
            (second, third, fourth)
        };

        let (driven, (second, third, fourth)) = tokio::join!(driver, burst);

        assert_eq!(second, EnqueueOutcome::Coalesced { replaced: None });
        assert_eq!(third, EnqueueOutcome::Coalesced { replaced: Some(2) });
        assert_eq!(fourth, EnqueueOutcome::Coalesced { replaced: Some(3) });
        assert_eq!(driven.unwrap(), EnqueueOutcome::Rendered { page: 4 });

        assert_eq!(renderer.pages(), vec![1, 4]);
        assert_eq!(renderer.max_in_flight(), 1);
        assert!(!scheduler.is_rendering());
        assert_eq!(scheduler.state().borrow().pending_page(), None);
    }

    #[tokio::test]
    async fn label_tracks_requested_page_before_render_finishes() {
        let renderer = Rc::new(GatedRenderer::closed());
        let scheduler = scheduler(10, renderer.clone());

        let driver = scheduler.enqueue(5);
        let observer = async {
            while !scheduler.is_rendering() {
                yield_now().await;
            }
            scheduler.enqueue(7).await.unwrap();

            assert_eq!(scheduler.display().current_pages(), vec![5, 7]);
            assert_eq!(renderer.pages(), vec![5]);
            renderer.release(10);
        };

        let (driven, ()) = tokio::join!(driver, observer);
        driven.unwrap();

        assert_eq!(renderer.pages(), vec![5, 7]);
    }

    #[tokio::test]
    async fn re_requesting_the_rendering_page_drops_the_pending_one() {
        let renderer = Rc::new(GatedRenderer::closed());
        let scheduler = scheduler(10, renderer.clone());

        let driver = scheduler.enqueue(2);
        let burst = async {
            while !scheduler.is_rendering() {
                yield_now().await;
            }
            scheduler.enqueue(6).await.unwrap();
            scheduler.enqueue(2).await.unwrap();
            renderer.release(10);
        };

        let (driven, ()) = tokio::join!(driver, burst);

        assert_eq!(driven.unwrap(), EnqueueOutcome::Rendered { page: 2 });
        assert_eq!(renderer.pages(), vec![2]);
    }

    #[tokio::test]
    async fn out_of_range_page_is_rejected_without_rendering() {
        let renderer = Rc::new(GatedRenderer::open());
        let scheduler = scheduler(4, renderer.clone());

        let err = scheduler.enqueue(5).await.expect_err("page 5 is past the end");
        assert!(matches!(err, ViewerError::PageOutOfRange { page: 5, page_count: 4 }));

        let err = scheduler.enqueue(0).await.expect_err("pages are 1-based");
        assert!(matches!(err, ViewerError::PageOutOfRange { page: 0, .. }));

        assert!(renderer.calls().is_empty());
        assert!(scheduler.display().current_pages().is_empty());
    }

    #[tokio::test]
    async fn render_failure_resets_the_scheduler() {
        let renderer = Rc::new(GatedRenderer::open());
        renderer.fail_on(3);
        let scheduler = scheduler(10, renderer.clone());

        let err = scheduler.enqueue(3).await.expect_err("render of 3 fails");
        assert!(matches!(err, ViewerError::Render { page: 3, .. }));
        assert!(!scheduler.is_rendering());

        let outcome = scheduler.enqueue(4).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Rendered { page: 4 });
        assert_eq!(renderer.pages(), vec![3, 4]);
    }

    #[tokio::test]
    async fn failed_intermediate_render_still_renders_pending_page() {
        let renderer = Rc::new(GatedRenderer::closed());
        renderer.fail_on(1);
        let scheduler = scheduler(10, renderer.clone());

        let driver = scheduler.enqueue(1);
        let burst = async {
            while !scheduler.is_rendering() {
                yield_now().await;
            }
            scheduler.enqueue(8).await.unwrap();
            renderer.release(10);
        };

        let (driven, ()) = tokio::join!(driver, burst);

        assert_eq!(driven.unwrap(), EnqueueOutcome::Rendered { page: 8 });
        assert_eq!(renderer.pages(), vec![1, 8]);
    }
}
