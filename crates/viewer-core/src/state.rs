use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::ViewerError;

/// Shared handle to the state of one viewer instance.
///
/// The viewer runs on a single thread, so the handle is an `Rc<RefCell<_>>`.
/// Borrows are never held across an `.await`.
pub type SharedViewerState = Rc<RefCell<ViewerState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationIntent {
    Prev,
    Next,
}

impl NavigationIntent {
    /// Applies one step to `page`, or `None` when the step leaves `[1, page_count]`.
    pub fn step(self, page: u32, page_count: u32) -> Option<u32> {
        match self {
            Self::Prev if page > 1 => Some(page - 1),
            Self::Next if page < page_count => Some(page + 1),
            _ => None,
        }
    }
}

impl fmt::Display for NavigationIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prev => write!(f, "prev"),
            Self::Next => write!(f, "next"),
        }
    }
}

/// Page bookkeeping for one displayed document.
///
/// Fields are private: the page pointer is moved by `PageSyncController`
/// and the render slots by `RenderScheduler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    local_page: u32,
    page_count: u32,
    rendering: Option<u32>,
    pending_page: Option<u32>,
}

impl ViewerState {
    pub fn new(local_page: u32, page_count: u32) -> Result<Self, ViewerError> {
        if page_count == 0 || local_page == 0 || local_page > page_count {
            return Err(ViewerError::InvalidInitialState { local_page, page_count });
        }

        Ok(Self { local_page, page_count, rendering: None, pending_page: None })
    }

    pub fn shared(self) -> SharedViewerState {
        Rc::new(RefCell::new(self))
    }

    pub fn local_page(&self) -> u32 {
        self.local_page
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn is_rendering(&self) -> bool {
        self.rendering.is_some()
    }

    /// Page whose rasterization is currently in flight.
    pub fn rendering_page(&self) -> Option<u32> {
        self.rendering
    }

    pub fn pending_page(&self) -> Option<u32> {
        self.pending_page
    }

    pub fn contains(&self, page: u32) -> bool {
        (1..=self.page_count).contains(&page)
    }

    pub(crate) fn set_local_page(&mut self, page: u32) {
        debug_assert!(self.contains(page));
        self.local_page = page;
    }

    pub(crate) fn begin_render(&mut self, page: u32) {
        self.rendering = Some(page);
    }

    /// Records `page` as the next render while one is in flight.
    ///
    /// Returns the pending page that was replaced. Requesting the page that is
    /// already being rendered clears the slot instead.
    pub(crate) fn coalesce(&mut self, page: u32) -> Option<u32> {
        if self.rendering == Some(page) {
            self.pending_page.take()
        } else {
            self.pending_page.replace(page)
        }
    }

    /// Ends the in-flight render and hands back the pending page, if any.
    pub(crate) fn finish_render(&mut self) -> Option<u32> {
        self.rendering = None;
        self.pending_page.take()
    }
}
