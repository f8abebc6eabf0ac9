use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use tokio::sync::Semaphore;

use crate::boundary::{DecisionProvider, PageCounter, PageDisplay, PageRenderer};
use crate::error::{CounterError, RenderError};
use crate::protocol::{DesyncPrompt, RemoteStatus, SetPageRequest};

/// Renderer whose calls block until the test hands out permits.
pub struct GatedRenderer {
    gate: Semaphore,
    calls: RefCell<Vec<(u32, f32)>>,
    failing: RefCell<HashSet<u32>>,
    in_flight: Cell<u32>,
    max_in_flight: Cell<u32>,
}

impl GatedRenderer {
    pub fn open() -> Self {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    pub fn closed() -> Self {
        Self::with_permits(0)
    }

    fn with_permits(permits: usize) -> Self {
        Self {
            gate: Semaphore::new(permits),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(HashSet::new()),
            in_flight: Cell::new(0),
            max_in_flight: Cell::new(0),
        }
    }

    pub fn release(&self, renders: usize) {
        self.gate.add_permits(renders);
    }

    pub fn fail_on(&self, page: u32) {
        self.failing.borrow_mut().insert(page);
    }

    pub fn calls(&self) -> Vec<(u32, f32)> {
        self.calls.borrow().clone()
    }

    pub fn pages(&self) -> Vec<u32> {
        self.calls.borrow().iter().map(|(page, _)| *page).collect()
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.get()
    }
}

impl PageRenderer for GatedRenderer {
    async fn render(&self, page: u32, scale: f32) -> Result<(), RenderError> {
        self.calls.borrow_mut().push((page, scale));
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight.set(self.max_in_flight.get().max(self.in_flight.get()));

        self.gate.acquire().await.expect("gate is never closed").forget();

        self.in_flight.set(self.in_flight.get() - 1);
        if self.failing.borrow().contains(&page) {
            return Err(RenderError::new(format!("engine rejected page {page}")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDisplay {
    current: RefCell<Vec<u32>>,
    counts: RefCell<Vec<u32>>,
}

impl RecordingDisplay {
    pub fn current_pages(&self) -> Vec<u32> {
        self.current.borrow().clone()
    }

    pub fn page_counts(&self) -> Vec<u32> {
        self.counts.borrow().clone()
    }
}

impl PageDisplay for RecordingDisplay {
    fn show_current_page(&self, page: u32) {
        self.current.borrow_mut().push(page);
    }

    fn show_page_count(&self, page_count: u32) {
        self.counts.borrow_mut().push(page_count);
    }
}

/// Counter answering status reads from a script and recording writes.
#[derive(Default)]
pub struct ScriptedCounter {
    statuses: RefCell<VecDeque<Result<RemoteStatus, CounterError>>>,
    fetches: Cell<u32>,
    writes: RefCell<Vec<SetPageRequest>>,
    finished_writes: Cell<u32>,
    failing_writes: Cell<bool>,
    write_gate: Option<Semaphore>,
}

impl ScriptedCounter {
    pub fn answering(
        statuses: impl IntoIterator<Item = Result<RemoteStatus, CounterError>>,
    ) -> Self {
        Self { statuses: RefCell::new(statuses.into_iter().collect()), ..Self::default() }
    }

    pub fn at(page: u32) -> Self {
        Self::answering([Ok(RemoteStatus::Page(page))])
    }

    /// Writes stay in flight until [`ScriptedCounter::release_writes`].
    pub fn holding_writes(mut self) -> Self {
        self.write_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_writes(&self, writes: usize) {
        if let Some(gate) = &self.write_gate {
            gate.add_permits(writes);
        }
    }

    /// Writes issued but not yet answered.
    pub fn writes_in_flight(&self) -> u32 {
        self.writes.borrow().len() as u32 - self.finished_writes.get()
    }

    pub fn fail_writes(&self) {
        self.failing_writes.set(true);
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.get()
    }

    pub fn writes(&self) -> Vec<SetPageRequest> {
        self.writes.borrow().clone()
    }

    pub fn written_pages(&self) -> Vec<u32> {
        self.writes.borrow().iter().map(|request| request.new_page).collect()
    }
}

impl PageCounter for ScriptedCounter {
    async fn fetch_status(&self, _document: &str) -> Result<RemoteStatus, CounterError> {
        self.fetches.set(self.fetches.get() + 1);
        self.statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(CounterError::Network("script exhausted".to_owned())))
    }

    async fn set_page(&self, request: &SetPageRequest) -> Result<(), CounterError> {
        self.writes.borrow_mut().push(request.clone());
        if let Some(gate) = &self.write_gate {
            gate.acquire().await.expect("gate is never closed").forget();
        }
        self.finished_writes.set(self.finished_writes.get() + 1);

        if self.failing_writes.get() {
            return Err(CounterError::Http { status: 500 });
        }
        Ok(())
    }
}

/// Decision provider with a fixed answer that remembers what it was asked.
pub struct RecordingDecision {
    answer: bool,
    prompts: RefCell<Vec<DesyncPrompt>>,
}

impl RecordingDecision {
    pub fn answering(answer: bool) -> Self {
        Self { answer, prompts: RefCell::new(Vec::new()) }
    }

    pub fn prompts(&self) -> Vec<DesyncPrompt> {
        self.prompts.borrow().clone()
    }
}

impl DecisionProvider for RecordingDecision {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool {
        self.prompts.borrow_mut().push(*prompt);
        self.answer
    }
}

/// Decision provider that holds every question until [`GatedDecision::release`].
pub struct GatedDecision {
    answer: bool,
    gate: Semaphore,
    prompts: RefCell<Vec<DesyncPrompt>>,
}

impl GatedDecision {
    pub fn answering(answer: bool) -> Self {
        Self { answer, gate: Semaphore::new(0), prompts: RefCell::new(Vec::new()) }
    }

    pub fn release(&self) {
        self.gate.add_permits(1);
    }

    pub fn prompts(&self) -> Vec<DesyncPrompt> {
        self.prompts.borrow().clone()
    }
}

impl DecisionProvider for GatedDecision {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool {
        self.prompts.borrow_mut().push(*prompt);
        self.gate.acquire().await.expect("gate is never closed").forget();
        self.answer
    }
}
