use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tokio::sync::oneshot;
use tracing::debug;
use viewer_core::{DecisionProvider, DesyncPrompt, FixedDecision};

use crate::input::is_affirmative;

/// Asks on stdout and takes the answer from the next input line.
///
/// The input loop hands every line to [`PromptDecider::answer`] first; a
/// line only reaches navigation when no question is open.
#[derive(Debug, Default)]
pub struct PromptDecider {
    waiting: RefCell<VecDeque<oneshot::Sender<bool>>>,
    closed: Cell<bool>,
}

impl PromptDecider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_waiting(&self) -> bool {
        !self.waiting.borrow().is_empty()
    }

    /// Resolves the oldest open question with `line`. Returns `false` when
    /// nothing was asked.
    pub fn answer(&self, line: &str) -> bool {
        let Some(reply) = self.waiting.borrow_mut().pop_front() else {
            return false;
        };

        // The asking task may already be gone.
        let _ = reply.send(is_affirmative(line));
        true
    }

    /// Declines everything open now and everything asked later.
    pub fn close(&self) {
        self.closed.set(true);
        for reply in self.waiting.borrow_mut().drain(..) {
            let _ = reply.send(false);
        }
    }
}

impl DecisionProvider for PromptDecider {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool {
        if self.closed.get() {
            debug!("input closed, declining jump");
            return false;
        }

        let (reply, answer) = oneshot::channel();
        self.waiting.borrow_mut().push_back(reply);
        println!("{prompt} [y/N]");

        answer.await.unwrap_or(false)
    }
}

/// How the `view` session settles a local/remote disagreement.
#[derive(Debug, Clone)]
pub enum Decider {
    Ask(Rc<PromptDecider>),
    Always(FixedDecision),
}

impl Decider {
    pub fn prompt(&self) -> Option<&Rc<PromptDecider>> {
        match self {
            Self::Ask(prompt) => Some(prompt),
            Self::Always(_) => None,
        }
    }
}

impl DecisionProvider for Decider {
    async fn confirm(&self, prompt: &DesyncPrompt) -> bool {
        match self {
            Self::Ask(asker) => asker.confirm(prompt).await,
            Self::Always(fixed) => {
                let accepted = fixed.confirm(prompt).await;
                println!("{prompt} {}", if accepted { "jumping" } else { "staying" });
                accepted
            }
        }
    }
}
