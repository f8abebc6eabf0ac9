//! The interactive `view` session: download, open, render, navigate.

use std::io::BufRead;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use pdf_engine::{default_engine, PdfEngine};
use sync_client::HttpPageCounter;
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info, warn};
use viewer_core::{
    resume_page, AdvanceOutcome, DeviceClass, DocumentSource, FixedDecision, NavigationIntent,
    PageCounter, PageSyncController, RenderScheduler, ViewerError, ViewerState,
};

use crate::canvas::{PngCanvas, TerminalDisplay};
use crate::input::{parse_line, Input};
use crate::prompt::{Decider, PromptDecider};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DesyncPolicy {
    /// Ask on the terminal each time.
    #[default]
    Ask,
    /// Always take the server's page.
    Jump,
    /// Always keep the local page.
    Stay,
}

impl DesyncPolicy {
    fn decider(self) -> Decider {
        match self {
            Self::Ask => Decider::Ask(Rc::new(PromptDecider::new())),
            Self::Jump => Decider::Always(FixedDecision(true)),
            Self::Stay => Decider::Always(FixedDecision(false)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub document: String,
    pub server: String,
    pub token: String,
    pub device: DeviceClass,
    pub canvas: PathBuf,
    /// Opens here instead of at the server's page.
    pub page: Option<u32>,
    pub on_desync: DesyncPolicy,
}

pub fn run_view(options: ViewOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    LocalSet::new().block_on(&runtime, view_session(options))
}

async fn view_session(options: ViewOptions) -> Result<()> {
    let client = HttpPageCounter::new(&options.server)?;

    let bytes = client
        .fetch_document(&options.document)
        .await
        .with_context(|| format!("failed to download document '{}'", options.document))?;

    let mut engine = default_engine();
    let handle = engine.open(bytes).context("failed to open document")?;
    let page_count = engine.page_count(handle)?;
    info!(document = %options.document, page_count, "document loaded");

    let initial_page = match options.page {
        Some(page) if (1..=page_count).contains(&page) => page,
        Some(page) => anyhow::bail!("--page {page} is outside 1..={page_count}"),
        None => match client.fetch_status(&options.document).await {
            Ok(status) => resume_page(&status, page_count),
            Err(err) => {
                warn!(error = %err, "page status unavailable, opening at the first page");
                1
            }
        },
    };

    let state = ViewerState::new(initial_page, page_count)?.shared();
    let canvas = PngCanvas::new(Arc::new(engine), handle, options.device, &options.canvas);
    let scheduler =
        RenderScheduler::new(state, canvas, TerminalDisplay::new(), options.device.scale());

    let decider = options.on_desync.decider();
    let prompt = decider.prompt().cloned();
    let controller = Rc::new(PageSyncController::new(
        options.document.clone(),
        options.token.clone(),
        client,
        decider,
        scheduler,
    ));

    println!("rendering to {}", options.canvas.display());
    if let Err(err) = controller.start().await {
        warn!(error = %err, "initial render failed");
    }

    let mut lines = spawn_stdin_reader()?;
    let mut in_flight = Vec::new();

    while let Some(line) = lines.recv().await {
        if prompt.as_ref().is_some_and(|prompt| prompt.answer(&line)) {
            continue;
        }

        match parse_line(&line) {
            Input::Navigate(intent) => {
                let controller = Rc::clone(&controller);
                in_flight.push(tokio::task::spawn_local(async move {
                    report(intent, controller.request_advance(intent).await);
                }));
            }
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown => {
                eprintln!("unrecognized input {:?} (n/next, p/prev, q/quit)", line.trim());
            }
        }

        in_flight.retain(|task| !task.is_finished());
    }

    if let Some(prompt) = &prompt {
        prompt.close();
    }
    for task in in_flight {
        if let Err(err) = task.await {
            warn!(error = %err, "navigation task did not finish");
        }
    }

    Ok(())
}

fn report(intent: NavigationIntent, result: Result<AdvanceOutcome, ViewerError>) {
    match result {
        Ok(outcome) => debug!(%intent, ?outcome, "navigation finished"),
        Err(err) => debug!(%intent, error = %err, "navigation aborted"),
    }
}

/// Lines from stdin. The channel closes at end of input.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (sender, receiver) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to start input reader")?;

    Ok(receiver)
}
