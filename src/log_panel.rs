//! The log panel controller: fetch loop, change detection, view state and
//! auto-refresh, driven by a single cooperative event loop.

use crate::change_detector::has_changed;
use crate::commands::{Command, HELP};
use crate::config::RefreshConfig;
use crate::error::FetchError;
use crate::log_client::LogSource;
use crate::renderer::{render, DisplayTree};
use crate::scheduler::RefreshScheduler;
use crate::types::LogBatch;
use crate::view_state::{FetchMode, ViewState};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

const OUTCOME_CHANNEL_CAPACITY: usize = 16;

/// Result of one spawned fetch, delivered back to the panel's loop.
#[derive(Debug)]
pub struct FetchOutcome {
    seq: u64,
    mode: FetchMode,
    result: Result<LogBatch, FetchError>,
}

#[derive(Debug)]
pub enum PanelEvent {
    Command(Command),
    Tick,
    Fetched(FetchOutcome),
}

/// Last successful batch and the tree rendered from it.
struct Snapshot {
    batch: LogBatch,
    tree: DisplayTree,
}

pub struct LogPanel<S: LogSource> {
    source: Arc<S>,
    config: RefreshConfig,
    state: ViewState,
    snapshot: Option<Snapshot>,
    scheduler: RefreshScheduler,
    in_flight: usize,
    last_issued_at: Option<Instant>,
    issued_seq: u64,
    applied_seq: u64,
    outcomes_tx: mpsc::Sender<FetchOutcome>,
    outcomes_rx: mpsc::Receiver<FetchOutcome>,
}

impl<S: LogSource> LogPanel<S> {
    pub fn new(source: Arc<S>, config: RefreshConfig) -> Self {
        let (outcomes_tx, outcomes_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            source,
            config,
            state: ViewState::Loading,
            snapshot: None,
            scheduler: RefreshScheduler::new(),
            in_flight: 0,
            last_issued_at: None,
            issued_seq: 0,
            applied_seq: 0,
            outcomes_tx,
            outcomes_rx,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn auto_refresh_active(&self) -> bool {
        self.scheduler.is_active()
    }

    /// Tree currently on screen, if the panel is showing content.
    pub fn display(&self) -> Option<&DisplayTree> {
        match self.state {
            ViewState::Content(_) => self.snapshot.as_ref().map(|s| &s.tree),
            _ => None,
        }
    }

    /// Arms the timer from the initial config and issues the first load, then
    /// handles commands, ticks and fetch outcomes until `Quit` or the command
    /// channel closes. Every visible change repaints the frame to `out`.
    pub async fn run<W: Write>(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut out: W,
    ) -> Result<()> {
        self.scheduler.configure(self.config.interval_secs);
        self.handle(PanelEvent::Command(Command::Refresh));
        self.paint(&mut out)?;

        loop {
            let event = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => PanelEvent::Command(command),
                },
                _ = self.scheduler.tick() => PanelEvent::Tick,
                Some(outcome) = self.outcomes_rx.recv() => PanelEvent::Fetched(outcome),
            };

            if let PanelEvent::Command(Command::Help) = event {
                writeln!(out, "{}", HELP).context("Failed to write to output")?;
                continue;
            }

            if self.handle(event) {
                self.paint(&mut out)?;
            }
        }

        info!("Log panel stopped");
        Ok(())
    }

    /// Applies one event. Returns whether the frame needs repainting.
    pub fn handle(&mut self, event: PanelEvent) -> bool {
        match event {
            PanelEvent::Command(Command::Refresh) => self.fetch(FetchMode::Explicit),
            PanelEvent::Command(Command::SetLimit(limit)) => {
                if limit == 0 {
                    warn!("Ignoring non-positive limit");
                    return false;
                }
                self.config.limit = limit;
                self.scheduler.configure(self.config.interval_secs);
                self.fetch(FetchMode::Explicit)
            }
            PanelEvent::Command(Command::SetInterval(secs)) => {
                self.config.interval_secs = secs;
                self.scheduler.configure(secs);
                true
            }
            PanelEvent::Command(Command::Toggle(index)) => self.toggle(index),
            PanelEvent::Command(Command::Help | Command::Quit) => false,
            PanelEvent::Tick => self.fetch(FetchMode::Ambient),
            PanelEvent::Fetched(outcome) => self.apply(outcome),
        }
    }

    /// Spawns one fetch. Returns whether the loading state was entered.
    fn fetch(&mut self, mode: FetchMode) -> bool {
        if mode == FetchMode::Ambient && self.in_flight > 0 {
            if !self.in_flight_overdue() {
                debug!("Skipping auto-refresh, {} fetch(es) in flight", self.in_flight);
                return false;
            }
            warn!(
                "{} fetch(es) still pending after a full refresh period, fetching again",
                self.in_flight
            );
        }

        // Keyed on the snapshot, which a failure drops, so the first fetch
        // after an error shows loading and its success always re-renders.
        let show_loading = mode == FetchMode::Explicit || self.snapshot.is_none();
        if show_loading {
            self.transition(ViewState::Loading);
        }

        self.issued_seq += 1;
        self.in_flight += 1;
        self.last_issued_at = Some(Instant::now());
        let seq = self.issued_seq;
        let limit = self.config.limit;
        let source = Arc::clone(&self.source);
        let outcomes = self.outcomes_tx.clone();
        debug!("Fetch #{} ({:?}) limit={}", seq, mode, limit);

        tokio::spawn(async move {
            let result = source.fetch_logs(limit).await;
            let _ = outcomes.send(FetchOutcome { seq, mode, result }).await;
        });

        show_loading
    }

    /// A fetch that has not reported back within one refresh period no longer
    /// holds up the timer.
    fn in_flight_overdue(&self) -> bool {
        let period = Duration::from_secs(self.config.interval_secs);
        self.last_issued_at
            .map_or(true, |issued| issued.elapsed() >= period)
    }

    fn apply(&mut self, outcome: FetchOutcome) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        if outcome.seq < self.applied_seq {
            debug!(
                "Discarding stale fetch #{} (already showing #{})",
                outcome.seq, self.applied_seq
            );
            return false;
        }
        self.applied_seq = outcome.seq;

        match outcome.result {
            Ok(batch) => {
                info!("Fetched {} log records ({:?})", batch.len(), outcome.mode);
                let changed = has_changed(self.snapshot.as_ref().map(|s| &s.batch), &batch);
                let was_showing_content = matches!(self.state, ViewState::Content(_));

                if changed {
                    self.snapshot = Some(Snapshot {
                        tree: render(&batch),
                        batch: batch.clone(),
                    });
                }
                self.transition(ViewState::Content(batch));
                changed || !was_showing_content
            }
            Err(e) => {
                error!("Failed to load logs: {}", e);
                self.snapshot = None;
                self.transition(ViewState::Error(format!("Failed to load logs: {}", e)));
                true
            }
        }
    }

    fn toggle(&mut self, index: usize) -> bool {
        if !matches!(self.state, ViewState::Content(_)) {
            return false;
        }
        match self.snapshot.as_mut() {
            Some(snapshot) => snapshot.tree.toggle(index),
            None => false,
        }
    }

    /// The only place the view state changes.
    fn transition(&mut self, next: ViewState) {
        debug!("View state {} -> {}", self.state.name(), next.name());
        self.state = next;
    }

    /// Text of the whole panel as currently shown.
    pub fn frame(&self) -> String {
        let indicator = if self.scheduler.is_active() {
            format!("auto-refresh every {}s", self.scheduler.period_secs())
        } else {
            "auto-refresh off".to_string()
        };
        let mut frame = format!(
            "=== Device logs | limit {} | {} ===\n",
            self.config.limit, indicator
        );

        match &self.state {
            ViewState::Loading => frame.push_str("Loading logs...\n"),
            ViewState::Error(message) => {
                frame.push_str(message);
                frame.push('\n');
            }
            ViewState::Content(_) => {
                if let Some(tree) = self.display() {
                    frame.push_str(&tree.to_string());
                }
            }
        }
        frame
    }

    fn paint<W: Write>(&self, out: &mut W) -> Result<()> {
        write!(out, "\n{}", self.frame()).context("Failed to write to output")?;
        out.flush().context("Failed to flush output")
    }
}
