//! Time-sliced batch runner for save/load passes.
//!
//! # Responsibility
//! - Drive a begin hook, a per-item callback and an end hook over a whole
//!   collection, a bounded slice of items per `step`.
//! - Let the host decide between steps whether to continue or cancel.
//!
//! # Invariants
//! - `begin` completes before the first item; every item completes before
//!   `end`. Items are processed in collection order.
//! - Every `step` in the iterating phase processes at least one item.
//! - Cancellation and failure never roll back: items already processed stay
//!   committed and `end` is not run.

use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// How much work one `step` may do before yielding to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceBudget {
    /// Yield once the slice has run for at least this long.
    Time(Duration),
    /// Yield after this many items (treated as at least one).
    Items(usize),
}

/// Per-item work plus the hooks around it.
pub trait BatchHandler {
    type Item;
    type Error;

    fn begin(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn process(&mut self, index: usize, item: Self::Item) -> Result<(), Self::Error>;

    fn end(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Begin,
    Iterating,
    End,
    Finished,
    Cancelled,
    Failed,
}

impl BatchPhase {
    fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::Iterating => "iterating",
            Self::End => "end",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Failed)
    }
}

/// Snapshot handed to the host between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub phase: BatchPhase,
    pub processed: usize,
    pub total: usize,
}

/// Final state of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub label: &'static str,
    pub phase: BatchPhase,
    pub processed: usize,
    pub total: usize,
}

impl BatchReport {
    /// `true` only when every item was processed and `end` ran.
    pub fn is_complete(&self) -> bool {
        self.phase == BatchPhase::Finished && self.processed == self.total
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == BatchPhase::Cancelled
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Yielded(BatchProgress),
    Finished(BatchReport),
}

/// Handler failure annotated with where the batch stopped.
#[derive(Debug)]
pub struct BatchError<E> {
    pub label: &'static str,
    pub phase: BatchPhase,
    pub processed: usize,
    pub source: E,
}

impl<E: Display> Display for BatchError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch `{}` failed in {} phase after {} items: {}",
            self.label,
            self.phase.as_str(),
            self.processed,
            self.source
        )
    }
}

impl<E: Error + 'static> Error for BatchError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// Resumable cursor over one batch operation.
pub struct BatchRunner<H: BatchHandler> {
    label: &'static str,
    handler: H,
    pending: std::vec::IntoIter<H::Item>,
    total: usize,
    processed: usize,
    phase: BatchPhase,
    started_at: Instant,
}

impl<H: BatchHandler> BatchRunner<H> {
    pub fn new(label: &'static str, handler: H, items: Vec<H::Item>) -> Self {
        let total = items.len();
        Self {
            label,
            handler,
            pending: items.into_iter(),
            total,
            processed: 0,
            phase: BatchPhase::Begin,
            started_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn progress(&self) -> BatchProgress {
        BatchProgress {
            phase: self.phase,
            processed: self.processed,
            total: self.total,
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn report(&self) -> BatchReport {
        BatchReport {
            label: self.label,
            phase: self.phase,
            processed: self.processed,
            total: self.total,
        }
    }

    /// Runs one slice of work.
    ///
    /// Returns `Yielded` when the budget ran out with items left, `Finished`
    /// once the batch reached a terminal phase.
    pub fn step(&mut self, budget: SliceBudget) -> Result<StepOutcome, BatchError<H::Error>> {
        if self.phase.is_terminal() {
            return Ok(StepOutcome::Finished(self.report()));
        }

        if self.phase == BatchPhase::Begin {
            info!(
                "event=batch_run module=batch status=start label={} total={}",
                self.label, self.total
            );
            if let Err(source) = self.handler.begin() {
                return Err(self.fail(source));
            }
            self.phase = BatchPhase::Iterating;
        }

        if self.phase == BatchPhase::Iterating {
            let slice_started_at = Instant::now();
            let mut in_slice = 0usize;
            while let Some(item) = self.pending.next() {
                if let Err(source) = self.handler.process(self.processed, item) {
                    return Err(self.fail(source));
                }
                self.processed += 1;
                in_slice += 1;

                if self.pending.len() > 0 && slice_exhausted(budget, slice_started_at, in_slice)
                {
                    debug!(
                        "event=batch_yield module=batch status=ok label={} processed={} total={}",
                        self.label, self.processed, self.total
                    );
                    return Ok(StepOutcome::Yielded(self.progress()));
                }
            }
            self.phase = BatchPhase::End;
        }

        if let Err(source) = self.handler.end() {
            return Err(self.fail(source));
        }
        self.phase = BatchPhase::Finished;
        info!(
            "event=batch_run module=batch status=ok label={} processed={} total={} duration_ms={}",
            self.label,
            self.processed,
            self.total,
            self.started_at.elapsed().as_millis()
        );
        Ok(StepOutcome::Finished(self.report()))
    }

    /// Stops the batch without running `end`. Processed items stay committed.
    pub fn cancel(&mut self) -> BatchReport {
        if !self.phase.is_terminal() {
            self.phase = BatchPhase::Cancelled;
            warn!(
                "event=batch_run module=batch status=cancelled label={} processed={} total={}",
                self.label, self.processed, self.total
            );
        }
        self.report()
    }

    /// Pumps `step` until the batch finishes or `host` breaks, which cancels.
    pub fn run(
        &mut self,
        budget: SliceBudget,
        mut host: impl FnMut(&BatchProgress) -> ControlFlow<()>,
    ) -> Result<BatchReport, BatchError<H::Error>> {
        loop {
            match self.step(budget)? {
                StepOutcome::Yielded(progress) => {
                    if host(&progress).is_break() {
                        return Ok(self.cancel());
                    }
                }
                StepOutcome::Finished(report) => return Ok(report),
            }
        }
    }

    fn fail(&mut self, source: H::Error) -> BatchError<H::Error> {
        let phase = self.phase;
        self.phase = BatchPhase::Failed;
        error!(
            "event=batch_run module=batch status=error label={} phase={} processed={} total={}",
            self.label,
            phase.as_str(),
            self.processed,
            self.total
        );
        BatchError {
            label: self.label,
            phase,
            processed: self.processed,
            source,
        }
    }
}

fn slice_exhausted(budget: SliceBudget, started_at: Instant, in_slice: usize) -> bool {
    match budget {
        SliceBudget::Time(limit) => started_at.elapsed() >= limit,
        SliceBudget::Items(limit) => in_slice >= limit.max(1),
    }
}
