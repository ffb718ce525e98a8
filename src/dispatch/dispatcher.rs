//! The dispatch loop and its result stream.
//!
//! Each call to [`Dispatcher::dispatch`] spawns one task that owns all
//! scheduling state for that run: the keyed queues, the admission state and
//! the completion tracker. Inbound items, processing completions and
//! cancellation all arrive as events to that one task, so no lock is ever
//! taken and a scheduling pass can never race with another.
//!
//! Processing runs in separate tasks and reports back through a `JoinSet`.
//! Results are pushed to an unbounded channel that backs [`ResultStream`].
//!
//! Backpressure: pending items are buffered without limit; only the number
//! of items *processing* is capped. A producer with unbounded key fan-out can
//! therefore exhaust memory.

use std::any::Any;
use std::fmt::Display;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures::{FutureExt as _, Stream, StreamExt as _};
use opentelemetry::KeyValue;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, Span, debug, error, info, warn};
use uuid::Uuid;

use super::completion::CompletionTracker;
use super::scheduler::{Launch, Scheduler};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventSink};
use crate::model::WorkItem;
use crate::processor::Processor;
use crate::telemetry::dispatch::{
    record_outcome, record_transition, start_dispatch_span, start_item_span,
};
use crate::telemetry::metrics::DispatchMetrics;

/// What to do when processing a single item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// End the whole output stream with the failure. Queued work is dropped.
    #[default]
    FailFast,
    /// Yield the failure as an `Err` item for that key and keep going.
    Isolate,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "isolate" => Ok(FailurePolicy::Isolate),
            other => Err(format!(
                "unknown failure policy {other:?} (expected fail-fast or isolate)"
            )),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::Isolate => write!(f, "isolate"),
        }
    }
}

/// Validated dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    max_concurrency: usize,
    failure_policy: FailurePolicy,
}

impl DispatchConfig {
    /// Fails with [`Error::InvalidConcurrency`] when `max_concurrency` is 0.
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::InvalidConcurrency(max_concurrency));
        }
        Ok(Self {
            max_concurrency,
            failure_policy: FailurePolicy::default(),
        })
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }
}

/// Keyed, order-preserving dispatcher.
///
/// Items sharing a key are processed one at a time in submission order, and
/// at most `max_concurrency` items process at once across all keys.
pub struct Dispatcher<Pr> {
    processor: Arc<Pr>,
    config: DispatchConfig,
    events: Option<mpsc::UnboundedSender<Event>>,
}

impl<Pr> Clone for Dispatcher<Pr> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            config: self.config.clone(),
            events: self.events.clone(),
        }
    }
}

impl<Pr: Processor> Dispatcher<Pr> {
    pub fn new(processor: Arc<Pr>, config: DispatchConfig) -> Self {
        Self {
            processor,
            config,
            events: None,
        }
    }

    /// Send a structured [`Event`] for every state transition of every run.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Start a dispatch run over `inbound`.
    ///
    /// The returned stream yields one result per item and ends once `inbound`
    /// has ended and every admitted item has produced its result. An inbound
    /// error, or a processing error under [`FailurePolicy::FailFast`], is
    /// yielded as the last item. Dropping the stream cancels the run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch<S, E>(&self, inbound: S) -> ResultStream<Pr::Output>
    where
        S: Stream<Item = std::result::Result<WorkItem<Pr::Input>, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        match Scheduler::new(self.config.max_concurrency) {
            Ok(scheduler) => {
                let id = Uuid::new_v4();
                let span = start_dispatch_span(&id, self.config.max_concurrency);
                let run = Run {
                    processor: Arc::clone(&self.processor),
                    policy: self.config.failure_policy,
                    scheduler,
                    tracker: CompletionTracker::new(),
                    tx,
                    cancel: cancel.clone(),
                    events: EventSink::new(self.events.clone()),
                    metrics: DispatchMetrics::new(),
                    span: span.clone(),
                    emitted: 0,
                };
                tokio::spawn(run.drive(inbound).instrument(span));
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }

        ResultStream {
            rx,
            _cancel: cancel.drop_guard(),
        }
    }
}

/// Results of one dispatch run, in completion order.
///
/// Dropping the stream stops admission, drops the inbound stream, and
/// discards results of items still processing.
pub struct ResultStream<R> {
    rx: mpsc::UnboundedReceiver<Result<R>>,
    _cancel: DropGuard,
}

impl<R> Stream for ResultStream<R> {
    type Item = Result<R>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

struct Completion<R> {
    key: String,
    outcome: Result<R>,
    elapsed: Duration,
}

struct Run<Pr: Processor> {
    processor: Arc<Pr>,
    policy: FailurePolicy,
    scheduler: Scheduler<WorkItem<Pr::Input>>,
    tracker: CompletionTracker,
    tx: mpsc::UnboundedSender<Result<Pr::Output>>,
    cancel: CancellationToken,
    events: EventSink,
    metrics: DispatchMetrics,
    span: Span,
    emitted: u64,
}

impl<Pr: Processor> Run<Pr> {
    async fn drive<S, E>(mut self, inbound: S)
    where
        S: Stream<Item = std::result::Result<WorkItem<Pr::Input>, E>> + Send,
        E: Display,
    {
        let mut inbound = std::pin::pin!(inbound);
        let mut tasks: JoinSet<Completion<Pr::Output>> = JoinSet::new();

        info!(
            max_concurrency = self.scheduler.max_concurrency(),
            policy = %self.policy,
            "dispatch started"
        );

        loop {
            let flow = tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    warn!(
                        pending = self.scheduler.pending(),
                        in_flight = self.scheduler.in_flight(),
                        "downstream cancelled"
                    );
                    self.abort("downstream cancelled");
                    ControlFlow::Break(())
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok(done) => self.on_completion(done),
                    Err(e) => self.fail(Error::Other(format!("processing task failed: {e}"))),
                },
                next = inbound.next(), if self.tracker.is_inbound_open() => match next {
                    Some(Ok(item)) => self.on_item(item),
                    Some(Err(e)) => self.fail(Error::Inbound(e.to_string())),
                    None => self.on_inbound_closed(),
                },
            };
            if flow.is_break() {
                break;
            }

            for launch in self.scheduler.schedule_pass() {
                self.launch(&mut tasks, launch);
            }

            if self.tracker.try_close(self.scheduler.is_drained()) {
                self.on_output_closed();
                break;
            }
        }

        // Items still processing finish on their own; their results are dropped.
        tasks.detach_all();
    }

    fn on_item(&mut self, item: WorkItem<Pr::Input>) -> ControlFlow<()> {
        let key = item.key.clone();
        self.scheduler.enqueue(&key, item);
        self.metrics.submitted.add(1, &[]);
        self.metrics.queue_depth.add(1, &[]);

        let depth = self.scheduler.depth(&key);
        debug!(key = %key, depth, "item queued");
        self.events.emit(EventKind::ItemQueued { key, depth });
        ControlFlow::Continue(())
    }

    fn on_inbound_closed(&mut self) -> ControlFlow<()> {
        if self.tracker.close_inbound() {
            let pending = self.scheduler.pending();
            let in_flight = self.scheduler.in_flight();
            info!(pending, in_flight, "inbound closed");
            record_transition(&self.span, "open", "draining");
            self.events
                .emit(EventKind::InboundClosed { pending, in_flight });
        }
        ControlFlow::Continue(())
    }

    fn launch(
        &mut self,
        tasks: &mut JoinSet<Completion<Pr::Output>>,
        launch: Launch<WorkItem<Pr::Input>>,
    ) {
        let Launch { key, item } = launch;
        let in_flight = self.scheduler.in_flight();
        self.metrics.queue_depth.add(-1, &[]);
        self.metrics.in_flight.add(1, &[]);
        debug!(key = %key, in_flight, "item started");
        self.events.emit(EventKind::ItemStarted {
            key: key.clone(),
            in_flight,
        });

        let processor = Arc::clone(&self.processor);
        let span = self.span.in_scope(|| start_item_span(&key));
        let task = async move {
            let started = Instant::now();
            let outcome = match AssertUnwindSafe(processor.process(item))
                .catch_unwind()
                .await
            {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(err)) => Err(keyed_error(&key, err)),
                Err(panic) => Err(Error::Processing {
                    key: key.clone(),
                    message: panic_message(panic.as_ref()),
                }),
            };
            record_outcome(&Span::current(), outcome.is_ok());
            Completion {
                key,
                outcome,
                elapsed: started.elapsed(),
            }
        };
        tasks.spawn(task.instrument(span));
    }

    fn on_completion(&mut self, done: Completion<Pr::Output>) -> ControlFlow<()> {
        let Completion {
            key,
            outcome,
            elapsed,
        } = done;
        let success = outcome.is_ok();
        let label = if success { "ok" } else { "error" };
        self.metrics
            .completed
            .add(1, &[KeyValue::new("outcome", label)]);
        self.metrics
            .duration_ms
            .record(elapsed.as_secs_f64() * 1000.0, &[]);
        self.metrics.in_flight.add(-1, &[]);

        // Emit before release: the key's next item cannot start until then.
        let failure = match outcome {
            Ok(result) => {
                self.emit(Ok(result));
                None
            }
            Err(err) if self.policy == FailurePolicy::FailFast => Some(err),
            Err(err) => {
                warn!(key = %key, error = %err, "item failed, continuing");
                self.emit(Err(err));
                None
            }
        };

        self.scheduler.complete(&key);
        let in_flight = self.scheduler.in_flight();
        debug!(
            key = %key,
            in_flight,
            elapsed_ms = elapsed.as_millis() as u64,
            "item finished"
        );
        self.events.emit(EventKind::ItemFinished {
            key,
            in_flight,
            success,
        });

        match failure {
            Some(err) => self.fail(err),
            None => ControlFlow::Continue(()),
        }
    }

    fn on_output_closed(&mut self) {
        info!(emitted = self.emitted, "output closed");
        self.span.record("dispatch.emitted", self.emitted);
        record_transition(&self.span, "draining", "closed");
        self.events.emit(EventKind::OutputClosed {
            emitted: self.emitted,
        });
    }

    fn emit(&mut self, item: Result<Pr::Output>) {
        self.emitted += 1;
        // A closed channel means the stream was dropped; the cancel branch
        // ends the loop on the next turn.
        let _ = self.tx.send(item);
    }

    /// Terminal failure: report it as the last item and stop.
    fn fail(&mut self, err: Error) -> ControlFlow<()> {
        error!(
            error = %err,
            pending = self.scheduler.pending(),
            in_flight = self.scheduler.in_flight(),
            "dispatch failed"
        );
        self.abort(&err.to_string());
        let _ = self.tx.send(Err(err));
        ControlFlow::Break(())
    }

    fn abort(&mut self, reason: &str) {
        let dropped = self.scheduler.clear_pending();
        self.metrics.queue_depth.add(-(dropped as i64), &[]);
        self.metrics
            .in_flight
            .add(-(self.scheduler.in_flight() as i64), &[]);
        record_transition(&self.span, "running", "aborted");
        self.events.emit(EventKind::Aborted {
            reason: reason.to_string(),
        });
    }
}

fn keyed_error(key: &str, err: Error) -> Error {
    match err {
        Error::Processing { .. } => err,
        other => Error::Processing {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("processor panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("processor panicked: {s}")
    } else {
        "processor panicked".to_string()
    }
}
