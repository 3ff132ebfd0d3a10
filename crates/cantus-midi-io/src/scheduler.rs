//! Timed dispatch of resolved events.
//!
//! A run owns one dispatcher thread. Every event contributes two actions, a
//! note-on at its onset and a note-off at its end, kept in a priority queue
//! ordered by due time. At equal times note-offs fire before note-ons, so a
//! channel freed at `t` can be taken again at `t`. The dispatcher sleeps on
//! the cancel channel until the next action is due, which makes cancellation
//! immediate.
//!
//! The dispatcher owns a fresh [`ChannelAllocator`] for the run and replays
//! the reservations made during resolution; a note landing on a different
//! channel than resolution chose is an accounting error and ends the run.

use crate::cleanup::{self, DEFAULT_PANIC_DELAY};
use crate::error::{Error, Result};
use crate::registry::{ClientId, ClientRegistry, SharedRegistry};
use cantus_midi::{ChannelAllocator, ChannelUsage, ResolvedEvent, ShortMessage};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where a run sends its messages.
pub enum Outputs {
    /// Opened for this run and closed when it ends.
    Owned(ClientRegistry),
    /// Opened elsewhere and left open after the run.
    Shared(SharedRegistry),
}

impl Outputs {
    pub fn port_count(&self) -> usize {
        match self {
            Outputs::Owned(registry) => registry.port_count(),
            Outputs::Shared(registry) => registry.lock().port_count(),
        }
    }

    fn client_count(&self) -> usize {
        match self {
            Outputs::Owned(registry) => registry.client_count(),
            Outputs::Shared(registry) => registry.lock().client_count(),
        }
    }

    fn with<R>(&mut self, f: impl FnOnce(&mut ClientRegistry) -> R) -> R {
        match self {
            Outputs::Owned(registry) => f(registry),
            Outputs::Shared(registry) => f(&mut registry.lock()),
        }
    }

    fn finish(self) {
        if let Outputs::Owned(registry) = self {
            registry.close();
        }
    }
}

impl From<ClientRegistry> for Outputs {
    fn from(registry: ClientRegistry) -> Self {
        Outputs::Owned(registry)
    }
}

impl From<SharedRegistry> for Outputs {
    fn from(registry: SharedRegistry) -> Self {
        Outputs::Shared(registry)
    }
}

/// Stops a run from any thread. Cloning shares the same run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl CancelToken {
    fn new() -> (Self, Receiver<()>) {
        let (wake, woken) = bounded(1);
        let token = Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            wake,
        };
        (token, woken)
    }

    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            let _ = self.wake.try_send(());
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Note-ons dispatched.
    pub notes: usize,
    /// Messages accepted by clients, panic messages included.
    pub messages_sent: usize,
    pub failed_clients: Vec<String>,
    pub interrupted: bool,
    pub panicked: bool,
    pub elapsed: Duration,
    /// Channel table after cleanup.
    pub usage_after: Vec<ChannelUsage>,
}

impl RunReport {
    /// `Err(Interrupted)` for a cancelled run.
    pub fn into_result(self) -> Result<Self> {
        if self.interrupted {
            Err(Error::Interrupted)
        } else {
            Ok(self)
        }
    }

    pub fn table_is_free(&self) -> bool {
        self.usage_after.iter().all(ChannelUsage::is_free)
    }
}

pub struct RunHandle {
    thread: JoinHandle<Result<RunReport>>,
    cancel: CancelToken,
}

impl RunHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Blocks until every action has fired or the run was cancelled, and
    /// cleanup has finished.
    pub fn wait(self) -> Result<RunReport> {
        self.thread.join().map_err(|_| Error::SchedulerGone)?
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    panic_delay: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            panic_delay: DEFAULT_PANIC_DELAY,
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pause between channels during the panic sequence.
    pub fn panic_delay(mut self, delay: Duration) -> Self {
        self.panic_delay = delay;
        self
    }

    /// Starts dispatching `events` now.
    ///
    /// Every event's port must exist in `outputs`. The run reserves its own
    /// channel table, sized to the outputs' port count.
    pub fn schedule(
        &self,
        events: Vec<ResolvedEvent>,
        outputs: impl Into<Outputs>,
    ) -> Result<RunHandle> {
        let outputs = outputs.into();
        let port_count = outputs.port_count();

        if let Some(event) = events
            .iter()
            .find(|e| e.channel.port >= port_count || e.requested.port >= port_count)
        {
            let message = format!(
                "note {} uses {} but only {} ports are open",
                event.seq, event.channel, port_count
            );
            outputs.finish();
            return Err(Error::InvalidConfig(message));
        }

        let (cancel, woken) = CancelToken::new();
        let dispatcher = Dispatcher {
            queue: actions(&events),
            events,
            allocator: ChannelAllocator::new(port_count),
            client_count: outputs.client_count(),
            outputs: Some(outputs),
            failed: HashSet::new(),
            report: RunReport::default(),
            panic_delay: self.panic_delay,
            cancel: cancel.clone(),
            woken,
        };

        let thread = thread::Builder::new()
            .name("cantus-dispatch".to_string())
            .spawn(move || dispatcher.run())?;

        Ok(RunHandle { thread, cancel })
    }

    /// [`schedule`](Self::schedule) and wait.
    pub fn play(
        &self,
        events: Vec<ResolvedEvent>,
        outputs: impl Into<Outputs>,
    ) -> Result<RunReport> {
        self.schedule(events, outputs)?.wait()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Action {
    at: Duration,
    phase: Phase,
    event: usize,
}

fn actions(events: &[ResolvedEvent]) -> BinaryHeap<Reverse<Action>> {
    events
        .iter()
        .enumerate()
        .flat_map(|(event, e)| {
            [
                Action {
                    at: e.onset,
                    phase: Phase::On,
                    event,
                },
                Action {
                    at: e.end(),
                    phase: Phase::Off,
                    event,
                },
            ]
        })
        .map(Reverse)
        .collect()
}

enum Completion {
    Finished,
    Interrupted,
}

struct Dispatcher {
    events: Vec<ResolvedEvent>,
    queue: BinaryHeap<Reverse<Action>>,
    allocator: ChannelAllocator,
    outputs: Option<Outputs>,
    client_count: usize,
    failed: HashSet<ClientId>,
    report: RunReport,
    panic_delay: Duration,
    cancel: CancelToken,
    woken: Receiver<()>,
}

impl Dispatcher {
    fn run(mut self) -> Result<RunReport> {
        let start = Instant::now();
        info!(
            "Playing {} notes on {} clients",
            self.events.len(),
            self.client_count
        );

        let outcome = self.dispatch(start);
        let needs_panic = match &outcome {
            Ok(Completion::Finished) => false,
            Ok(Completion::Interrupted) => {
                info!("Playback interrupted");
                self.report.interrupted = true;
                true
            }
            // Nobody is left to receive a panic.
            Err(e @ Error::AllClientsFailed(_)) => {
                error!("Playback aborted: {}", e);
                false
            }
            Err(e) => {
                error!("Playback aborted: {}", e);
                true
            }
        };

        if let Some(mut outputs) = self.outputs.take() {
            if needs_panic {
                let delay = self.panic_delay;
                let failed = &self.failed;
                let summary = outputs.with(|registry| cleanup::panic_skipping(registry, delay, failed));
                self.report.panicked = true;
                self.report.messages_sent += summary.messages_sent;
                self.report.failed_clients.extend(summary.failed_clients);
            }
            outputs.finish();
        }

        if !needs_panic && !self.allocator.is_idle() {
            warn!("Channels still reserved at the end of the run");
        }
        self.allocator.reset();
        self.report.usage_after = self.allocator.usages().to_vec();
        self.report.elapsed = start.elapsed();
        info!(
            "Run finished: {} notes, {} messages in {:?}",
            self.report.notes, self.report.messages_sent, self.report.elapsed
        );

        outcome.map(|_| self.report)
    }

    fn dispatch(&mut self, start: Instant) -> Result<Completion> {
        while let Some(Reverse(action)) = self.queue.pop() {
            if self.wait_until(start.checked_add(action.at)) {
                return Ok(Completion::Interrupted);
            }

            let late = start.elapsed().saturating_sub(action.at);
            if late > Duration::from_millis(5) {
                debug!("Action for note {} fired {:?} late", action.event, late);
            }

            match action.phase {
                Phase::On => self.note_on(action.event)?,
                Phase::Off => self.note_off(action.event)?,
            }

            if self.client_count > 0 && self.failed.len() >= self.client_count {
                return Err(Error::AllClientsFailed(self.report.failed_clients.clone()));
            }
        }
        Ok(Completion::Finished)
    }

    /// Sleeps until `deadline`, or until cancelled if the deadline is past
    /// what the clock can represent. Returns true if the run was cancelled.
    fn wait_until(&self, deadline: Option<Instant>) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        let Some(deadline) = deadline else {
            return self.woken.recv().is_ok() || self.cancel.is_cancelled();
        };
        match self.woken.recv_deadline(deadline) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) => self.cancel.is_cancelled(),
            // The dispatcher holds a sender, so this cannot happen.
            Err(RecvTimeoutError::Disconnected) => self.cancel.is_cancelled(),
        }
    }

    fn note_on(&mut self, index: usize) -> Result<()> {
        let event = &self.events[index];
        let (requested, expected, tuning, messages) =
            (event.requested, event.channel, event.tuning, event.messages);

        let channel = self.allocator.reserve_at(requested, tuning)?;
        if channel != expected {
            return Err(cantus_midi::Error::ChannelAccounting {
                channel: channel.index(),
                reason: format!("note {} resolved to {} but got {}", index, expected, channel),
            }
            .into());
        }

        debug!("Note on {} on {}", messages.note_on, channel);
        if let Some(pair) = messages.bend {
            self.broadcast(channel.port, &pair.bend);
        }
        self.broadcast(channel.port, &messages.note_on);
        self.report.notes += 1;
        Ok(())
    }

    fn note_off(&mut self, index: usize) -> Result<()> {
        let event = &self.events[index];
        let (channel, tuning, messages) = (event.channel, event.tuning, event.messages);

        debug!("Note off {} on {}", messages.note_off, channel);
        self.broadcast(channel.port, &messages.note_off);
        self.allocator.release(channel, tuning)?;
        if let Some(pair) = messages.bend {
            self.broadcast(channel.port, &pair.reset);
        }
        Ok(())
    }

    /// Sends to every working client of `port`. A failing client is logged
    /// and receives nothing for the rest of the run.
    fn broadcast(&mut self, port: usize, message: &ShortMessage) {
        let Some(outputs) = self.outputs.as_mut() else {
            return;
        };
        let failed = &mut self.failed;
        let report = &mut self.report;

        outputs.with(|registry| {
            for (synth, client) in registry.clients_mut(port).iter_mut().enumerate() {
                let id = ClientId { port, synth };
                if failed.contains(&id) {
                    continue;
                }
                match client.send(message) {
                    Ok(()) => report.messages_sent += 1,
                    Err(e) => {
                        warn!("Dropping output client '{}': {}", client.name(), e);
                        failed.insert(id);
                        report.failed_clients.push(client.name().to_string());
                    }
                }
            }
        });
    }
}
