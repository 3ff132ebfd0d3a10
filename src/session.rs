//! Playback and export of compositions.

use crate::config::PlaybackConfig;
use crate::Result;
use cantus_midi::{resolve, BendRange, Composition, ResolvedEvent};
use cantus_midi_io::{
    cleanup, save_smf, CancelToken, CaptureLog, ClientRegistry, OutputBackend, OutputPort,
    Outputs, RunReport, Scheduler, SharedRegistry,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Where [`Session::process`] sends a composition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
    /// Play it now on the configured outputs.
    #[default]
    Play,
    /// Write it to a Standard MIDI File.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Played(RunReport),
    Exported { path: PathBuf, notes: usize },
}

/// Cancels the session's current run from another thread (a Ctrl-C
/// handler, say). A trigger that arrives while no run is active is kept
/// and cancels the next run instead.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
    active: Arc<Mutex<Option<CancelToken>>>,
}

impl Interrupt {
    pub fn trigger(&self) {
        let active = self.active.lock();
        match active.as_ref() {
            Some(token) => token.cancel(),
            None => self.requested.store(true, Ordering::SeqCst),
        }
    }

    /// True if a trigger is pending, i.e. no run has consumed it yet.
    pub fn is_triggered(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    fn attach(&self, token: CancelToken) {
        let mut active = self.active.lock();
        if self.requested.swap(false, Ordering::SeqCst) {
            token.cancel();
        }
        *active = Some(token);
    }

    /// Ends the current run. A trigger that reached the token after the run
    /// had already finished stays pending.
    fn detach(&self, interrupted: bool) {
        if let Some(token) = self.active.lock().take() {
            if token.is_cancelled() && !interrupted {
                self.requested.store(true, Ordering::SeqCst);
            }
        }
    }
}

/// A configured playback front end.
///
/// Create with [`Session::builder`](crate::SessionBuilder).
pub struct Session {
    pub(crate) config: PlaybackConfig,
    pub(crate) bend_range: BendRange,
    pub(crate) backend: Box<dyn OutputBackend>,
    pub(crate) shared: Option<SharedRegistry>,
    pub(crate) capture: Option<CaptureLog>,
    pub(crate) interrupt: Interrupt,
}

impl Session {
    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }

    /// Messages recorded by the capture backend, if the session uses one.
    pub fn capture_log(&self) -> Option<CaptureLog> {
        self.capture.clone()
    }

    pub fn output_ports(&self) -> Result<Vec<OutputPort>> {
        Ok(self.backend.output_ports()?)
    }

    /// Resolves a composition with this session's port count and bend range.
    pub fn resolve(&self, composition: &Composition) -> Result<Vec<ResolvedEvent>> {
        Ok(resolve(
            composition,
            self.config.port_count,
            self.bend_range,
        )?)
    }

    /// Plays `composition` or writes it to a file.
    ///
    /// Nothing is sent unless the whole composition resolves. A cancelled run
    /// ends with an error for which [`Error::is_interrupted`](crate::Error::is_interrupted)
    /// holds, after the panic sequence has run.
    pub fn process(&self, composition: &Composition, destination: Destination) -> Result<Outcome> {
        match destination {
            Destination::Play => self.play(composition).map(Outcome::Played),
            Destination::File(path) => {
                let notes = self.export(composition, &path)?;
                Ok(Outcome::Exported { path, notes })
            }
        }
    }

    pub fn play(&self, composition: &Composition) -> Result<RunReport> {
        let events = match self.resolve(composition) {
            Ok(events) => events,
            Err(e) => {
                self.silence_shared();
                return Err(e);
            }
        };

        let outputs = match &self.shared {
            Some(shared) => Outputs::Shared(Arc::clone(shared)),
            None => Outputs::Owned(ClientRegistry::connect(
                self.backend.as_ref(),
                &self.config.synths,
                self.config.port_count,
                &self.config.client_name,
            )?),
        };

        let handle = Scheduler::new()
            .panic_delay(self.config.panic_delay())
            .schedule(events, outputs)?;
        self.interrupt.attach(handle.cancel_token());
        let result = handle.wait();
        let interrupted = matches!(&result, Ok(report) if report.interrupted);
        self.interrupt.detach(interrupted);

        let report = result?;
        if !report.failed_clients.is_empty() {
            warn!("Output clients failed: {}", report.failed_clients.join(", "));
        }
        Ok(report.into_result()?)
    }

    /// Writes `composition` to `path`, returning the number of notes written.
    pub fn export(&self, composition: &Composition, path: impl AsRef<Path>) -> Result<usize> {
        let events = self.resolve(composition)?;
        save_smf(path.as_ref(), &events)?;
        Ok(events.len())
    }

    /// Closes a registry opened with `keep_open`. Owned clients are already
    /// closed at the end of every run.
    pub fn close(self) {
        if let Some(shared) = self.shared {
            match Arc::try_unwrap(shared) {
                Ok(registry) => registry.into_inner().close(),
                Err(_) => warn!("Output clients still in use, leaving them open"),
            }
        }
    }

    fn silence_shared(&self) {
        if let Some(shared) = &self.shared {
            info!("Run aborted before playback, silencing shared outputs");
            cleanup::panic(&mut shared.lock(), self.config.panic_delay());
        }
    }
}

/// Reads a composition from JSON.
pub fn parse_composition(source: &str) -> Result<Composition> {
    Ok(serde_json::from_str(source)?)
}

pub fn load_composition(path: impl AsRef<Path>) -> Result<Composition> {
    let source = std::fs::read_to_string(path.as_ref())?;
    parse_composition(&source)
}
