use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::detection::domain::expression_detector::{ExpressionDetector, ModelStep};
use crate::detection::domain::expression_ranker::ExpressionRanker;
use crate::media::domain::frame_source::{AcquisitionError, FrameSource};
use crate::shared::constants::{SAMPLE_INTERVAL, TOP_EXPRESSIONS};

use super::cycle_logger::CycleLogger;
use super::detection_cycle::{CycleOutcome, DetectionCycle};
use super::inference_guard::{CyclePermit, InferenceGuard};
use super::readiness::{load_models, ReadinessMachine, ReadinessState};
use super::result_publisher::{Liveness, PublishedState, ResultPublisher};
use super::sampling_stats::{SamplingStats, StatsSnapshot};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("sampling interval must be greater than zero")]
    ZeroInterval,
    #[error("top_n must be at least 1")]
    ZeroTopN,
    #[error("at least one model step is required")]
    NoModels,
}

/// Configuration for one sampling loop.
#[derive(Clone, Debug)]
pub struct SamplingConfig {
    pub interval: Duration,
    pub top_n: usize,
    /// Loaded strictly in this order.
    pub models: Vec<ModelStep>,
}

impl SamplingConfig {
    pub fn new(models: Vec<ModelStep>) -> Self {
        Self {
            interval: SAMPLE_INTERVAL,
            top_n: TOP_EXPRESSIONS,
            models,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.top_n == 0 {
            return Err(ConfigError::ZeroTopN);
        }
        if self.models.is_empty() {
            return Err(ConfigError::NoModels);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum MediaState {
    Closed,
    Open,
    Failed(AcquisitionError),
}

enum Command {
    Load,
    OpenMedia,
    Cycle(CyclePermit),
}

/// State read by the ticker, written by the worker and the handle.
struct Shared {
    readiness: Mutex<ReadinessMachine>,
    media: Mutex<MediaState>,
    guard: InferenceGuard,
    stats: SamplingStats,
}

impl Shared {
    fn readiness(&self) -> MutexGuard<'_, ReadinessMachine> {
        self.readiness.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn media(&self) -> MutexGuard<'_, MediaState> {
        self.media.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Periodically samples a frame source, runs the detector on it and
/// publishes the ranked result.
///
/// Layout: `ticker ─[admitted tick]→ worker [load | open media | cycle]`
///
/// The ticker drops a tick when models are not ready, media is not open, or
/// a cycle is still in flight. The worker owns the detector and the frame
/// source, so loading and detection never overlap.
pub struct SamplingLoop;

impl SamplingLoop {
    /// Starts loading models and, once ready, sampling at the configured
    /// cadence.
    pub fn start(
        config: SamplingConfig,
        detector: Box<dyn ExpressionDetector>,
        source: Box<dyn FrameSource>,
        publisher: ResultPublisher,
        logger: Box<dyn CycleLogger>,
    ) -> Result<SamplingHandle, ConfigError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            readiness: Mutex::new(ReadinessMachine::new()),
            media: Mutex::new(MediaState::Closed),
            guard: InferenceGuard::new(),
            stats: SamplingStats::default(),
        });
        let published = publisher.state();
        let live = publisher.liveness();

        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        shared.readiness().begin_load();
        // Queued before the worker exists, so it is the first thing it runs.
        let _ = command_tx.send(Command::Load);

        let worker = Worker {
            shared: shared.clone(),
            detector,
            source,
            publisher,
            logger,
            cycle: DetectionCycle::new(ExpressionRanker::new(config.top_n)),
            models: config.models,
        };
        let worker_handle = std::thread::spawn(move || worker.run(command_rx));
        let ticker_handle = spawn_ticker(
            shared.clone(),
            config.interval,
            command_tx.clone(),
            shutdown_rx,
        );

        Ok(SamplingHandle {
            shared,
            command_tx: Some(command_tx),
            shutdown_tx: Some(shutdown_tx),
            ticker: Some(ticker_handle),
            worker: Some(worker_handle),
            published,
            live,
        })
    }
}

/// Control and observation surface of a running [`SamplingLoop`].
///
/// Dropping the handle tears the loop down; an in-flight cycle still runs to
/// completion on its own thread but its result is discarded.
pub struct SamplingHandle {
    shared: Arc<Shared>,
    command_tx: Option<Sender<Command>>,
    shutdown_tx: Option<Sender<()>>,
    ticker: Option<JoinHandle<()>>,
    worker: Option<JoinHandle<()>>,
    published: PublishedState,
    live: Liveness,
}

impl SamplingHandle {
    pub fn readiness(&self) -> ReadinessState {
        self.shared.readiness().state().clone()
    }

    /// The persistent media error, if the frame source could not be opened.
    pub fn acquisition_error(&self) -> Option<AcquisitionError> {
        match &*self.shared.media() {
            MediaState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Restarts loading if the last load failed. Returns whether a new load
    /// was started; a no-op while loading or once ready.
    pub fn retry(&self) -> bool {
        let Some(tx) = &self.command_tx else {
            return false;
        };
        if !self.shared.readiness().retry() {
            return false;
        }
        log::info!("Retrying model load");
        let _ = tx.send(Command::Load);
        true
    }

    /// Re-opens the frame source after an acquisition failure.
    pub fn retry_media(&self) -> bool {
        let Some(tx) = &self.command_tx else {
            return false;
        };
        {
            let mut media = self.shared.media();
            if !matches!(*media, MediaState::Failed(_)) {
                return false;
            }
            *media = MediaState::Closed;
        }
        log::info!("Retrying frame source");
        let _ = tx.send(Command::OpenMedia);
        true
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Latest published result, for polling consumers.
    pub fn published(&self) -> PublishedState {
        self.published.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.guard.is_busy()
    }

    /// Tears the loop down without waiting for an in-flight cycle.
    ///
    /// A publish already delivering to the callbacks is allowed to finish;
    /// no consumer callback fires after this returns.
    pub fn stop(&mut self) {
        self.live.retire();
        self.shutdown_tx.take();
        if let Some(ticker) = self.ticker.take() {
            if ticker.join().is_err() {
                log::error!("Sampling ticker panicked");
            }
        }
        self.command_tx.take();
    }

    /// Stops the loop and waits for the worker to finish its current
    /// command. Returns the final counters.
    pub fn join(mut self) -> StatsSnapshot {
        self.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Sampling worker panicked");
            }
        }
        self.shared.stats.snapshot()
    }
}

impl Drop for SamplingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_ticker(
    shared: Arc<Shared>,
    interval: Duration,
    command_tx: Sender<Command>,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let ticks = crossbeam_channel::tick(interval);
        loop {
            crossbeam_channel::select! {
                recv(ticks) -> _ => {
                    if !on_tick(&shared, &command_tx) {
                        break;
                    }
                }
                recv(shutdown_rx) -> _ => break,
            }
        }
        log::debug!("Sampling ticker stopped");
    })
}

/// Admits or drops one tick. Returns false once the worker is gone.
fn on_tick(shared: &Shared, command_tx: &Sender<Command>) -> bool {
    let ready = shared.readiness().state().is_ready();
    let media_open = *shared.media() == MediaState::Open;
    if !ready || !media_open {
        shared.stats.record_dropped_not_ready();
        log::trace!("Tick dropped: not ready");
        return true;
    }

    let Some(permit) = shared.guard.try_acquire() else {
        shared.stats.record_dropped_busy();
        log::trace!("Tick dropped: cycle in flight");
        return true;
    };

    shared.stats.record_admitted();
    command_tx.send(Command::Cycle(permit)).is_ok()
}

struct Worker {
    shared: Arc<Shared>,
    detector: Box<dyn ExpressionDetector>,
    source: Box<dyn FrameSource>,
    publisher: ResultPublisher,
    logger: Box<dyn CycleLogger>,
    cycle: DetectionCycle,
    models: Vec<ModelStep>,
}

impl Worker {
    fn run(mut self, command_rx: Receiver<Command>) {
        for command in command_rx {
            if !self.publisher.is_live() {
                break;
            }
            match command {
                Command::Load => self.load(),
                Command::OpenMedia => self.open_media(),
                Command::Cycle(permit) => self.run_cycle(permit),
            }
        }

        self.source.close();
        self.logger.summary(&self.shared.stats.snapshot());
        log::debug!("Sampling worker stopped");
    }

    fn load(&mut self) {
        let result = load_models(self.detector.as_mut(), &self.models);
        if let Err(ref e) = result {
            log::error!("{e}");
        }
        let ready = {
            let mut readiness = self.shared.readiness();
            readiness.finish_load(result);
            readiness.state().is_ready()
        };
        if ready {
            self.logger.info("Models ready");
            let media_closed = *self.shared.media() == MediaState::Closed;
            if media_closed {
                self.open_media();
            }
        }
    }

    fn open_media(&mut self) {
        let state = match self.source.open() {
            Ok(()) => {
                self.logger.info("Frame source open");
                MediaState::Open
            }
            Err(e) => {
                log::error!("{e}");
                MediaState::Failed(e)
            }
        };
        *self.shared.media() = state;
    }

    fn run_cycle(&mut self, permit: CyclePermit) {
        let outcome = self.cycle.run(
            self.source.as_mut(),
            self.detector.as_mut(),
            &self.publisher,
            self.logger.as_mut(),
        );
        drop(permit);

        let stats = &self.shared.stats;
        match outcome {
            Ok(CycleOutcome::Published(_)) => stats.record_published(),
            Ok(CycleOutcome::FrameNotReady) => {
                log::debug!("Frame not ready; cycle skipped");
                stats.record_frame_not_ready();
            }
            Ok(CycleOutcome::Discarded) => stats.record_discarded(),
            Err(e) => {
                log::warn!("{e}");
                stats.record_failure();
            }
        }
    }
}
