use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use sensorpipe_decode::{Decode, Decoder, DecoderConfig, DecoderStats, Input, StructuredRecord};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, StageError};
use crate::stage::{RecordStage, Source, Stage};
use crate::status::{PipelineState, PipelineStatus, QueueDepth, StageStatus};

/// Runs one sensor's stages, one Tokio task per stage collaborator.
///
/// Workers are connected by bounded channels of `queue_capacity` items. The
/// Acquire and Decode stages always run; Process, Analyze, Emit and Persist
/// run when collaborators are attached. A stage may hold a chain of
/// collaborators, run in the order they were added, each with its own task
/// and input queue. The last worker drops its output after counting it.
///
/// Shutdown is cooperative: workers check the stop signal whenever they wait
/// on a queue, never in the middle of handling an item.
pub struct PipelineExecutor {
    config: PipelineConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    pause: watch::Sender<bool>,
    parts: Option<Parts>,
    handles: Vec<(Stage, JoinHandle<()>)>,
    queues: Vec<QueueProbe>,
    panicked: Vec<Stage>,
}

struct Parts {
    source: Box<dyn Source>,
    decoder: Decoder,
    record_stages: Vec<(Stage, Box<dyn RecordStage>)>,
}

impl PipelineExecutor {
    /// Create a pipeline with the default [`PipelineConfig`].
    pub fn new(id: impl Into<String>, source: impl Source + 'static, decoder: Decoder) -> Self {
        let shared = Arc::new(Shared {
            id: id.into(),
            state: AtomicU8::new(PipelineState::Created as u8),
            stages: Mutex::new(vec![
                StageStatus::new(Stage::Acquire, None),
                StageStatus::new(Stage::Decode, Some(decoder.name().to_string())),
            ]),
            decoder: Mutex::new(decoder.stats().clone()),
        });
        let (pause, _) = watch::channel(false);

        Self {
            config: PipelineConfig::default(),
            shared,
            cancel: CancellationToken::new(),
            pause,
            parts: Some(Parts {
                source: Box::new(source),
                decoder,
                record_stages: Vec::new(),
            }),
            handles: Vec::new(),
            queues: Vec::new(),
            panicked: Vec::new(),
        }
    }

    /// Build the decoder from configuration.
    pub fn from_config(
        id: impl Into<String>,
        source: impl Source + 'static,
        decoder: DecoderConfig,
        config: PipelineConfig,
    ) -> Result<Self> {
        let decoder = Decoder::from_config(decoder)?;
        Ok(Self::new(id, source, decoder).with_config(config))
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_processor(self, handler: impl RecordStage + 'static) -> Self {
        self.with_record_stage(Stage::Process, Box::new(handler))
    }

    pub fn with_analyzer(self, handler: impl RecordStage + 'static) -> Self {
        self.with_record_stage(Stage::Analyze, Box::new(handler))
    }

    pub fn with_emitter(self, handler: impl RecordStage + 'static) -> Self {
        self.with_record_stage(Stage::Emit, Box::new(handler))
    }

    pub fn with_persister(self, handler: impl RecordStage + 'static) -> Self {
        self.with_record_stage(Stage::Persist, Box::new(handler))
    }

    /// Append `handler` to the chain for `stage`. Both sorts are stable, so
    /// status slot `2 + i` always belongs to `record_stages[i]`.
    fn with_record_stage(mut self, stage: Stage, handler: Box<dyn RecordStage>) -> Self {
        let Some(parts) = self.parts.as_mut() else {
            return self;
        };
        let name = handler.name().to_string();
        parts.record_stages.push((stage, handler));
        parts.record_stages.sort_by_key(|(s, _)| *s);

        let mut stages = lock(&self.shared.stages);
        stages.push(StageStatus::new(stage, Some(name)));
        stages.sort_by_key(|s| s.stage);
        drop(stages);
        self
    }

    pub fn id(&self) -> &str {
        &self.shared.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow()
    }

    /// Spawn every stage worker and enter [`PipelineState::Running`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != PipelineState::Created {
            return Err(PipelineError::AlreadyStarted(self.shared.id.clone()));
        }
        let Some(parts) = self.parts.take() else {
            return Err(PipelineError::AlreadyStarted(self.shared.id.clone()));
        };

        let capacity = self.config.queue_capacity.max(1);
        self.shared.set_state(PipelineState::Running);
        for status in lock(&self.shared.stages).iter_mut() {
            status.alive = true;
        }

        let (chunk_tx, chunk_rx) = mpsc::channel::<Input>(capacity);
        self.queues.push(QueueProbe::new(Stage::Acquire, Stage::Decode, &chunk_tx));
        let acquire = run_acquire(
            self.worker(ACQUIRE_SLOT),
            parts.source,
            chunk_tx,
            self.pause.subscribe(),
        );
        self.spawn(Stage::Acquire, acquire);

        let mut record_stages = parts.record_stages.into_iter().peekable();

        let mut upstream = None;
        let decode_tx = match record_stages.peek() {
            Some((next, _)) => {
                let (tx, rx) = mpsc::channel::<StructuredRecord>(capacity);
                self.queues.push(QueueProbe::new(Stage::Decode, *next, &tx));
                upstream = Some(rx);
                Some(tx)
            }
            None => None,
        };
        let decode = run_decode(
            self.worker(DECODE_SLOT),
            parts.decoder,
            chunk_rx,
            decode_tx,
        );
        self.spawn(Stage::Decode, decode);

        let mut slot = FIRST_RECORD_SLOT;
        while let Some((stage, handler)) = record_stages.next() {
            let Some(rx) = upstream.take() else {
                break;
            };
            let tx = match record_stages.peek() {
                Some((next, _)) => {
                    let (tx, rx) = mpsc::channel::<StructuredRecord>(capacity);
                    self.queues.push(QueueProbe::new(stage, *next, &tx));
                    upstream = Some(rx);
                    Some(tx)
                }
                None => None,
            };
            let worker = run_record_stage(self.worker(slot), handler, rx, tx);
            self.spawn(stage, worker);
            slot += 1;
        }

        tracing::info!(
            pipeline = %self.shared.id,
            stages = self.handles.len(),
            queue_capacity = capacity,
            "pipeline started"
        );
        Ok(())
    }

    /// Stop pulling new input. Items already queued keep flowing.
    ///
    /// Allowed before [`start`](Self::start), so a pipeline can start paused.
    pub fn pause(&self) -> Result<()> {
        self.ensure_active()?;
        if !self.pause.send_replace(true) {
            tracing::info!(pipeline = %self.shared.id, "pipeline paused");
        }
        Ok(())
    }

    pub fn resume(&self) -> Result<()> {
        self.ensure_active()?;
        if self.pause.send_replace(false) {
            tracing::info!(pipeline = %self.shared.id, "pipeline resumed");
        }
        Ok(())
    }

    /// Signal every worker to stop and wait, up to `join_timeout`, for them
    /// to exit. Items still queued are dropped.
    ///
    /// The pipeline is [`PipelineState::Stopped`] afterwards even when an
    /// error is returned: workers that missed the deadline are aborted and
    /// reported as [`PipelineError::JoinTimeout`].
    pub async fn stop(&mut self) -> Result<()> {
        match self.state() {
            PipelineState::Created => {
                return Err(PipelineError::NotRunning(self.shared.id.clone()))
            }
            PipelineState::Stopped => return Ok(()),
            PipelineState::Running | PipelineState::Stopping => {}
        }
        if self.shared.begin_stopping() {
            tracing::info!(pipeline = %self.shared.id, "stopping pipeline");
        }
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the pipeline to finish on its own: the source reaches end of
    /// stream and every stage drains, or a fatal stage error stops it.
    pub async fn wait(&mut self) -> Result<()> {
        match self.state() {
            PipelineState::Created => {
                return Err(PipelineError::NotRunning(self.shared.id.clone()))
            }
            PipelineState::Stopped => return Ok(()),
            PipelineState::Running | PipelineState::Stopping => {}
        }

        let cancel = self.cancel.clone();
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = join_finished(&mut self.handles, &mut self.panicked) => {}
        }

        if self.shared.begin_stopping() {
            tracing::info!(pipeline = %self.shared.id, "pipeline finished");
        }
        self.cancel.cancel();
        self.join().await
    }

    pub fn status(&self) -> PipelineStatus {
        PipelineStatus {
            id: self.shared.id.clone(),
            state: self.state(),
            paused: self.is_paused(),
            stages: lock(&self.shared.stages).clone(),
            queues: self.queues.iter().map(QueueProbe::depth).collect(),
            decoder: lock(&self.shared.decoder).clone(),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state() {
            PipelineState::Created | PipelineState::Running => Ok(()),
            PipelineState::Stopping | PipelineState::Stopped => {
                Err(PipelineError::NotRunning(self.shared.id.clone()))
            }
        }
    }

    fn worker(&self, slot: usize) -> Worker {
        Worker {
            slot,
            shared: Arc::clone(&self.shared),
            cancel: self.cancel.clone(),
            stage_timeout: self.config.stage_timeout,
        }
    }

    fn spawn<F>(&mut self, stage: Stage, worker: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::info_span!("stage", pipeline = %self.shared.id, stage = %stage);
        self.handles.push((stage, tokio::spawn(worker.instrument(span))));
    }

    async fn join(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.join_timeout;
        let mut stuck = Vec::new();

        for (stage, mut handle) in std::mem::take(&mut self.handles) {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_panic() => {
                    tracing::error!(
                        pipeline = %self.shared.id,
                        stage = %stage,
                        "stage worker panicked"
                    );
                    self.panicked.push(stage);
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    handle.abort();
                    tracing::error!(
                        pipeline = %self.shared.id,
                        stage = %stage,
                        timeout = ?self.config.join_timeout,
                        "stage worker did not exit in time, aborted"
                    );
                    stuck.push(stage);
                }
            }
        }

        for status in lock(&self.shared.stages).iter_mut() {
            status.alive = false;
        }
        self.shared.set_state(PipelineState::Stopped);
        tracing::info!(pipeline = %self.shared.id, "pipeline stopped");

        if !stuck.is_empty() {
            return Err(PipelineError::JoinTimeout { stages: stuck });
        }
        if !self.panicked.is_empty() {
            return Err(PipelineError::WorkerPanicked {
                stages: std::mem::take(&mut self.panicked),
            });
        }
        if let Some((stage, message)) = self.shared.fatal() {
            return Err(PipelineError::StageFailed { stage, message });
        }
        Ok(())
    }
}

impl Drop for PipelineExecutor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Join workers in order, removing each one as it completes. Safe to drop
/// mid-way: unfinished handles stay in `handles`.
async fn join_finished(handles: &mut Vec<(Stage, JoinHandle<()>)>, panicked: &mut Vec<Stage>) {
    while !handles.is_empty() {
        let result = (&mut handles[0].1).await;
        let (stage, _) = handles.remove(0);
        if matches!(result, Err(ref err) if err.is_panic()) {
            panicked.push(stage);
        }
    }
}

const ACQUIRE_SLOT: usize = 0;
const DECODE_SLOT: usize = 1;
const FIRST_RECORD_SLOT: usize = 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State visible to both the executor and its workers.
struct Shared {
    id: String,
    state: AtomicU8,
    stages: Mutex<Vec<StageStatus>>,
    decoder: Mutex<DecoderStats>,
}

impl Shared {
    fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Running to Stopping. Returns false if the pipeline was not running.
    fn begin_stopping(&self) -> bool {
        self.state
            .compare_exchange(
                PipelineState::Running as u8,
                PipelineState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn update(&self, slot: usize, f: impl FnOnce(&mut StageStatus)) {
        if let Some(status) = lock(&self.stages).get_mut(slot) {
            f(status);
        }
    }

    fn fatal(&self) -> Option<(Stage, String)> {
        lock(&self.stages)
            .iter()
            .find_map(|s| s.fatal.clone().map(|msg| (s.stage, msg)))
    }
}

struct QueueProbe {
    from: Stage,
    to: Stage,
    capacity: usize,
    depth: Box<dyn Fn() -> usize + Send + Sync>,
}

impl QueueProbe {
    fn new<T: Send + 'static>(from: Stage, to: Stage, tx: &mpsc::Sender<T>) -> Self {
        let weak = tx.downgrade();
        Self {
            from,
            to,
            capacity: tx.max_capacity(),
            depth: Box::new(move || {
                weak.upgrade()
                    .map_or(0, |tx| tx.max_capacity() - tx.capacity())
            }),
        }
    }

    fn depth(&self) -> QueueDepth {
        QueueDepth {
            from: self.from,
            to: self.to,
            depth: (self.depth)(),
            capacity: self.capacity,
        }
    }
}

/// Per-task handle on the shared state and the stop signal.
struct Worker {
    /// Index of this worker's entry in `Shared::stages`.
    slot: usize,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    stage_timeout: Duration,
}

impl Worker {
    /// Next item, or `None` once the queue is closed and drained or stop is
    /// signalled. Waits in `stage_timeout` slices.
    async fn recv<T>(&self, rx: &mut mpsc::Receiver<T>) -> Option<T> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                next = tokio::time::timeout(self.stage_timeout, rx.recv()) => match next {
                    Ok(item) => return item,
                    Err(_elapsed) => continue,
                },
            }
        }
    }

    /// Blocks while the queue is full. Returns false if stop was signalled
    /// or the downstream stage is gone.
    async fn send<T>(&self, tx: &mpsc::Sender<T>, item: T) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        }
    }

    fn count_in(&self) {
        self.shared.update(self.slot, |s| s.items_in += 1);
    }

    fn count_out(&self) {
        self.shared.update(self.slot, |s| s.items_out += 1);
    }

    fn recoverable(&self, message: String) {
        tracing::warn!(error = %message, "recoverable stage error");
        self.shared.update(self.slot, |s| {
            s.recoverable_errors += 1;
            s.last_error = Some(message);
        });
    }

    fn fatal(&self, message: String) {
        tracing::error!(error = %message, "fatal stage error, stopping pipeline");
        self.shared.update(self.slot, |s| {
            s.last_error = Some(message.clone());
            s.fatal = Some(message);
        });
        self.shared.begin_stopping();
        self.cancel.cancel();
    }

    /// Record `err`. Returns true if the worker should keep going.
    fn on_error(&self, err: StageError) -> bool {
        match err {
            StageError::Recoverable(message) => {
                self.recoverable(message);
                true
            }
            StageError::Fatal(message) => {
                self.fatal(message);
                false
            }
        }
    }

    fn finish(&self) {
        self.shared.update(self.slot, |s| s.alive = false);
        tracing::debug!("stage worker exited");
    }
}

async fn run_acquire(
    worker: Worker,
    mut source: Box<dyn Source>,
    tx: mpsc::Sender<Input>,
    mut paused: watch::Receiver<bool>,
) {
    'run: loop {
        loop {
            let is_paused = *paused.borrow_and_update();
            if !is_paused {
                break;
            }
            tokio::select! {
                biased;
                _ = worker.cancel.cancelled() => break 'run,
                changed = paused.changed() => if changed.is_err() {
                    break 'run;
                },
            }
        }

        let next = tokio::select! {
            biased;
            _ = worker.cancel.cancelled() => break,
            next = source.next_chunk() => next,
        };

        match next {
            Ok(Some(input)) => {
                worker.count_in();
                if !worker.send(&tx, input).await {
                    break;
                }
                worker.count_out();
            }
            Ok(None) => {
                tracing::info!("source reached end of stream");
                break;
            }
            Err(err) => {
                if !worker.on_error(err) {
                    break;
                }
            }
        }
    }
    worker.finish();
}

async fn run_decode(
    worker: Worker,
    mut decoder: Decoder,
    mut rx: mpsc::Receiver<Input>,
    tx: Option<mpsc::Sender<StructuredRecord>>,
) {
    'run: while let Some(input) = worker.recv(&mut rx).await {
        worker.count_in();
        let result = decoder.decode(input);
        *lock(&worker.shared.decoder) = decoder.stats().clone();

        match result {
            Ok(records) => {
                for record in records {
                    if let Some(tx) = &tx {
                        if !worker.send(tx, record).await {
                            break 'run;
                        }
                    }
                    worker.count_out();
                }
            }
            Err(err) => worker.recoverable(err.to_string()),
        }
    }
    worker.finish();
}

async fn run_record_stage(
    worker: Worker,
    mut handler: Box<dyn RecordStage>,
    mut rx: mpsc::Receiver<StructuredRecord>,
    tx: Option<mpsc::Sender<StructuredRecord>>,
) {
    while let Some(record) = worker.recv(&mut rx).await {
        worker.count_in();
        match handler.handle(record).await {
            Ok(Some(record)) => {
                if let Some(tx) = &tx {
                    if !worker.send(tx, record).await {
                        break;
                    }
                }
                worker.count_out();
            }
            Ok(None) => {}
            Err(err) => {
                if !worker.on_error(err) {
                    break;
                }
            }
        }
    }
    worker.finish();
}

#[cfg(test)]
mod tests {
    use sensorpipe_decode::{Format, MultiFormatConfig};

    use super::*;
    use crate::stage::{from_fn, ChannelSource};

    fn csv_decoder() -> Decoder {
        Decoder::from_config(DecoderConfig::MultiFormat(MultiFormatConfig {
            format: Format::Csv,
            has_header: false,
            field_mapping: sensorpipe_decode::FieldMapping::from_pairs([("field0", "timestamp")]),
            ..Default::default()
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let (_tx, source) = ChannelSource::channel(1);
        let mut exec = PipelineExecutor::new("p", source, csv_decoder());
        assert_eq!(exec.state(), PipelineState::Created);
        assert!(matches!(exec.stop().await, Err(PipelineError::NotRunning(_))));

        exec.start().unwrap();
        assert_eq!(exec.state(), PipelineState::Running);
        assert!(matches!(exec.start(), Err(PipelineError::AlreadyStarted(_))));

        exec.stop().await.unwrap();
        assert_eq!(exec.state(), PipelineState::Stopped);
        assert!(exec.status().stages.iter().all(|s| !s.alive));

        // Terminal.
        assert!(matches!(exec.start(), Err(PipelineError::AlreadyStarted(_))));
        exec.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_status_lists_configured_stages_in_order() {
        let (_tx, source) = ChannelSource::channel(1);
        let exec = PipelineExecutor::new("p", source, csv_decoder())
            .with_persister(from_fn("db", |r| Ok(Some(r))))
            .with_processor(from_fn("scale", |r| Ok(Some(r))));

        let stages: Vec<Stage> = exec.status().stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Acquire, Stage::Decode, Stage::Process, Stage::Persist]
        );
        assert_eq!(
            exec.status().stage(Stage::Decode).unwrap().handler.as_deref(),
            Some("multi_format")
        );
    }

    #[tokio::test]
    async fn test_collaborators_chain_within_a_stage() {
        let (_tx, source) = ChannelSource::channel(1);
        let exec = PipelineExecutor::new("p", source, csv_decoder())
            .with_processor(from_fn("first", |r| Ok(Some(r))))
            .with_emitter(from_fn("out", |r| Ok(Some(r))))
            .with_processor(from_fn("second", |r| Ok(Some(r))));

        let status = exec.status();
        let stages: Vec<Stage> = status.stages.iter().map(|s| s.stage).collect();
        assert_eq!(
            stages,
            vec![Stage::Acquire, Stage::Decode, Stage::Process, Stage::Process, Stage::Emit]
        );
        let names: Vec<&str> = status
            .stages
            .iter()
            .filter_map(|s| s.handler.as_deref())
            .collect();
        assert_eq!(names, vec!["multi_format", "first", "second", "out"]);
    }

    #[tokio::test]
    async fn test_pause_rejected_after_stop() {
        let (_tx, source) = ChannelSource::channel(1);
        let mut exec = PipelineExecutor::new("p", source, csv_decoder());

        exec.pause().unwrap();
        exec.start().unwrap();
        assert!(exec.is_paused());
        exec.resume().unwrap();
        assert!(!exec.is_paused());

        exec.stop().await.unwrap();
        assert!(matches!(exec.pause(), Err(PipelineError::NotRunning(_))));
    }

    #[tokio::test]
    async fn test_queue_probe_reports_depth() {
        let (tx, _rx) = mpsc::channel::<u8>(3);
        let probe = QueueProbe::new(Stage::Acquire, Stage::Decode, &tx);
        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();

        let depth = probe.depth();
        assert_eq!(depth.depth, 2);
        assert_eq!(depth.capacity, 3);

        drop(tx);
        assert_eq!(probe.depth().depth, 0);
    }
}
