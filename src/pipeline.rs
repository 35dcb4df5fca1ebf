//! Stream driver.
//!
//! One frame at a time: read, infer (bounded wait on the worker), filter,
//! track, publish, annotate, write to the sink. The driver owns the tracker,
//! so there is no shared state beyond the stop flag.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::annotate::FrameAnnotator;
use crate::config::CounterConfig;
use crate::detect::{filter_detections, FrameObservation, InferenceWorker, ModelInput};
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceKind};
use crate::publish::{EventBus, EventPublisher, PublishStats};
use crate::sink::FrameSink;
use crate::tracker::OccupancyTracker;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);
/// Read failures in a row after which the source is treated as lost.
pub const MAX_CONSECUTIVE_SOURCE_ERRORS: u32 = 5;

/// Per-run driver parameters.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Detections must be strictly above this confidence.
    pub prob_threshold: f32,
    /// Minimum spacing between frame reads. Only synthetic sources are paced;
    /// real sources deliver at their own rate.
    pub frame_interval: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_config(cfg: &CounterConfig) -> Self {
        let paced = SourceKind::classify(&cfg.source.input) == SourceKind::Synthetic
            && cfg.source.target_fps > 0;
        Self {
            prob_threshold: cfg.tracking.prob_threshold,
            frame_interval: paced
                .then(|| Duration::from_secs(1) / cfg.source.target_fps),
        }
    }
}

/// Counters reported when the stream ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub source_errors: u64,
    pub sink_failures: u64,
    pub total_count: u64,
    pub publish: PublishStats,
}

pub struct StreamDriver<S: FrameSource, B: EventBus, K: FrameSink> {
    config: PipelineConfig,
    source: S,
    worker: InferenceWorker,
    tracker: OccupancyTracker,
    publisher: EventPublisher<B>,
    annotator: FrameAnnotator,
    sink: K,
    stop: Arc<AtomicBool>,
    summary: RunSummary,
}

impl<S: FrameSource, B: EventBus, K: FrameSink> StreamDriver<S, B, K> {
    pub fn new(
        config: PipelineConfig,
        source: S,
        worker: InferenceWorker,
        bus: B,
        annotator: FrameAnnotator,
        sink: K,
    ) -> Self {
        Self {
            config,
            source,
            worker,
            tracker: OccupancyTracker::new(),
            publisher: EventPublisher::new(bus),
            annotator,
            sink,
            stop: Arc::new(AtomicBool::new(false)),
            summary: RunSummary::default(),
        }
    }

    /// Flag that ends the run at the next frame boundary when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Drive the stream until the source ends, keeps failing, or the stop flag
    /// is set. A single failed read is skipped like a failed frame.
    pub fn run(&mut self) -> Result<RunSummary> {
        log::info!(
            "stream driver running: source={} backend={} timeout={}ms threshold={} alert_capacity={}",
            self.source.describe(),
            self.worker.backend_name(),
            self.worker.timeout().as_millis(),
            self.config.prob_threshold,
            self.annotator.alert_capacity()
        );
        let mut last_health_log = Instant::now();
        let mut consecutive_errors = 0u32;

        loop {
            if self.stop.load(Ordering::SeqCst) {
                log::info!("stop requested, ending stream");
                break;
            }
            let started = Instant::now();

            let frame = match self.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    log::info!("end of stream: {}", self.source.describe());
                    break;
                }
                Err(e) => {
                    self.summary.source_errors += 1;
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_SOURCE_ERRORS {
                        log::error!(
                            "source {} failed {} times in a row, ending stream: {:#}",
                            self.source.describe(),
                            consecutive_errors,
                            e
                        );
                        break;
                    }
                    log::warn!("source {} read failed: {:#}", self.source.describe(), e);
                    continue;
                }
            };
            consecutive_errors = 0;
            self.summary.frames_read += 1;
            self.process_frame(frame);

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let publish = self.publisher.stats();
                log::info!(
                    "stream health: frames={} processed={} skipped={} count={} total={} published={} publish_failed={}",
                    self.source.frames_captured(),
                    self.summary.frames_processed,
                    self.summary.frames_skipped,
                    self.tracker.last_count(),
                    self.tracker.total_count(),
                    publish.published,
                    publish.failed
                );
                last_health_log = Instant::now();
            }

            if let Some(interval) = self.config.frame_interval {
                if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                    std::thread::sleep(remaining);
                }
            }
        }

        Ok(self.summary())
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            total_count: self.tracker.total_count(),
            publish: self.publisher.stats(),
            ..self.summary
        }
    }

    /// Tear down the driver. The inference worker is joined here; the bus is
    /// handed back so the caller can disconnect it.
    pub fn finish(self) -> (B, K) {
        let Self {
            worker,
            publisher,
            sink,
            ..
        } = self;
        drop(worker);
        (publisher.into_bus(), sink)
    }

    fn process_frame(&mut self, mut frame: Frame) {
        let input = ModelInput::prepare(&frame.image, self.worker.input_size());
        match self.worker.infer(input) {
            Ok(output) => {
                let filtered = filter_detections(
                    &output.detections,
                    self.config.prob_threshold,
                    frame.width(),
                    frame.height(),
                );
                let observation = FrameObservation::new(frame.timestamp, &filtered);
                for event in self.tracker.observe(&observation) {
                    self.publisher.publish(&event);
                }
                self.annotator.annotate(
                    &mut frame,
                    observation.boxes(),
                    observation.count(),
                    output.latency,
                );
                self.summary.frames_processed += 1;
            }
            Err(e) => {
                self.summary.frames_skipped += 1;
                log::warn!("frame {} skipped: {:#}", frame.sequence, e);
            }
        }

        if let Err(e) = self.sink.write_frame(&frame) {
            self.summary.sink_failures += 1;
            log::warn!("frame {} not written: {:#}", frame.sequence, e);
        }
    }
}
