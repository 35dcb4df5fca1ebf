use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use people_counter::pipeline::MAX_CONSECUTIVE_SOURCE_ERRORS;
use people_counter::{
    Detection, DetectorBackend, EventBus, Frame, FrameAnnotator, FrameSink, FrameSource,
    InferenceWorker, ModelInput, NullBus, NullSink, PipelineConfig, StreamDriver, StubBackend,
    VideoSource,
};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

/// Frames one second apart. Selected reads fail without consuming a frame.
struct ScriptedSource {
    remaining: VecDeque<Frame>,
    failing_reads: Vec<u64>,
    fail_from: Option<u64>,
    reads: u64,
}

impl ScriptedSource {
    fn new(frames: usize) -> Self {
        let remaining = (0..frames)
            .map(|i| {
                Frame::new(
                    RgbImage::from_pixel(100, 100, GREEN),
                    Duration::from_secs(i as u64),
                    i as u64 + 1,
                )
            })
            .collect();
        Self {
            remaining,
            failing_reads: Vec::new(),
            fail_from: None,
            reads: 0,
        }
    }

    fn failing_reads(mut self, reads: &[u64]) -> Self {
        self.failing_reads = reads.to_vec();
        self
    }

    /// Every read from `read` on fails.
    fn failing_from(mut self, read: u64) -> Self {
        self.fail_from = Some(read);
        self
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.reads += 1;
        if self.failing_reads.contains(&self.reads) {
            return Err(anyhow!("corrupt packet"));
        }
        if self.fail_from.is_some_and(|from| self.reads >= from) {
            return Err(anyhow!("camera unplugged"));
        }
        Ok(self.remaining.pop_front())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn frames_captured(&self) -> u64 {
        self.reads
    }
}

#[derive(Default)]
struct RecordingBus {
    messages: Vec<(String, String)>,
}

impl EventBus for RecordingBus {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self.messages
            .push((topic.to_string(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    frames: Vec<Frame>,
}

impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(Frame::new(
            frame.image.clone(),
            frame.timestamp,
            frame.sequence,
        ));
        Ok(())
    }
}

struct BrokenSink;

impl FrameSink for BrokenSink {
    fn write_frame(&mut self, _frame: &Frame) -> Result<()> {
        Err(anyhow!("broken pipe"))
    }
}

/// Replays counts like the stub backend, but errors on selected calls.
struct FlakyBackend {
    inner: StubBackend,
    calls: usize,
    fail_on: Vec<usize>,
}

impl DetectorBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn detect(&mut self, input: &ModelInput) -> Result<Vec<Detection>> {
        let call = self.calls;
        self.calls += 1;
        let detections = self.inner.detect(input)?;
        if self.fail_on.contains(&call) {
            return Err(anyhow!("accelerator fault"));
        }
        Ok(detections)
    }
}

fn pipeline() -> PipelineConfig {
    PipelineConfig {
        prob_threshold: 0.55,
        frame_interval: None,
    }
}

fn worker(backend: impl DetectorBackend + 'static) -> InferenceWorker {
    InferenceWorker::spawn(Box::new(backend), Duration::from_secs(5)).expect("spawn worker")
}

fn messages(list: &[(&str, &str)]) -> Vec<(String, String)> {
    list.iter()
        .map(|(topic, payload)| (topic.to_string(), payload.to_string()))
        .collect()
}

#[test]
fn publishes_entry_exit_and_heartbeat_events() {
    let counts = [0, 0, 1, 1, 2, 1, 0];
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(counts.len()),
        worker(StubBackend::from_counts(&counts, 0.9)),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        RecordingSink::default(),
    );

    let summary = driver.run().expect("run");
    assert_eq!(summary.frames_read, 7);
    assert_eq!(summary.frames_processed, 7);
    assert_eq!(summary.frames_skipped, 0);
    assert_eq!(summary.total_count, 2);
    assert_eq!(summary.publish.published, 11);
    assert_eq!(summary.publish.failed, 0);

    let (bus, sink) = driver.finish();
    assert_eq!(
        bus.messages,
        messages(&[
            ("person", r#"{"count":0}"#),
            ("person", r#"{"count":0}"#),
            ("person", r#"{"total":1}"#),
            ("person", r#"{"count":1}"#),
            ("person", r#"{"count":1}"#),
            ("person", r#"{"total":2}"#),
            ("person", r#"{"count":2}"#),
            ("person/duration", r#"{"duration":3}"#),
            ("person", r#"{"count":1}"#),
            ("person/duration", r#"{"duration":4}"#),
            ("person", r#"{"count":0}"#),
        ])
    );

    assert_eq!(sink.frames.len(), 7);
    let has_box = |frame: &Frame| frame.image.pixels().any(|p| *p == Rgb([255, 0, 0]));
    assert!(!has_box(&sink.frames[0]));
    assert!(has_box(&sink.frames[2]));
    assert!(!has_box(&sink.frames[6]));
}

#[test]
fn low_confidence_detections_are_not_counted() {
    let counts = [1, 2, 1];
    let mut driver = StreamDriver::new(
        PipelineConfig {
            prob_threshold: 0.55,
            frame_interval: None,
        },
        ScriptedSource::new(counts.len()),
        worker(StubBackend::from_counts(&counts, 0.55)),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        NullSink,
    );

    let summary = driver.run().expect("run");
    assert_eq!(summary.total_count, 0);

    let (bus, _) = driver.finish();
    assert_eq!(bus.messages.len(), 3);
    assert!(bus
        .messages
        .iter()
        .all(|(topic, payload)| topic == "person" && payload == r#"{"count":0}"#));
}

#[test]
fn failed_inference_skips_tracking_but_forwards_frame() {
    let backend = FlakyBackend {
        inner: StubBackend::from_counts(&[1, 1, 0, 1], 0.9),
        calls: 0,
        fail_on: vec![2],
    };
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(4),
        worker(backend),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        RecordingSink::default(),
    );

    let summary = driver.run().expect("run");
    assert_eq!(summary.frames_read, 4);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(summary.total_count, 1);

    let (bus, sink) = driver.finish();
    // The failed frame would have been an exit; it leaves no trace.
    assert_eq!(
        bus.messages,
        messages(&[
            ("person", r#"{"total":1}"#),
            ("person", r#"{"count":1}"#),
            ("person", r#"{"count":1}"#),
            ("person", r#"{"count":1}"#),
        ])
    );
    assert_eq!(sink.frames.len(), 4);
    assert!(sink.frames[2].image.pixels().all(|p| *p == GREEN));
}

#[test]
fn transient_source_errors_are_skipped() {
    let counts = [0, 1, 1, 2, 0];
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(counts.len()).failing_reads(&[2, 4, 5]),
        worker(StubBackend::from_counts(&counts, 0.9)),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        NullSink,
    );

    let summary = driver.run().expect("run");
    assert_eq!(summary.frames_read, 5);
    assert_eq!(summary.frames_processed, 5);
    assert_eq!(summary.source_errors, 3);
    assert_eq!(summary.total_count, 2);

    let (bus, _) = driver.finish();
    let heartbeats = bus
        .messages
        .iter()
        .filter(|(_, payload)| payload.starts_with(r#"{"count":"#))
        .count();
    assert_eq!(heartbeats, 5);
}

#[test]
fn persistent_source_errors_end_stream_gracefully() {
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(10).failing_from(4),
        worker(StubBackend::from_counts(&[1], 0.9)),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        NullSink,
    );

    let summary = driver.run().expect("source errors are not fatal");
    assert_eq!(summary.frames_read, 3);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(
        summary.source_errors,
        u64::from(MAX_CONSECUTIVE_SOURCE_ERRORS)
    );
    assert_eq!(summary.total_count, 1);
}

#[test]
fn sink_failures_do_not_stop_the_stream() {
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(3),
        worker(StubBackend::from_counts(&[0, 1, 0], 0.9)),
        NullBus,
        FrameAnnotator::new(5).unwrap(),
        BrokenSink,
    );

    let summary = driver.run().expect("run");
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.sink_failures, 3);
    assert_eq!(summary.total_count, 1);
}

#[test]
fn stop_flag_set_before_run_reads_nothing() {
    let mut driver = StreamDriver::new(
        pipeline(),
        ScriptedSource::new(3),
        worker(StubBackend::from_counts(&[1], 0.9)),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        NullSink,
    );
    driver.stop_handle().store(true, Ordering::SeqCst);

    let summary = driver.run().expect("run");
    assert_eq!(summary.frames_read, 0);
    let (bus, _) = driver.finish();
    assert!(bus.messages.is_empty());
}

#[test]
fn stop_flag_ends_endless_source() {
    let mut driver = StreamDriver::new(
        pipeline(),
        VideoSource::synthetic("stub://endless", 32, 24, None),
        worker(StubBackend::new()),
        RecordingBus::default(),
        FrameAnnotator::new(5).unwrap(),
        NullSink,
    );
    let stop = driver.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::SeqCst);
    });

    let summary = driver.run().expect("run");
    stopper.join().unwrap();
    assert!(summary.frames_read > 0);

    let (bus, _) = driver.finish();
    let heartbeats = bus
        .messages
        .iter()
        .filter(|(_, payload)| payload.starts_with(r#"{"count":"#))
        .count() as u64;
    assert_eq!(heartbeats, summary.frames_processed);
}
