//! People counter
//!
//! Counts people in a video stream with an object detector, tracks occupancy
//! over time and publishes the result to an MQTT broker.
//!
//! # Pipeline
//!
//! Each frame goes through the same steps on the driver thread:
//!
//! 1. **Ingest**: `VideoSource` reads the next frame (synthetic, still image or FFmpeg).
//! 2. **Detect**: the `InferenceWorker` runs the detector backend with a bounded wait.
//! 3. **Filter**: detections strictly above the confidence threshold become pixel boxes.
//! 4. **Track**: `OccupancyTracker` turns the count into entry, exit and heartbeat events.
//! 5. **Publish**: `EventPublisher` sends each event to the bus, best effort.
//! 6. **Annotate**: boxes, latency, count and the capacity alert are drawn on the frame.
//! 7. **Sink**: the frame is written to stdout, a snapshot file, or dropped.
//!
//! # Module Structure
//!
//! - `frame`: frames and the stream clock
//! - `ingest`: frame sources
//! - `detect`: backends, inference worker, confidence filter
//! - `tracker`: occupancy state machine
//! - `publish`: event encoding and the bus trait
//! - `transport`: MQTT client and broker endpoint policy
//! - `annotate`: frame overlay
//! - `sink`: frame output
//! - `pipeline`: the stream driver
//! - `config`: file and environment configuration

pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod publish;
pub mod sink;
pub mod tracker;
pub mod transport;

pub use annotate::FrameAnnotator;
pub use config::{CounterConfig, SinkKind};
pub use detect::{
    filter_detections, open_backend, Detection, DetectorBackend, FilteredDetection,
    FrameObservation, InferenceOutput, InferenceWorker, ModelInput, PixelBox, StubBackend,
};
pub use frame::{Frame, StreamClock};
pub use ingest::{FrameSource, SourceKind, VideoSource};
pub use pipeline::{PipelineConfig, RunSummary, StreamDriver};
pub use publish::{EventBus, EventPublisher, NullBus, PublishStats};
pub use sink::{FrameSink, NullSink, RawSink, SnapshotSink};
pub use tracker::{OccupancyEvent, OccupancyTracker, Phase};
pub use transport::MqttBus;
