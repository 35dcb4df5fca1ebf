//! people_counter - count people in a video stream and publish occupancy.
//!
//! This binary:
//! 1. Loads configuration (file, environment, then command line)
//! 2. Loads the detector backend onto its inference worker
//! 3. Opens the input (video, stream URL, camera, still image or `stub://`)
//! 4. Connects to the MQTT broker (topics `person`, `person/duration`)
//! 5. Runs the stream driver until end of stream or Ctrl-C
//!
//! Annotated frames go to stdout as raw RGB24 for an external FFmpeg server,
//! or to a snapshot file when the input is a single image.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use people_counter::{
    open_backend, CounterConfig, EventBus, FrameAnnotator, FrameSink, InferenceWorker, MqttBus,
    NullBus, NullSink, PipelineConfig, RawSink, SinkKind, SnapshotSink, StreamDriver, VideoSource,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Count people in a video stream and publish occupancy over MQTT"
)]
struct Args {
    /// JSON or TOML config file (falls back to PEOPLE_COUNTER_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input: video file, stream URL, `CAM`, an image file, or `stub://name`.
    #[arg(short, long)]
    input: Option<String>,

    /// ONNX detection model. Selects the tract backend.
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Minimum confidence for a detection to count (exclusive).
    #[arg(short = 'p', long)]
    prob_threshold: Option<f32>,

    /// Where annotated frames go: `stdout` (raw RGB24) or `none`.
    #[arg(long)]
    sink: Option<String>,

    /// Run without an MQTT broker; events are dropped.
    #[arg(long, env = "PEOPLE_COUNTER_NO_MQTT")]
    no_mqtt: bool,

    /// Allow non-loopback MQTT brokers.
    #[arg(long, env = "ALLOW_REMOTE_MQTT")]
    allow_remote_mqtt: bool,

    /// Startup progress output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,
}

/// Bus selected at startup.
enum OutputBus {
    Mqtt(MqttBus),
    Disabled(NullBus),
}

impl EventBus for OutputBus {
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        match self {
            OutputBus::Mqtt(bus) => bus.publish(topic, payload),
            OutputBus::Disabled(bus) => bus.publish(topic, payload),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        load_config(&args)?
    };

    let worker = {
        let mut stage = ui.stage("Load detector");
        let backend = open_backend(&cfg.model)?;
        let worker = InferenceWorker::spawn(backend, cfg.model.timeout)?;
        stage.set_detail(worker.backend_name());
        worker
    };

    let source = {
        let mut stage = ui.stage("Open input");
        let source = VideoSource::open(&cfg.source)?;
        stage.set_detail(cfg.source.input.clone());
        source
    };

    let annotator = FrameAnnotator::with_font_file(
        cfg.tracking.alert_capacity,
        cfg.overlay.font_path.as_deref(),
    )?;

    let bus = if cfg.mqtt.enabled {
        let mut stage = ui.stage("Connect MQTT");
        let bus = MqttBus::connect(&cfg.mqtt)?;
        stage.set_detail(cfg.mqtt.broker_addr.clone());
        OutputBus::Mqtt(bus)
    } else {
        log::info!("MQTT disabled; occupancy events are not published");
        OutputBus::Disabled(NullBus)
    };

    let sink: Box<dyn FrameSink> = if source.is_still_image() {
        let snapshot = SnapshotSink::new(&cfg.output.snapshot_path);
        log::info!(
            "single image input; annotated frame goes to {}",
            snapshot.path().display()
        );
        Box::new(snapshot)
    } else {
        match cfg.output.sink {
            SinkKind::Stdout => {
                if std::io::stdout().is_terminal() {
                    log::warn!("writing raw frames to a terminal; pipe stdout or use --sink none");
                }
                Box::new(RawSink::stdout())
            }
            SinkKind::Null => Box::new(NullSink),
        }
    };

    let mut driver = StreamDriver::new(
        PipelineConfig::from_config(&cfg),
        source,
        worker,
        bus,
        annotator,
        sink,
    );

    let stop = driver.stop_handle();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .context("install Ctrl-C handler")?;

    let summary = driver.run()?;
    let (bus, _sink) = driver.finish();
    if let OutputBus::Mqtt(bus) = bus {
        if let Err(e) = bus.disconnect() {
            log::warn!("{:#}", e);
        }
    }

    log::info!(
        "stream finished: frames={} processed={} skipped={} source_errors={} sink_failures={} total_count={} published={} publish_failed={}",
        summary.frames_read,
        summary.frames_processed,
        summary.frames_skipped,
        summary.source_errors,
        summary.sink_failures,
        summary.total_count,
        summary.publish.published,
        summary.publish.failed
    );
    Ok(())
}

fn load_config(args: &Args) -> Result<CounterConfig> {
    let mut cfg = CounterConfig::load(args.config.as_deref())?;
    if let Some(input) = &args.input {
        cfg.source.input = input.clone();
    }
    if let Some(model) = &args.model {
        cfg.model.path = Some(model.clone());
        cfg.model.backend = "tract".to_string();
    }
    if let Some(threshold) = args.prob_threshold {
        cfg.tracking.prob_threshold = threshold;
    }
    if let Some(sink) = &args.sink {
        cfg.output.sink = sink.parse()?;
    }
    if args.no_mqtt {
        cfg.mqtt.enabled = false;
    }
    if args.allow_remote_mqtt {
        cfg.mqtt.allow_remote = true;
    }
    cfg.validate()?;
    Ok(cfg)
}
