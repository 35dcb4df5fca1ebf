use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_INPUT: &str = "stub://entrance";
const DEFAULT_STUB_WIDTH: u32 = 640;
const DEFAULT_STUB_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_WIDTH: u32 = 544;
const DEFAULT_MODEL_HEIGHT: u32 = 320;
const DEFAULT_INFER_TIMEOUT_MS: u64 = 1_000;
const DEFAULT_PROB_THRESHOLD: f32 = 0.55;
const DEFAULT_ALERT_CAPACITY: usize = 5;
const DEFAULT_MQTT_BROKER_ADDR: &str = "127.0.0.1:3001";
const DEFAULT_MQTT_CLIENT_ID: &str = "people_counter";
const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 60;
const DEFAULT_SNAPSHOT_PATH: &str = "output_image.jpg";

#[derive(Debug, Deserialize, Default)]
struct CounterConfigFile {
    source: Option<SourceConfigFile>,
    model: Option<ModelConfigFile>,
    tracking: Option<TrackingConfigFile>,
    mqtt: Option<MqttConfigFile>,
    output: Option<OutputConfigFile>,
    overlay: Option<OverlayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    input: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    bgr: Option<bool>,
    scale: Option<f32>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackingConfigFile {
    prob_threshold: Option<f32>,
    alert_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    enabled: Option<bool>,
    broker_addr: Option<String>,
    client_id: Option<String>,
    username: Option<String>,
    password: Option<String>,
    use_tls: Option<bool>,
    tls_ca_path: Option<PathBuf>,
    tls_client_cert_path: Option<PathBuf>,
    tls_client_key_path: Option<PathBuf>,
    allow_remote: Option<bool>,
    keep_alive_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    sink: Option<String>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
}

/// Configuration for one stream run.
#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub source: SourceSettings,
    pub model: ModelSettings,
    pub tracking: TrackingSettings,
    pub mqtt: MqttSettings,
    pub output: OutputSettings,
    pub overlay: OverlaySettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://name`, a still image path, or a video file/URL.
    pub input: String,
    /// Frame size for synthetic sources.
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// `stub` or `tract`.
    pub backend: String,
    pub path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub bgr: bool,
    pub scale: f32,
    /// Upper bound on one inference request.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Detections must be strictly above this confidence.
    pub prob_threshold: f32,
    /// Counts above this raise the overlay alert.
    pub alert_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub enabled: bool,
    pub broker_addr: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub tls_ca_path: Option<PathBuf>,
    pub tls_client_cert_path: Option<PathBuf>,
    pub tls_client_key_path: Option<PathBuf>,
    pub allow_remote: bool,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Raw RGB24 frames on stdout.
    Stdout,
    /// Discard frames.
    Null,
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "stdout" | "raw" => Ok(Self::Stdout),
            "none" | "null" => Ok(Self::Null),
            other => Err(anyhow!(
                "unknown output sink '{}': expected 'stdout' or 'none'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub sink: SinkKind,
    /// Where the annotated frame is written in single-image mode.
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct OverlaySettings {
    /// TrueType/OpenType font for overlay text, replacing the bundled one.
    pub font_path: Option<PathBuf>,
}

impl CounterConfig {
    /// Load configuration from `path` (or `PEOPLE_COUNTER_CONFIG`), apply
    /// environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PEOPLE_COUNTER_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in defaults, without reading files or the environment.
    pub fn defaults() -> Result<Self> {
        Self::from_file(CounterConfigFile::default())
    }

    fn from_file(file: CounterConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            input: source_file
                .input
                .unwrap_or_else(|| DEFAULT_INPUT.to_string()),
            width: source_file.width.unwrap_or(DEFAULT_STUB_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_STUB_HEIGHT),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            path: model_file.path,
            input_width: model_file.input_width.unwrap_or(DEFAULT_MODEL_WIDTH),
            input_height: model_file.input_height.unwrap_or(DEFAULT_MODEL_HEIGHT),
            bgr: model_file.bgr.unwrap_or(true),
            scale: model_file.scale.unwrap_or(1.0),
            timeout: Duration::from_millis(
                model_file.timeout_ms.unwrap_or(DEFAULT_INFER_TIMEOUT_MS),
            ),
        };

        let tracking_file = file.tracking.unwrap_or_default();
        let tracking = TrackingSettings {
            prob_threshold: tracking_file
                .prob_threshold
                .unwrap_or(DEFAULT_PROB_THRESHOLD),
            alert_capacity: tracking_file
                .alert_capacity
                .unwrap_or(DEFAULT_ALERT_CAPACITY),
        };

        let mqtt_file = file.mqtt.unwrap_or_default();
        let mqtt = MqttSettings {
            enabled: mqtt_file.enabled.unwrap_or(true),
            broker_addr: mqtt_file
                .broker_addr
                .unwrap_or_else(|| DEFAULT_MQTT_BROKER_ADDR.to_string()),
            client_id: mqtt_file
                .client_id
                .unwrap_or_else(|| DEFAULT_MQTT_CLIENT_ID.to_string()),
            username: mqtt_file.username,
            password: mqtt_file.password,
            use_tls: mqtt_file.use_tls.unwrap_or(false),
            tls_ca_path: mqtt_file.tls_ca_path,
            tls_client_cert_path: mqtt_file.tls_client_cert_path,
            tls_client_key_path: mqtt_file.tls_client_key_path,
            allow_remote: mqtt_file.allow_remote.unwrap_or(false),
            keep_alive: Duration::from_secs(
                mqtt_file
                    .keep_alive_secs
                    .unwrap_or(DEFAULT_MQTT_KEEP_ALIVE_SECS),
            ),
        };

        let output_file = file.output.unwrap_or_default();
        let output = OutputSettings {
            sink: match output_file.sink.as_deref() {
                Some(sink) => sink.parse()?,
                None => SinkKind::Stdout,
            },
            snapshot_path: output_file
                .snapshot_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
        };

        let overlay = OverlaySettings {
            font_path: file.overlay.and_then(|overlay| overlay.font_path),
        };

        Ok(Self {
            source,
            model,
            tracking,
            mqtt,
            output,
            overlay,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(input) = non_empty_env("PEOPLE_COUNTER_INPUT") {
            self.source.input = input;
        }
        if let Some(model) = non_empty_env("PEOPLE_COUNTER_MODEL") {
            self.model.path = Some(PathBuf::from(model));
            self.model.backend = "tract".to_string();
        }
        if let Some(threshold) = non_empty_env("PEOPLE_COUNTER_PROB_THRESHOLD") {
            self.tracking.prob_threshold = threshold.parse().map_err(|_| {
                anyhow!("PEOPLE_COUNTER_PROB_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Some(capacity) = non_empty_env("PEOPLE_COUNTER_ALERT_CAPACITY") {
            self.tracking.alert_capacity = capacity.parse().map_err(|_| {
                anyhow!("PEOPLE_COUNTER_ALERT_CAPACITY must be a non-negative integer")
            })?;
        }
        if let Some(addr) = non_empty_env("MQTT_BROKER_ADDR") {
            self.mqtt.broker_addr = addr;
        }
        if let Some(client_id) = non_empty_env("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(username) = non_empty_env("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = non_empty_env("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        Ok(())
    }

    /// Check cross-field constraints. Call again after applying CLI overrides.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.tracking.prob_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "probability threshold must be within 0..=1 (got {})",
                threshold
            ));
        }
        if self.source.input.trim().is_empty() {
            return Err(anyhow!("input source must not be empty"));
        }
        if self.model.timeout.is_zero() {
            return Err(anyhow!("inference timeout must be greater than zero"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        match self.model.backend.as_str() {
            "stub" => {}
            "tract" => {
                if self.model.path.is_none() {
                    return Err(anyhow!("the tract backend requires a model path"));
                }
            }
            other => {
                return Err(anyhow!(
                    "unknown detector backend '{}': expected 'stub' or 'tract'",
                    other
                ))
            }
        }
        if self.mqtt.enabled && self.mqtt.client_id.trim().is_empty() {
            return Err(anyhow!("MQTT client id must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CounterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
