use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// How startup stages are reported on stderr.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    /// Spinners on a terminal, plain lines otherwise.
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    fn parse(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            Some("auto") | None => UiMode::Auto,
            Some(other) => {
                log::warn!("unknown --ui mode '{}', using auto", other);
                UiMode::Auto
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    stderr_is_tty: bool,
}

impl Ui {
    pub fn from_args(ui_flag: Option<&str>, stderr_is_tty: bool) -> Self {
        Self {
            mode: UiMode::parse(ui_flag),
            stderr_is_tty,
        }
    }

    fn use_spinner(&self) -> bool {
        self.stderr_is_tty && self.mode != UiMode::Plain
    }

    /// Report one startup stage; it is marked done when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if !self.use_spinner() {
            eprintln!("==> {}", name);
            return StageGuard::new(name, None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(format!("{name}…"));
        StageGuard::new(name, Some(spinner))
    }
}

pub struct StageGuard {
    name: String,
    detail: Option<String>,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: &str, spinner: Option<ProgressBar>) -> Self {
        Self {
            name: name.to_string(),
            detail: None,
            start: Instant::now(),
            spinner,
        }
    }

    /// Extra text shown next to the stage name once it completes.
    pub fn set_detail(&mut self, detail: impl Into<String>) {
        self.detail = Some(detail.into());
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = format_duration(self.start.elapsed());
        let message = match &self.detail {
            Some(detail) => format!("✔ {}: {} ({})", self.name, detail, elapsed),
            None => format!("✔ {} ({})", self.name, elapsed),
        };
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
