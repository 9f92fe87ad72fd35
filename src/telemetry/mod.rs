//! Telemetry formatting and tracing setup.
//!
//! Formatters turn structured [`Event`]s into human-readable lines for the
//! stdout sink; [`init_tracing`] wires the crate's `tracing` output to a
//! subscriber with env-filter support for binaries and demos.

use std::io::IsTerminal;

use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::event_bus::Event;

pub const KIND_COLOR: &str = "\x1b[36m"; // cyan
pub const NODE_COLOR: &str = "\x1b[32m"; // green
pub const RESET_COLOR: &str = "\x1b[0m";

/// Formatter color mode for telemetry output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatterMode {
    /// Auto-detect TTY capability (checks `stderr.is_terminal()`).
    #[default]
    Auto,
    /// Always include ANSI color codes.
    Colored,
    /// Never include ANSI color codes (for logs/files).
    Plain,
}

impl FormatterMode {
    /// Returns true if this mode should use colored output.
    pub fn is_colored(&self) -> bool {
        match self {
            FormatterMode::Auto => std::io::stderr().is_terminal(),
            FormatterMode::Colored => true,
            FormatterMode::Plain => false,
        }
    }
}

/// Rendered output for a telemetry item that can be consumed by sinks.
#[derive(Clone, Debug, Default)]
pub struct EventRender {
    pub lines: Vec<String>,
}

impl EventRender {
    pub fn join_lines(&self) -> String {
        self.lines.join("")
    }
}

/// Turns events into sink-ready text.
pub trait TelemetryFormatter: Send + Sync {
    fn render_event(&self, event: &Event) -> EventRender;
}

/// Plain text formatter with optional ANSI color codes.
///
/// ```
/// use warpline::event_bus::{Event, EventKind};
/// use warpline::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};
///
/// let formatter = PlainFormatter::with_mode(FormatterMode::Plain);
/// let rendered = formatter.render_event(&Event::new(EventKind::RunStarted, "run-1"));
/// assert!(rendered.join_lines().contains("run.started"));
/// ```
pub struct PlainFormatter {
    mode: FormatterMode,
}

impl PlainFormatter {
    pub fn new() -> Self {
        Self {
            mode: FormatterMode::Auto,
        }
    }

    pub fn with_mode(mode: FormatterMode) -> Self {
        Self { mode }
    }

    fn paint<'a>(&self, ansi_code: &'a str) -> &'a str {
        if self.mode.is_colored() { ansi_code } else { "" }
    }

    fn reset(&self) -> &str {
        if self.mode.is_colored() {
            RESET_COLOR
        } else {
            ""
        }
    }
}

impl Default for PlainFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFormatter for PlainFormatter {
    fn render_event(&self, event: &Event) -> EventRender {
        let mut line = format!(
            "{:>6} {}{}{}",
            event.seq,
            self.paint(KIND_COLOR),
            event.kind,
            self.reset()
        );
        if let Some(node_id) = &event.node_id {
            line.push_str(&format!(
                " {}{}{}",
                self.paint(NODE_COLOR),
                node_id,
                self.reset()
            ));
        }
        if let Some(elapsed_ms) = event.elapsed_ms {
            line.push_str(&format!(" ({elapsed_ms}ms)"));
        }
        if !event.payload.is_empty() {
            let mut keys: Vec<_> = event.payload.keys().collect();
            keys.sort();
            for key in keys {
                line.push_str(&format!(" {key}={}", event.payload[key]));
            }
        }
        line.push('\n');
        EventRender { lines: vec![line] }
    }
}

/// Install a global tracing subscriber: env-filtered fmt layer plus
/// `tracing-error`'s span-trace layer.
///
/// Safe to call once per process (typically from a binary or demo);
/// subsequent calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(ErrorLayer::default())
        .try_init();
}
