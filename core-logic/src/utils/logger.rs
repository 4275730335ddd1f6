use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target carrying user-facing activity lines.
pub const ACTIVITY_TARGET: &str = "activity";

/// Installs the global subscriber.
///
/// Activity lines go to stdout with a `[ HH:MM:SS ]` prefix and are colored by
/// their `kind` field. Everything at WARN and above, plus activity, lands in the
/// hourly rolling file under `logs/`. Debug activity is only shown when `debug`
/// is set.
pub fn setup_logger(debug: bool) -> Option<WorkerGuard> {
    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::hourly("logs", "clober");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let activity_level = if debug { Level::DEBUG } else { Level::INFO };

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(ACTIVITY_TARGET, activity_level)
        .with_default(Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(ACTIVITY_TARGET, activity_level)
        .with_default(Level::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    Some(guard)
}

// --- Formatters ---

#[derive(Default)]
struct ActivityVisitor {
    message: String,
    kind: Option<String>,
}

impl tracing::field::Visit for ActivityVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "kind" => self.kind = Some(format!("{:?}", value).trim_matches('"').to_string()),
            _ => {}
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "kind" => self.kind = Some(value.to_string()),
            _ => {}
        }
    }
}

/// Console color for an activity kind. Unknown kinds fall back to the level.
pub fn kind_style(kind: Option<&str>, level: &Level) -> Style {
    match kind {
        Some("swap") => Style::new().fg(Color::Cyan),
        Some("system") => Style::new().fg(Color::White),
        Some("error") => Style::new().fg(Color::Red),
        Some("success") => Style::new().fg(Color::Green),
        Some("warning") => Style::new().fg(Color::Yellow),
        Some("debug") => Style::new().fg(Color::Magenta),
        _ => match *level {
            Level::ERROR => Style::new().fg(Color::Red),
            Level::WARN => Style::new().fg(Color::Yellow),
            _ => Style::new(),
        },
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = ActivityVisitor::default();
        event.record(&mut visitor);

        let timestamp = Local::now().format("%H:%M:%S");
        let style = kind_style(visitor.kind.as_deref(), event.metadata().level());

        writeln!(
            writer,
            "{} {}",
            Style::new().dimmed().paint(format!("[ {} ]", timestamp)),
            style.paint(visitor.message)
        )
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();

        let mut visitor = ActivityVisitor::default();
        event.record(&mut visitor);

        match visitor.kind {
            Some(kind) => writeln!(
                writer,
                "{} [{}] [{}] {}",
                timestamp, level, kind, visitor.message
            ),
            None => writeln!(writer, "{} [{}] {}", timestamp, level, visitor.message),
        }
    }
}
