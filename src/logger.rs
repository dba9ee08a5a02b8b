use std::{
    collections::HashMap,
    fmt::{self, Write as _},
    fs::OpenOptions,
    path::PathBuf,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::{Field, Visit}, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
};

use crate::prelude::*;


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is chosen.
    /// If no such entry exists, the log is not emitted. Otherwise, that
    /// entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: only ≥"info" logs from Shopfront generally, but all SQL
    /// queries of the API and ≥"debug" messages from `hyper`:
    ///
    ///    [log]
    ///    filters.shopfront = "info"
    ///    filters."shopfront::db::tx" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "shopfront": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file. The string
    /// `${cmd}` in this value is replaced by the subcommand name of the
    /// process, e.g. `serve`, `db` or `other` (for less important commands).
    /// Example: "/var/log/shopfront-${cmd}.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,

    /// If set to `true`, HTTP header of each incoming request are logged
    /// (with 'trace' level).
    #[config(default = false)]
    pub(crate) log_http_headers: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| Ok((target_prefix, parse_level_filter(&level)?)))
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl Filters {
    /// Whether an event with `target` and `level` passes the filters: the
    /// entry with the longest matching prefix decides.
    fn allows(&self, target: &str, level: &Level) -> bool {
        self.0.iter()
            .filter(|(prefix, _)| target.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .is_some_and(|(_, filter)| level <= filter)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, color: ColorChoice, cmd: &str) -> Result<()> {
    let filter = {
        let filters = Filters(config.filters.0.clone());
        let max_level = filters.0.values().max().copied().unwrap_or(LevelFilter::OFF);
        FilterFn::new(move |metadata| filters.allows(metadata.target(), metadata.level()))
            .with_max_level_hint(max_level)
    };

    let stdout_output = config.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(EventFormatter(color))
            .with_writer(std::io::stdout)
    });

    let file_output = config.file.as_ref()
        .map(|path| -> Result<std::fs::File> {
            use std::io::Write;

            let path = path.to_str()
                .ok_or_else(|| anyhow!("log file path is not valid UTF-8"))?
                .replace("${cmd}", cmd);

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .with_context(|| format!("failed to open/create log file '{path}'"))?;

            // Empty line to make process restarts easier to spot.
            file.write_all(b"\n").context("could not write to log file")?;

            Ok(file)
        })
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(ColorChoice::Never))
                .with_writer(file)
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .try_init()
        .context("failed to install logger")?;

    Ok(())
}


/// Prints one line per event: time, level, target, message and then all
/// other fields as `key=value`.
#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);
        let paint = |style: Style| if use_ansi { style } else { Style::new() };

        // Events from the `log` bridge carry their real metadata in fields.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        let (level_style, body_style) = match *metadata.level() {
            Level::ERROR => (Color::Red.bold(), Color::Red.normal()),
            Level::WARN => (Color::Yellow.bold(), Color::Yellow.normal()),
            Level::INFO => (Color::Green.normal(), Style::new()),
            Level::DEBUG => (Color::Blue.normal(), Style::new().dimmed()),
            Level::TRACE => (Color::Magenta.normal(), Color::DarkGray.normal()),
        };
        let dim = paint(Style::new().dimmed());

        write!(writer, "{} ", dim.paint(
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        ))?;
        write!(writer, "{} ", paint(level_style).paint(format!("{:5}", metadata.level())))?;
        write!(writer, "{} ", dim.paint(format!("{} >", metadata.target())))?;

        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        write!(writer, "{}", paint(body_style).paint(fields.message))?;
        if !fields.rest.is_empty() {
            write!(writer, " {}", paint(body_style.italic()).paint(fields.rest))?;
        }

        writeln!(writer)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    rest: String,
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let name = field.name();
        if name == "message" {
            let _ = write!(self.message, "{value:?}");
        } else if !name.starts_with("log.") {
            if !self.rest.is_empty() {
                self.rest.push(' ');
            }
            let _ = write!(self.rest, "{name}={value:?}");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn filters(pairs: &[(&str, &str)]) -> Filters {
        pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>()
            .try_into()
            .unwrap()
    }

    #[test]
    fn longest_prefix_wins() {
        let f = filters(&[
            ("shopfront", "info"),
            ("shopfront::db", "trace"),
            ("shopfront::db::tx", "off"),
        ]);

        assert!(f.allows("shopfront::http", &Level::INFO));
        assert!(!f.allows("shopfront::http", &Level::DEBUG));
        assert!(f.allows("shopfront::db::migrations", &Level::TRACE));
        assert!(!f.allows("shopfront::db::tx", &Level::ERROR));
        assert!(!f.allows("hyper", &Level::ERROR));
    }

    #[test]
    fn invalid_level() {
        let raw = HashMap::from([("shopfront".to_string(), "loud".to_string())]);
        assert!(Filters::try_from(raw).is_err());
    }
}
