//! File-log line format (§6): `"YYYY-MM-DD HH:MM:SS,mmm [LEVEL] msg"`.
//!
//! `tracing_subscriber`'s built-in formatters don't produce this exact
//! shape, so this implements [`FormatEvent`] directly, the way
//! `prefetcharr`'s `enable_logging` layers a dedicated file writer
//! alongside the console one rather than trying to make one formatter
//! serve both.

use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

pub struct AppLogFormat;

impl<S, N> FormatEvent<S, N> for AppLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%d %H:%M:%S,%3f"))?;

        let level = *event.metadata().level();
        write!(writer, "[{}] ", level_label(level))?;

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG => "DEBUG",
        Level::TRACE => "TRACE",
    }
}
