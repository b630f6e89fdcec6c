use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

const VERBOSE_FILTER: &str = "reposync_core=debug,reposync_cli=debug,warn";
const QUIET_FILTER: &str = "warn";
const KEPT_WARNINGS: usize = 200;

/// A warning or error, rendered as `hh:mm:ss LEVEL message | key=value ...`
/// when it was emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub line: String,
}

/// Bounded in-memory copy of recent warnings and errors, replayed after the
/// summary in verbose runs.
#[derive(Clone)]
pub struct WarningLog {
    events: Arc<Mutex<VecDeque<CapturedEvent>>>,
    capacity: usize,
}

impl WarningLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn snapshot(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .map(|events| events.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn push(&self, event: CapturedEvent) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

struct CaptureLayer(WarningLog);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if self.0.capacity == 0 {
            return;
        }
        let mut line = LineBuilder::default();
        event.record(&mut line);
        let level = *event.metadata().level();
        self.0.push(CapturedEvent {
            level,
            line: line.finish(OffsetDateTime::now_utc(), level),
        });
    }
}

#[derive(Default)]
struct LineBuilder {
    message: String,
    fields: String,
}

impl LineBuilder {
    fn finish(self, at: OffsetDateTime, level: Level) -> String {
        let mut line = format!(
            "{:02}:{:02}:{:02} {level:<5} {}",
            at.hour(),
            at.minute(),
            at.second(),
            self.message
        );
        if !self.fields.is_empty() {
            line.push_str(" |");
            line.push_str(&self.fields);
        }
        line
    }
}

impl Visit for LineBuilder {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

/// Installs the stderr fmt layer and the warning log. `RUST_LOG` wins over
/// the verbosity flag when set.
pub fn init(verbose: bool) -> WarningLog {
    let warnings = WarningLog::new(KEPT_WARNINGS);
    let default = if verbose { VERBOSE_FILTER } else { QUIET_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .with(CaptureLayer(warnings.clone()).with_filter(LevelFilter::WARN))
        .try_init();
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture(capacity: usize, emit: impl FnOnce()) -> Vec<CapturedEvent> {
        let warnings = WarningLog::new(capacity);
        let subscriber = tracing_subscriber::registry()
            .with(CaptureLayer(warnings.clone()).with_filter(LevelFilter::WARN));
        tracing::subscriber::with_default(subscriber, emit);
        warnings.snapshot()
    }

    #[test]
    fn keeps_warnings_with_their_fields() {
        let events = capture(10, || {
            tracing::info!("ignored");
            tracing::warn!(repo = "tools", attempts = 2, "no upstream configured");
        });
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, Level::WARN);
        assert!(
            events[0]
                .line
                .ends_with("WARN  no upstream configured | repo=tools attempts=2"),
            "{}",
            events[0].line
        );
    }

    #[test]
    fn oldest_warning_is_dropped_at_capacity() {
        let events = capture(2, || {
            for idx in 0..3 {
                tracing::error!("entry {idx}");
            }
        });
        assert_eq!(events.len(), 2);
        assert!(events[0].line.ends_with("ERROR entry 1"));
        assert!(events[1].line.ends_with("ERROR entry 2"));
    }
}
