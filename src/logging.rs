//! Structured logging handle.
//!
//! [`Logger`] owns a [`tracing::Dispatch`] built once in `main` and handed to
//! the supervisor, which runs every worker future under it. Production logs
//! are JSON lines; tests use [`Logger::capturing`] to assert on the
//! structured fields that were emitted.

use crate::error::{ReplicationError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::dispatcher::DefaultGuard;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::{LookupSpan, Registry};

/// Parse a `LOG_LEVEL` value. Anything unrecognised means INFO.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_lowercase().as_str() {
        "off" => LevelFilter::OFF,
        "error" => LevelFilter::ERROR,
        "warn" | "warning" => LevelFilter::WARN,
        "debug" => LevelFilter::DEBUG,
        "trace" => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

/// Handle to the process's tracing subscriber.
#[derive(Clone)]
pub struct Logger {
    dispatch: Dispatch,
    level: LevelFilter,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}

impl Logger {
    /// JSON logger at `level` (see [`parse_level`]).
    pub fn from_level(level: &str) -> Self {
        let level = parse_level(level);
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(false)
            .finish();
        Self {
            dispatch: Dispatch::new(subscriber),
            level,
        }
    }

    /// JSON logger at the level named by `LOG_LEVEL`, defaulting to INFO.
    pub fn from_env() -> Self {
        let level = crate::config::resolve(crate::config::LOG_LEVEL).unwrap_or_default();
        Self::from_level(&level)
    }

    /// Logger that records every event in memory.
    pub fn capturing() -> (Self, CapturedLogs) {
        let logs = CapturedLogs::default();
        let subscriber = Registry::default().with(CaptureLayer { logs: logs.clone() });
        let logger = Self {
            dispatch: Dispatch::new(subscriber),
            level: LevelFilter::TRACE,
        };
        (logger, logs)
    }

    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Make this the default subscriber for the current thread until the
    /// guard is dropped.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::dispatcher::set_default(&self.dispatch)
    }

    /// Make this the process-wide subscriber. Fails if one is already set.
    pub fn install_global(&self) -> Result<()> {
        tracing::dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| ReplicationError::Internal(format!("logger already installed: {e}")))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Capture
// ═══════════════════════════════════════════════════════════════════════════════

/// One recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    /// Fields from the event and every enclosing span; event fields win.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Shared view of the events recorded by a capturing [`Logger`].
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<CapturedEvent>>>);

impl CapturedLogs {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Events whose message is exactly `message`.
    pub fn with_message(&self, message: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.message == message)
            .collect()
    }

    pub fn contains(&self, message: &str) -> bool {
        !self.with_message(message).is_empty()
    }

    fn push(&self, event: CapturedEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }
}

#[derive(Default)]
struct FieldMap(BTreeMap<String, String>);

impl Visit for FieldMap {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{value:?}"));
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = FieldMap::default();
        attrs.record(&mut fields);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut fields = BTreeMap::new();
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(span_fields) = span.extensions().get::<FieldMap>() {
                    fields.extend(span_fields.0.clone());
                }
            }
        }

        let mut own = FieldMap::default();
        event.record(&mut own);
        fields.extend(own.0);

        let message = fields.remove("message").unwrap_or_default();
        self.logs.push(CapturedEvent {
            level: *event.metadata().level(),
            message,
            fields,
        });
    }
}
