//! # Progress Events
//!
//! Every step of a clone reports what it is doing through an [`Event`]
//! delivered to an [`EventSink`] that the caller hands to the
//! [`Cloner`](crate::clone::Cloner). Nothing is registered globally: a caller
//! that does not care passes [`NullSink`], the CLI passes a closure that
//! renders to stderr, and tests pass a [`RecordingSink`] to assert on the
//! exact sequence.
//!
//! Events are informational. A fatal failure is always returned as an
//! [`Error`](crate::error::Error); the sink only ever sees recoverable
//! warnings and progress.

use std::fmt;
use std::sync::Mutex;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Success,
}

/// Stable identifier of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCode {
    DestNotEmpty,
    DestIsEmpty,
    UsingCache,
    FoundMatch,
    FileExists,
    Downloading,
    Extracting,
    Proxy,
    Removed,
    FileDoesNotExist,
    Success,
    CouldNotFetch,
    Downgrade,
    Cloning,
}

impl EventCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::DestNotEmpty => "DEST_NOT_EMPTY",
            EventCode::DestIsEmpty => "DEST_IS_EMPTY",
            EventCode::UsingCache => "USING_CACHE",
            EventCode::FoundMatch => "FOUND_MATCH",
            EventCode::FileExists => "FILE_EXISTS",
            EventCode::Downloading => "DOWNLOADING",
            EventCode::Extracting => "EXTRACTING",
            EventCode::Proxy => "PROXY",
            EventCode::Removed => "REMOVED",
            EventCode::FileDoesNotExist => "FILE_DOES_NOT_EXIST",
            EventCode::Success => "SUCCESS",
            EventCode::CouldNotFetch => "COULD_NOT_FETCH",
            EventCode::Downgrade => "DOWNGRADE",
            EventCode::Cloning => "CLONING",
        }
    }

    /// Whether events with this code are only shown in verbose mode.
    pub fn is_verbose(&self) -> bool {
        matches!(
            self,
            EventCode::DestIsEmpty
                | EventCode::FoundMatch
                | EventCode::FileExists
                | EventCode::Proxy
                | EventCode::Downloading
                | EventCode::Extracting
                | EventCode::Cloning
        )
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub level: Level,
    pub code: EventCode,
    pub message: String,
}

impl Event {
    pub fn info(code: EventCode, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            code,
            message: message.into(),
        }
    }

    pub fn warn(code: EventCode, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            code,
            message: message.into(),
        }
    }

    pub fn success(code: EventCode, message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            code,
            message: message.into(),
        }
    }
}

/// Receiver for progress events.
pub trait EventSink {
    fn emit(&self, event: &Event);
}

impl<F> EventSink for F
where
    F: Fn(&Event),
{
    fn emit(&self, event: &Event) {
        self(event)
    }
}

/// Delivers events to a sink, dropping verbose-only events unless asked for.
///
/// Every event is also written to the `log` facade at debug level.
#[derive(Clone, Copy)]
pub struct Reporter<'a> {
    sink: &'a dyn EventSink,
    verbose: bool,
}

impl<'a> Reporter<'a> {
    pub fn new(sink: &'a dyn EventSink, verbose: bool) -> Self {
        Self { sink, verbose }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Same sink with a different verbosity.
    pub fn with_verbose(&self, verbose: bool) -> Self {
        Self {
            sink: self.sink,
            verbose,
        }
    }

    pub fn emit(&self, event: Event) {
        log::debug!("[{}] {}", event.code, event.message);
        if self.verbose || !event.code.is_verbose() {
            self.sink.emit(&event);
        }
    }

    pub fn info(&self, code: EventCode, message: impl Into<String>) {
        self.emit(Event::info(code, message));
    }

    pub fn warn(&self, code: EventCode, message: impl Into<String>) {
        self.emit(Event::warn(code, message));
    }

    pub fn success(&self, code: EventCode, message: impl Into<String>) {
        self.emit(Event::success(code, message));
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink that keeps every event in order, for inspection after the fact.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Codes of the events received so far, in order.
    pub fn codes(&self) -> Vec<EventCode> {
        self.events().iter().map(|event| event.code).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
