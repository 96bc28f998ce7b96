//! Leveled log sink.
//!
//! The engine logs through `tracing`, but the spec calls for a single global level
//! (`OFF`/`ERROR`/`WARN`/`INFO`/`DEBUG`/`TRACE`) that a host can change at runtime via
//! `set_log_level` without reinstalling a subscriber. `tracing_subscriber::reload` gives
//! us exactly that: a filter handle we can swap after the fact.

use std::sync::OnceLock;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::reload::{self, Handle};
use tracing_subscriber::{EnvFilter, Registry};

/// Log verbosity levels, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Logging disabled entirely.
    Off,
    /// Errors only.
    Error,
    /// Errors and warnings.
    Warn,
    /// Errors, warnings, and informational messages.
    Info,
    /// The above plus debug detail.
    Debug,
    /// Everything, including per-task trace events.
    Trace,
}

impl LogLevel {
    fn to_filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

type ReloadHandle = Handle<LevelFilter, Registry>;

static RELOAD_HANDLE: OnceLock<ReloadHandle> = OnceLock::new();

/// Install the global subscriber if one hasn't been installed yet. Safe to call more than
/// once; only the first call has an effect. Mirrors the teacher's `init_tracing` guard.
pub fn init(level: LogLevel) {
    if RELOAD_HANDLE.get().is_some() || tracing::dispatcher::has_been_set() {
        return;
    }

    let (filter, handle) = reload::Layer::new(level.to_filter());
    let subscriber = Registry::default()
        .with(filter)
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = RELOAD_HANDLE.set(handle);
    }
}

/// Change the single global log level. No-op if `init` was never called (e.g. the host
/// installed its own subscriber) — the engine logs through `tracing` either way, just
/// without engine-controlled level switching.
pub fn set_log_level(level: LogLevel) {
    if let Some(handle) = RELOAD_HANDLE.get() {
        let _ = handle.modify(|filter| *filter = level.to_filter());
    }
}
