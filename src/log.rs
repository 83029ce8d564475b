//! File logging for conductor.
//!
//! Lines go to `~/.conductor/conductor.log` as
//! `[HH:MM:SS.mmm] [LEVEL] module::path: message`.
//!
//! - ERROR: request and plan failures (failed groups, cyclic leveling)
//! - WARN: problems the engine works around (mirror or bus delivery, refused requests)
//! - INFO: lifecycle (request received, plan created, group dispatched)
//! - DEBUG: state changes and per-task dispatch
//! - TRACE: prompts and bus traffic
//!
//! The level is INFO, DEBUG with `--debug` or `CONDUCTOR_DEBUG=1`, and
//! `CONDUCTOR_LOG=<level>` overrides both. Nothing is written before
//! `init_with_debug`.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Pick the level from the CLI flag and the two environment variables.
fn resolve_level(debug: bool, env_debug: Option<&str>, env_level: Option<&str>) -> LogLevel {
    if let Some(level) = env_level.and_then(|v| v.parse().ok()) {
        return level;
    }
    let env_debug = env_debug
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if debug || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Start logging to `~/.conductor/conductor.log`, truncating it.
pub fn init_with_debug(debug: bool) {
    let level = resolve_level(
        debug,
        std::env::var("CONDUCTOR_DEBUG").ok().as_deref(),
        std::env::var("CONDUCTOR_LOG").ok().as_deref(),
    );
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);

    if let Some(dir) = dirs::home_dir().map(|h| h.join(".conductor")) {
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join("conductor.log");
        let _ = std::fs::write(&path, "");
        LOG_PATH.set(path).ok();
    }
}

pub fn level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Whether a line at `level` would be written. The macros check this
/// before formatting.
pub fn enabled(level: LogLevel) -> bool {
    LOG_PATH.get().is_some() && level <= self::level()
}

fn format_line(timestamp: &str, level: LogLevel, target: &str, msg: &str) -> String {
    format!("[{}] [{}] {}: {}", timestamp, level, target, msg)
}

pub fn write(level: LogLevel, target: &str, msg: &str) {
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let timestamp = chrono::Local::now().format("%H:%M:%S%.3f").to_string();
        let _ = writeln!(file, "{}", format_line(&timestamp, level, target, msg));
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __clog_at {
    ($level:expr, $($arg:tt)*) => {
        if $crate::log::enabled($level) {
            $crate::log::write($level, module_path!(), &format!($($arg)*))
        }
    };
}

#[macro_export]
macro_rules! clog {
    ($($arg:tt)*) => { $crate::__clog_at!($crate::log::LogLevel::Info, $($arg)*) };
}

#[macro_export]
macro_rules! clog_error {
    ($($arg:tt)*) => { $crate::__clog_at!($crate::log::LogLevel::Error, $($arg)*) };
}

#[macro_export]
macro_rules! clog_warn {
    ($($arg:tt)*) => { $crate::__clog_at!($crate::log::LogLevel::Warn, $($arg)*) };
}

#[macro_export]
macro_rules! clog_debug {
    ($($arg:tt)*) => { $crate::__clog_at!($crate::log::LogLevel::Debug, $($arg)*) };
}

#[macro_export]
macro_rules! clog_trace {
    ($($arg:tt)*) => { $crate::__clog_at!($crate::log::LogLevel::Trace, $($arg)*) };
}
