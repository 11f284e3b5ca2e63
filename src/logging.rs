use tracing_subscriber::EnvFilter;

use crate::error::VrmError;

/// ログレベル定義
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Map a `-v` count from the CLI onto a default filter level.
    pub fn from_verbosity(verbosity: u8) -> Self {
        match verbosity {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// Install a stderr subscriber. `RUST_LOG` takes precedence over `default_level`.
///
/// Only the binary calls this; the library just emits events.
pub fn init_logging(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vrm_codec={}", default_level.as_str())));

    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: Logging system already initialized");
    }
}

/// Forward a message to the active `tracing` subscriber.
pub fn send_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug => tracing::debug!(target: "vrm_codec", "{message}"),
        LogLevel::Info => tracing::info!(target: "vrm_codec", "{message}"),
        LogLevel::Warn => tracing::warn!(target: "vrm_codec", "{message}"),
        LogLevel::Error => tracing::error!(target: "vrm_codec", "{message}"),
    }
}

/// Log a codec error at error level, optionally prefixed with what was being done.
pub fn log_codec_error(error: &VrmError, context: Option<&str>) {
    let message = match context {
        Some(ctx) => format!("{}: {}", ctx, error),
        None => error.to_string(),
    };

    send_log(LogLevel::Error, &message);
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::send_log($crate::logging::LogLevel::Debug, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::send_log($crate::logging::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::send_log($crate::logging::LogLevel::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::send_log($crate::logging::LogLevel::Error, &format!($($arg)*))
    };
}

/// Result extension for convenient error logging
pub trait ResultExt<T, E> {
    fn log_error(self, context: Option<&str>) -> Self;
}

impl<T> ResultExt<T, VrmError> for Result<T, VrmError> {
    fn log_error(self, context: Option<&str>) -> Self {
        if let Err(ref error) = self {
            log_codec_error(error, context);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_verbosity_counts_when_mapping_then_levels_escalate() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Warn);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(5), LogLevel::Debug);
    }

    #[test]
    fn given_failed_result_when_logging_then_result_is_passed_through() {
        let result: Result<(), VrmError> = Err(VrmError::encoding("/nodes/0", "broken"));
        let result = result.log_error(Some("export"));
        assert!(matches!(
            result,
            Err(VrmError::EncodingConstraintViolation { .. })
        ));
    }
}
