//! Emoji log markers for the execution engine
//!
//! Keeps the engine's human-readable log lines scannable: each stage of an
//! execution gets a fixed marker in front of the message.

/// Marker set for engine logging
pub struct LogEmoji;

impl LogEmoji {
    // Outcome
    pub const SUCCESS: &'static str = "✅";
    pub const ERROR: &'static str = "❌";
    pub const REJECT: &'static str = "🚫"; // expected go/no-go rejection

    // Pipeline stages
    pub const EXECUTE: &'static str = "⚡";
    pub const LOAN: &'static str = "🏦"; // flash-loan source choice
    pub const MONEY: &'static str = "💰";
    pub const SHIELD: &'static str = "🛡️"; // privacy level / relay submission
    pub const NETWORK: &'static str = "🌐";
    pub const CHART: &'static str = "📊";
}

#[macro_export]
macro_rules! log_success {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SUCCESS, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        tracing::error!("{} {}", $crate::logging::LogEmoji::ERROR, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_rejection {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::REJECT, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_execution {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::EXECUTE, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_loan {
    ($($arg:tt)*) => {
        tracing::debug!("{} {}", $crate::logging::LogEmoji::LOAN, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_profit {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::MONEY, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_submission {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::SHIELD, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_metrics {
    ($($arg:tt)*) => {
        tracing::info!("{} {}", $crate::logging::LogEmoji::CHART, format!($($arg)*))
    };
}
