//! Structured logging setup shared by the auth backend and the edge gateway.
//!
//! # Environment Variables
//!
//! - `LOG_FORMAT`: `json` for one JSON object per event, anything else for text (default: text)
//! - `RUST_LOG`: level filter (default: info),
//!   e.g. `RUST_LOG=oa_auth=debug,oa_discovery=trace,tower_http=info`
//!
//! Request handlers open an `info_span!` carrying `request_id`; every event
//! emitted below that span (store calls, RPC calls) inherits the field.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("LOG_FORMAT").unwrap_or_default())
    }

    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Install the global subscriber for `service_name`.
///
/// Calling this twice in one process is a no-op for the second call, so
/// integration tests may initialise logging freely.
pub fn init_logging(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .flatten_event(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(service = service_name, "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" JSON "), LogFormat::Json);
        assert_eq!(LogFormat::parse("text"), LogFormat::Text);
        assert_eq!(LogFormat::parse(""), LogFormat::Text);
    }

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging("test");
        init_logging("test");
    }
}
