use thiserror::Error;

/// Errors raised while loading or parsing the server's configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GIS_ROOT environment variable is not set")]
    MissingGisRoot,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config line (expected KEY=VALUE): {0:?}")]
    MalformedLine(String),
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),
    #[error("config key {key} has an invalid value {value:?}: {source}")]
    InvalidValue {
        key: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("config key {key} has an invalid value {value:?}: {source}")]
    InvalidAddress {
        key: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Errors surfaced by the Scheduler's request/reply protocol.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler did not reply before the deadline")]
    Timeout,
    #[error("scheduler task is no longer running")]
    Disconnected,
}

/// Status values returned to the Front-end by the Buffer or Scheduler, and
/// ultimately mapped to an HTTP status code. Named after the error taxonomy
/// (validation/capacity/render/timing/protocol) rather than as raw integers
/// so call sites read naturally.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReplyStatus {
    Ready,
    Processing,
    InvalidParam,
    Nomem,
    RenderFailed,
    Timeout,
    RequestFailed,
}

impl ReplyStatus {
    pub fn http_code(self) -> u16 {
        match self {
            ReplyStatus::Ready => 200,
            ReplyStatus::Processing => 202,
            ReplyStatus::InvalidParam => 400,
            ReplyStatus::Timeout => 408,
            ReplyStatus::Nomem => 418,
            ReplyStatus::RenderFailed => 500,
            ReplyStatus::RequestFailed => 520,
        }
    }

    /// Human-readable description, as used only in the error HTML body.
    pub fn description(self) -> &'static str {
        match self {
            ReplyStatus::Ready => "Request is ready",
            ReplyStatus::Processing => "Request is processing",
            ReplyStatus::InvalidParam => "Request has invalid parameters",
            ReplyStatus::Timeout => "Request status is unknown, timeout error",
            ReplyStatus::Nomem => "Request is not ready - not enough memory on server",
            ReplyStatus::RenderFailed => "Request is failed - renderer did not finish successfully",
            ReplyStatus::RequestFailed => "Request is failed",
        }
    }
}

impl From<crate::types::OrderStatus> for ReplyStatus {
    fn from(s: crate::types::OrderStatus) -> Self {
        match s {
            crate::types::OrderStatus::Processing => ReplyStatus::Processing,
            crate::types::OrderStatus::Ready => ReplyStatus::Ready,
            crate::types::OrderStatus::RenderFailed => ReplyStatus::RenderFailed,
            crate::types::OrderStatus::Nomem => ReplyStatus::Nomem,
        }
    }
}
