use std::time::Duration;

/// Rejected run configuration. Raised before any worker starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("need a target")]
    EmptyTarget,

    #[error("invalid target '{target}': {source}")]
    InvalidTarget {
        target: String,
        source: url::ParseError,
    },

    #[error("target must be an http:// or https:// link, got scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("max requests per second must be a positive number, got {0}")]
    InvalidRate(f64),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,
}

/// Failure of a single request. Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("transport: {0}")]
    Transport(reqwest::Error),

    #[error("request timed out after {}", humantime::format_duration(*.0))]
    Timeout(Duration),

    #[error("reading body: {0}")]
    Body(reqwest::Error),
}

impl RequestError {
    pub(crate) fn transport(err: reqwest::Error, ceiling: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(ceiling)
        } else {
            Self::Transport(err)
        }
    }

    pub(crate) fn body(err: reqwest::Error, ceiling: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(ceiling)
        } else {
            Self::Body(err)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("building http client: {0}")]
    Client(#[from] reqwest::Error),
}
