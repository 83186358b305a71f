//! Error taxonomy for the scan pipeline.
//!
//! Fetch failures are fatal for a single (ticker, interval, strategy) tuple
//! only; sink failures are fatal for the whole run. Everything else (short
//! series, pivot starvation, rejected candidates) is normal control flow
//! and never surfaces as an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    #[error("provider returned no bars for {ticker}/{interval}")]
    Empty { ticker: String, interval: String },

    #[error("replay file not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encode error: {0}")]
    Encode(String),
}

/// Run-level failure of the pipeline driver.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("no strategy/interval combination matched the request")]
    EmptyPlan,
}
