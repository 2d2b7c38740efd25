//! Error types for telemetry transport

use thiserror::Error;

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("ZMQ socket error: {0}")]
    Socket(#[from] zmq::Error),

    #[error("Cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Telemetry thread panicked")]
    ThreadPanicked,
}
