//! Telemetry ingestion over ZeroMQ pub/sub.
//!
//! A background thread owns a SUB socket, matches each message's topic
//! against the configured table and writes instrument values into the shared
//! [`adi_core::TelemetryRegister`].

pub mod error;
pub mod payload;
pub mod publisher;
pub mod router;
pub mod subscriber;

pub use error::{TelemetryError, TelemetryResult};
pub use payload::parse_raw;
pub use publisher::{Sweep, TelemetryPublisher};
pub use router::{Routed, TopicRouter};
pub use subscriber::ZmqTelemetryLink;
