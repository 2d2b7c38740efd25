//! Background ZeroMQ subscriber feeding the telemetry register.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use adi_core::{TelemetryConfig, TelemetryLink, TelemetryRegister};

use crate::error::{TelemetryError, TelemetryResult};
use crate::router::TopicRouter;

/// A running subscription. Dropping it without [`TelemetryLink::shutdown`]
/// leaves the thread to exit on its next receive timeout.
pub struct ZmqTelemetryLink {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    endpoint: String,
}

impl ZmqTelemetryLink {
    /// Connect, subscribe to every configured topic and start receiving.
    ///
    /// The connection itself completes in the background; ZeroMQ keeps
    /// retrying an unreachable publisher with exponential backoff up to
    /// `reconnect_max_ms`.
    pub fn start(
        context: &zmq::Context,
        config: &TelemetryConfig,
        register: Arc<TelemetryRegister>,
    ) -> TelemetryResult<Self> {
        let router = TopicRouter::new(register, config.topics.clone());

        let socket = context.socket(zmq::SUB)?;
        socket.set_rcvtimeo(config.recv_timeout_ms)?;
        socket.set_reconnect_ivl(config.reconnect_ms)?;
        socket.set_reconnect_ivl_max(config.reconnect_max_ms)?;
        socket.set_linger(0)?;
        for topic in router.subscriptions() {
            socket.set_subscribe(topic.as_bytes())?;
        }
        socket
            .connect(&config.endpoint)
            .map_err(|source| TelemetryError::Connect {
                endpoint: config.endpoint.clone(),
                source,
            })?;
        tracing::info!(
            "Subscribed to {} topics on {}",
            config.topics.len(),
            config.endpoint
        );

        let backoff = Duration::from_millis(config.recv_timeout_ms.max(1) as u64);
        let stop = Arc::new(AtomicBool::new(false));
        let handle = std::thread::Builder::new()
            .name("adi-telemetry".to_string())
            .spawn({
                let stop = Arc::clone(&stop);
                move || receive_loop(socket, router, stop, backoff)
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
            endpoint: config.endpoint.clone(),
        })
    }

    /// Start on a fresh ZeroMQ context. The socket keeps the context alive.
    pub fn connect(config: &TelemetryConfig, register: Arc<TelemetryRegister>) -> TelemetryResult<Self> {
        Self::start(&zmq::Context::new(), config, register)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn stop_and_join(&mut self) -> TelemetryResult<()> {
        self.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| TelemetryError::ThreadPanicked),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RecvFailure {
    /// Timeout or interrupted call; receive again
    Retry,
    /// Context terminated
    Stop,
    /// Anything else; log and wait before the next attempt
    Backoff,
}

fn classify(err: zmq::Error) -> RecvFailure {
    match err {
        zmq::Error::EAGAIN | zmq::Error::EINTR => RecvFailure::Retry,
        zmq::Error::ETERM => RecvFailure::Stop,
        _ => RecvFailure::Backoff,
    }
}

fn receive_loop(socket: zmq::Socket, router: TopicRouter, stop: Arc<AtomicBool>, backoff: Duration) {
    let mut received: u64 = 0;
    while !stop.load(Ordering::Acquire) {
        match socket.recv_multipart(0) {
            Ok(frames) => {
                received += 1;
                router.handle_frames(&frames);
            }
            Err(e) => match classify(e) {
                RecvFailure::Retry => continue,
                RecvFailure::Stop => break,
                RecvFailure::Backoff => {
                    tracing::warn!("Telemetry receive failed: {}", e);
                    std::thread::sleep(backoff);
                }
            },
        }
    }
    tracing::debug!("Telemetry thread exiting after {} messages", received);
}

impl TelemetryLink for ZmqTelemetryLink {
    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.stop_and_join()?;
        tracing::info!("Disconnected from {}", self.endpoint);
        Ok(())
    }
}

impl Drop for ZmqTelemetryLink {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adi_core::{Axis, MonotonicClock};
    use std::time::Instant;

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_receive_errors_classified() {
        assert_eq!(classify(zmq::Error::EAGAIN), RecvFailure::Retry);
        assert_eq!(classify(zmq::Error::EINTR), RecvFailure::Retry);
        assert_eq!(classify(zmq::Error::ETERM), RecvFailure::Stop);
        assert_eq!(classify(zmq::Error::EFSM), RecvFailure::Backoff);
        assert_eq!(classify(zmq::Error::ENOTSOCK), RecvFailure::Backoff);
    }

    #[test]
    fn test_start_and_shutdown_without_publisher() {
        let ctx = zmq::Context::new();
        let register = Arc::new(TelemetryRegister::new(MonotonicClock::new()));
        let config = TelemetryConfig {
            endpoint: "tcp://127.0.0.1:59987".to_string(),
            ..Default::default()
        };

        let mut link = ZmqTelemetryLink::start(&ctx, &config, register).unwrap();
        assert_eq!(link.endpoint(), "tcp://127.0.0.1:59987");
        link.shutdown().unwrap();
    }

    #[test]
    fn test_bad_endpoint_fails() {
        let ctx = zmq::Context::new();
        let register = Arc::new(TelemetryRegister::new(MonotonicClock::new()));
        let config = TelemetryConfig {
            endpoint: "not-an-endpoint".to_string(),
            ..Default::default()
        };

        let err = ZmqTelemetryLink::start(&ctx, &config, register).err().unwrap();
        assert!(matches!(err, TelemetryError::Connect { .. }));
    }

    #[test]
    fn test_receives_published_values() {
        let ctx = zmq::Context::new();
        let endpoint = "tcp://127.0.0.1:15571";
        let publisher = ctx.socket(zmq::PUB).unwrap();
        publisher.bind(endpoint).unwrap();

        let register = Arc::new(TelemetryRegister::new(MonotonicClock::new()));
        let config = TelemetryConfig {
            endpoint: endpoint.to_string(),
            ..Default::default()
        };
        let mut link = ZmqTelemetryLink::start(&ctx, &config, Arc::clone(&register)).unwrap();

        // slow joiner: keep publishing until the subscription is live
        let arrived = wait_for(|| {
            publisher
                .send_multipart(["dcs-bios/output/adi/adi_bank", "16384"], 0)
                .unwrap();
            register.axis(Axis::Bank).is_live()
        });
        assert!(arrived);
        assert_eq!(register.axis(Axis::Bank).raw, 16384);

        publisher.send("dcs-bios/goodbye 0", 0).unwrap();
        assert!(wait_for(|| !register.axis(Axis::Bank).is_live()));

        link.shutdown().unwrap();
    }
}
