//! Background latency prober.
//!
//! While a session is up, the prober measures round-trip time with a
//! burst of pings, publishes the average, rests, and repeats. The first
//! successful sample is published immediately so callers have a figure
//! to show before the first full burst completes.
//!
//! The prober is advisory. If a ping fails it simply stops; the
//! keep-alive loop is the authority on whether the session is alive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use garrison_protocol::Call;
use garrison_transport::Connection;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::rpc::RpcChannel;

/// Pings per measurement burst.
const SAMPLES_PER_BURST: usize = 6;
/// Pause between pings inside a burst.
const SAMPLE_INTERVAL: Duration = Duration::from_millis(1000);
/// Rest between bursts.
const BURST_REST: Duration = Duration::from_millis(10000);

/// The published measurement, shared between the prober task and its
/// readers.
struct LatencyStats {
    micros: AtomicU64,
    available: AtomicBool,
}

impl LatencyStats {
    fn publish(&self, latency: Duration) {
        self.micros
            .store(latency.as_micros() as u64, Ordering::SeqCst);
        self.available.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> Option<Duration> {
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        Some(Duration::from_micros(self.micros.load(Ordering::SeqCst)))
    }
}

/// Handle to a running prober.
pub(crate) struct Pinger {
    handle: JoinHandle<()>,
    stats: Arc<LatencyStats>,
}

impl Pinger {
    /// Starts probing on `channel`.
    pub(crate) fn start<C: Connection>(channel: Arc<RpcChannel<C>>) -> Self {
        let stats = Arc::new(LatencyStats {
            micros: AtomicU64::new(0),
            available: AtomicBool::new(false),
        });
        let handle = tokio::spawn(run(channel, Arc::clone(&stats)));
        Self { handle, stats }
    }

    /// The most recent average round-trip time, if any burst (or the
    /// first early sample) has completed.
    pub(crate) fn average(&self) -> Option<Duration> {
        self.stats.read()
    }

    /// Stops the prober. The last published average stays readable.
    pub(crate) fn stop(&self) {
        self.handle.abort();
    }
}

async fn run<C: Connection>(channel: Arc<RpcChannel<C>>, stats: Arc<LatencyStats>) {
    let mut samples = Vec::with_capacity(SAMPLES_PER_BURST);
    loop {
        for _ in 0..SAMPLES_PER_BURST {
            let start = Instant::now();
            if let Err(e) = channel.call(Call::Ping).await {
                tracing::debug!(error = %e, "latency prober stopping");
                return;
            }
            let sample = start.elapsed();
            if stats.read().is_none() {
                stats.publish(sample);
            }
            samples.push(sample);
            tokio::time::sleep(SAMPLE_INTERVAL).await;
        }
        let total: Duration = samples.iter().sum();
        let average = total / samples.len() as u32;
        tracing::trace!(?average, "latency burst complete");
        stats.publish(average);
        samples.clear();
        tokio::time::sleep(BURST_REST).await;
    }
}

/// Renders an average for display, rounding partial milliseconds up.
/// `None` renders as a placeholder.
pub(crate) fn format_average(average: Option<Duration>) -> String {
    match average {
        Some(latency) => {
            let millis = (latency.as_secs_f64() * 1000.0).ceil() as u64;
            format!("{millis} ms")
        }
        None => "-- ms".into(),
    }
}

#[cfg(test)]
mod tests {
    use garrison_protocol::{CallOutcome, Codec, JsonCodec, Reply, Request, Response};
    use garrison_transport::memory::memory_pair;

    use super::*;

    #[test]
    fn test_format_average_rounds_up() {
        assert_eq!(format_average(Some(Duration::from_micros(1200))), "2 ms");
        assert_eq!(format_average(Some(Duration::from_millis(31))), "31 ms");
        assert_eq!(format_average(None), "-- ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_publishes_an_average() {
        let (client, server) = memory_pair();
        tokio::spawn(async move {
            let codec = JsonCodec;
            while let Ok(Some(data)) = server.recv().await {
                let request: Request = codec.decode(&data).unwrap();
                let response = Response {
                    id: request.id,
                    outcome: CallOutcome::Ok(Reply::Pong),
                };
                let _ = server.send(&codec.encode(&response).unwrap()).await;
            }
        });
        let channel = RpcChannel::new(client, Duration::from_secs(5));

        let pinger = Pinger::start(channel);
        assert_eq!(pinger.average(), None);

        // One full burst is six samples a second apart.
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert!(pinger.average().is_some());
        pinger.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_prober_stops_quietly_on_failure() {
        let (client, server) = memory_pair();
        server.close().await.unwrap();
        let channel = RpcChannel::new(client, Duration::from_secs(5));

        let pinger = Pinger::start(channel);
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(pinger.handle.is_finished());
        assert_eq!(pinger.average(), None);
    }
}
