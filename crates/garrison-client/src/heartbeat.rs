//! Keep-alive loop.
//!
//! Once a session is logged in, a background task fires a `KeepAlive`
//! call every interval to prove the session is still there. The first
//! failure hands control to the `on_failure` hook and stops the loop;
//! there is no retry, because by then the session is already gone and
//! the tear-down policy lives with the session owner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use garrison_protocol::Call;
use garrison_transport::Connection;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::rpc::RpcChannel;

/// Starts the keep-alive loop on `channel`.
///
/// A small random start offset keeps sessions created together from
/// polling the server on the same tick.
pub(crate) fn spawn<C, F, Fut>(
    channel: Arc<RpcChannel<C>>,
    interval: Duration,
    on_failure: F,
) -> JoinHandle<()>
where
    C: Connection,
    F: FnOnce(String) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let jitter = Duration::from_millis(rand::rng().random_range(0..250));
        tokio::time::sleep(jitter).await;

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately;
        // the server only wants to hear from us every `interval`.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match channel.call(Call::KeepAlive).await {
                Ok(_) => tracing::trace!("keep-alive acknowledged"),
                Err(e) => {
                    tracing::debug!(error = %e, "keep-alive failed");
                    // The hook tears the session down, which aborts
                    // this task's own handle; on a fresh task the
                    // abort cannot cancel the teardown midway.
                    tokio::spawn(on_failure(e.to_string()));
                    break;
                }
            }
        }
    })
}
