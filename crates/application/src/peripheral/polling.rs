use std::sync::Weak;
use std::time::Duration;

use async_trait::async_trait;
use domain::driver::PollTarget;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Receiver of polling ticks
#[async_trait]
pub trait PollSink: Send + Sync + 'static {
    /// Record a tick for session `session`. Returning false stops the poller.
    async fn begin_tick(&self, session: u64) -> bool;

    /// Request a fresh value for one target
    async fn refresh(&self, target: PollTarget);
}

/// Periodic task bound to one connected session.
///
/// The first tick fires one period after start. The task ends when stopped,
/// when the sink is dropped, or when the sink reports the session gone.
pub struct PollingScheduler {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollingScheduler {
    pub fn start<S: PollSink>(
        sink: Weak<S>,
        session: u64,
        period: Duration,
        targets: Vec<PollTarget>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            info!(session, period_ms = period.as_millis() as u64, targets = targets.len(), "Starting poll loop");
            let mut timer = tokio::time::interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(session, "Poll loop cancelled");
                        break;
                    }
                    _ = timer.tick() => {
                        let Some(sink) = sink.upgrade() else {
                            break;
                        };
                        if !sink.begin_tick(session).await {
                            debug!(session, "Session gone, stopping poll loop");
                            break;
                        }
                        for target in &targets {
                            sink.refresh(*target).await;
                        }
                    }
                }
            }
        });

        Self {
            cancel_token,
            handle,
        }
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::protocol::CommandId;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        ticks: AtomicU64,
        alive: AtomicBool,
        refreshed: Mutex<Vec<PollTarget>>,
    }

    #[async_trait]
    impl PollSink for RecordingSink {
        async fn begin_tick(&self, _session: u64) -> bool {
            if !self.alive.load(Ordering::SeqCst) {
                return false;
            }
            self.ticks.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn refresh(&self, target: PollTarget) {
            self.refreshed.lock().await.push(target);
        }
    }

    fn alive_sink() -> Arc<RecordingSink> {
        let sink = Arc::new(RecordingSink::default());
        sink.alive.store(true, Ordering::SeqCst);
        sink
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let sink = alive_sink();
        let target = PollTarget {
            command: CommandId::GetUltrasonic,
            port: 1,
        };
        let poller = PollingScheduler::start(
            Arc::downgrade(&sink),
            1,
            Duration::from_millis(500),
            vec![target],
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(sink.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(sink.refreshed.lock().await.len(), 3);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let sink = alive_sink();
        let poller =
            PollingScheduler::start(Arc::downgrade(&sink), 1, Duration::from_millis(100), vec![]);

        tokio::time::sleep(Duration::from_millis(350)).await;
        poller.stop();
        let ticks = sink.ticks.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sink.ticks.load(Ordering::SeqCst), ticks);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_when_session_gone() {
        let sink = alive_sink();
        let poller =
            PollingScheduler::start(Arc::downgrade(&sink), 1, Duration::from_millis(100), vec![]);

        tokio::time::sleep(Duration::from_millis(250)).await;
        sink.alive.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(sink.ticks.load(Ordering::SeqCst), 2);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_when_sink_dropped() {
        let sink = alive_sink();
        let poller =
            PollingScheduler::start(Arc::downgrade(&sink), 1, Duration::from_millis(100), vec![]);

        drop(sink);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(!poller.is_running());
    }
}
