use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::campaign::Campaign;
use super::orchestrator::{DispatchOrchestrator, RunOptions, RunReport};
use crate::domain::{MissiveError, MissiveResult};

/// Background dispatch run handle.
/// - `request_stop()` で次の recipient に進む前に止まる（送信中の 1 件は完了させる）
/// - `abort()` はその場で task を落とす。checkpoint 済みの分だけが残る
/// - `join()` で RunReport を受け取る
pub struct DispatchHandle {
    stop: StopHandle,
    join: JoinHandle<MissiveResult<RunReport>>,
}

/// Cloneable stop switch, usable after the `DispatchHandle` is consumed by `join()`.
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn request_stop(&self) {
        // ignore send error: the run may already be finished
        let _ = self.tx.send(true);
    }
}

pub struct DispatchWorker;

impl DispatchWorker {
    /// Spawn one run on the current tokio runtime.
    pub fn spawn(
        orchestrator: Arc<DispatchOrchestrator>,
        campaign: Campaign,
        options: RunOptions,
    ) -> DispatchHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join =
            tokio::spawn(async move { orchestrator.run(&campaign, &options, stop_rx).await });
        DispatchHandle {
            stop: StopHandle {
                tx: Arc::new(stop_tx),
            },
            join,
        }
    }
}

impl DispatchHandle {
    /// Ask the run to stop between recipients.
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Kill the run immediately (simulates a crash).
    pub fn abort(&self) {
        self.join.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> MissiveResult<RunReport> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(MissiveError::Worker("run was aborted".into())),
            Err(e) => Err(MissiveError::Worker(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::orchestrator::RunState;
    use crate::domain::{DeliveryStatus, MessageTemplate, Recipient};
    use crate::domain::classifier::SUCCESS_PHRASE;
    use crate::impls::{
        InMemoryStateStore, JitterRateLimiter, NoDelay, ScriptedChannel, ScriptedReply,
    };
    use crate::ports::Credentials;
    use chrono::Utc;
    use std::time::Duration;

    fn setup(channel: ScriptedChannel) -> (Arc<DispatchOrchestrator>, Arc<InMemoryStateStore>) {
        let store = Arc::new(InMemoryStateStore::new());
        let orchestrator = DispatchOrchestrator::builder()
            .channel(Arc::new(channel))
            .store(store.clone())
            .rate_limiter(Arc::new(NoDelay))
            .build()
            .unwrap();
        (Arc::new(orchestrator), store)
    }

    fn campaign(n: usize) -> Campaign {
        let now = Utc::now();
        let recipients = (0..n).map(|i| Recipient::new(i, format!("r{i}"), now)).collect();
        Campaign::new(recipients, MessageTemplate::new("hi"), Credentials::new("me", "pw"))
    }

    #[tokio::test]
    async fn join_returns_the_report() {
        let (orchestrator, store) = setup(ScriptedChannel::always_success());
        let handle = DispatchWorker::spawn(orchestrator, campaign(3), RunOptions::default());

        let report = handle.join().await.unwrap();
        assert_eq!(report.state, RunState::Completed);
        assert_eq!(store.snapshot().unwrap().count(DeliveryStatus::Success), 3);
    }

    #[tokio::test]
    async fn stop_request_interrupts_the_pacing_delay() {
        // the stop lands during the 30 s delay after the first send
        let channel = ScriptedChannel::new(ScriptedReply::Hang)
            .then(ScriptedReply::text(SUCCESS_PHRASE));
        let stats = channel.stats();
        let store = Arc::new(InMemoryStateStore::new());
        let orchestrator = DispatchOrchestrator::builder()
            .channel(Arc::new(channel))
            .store(store.clone())
            .rate_limiter(Arc::new(JitterRateLimiter::new(
                Duration::from_secs(30),
                Duration::from_secs(30),
            )))
            .build()
            .unwrap();
        let handle =
            DispatchWorker::spawn(Arc::new(orchestrator), campaign(3), RunOptions::default());

        tokio::time::timeout(Duration::from_secs(5), async {
            while stats.send_count() < 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let stop = handle.stop_handle();
        stop.request_stop();
        let report = tokio::time::timeout(Duration::from_secs(5), handle.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.state, RunState::Cancelled);
        assert_eq!(stats.send_count(), 1);
        assert_eq!(store.snapshot().unwrap().terminal_count(), 1);
    }

    #[tokio::test]
    async fn abort_surfaces_as_worker_error() {
        let (orchestrator, _store) = setup(ScriptedChannel::new(ScriptedReply::Hang));
        let handle = DispatchWorker::spawn(orchestrator, campaign(2), RunOptions::default());
        handle.abort();

        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, MissiveError::Worker(_)));
    }
}
