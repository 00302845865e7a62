//! DispatchOrchestrator - 送信ループ本体
//!
//! # フロー（1 run）
//! 1. 状態ファイルを load → reconcile（resume or fresh）→ fresh なら即 save
//! 2. index window `[start, start+limit)` を昇順に走査
//! 3. 各 recipient について:
//!    - terminal ならスキップ（idempotent な resume）
//!    - id が空なら channel に触れずに Fail(blank_id)
//!    - それ以外は `vary(n)` を送信 → classify → settle
//! 4. settle のたびに状態ファイル全体を書き直す（checkpoint）
//! 5. 実送信のあとだけ jitter delay、`n` を 1 進める
//!
//! # 設計原則
//! - checkpoint は 1 attempt ごと。kill されても失うのは「送信中の 1 件」だけで、
//!   その 1 件は Pending のまま残るので次回 resume で再送される（at-least-once）
//! - channel のエラーは run を止めない（`SessionLost` と checkpoint 失敗を除く）
//! - session は最初の実送信の直前に開く。送るものがなければ login もしない
//! - stop signal は recipient の間と delay 中にだけ見る（送信途中では切らない）

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::builder::OrchestratorBuilder;
use super::campaign::{Campaign, CampaignSources};
use crate::domain::{
    AttemptOutcome, ChannelError, DeliveryState, FailureReason, MessageTemplate, MissiveResult,
    PhraseBook, Reconciliation, Recipient, RunId, VariationRules,
};
use crate::ports::{
    ChannelAdapter, ChannelSession, Clock, Credentials, DeliveryStateStore, RateLimiter,
    SessionOptions,
};

/// Per-run knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// First index (inclusive) to consider.
    pub start: usize,
    /// Window width. `0` means "to the end".
    pub limit: usize,
    /// Discard any persisted state and start over.
    pub reset: bool,
    /// Forwarded to the channel adapter.
    pub headless: bool,
}

impl RunOptions {
    /// Indices this run may touch, clamped to `len`.
    pub fn window(&self, len: usize) -> Range<usize> {
        let start = self.start.min(len);
        let end = match self.limit {
            0 => len,
            limit => self.start.saturating_add(limit).min(len),
        };
        start..end
    }
}

/// Run lifecycle: Idle -> Running -> {Completed, Aborted, Cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    /// Window exhausted.
    Completed,
    /// Session loss or checkpoint failure.
    Aborted,
    /// Stop signal observed between recipients.
    Cancelled,
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub state: RunState,
    pub reconciliation: Reconciliation,
    pub window: (usize, usize),
    /// Recipients settled by this run (including blank ids).
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Real sends handed to the channel.
    pub dispatched: u64,
    /// Already terminal when the run reached them.
    pub skipped: usize,
    pub by_reason: BTreeMap<FailureReason, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunReport {
    fn new(run_id: RunId, reconciliation: Reconciliation, window: &Range<usize>) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            reconciliation,
            window: (window.start, window.end),
            attempted: 0,
            succeeded: 0,
            failed: 0,
            dispatched: 0,
            skipped: 0,
            by_reason: BTreeMap::new(),
            abort_reason: None,
        }
    }

    fn record(&mut self, outcome: &AttemptOutcome) {
        self.attempted += 1;
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if let Some(reason) = outcome.reason {
            *self.by_reason.entry(reason).or_default() += 1;
        }
    }

    fn abort(&mut self, reason: impl Into<String>) {
        self.state = RunState::Aborted;
        self.abort_reason = Some(reason.into());
    }

    pub fn is_aborted(&self) -> bool {
        self.state == RunState::Aborted
    }
}

/// The dispatch engine. Build with [`DispatchOrchestrator::builder`].
pub struct DispatchOrchestrator {
    pub(crate) channel: Arc<dyn ChannelAdapter>,
    pub(crate) store: Arc<dyn DeliveryStateStore>,
    pub(crate) limiter: Arc<dyn RateLimiter>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) phrases: PhraseBook,
    pub(crate) variation: VariationRules,
}

impl DispatchOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn DeliveryStateStore> {
        &self.store
    }

    pub fn variation(&self) -> &VariationRules {
        &self.variation
    }

    /// Validate inputs, then run. Precondition failures return before the
    /// state file is touched.
    pub async fn run_from_sources(
        &self,
        sources: &CampaignSources,
        credentials: Credentials,
        options: &RunOptions,
        stop: watch::Receiver<bool>,
    ) -> MissiveResult<RunReport> {
        let campaign = Campaign::prepare(sources, credentials, self.clock.as_ref())?;
        self.run(&campaign, options, stop).await
    }

    /// Run without an external stop signal.
    pub async fn run_unattended(
        &self,
        campaign: &Campaign,
        options: &RunOptions,
    ) -> MissiveResult<RunReport> {
        let (_stop_tx, stop_rx) = watch::channel(false);
        self.run(campaign, options, stop_rx).await
    }

    /// Process the window once.
    ///
    /// `Err` only for failures before the first recipient is settled
    /// (state load, session open). Everything later ends in a report.
    pub async fn run(
        &self,
        campaign: &Campaign,
        options: &RunOptions,
        mut stop: watch::Receiver<bool>,
    ) -> MissiveResult<RunReport> {
        let started = self.clock.now().timestamp_millis().max(0) as u64;
        let run_id = RunId::generate(started);
        let span = info_span!("dispatch", run = %run_id);
        self.run_inner(run_id, campaign, options, &mut stop)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        run_id: RunId,
        campaign: &Campaign,
        options: &RunOptions,
        stop: &mut watch::Receiver<bool>,
    ) -> MissiveResult<RunReport> {
        let existing = self.store.load()?;
        let (mut state, reconciliation) = DeliveryState::reconcile(
            &campaign.recipients,
            existing,
            options.reset,
            self.clock.now(),
        );
        match reconciliation {
            Reconciliation::Fresh => {
                self.store.save(&state)?;
                info!(items = state.len(), "state initialised");
            }
            Reconciliation::Resumed => {
                info!(
                    items = state.len(),
                    terminal = state.terminal_count(),
                    "resuming persisted state"
                );
            }
        }

        let window = options.window(state.len());
        let mut report = RunReport::new(run_id, reconciliation, &window);
        report.state = RunState::Running;
        info!(start = window.start, end = window.end, "run started");

        let mut session: Option<Box<dyn ChannelSession>> = None;
        for index in window {
            let stop_requested = *stop.borrow();
            if stop_requested {
                info!(index, "stop requested");
                report.state = RunState::Cancelled;
                break;
            }

            let recipient = state.items[index].clone();
            if recipient.status.is_terminal() {
                report.skipped += 1;
                continue;
            }

            let outcome = if recipient.has_blank_id() {
                AttemptOutcome::blank_id()
            } else {
                let active = match session.take() {
                    Some(active) => active,
                    None => self.open_session(campaign, options).await?,
                };
                let active = session.insert(active);
                self.attempt(
                    &mut **active,
                    &recipient,
                    &campaign.template,
                    report.dispatched,
                )
                .await
            };

            state.settle(index, outcome.status, outcome.reason, self.clock.now())?;
            if let Err(e) = self.store.save(&state) {
                error!(index, error = %e, "checkpoint failed");
                report.abort(format!("checkpoint failed: {e}"));
                break;
            }
            report.record(&outcome);
            info!(
                index,
                id = recipient.dispatch_id(),
                status = %outcome.status,
                reason = outcome.reason.map(FailureReason::as_str),
                "recipient settled"
            );

            if outcome.reason == Some(FailureReason::SessionLost) {
                report.abort("channel session lost");
                break;
            }

            if outcome.dispatched {
                report.dispatched += 1;
                tokio::select! {
                    _ = self.limiter.delay() => {}
                    _ = wait_for_stop(stop) => debug!("delay interrupted by stop signal"),
                }
            }
        }

        if report.state == RunState::Running {
            report.state = RunState::Completed;
        }
        if let Some(active) = session {
            if let Err(e) = active.close().await {
                warn!(error = %e, "closing channel session failed");
            }
        }

        info!(
            state = ?report.state,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "run finished"
        );
        Ok(report)
    }

    async fn open_session(
        &self,
        campaign: &Campaign,
        options: &RunOptions,
    ) -> MissiveResult<Box<dyn ChannelSession>> {
        let session = self
            .channel
            .open_session(
                &campaign.credentials,
                SessionOptions {
                    headless: options.headless,
                },
            )
            .await?;
        info!(account = %campaign.credentials.account, "channel session opened");
        Ok(session)
    }

    /// One send. Never fails: adapter errors fold into the outcome.
    async fn attempt(
        &self,
        session: &mut dyn ChannelSession,
        recipient: &Recipient,
        template: &MessageTemplate,
        n: u64,
    ) -> AttemptOutcome {
        let message = template.vary(n, &self.variation);
        match session.send(recipient.dispatch_id(), &message).await {
            Ok(text) => {
                let classification = self.phrases.classify(&text);
                debug!(index = recipient.index, ?classification, raw = %text, "confirmation");
                AttemptOutcome::classified(classification)
            }
            Err(ChannelError::SessionLost(detail)) => {
                error!(index = recipient.index, %detail, "channel session lost");
                AttemptOutcome::session_lost()
            }
            Err(e) => {
                warn!(index = recipient.index, error = %e, "send failed");
                AttemptOutcome::adapter_error()
            }
        }
    }
}

/// Resolves once the stop flag is raised. Pends forever if the sender is gone.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    let closed = stop.wait_for(|stopped| *stopped).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
