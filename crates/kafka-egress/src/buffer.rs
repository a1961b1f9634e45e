//! The egress buffer: the core engine described in full by §4.3 of the
//! spec. A single task multiplexes ingress, a flush tick, a liveness tick,
//! and cancellation via `tokio::select!` — the same idiom the pack uses
//! for cancellable background loops (see
//! `PostHog-posthog/rust/capture/src/event_restrictions/manager.rs`'s
//! `start_refresh_task`, which races a `CancellationToken` against a
//! `tokio::time::interval`).

use crate::config::EgressConfig;
use crate::envelope;
use crate::liveness::probe_message;
use crate::spool::Spool;
use crate::writer::{Writer, WriterError};
use common::{notify, Message, ObservabilityEvent, ObservabilitySender};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum EgressError {
    /// The only fatal case: the very first liveness probe, issued
    /// synchronously at startup, failed. Cold-start misconfiguration
    /// should not be masked, so this surfaces instead of silently
    /// entering DOWN (§4.3.6, §7).
    #[error("startup liveness probe failed: {0}")]
    StartupProbeFailed(#[from] WriterError),
}

/// Point-in-time snapshot of the buffer's counters, for tests and the
/// observability HTTP endpoint (§3 "Buffer state").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStats {
    pub alive: bool,
    pub spool_depth: usize,
    pub writes: u64,
    pub msgs: u64,
    pub failures: u64,
}

/// Outcome of a single guarded Writer call: either it resolved (with a
/// success or transient failure), or cancellation won the race first.
enum WriteOutcome {
    Ok,
    Failed,
    Cancelled,
}

pub struct EgressBuffer {
    config: EgressConfig,
    writer: Arc<dyn Writer>,
    obs_tx: ObservabilitySender,
    cancel: CancellationToken,

    spool: Spool,
    alive: bool,
    last_probe_at: Instant,
    shutting_down: bool,

    writes: u64,
    msgs: u64,
    failures: u64,

    /// Latest-value broadcast of [`BufferStats`], in the shape of
    /// PostHog's `common/health::HealthHandle`: a component pushes its
    /// current status and any number of readers can observe the latest
    /// value without ever blocking the publisher. Used by the
    /// `metamorphosis` binary's `/healthz`/`/metrics` endpoints.
    stats_tx: watch::Sender<BufferStats>,
}

impl EgressBuffer {
    pub fn new(
        config: EgressConfig,
        writer: Arc<dyn Writer>,
        obs_tx: ObservabilitySender,
        cancel: CancellationToken,
    ) -> Self {
        let (stats_tx, _) = watch::channel(BufferStats::default());
        Self {
            config,
            writer,
            obs_tx,
            cancel,
            spool: Spool::new(),
            alive: false,
            last_probe_at: Instant::now(),
            shutting_down: false,
            writes: 0,
            msgs: 0,
            failures: 0,
            stats_tx,
        }
    }

    pub fn stats(&self) -> BufferStats {
        BufferStats {
            alive: self.alive,
            spool_depth: self.spool.len(),
            writes: self.writes,
            msgs: self.msgs,
            failures: self.failures,
        }
    }

    /// Subscribe to live stats updates. Must be called before [`Self::run`]
    /// consumes `self`; the returned receiver always reflects the most
    /// recently published snapshot, starting from the zero value.
    pub fn subscribe(&self) -> watch::Receiver<BufferStats> {
        self.stats_tx.subscribe()
    }

    fn publish_stats(&self) {
        // A `watch` send only fails once every receiver has been dropped,
        // which just means nothing is observing this buffer's health —
        // not a reason to log or alter behavior.
        let _ = self.stats_tx.send(self.stats());
    }

    /// Run the buffer to completion: a synchronous startup probe, then the
    /// main event multiplex until cancellation or ingress end-of-stream.
    ///
    /// Returns `Err` only for a failed startup probe (§4.3.3, §7). Every
    /// other failure mode is absorbed internally and `run` returns
    /// `Ok(stats)` on orderly termination.
    pub async fn run(mut self, mut ingress: mpsc::Receiver<Message>) -> Result<BufferStats, EgressError> {
        if self.startup_probe().await? {
            // Cancelled before we ever came up — nothing more to do.
            return Ok(self.stats());
        }
        self.publish_stats();

        let mut flush_tick = interval(self.config.interval);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut liveness_tick = interval(self.config.failure_retry_interval);
        liveness_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                // Priority 1: cancellation always wins (§4.3.4 item 1).
                _ = self.cancel.cancelled() => {
                    info!("cancellation received, draining and exiting");
                    break;
                }

                // Priority 2: service ingress as soon as it's available
                // (§4.3.4 item 2, plus the DOWN-state spool-and-maybe-probe
                // behavior from §4.3.3).
                maybe_message = ingress.recv() => {
                    match maybe_message {
                        Some(message) => self.handle_ingress(message).await,
                        None => {
                            info!("ingress channel closed, draining spool best-effort");
                            break;
                        }
                    }
                }

                // Only relevant while DOWN: periodic probe attempts.
                _ = liveness_tick.tick(), if !self.alive => {
                    self.attempt_recovery().await;
                }

                // Only relevant while ALIVE: flush whatever partial batch
                // is sitting in the spool (§4.3.4 item 5).
                _ = flush_tick.tick(), if self.alive => {
                    self.handle_flush_tick().await;
                }
            }

            self.publish_stats();
            if self.shutting_down {
                break;
            }
        }

        info!(
            spool_depth = self.spool.len(),
            writes = self.writes,
            msgs = self.msgs,
            failures = self.failures,
            alive = self.alive,
            "egress buffer exiting"
        );
        Ok(self.stats())
    }

    /// Race a Writer call against cancellation, per §4.3.7: "the
    /// cancellation scope propagates into any ongoing Writer call as a
    /// deadline; a Writer stuck in a deadlock must unblock when the scope
    /// is cancelled."
    async fn write_guarded(&self, records: &[Vec<u8>]) -> WriteOutcome {
        tokio::select! {
            result = self.writer.write(records, self.config.kafka_timeout) => {
                match result {
                    Ok(()) => WriteOutcome::Ok,
                    Err(err) => {
                        warn!(error = %err, "writer reported a transient failure");
                        WriteOutcome::Failed
                    }
                }
            }
            _ = self.cancel.cancelled() => WriteOutcome::Cancelled,
        }
    }

    /// Returns `true` if cancellation won the race before the probe
    /// resolved (in which case the buffer never comes ALIVE and `run`
    /// should exit immediately).
    async fn startup_probe(&mut self) -> Result<bool, EgressError> {
        let probe = probe_message(&self.config.test_message_topic);
        let record = envelope::encode(&probe).expect("probe message always encodes");

        tokio::select! {
            result = self.writer.write(&[record], self.config.kafka_timeout) => {
                match result {
                    Ok(()) => {
                        self.alive = true;
                        self.writes += 1;
                        self.msgs += 1;
                        self.last_probe_at = Instant::now();
                        info!("startup liveness probe succeeded");
                        Ok(false)
                    }
                    Err(err) => {
                        error!(error = %err, "startup liveness probe failed");
                        Err(EgressError::StartupProbeFailed(err))
                    }
                }
            }
            _ = self.cancel.cancelled() => {
                warn!("cancelled while waiting on the startup liveness probe");
                Ok(true)
            }
        }
    }

    async fn handle_ingress(&mut self, message: Message) {
        self.spool.push_back(message);

        if self.alive {
            let len = self.spool.len();
            if len >= self.config.max_batch_size {
                self.flush(self.config.max_batch_size).await;
            } else if len >= self.config.batch_size {
                self.flush(len.min(self.config.max_batch_size)).await;
            }
        } else if self.last_probe_at.elapsed() >= self.config.failure_retry_interval {
            self.attempt_recovery().await;
        }
    }

    async fn handle_flush_tick(&mut self) {
        if !self.spool.is_empty() {
            let n = self.spool.len().min(self.config.max_batch_size);
            self.flush(n).await;
        }
    }

    /// Test liveness by attempting to flush the spool head directly —
    /// the DOWN state is only ever entered with a non-empty spool (a
    /// failed flush always returns its batch to the head), so the real
    /// backlog doubles as the probe: a dedicated synthetic probe Record
    /// is only needed once, at startup, before there is anything to
    /// despool. On success this both counts as the recovery write and
    /// folds directly into despool; on failure the buffer stays DOWN and
    /// `lastProbeAt` is refreshed by `flush` itself.
    async fn attempt_recovery(&mut self) {
        let n = self.spool.len().min(self.config.max_batch_size);
        self.flush(n).await;
        if self.alive {
            info!("recovery write succeeded, despooling remainder");
            self.despool().await;
        }
    }

    /// Drain the spool in chunks of at most `max_batch_size` until it's
    /// empty, a flush fails (back to DOWN), or cancellation interrupts.
    /// Resumable by construction: a later call just continues consuming
    /// from whatever the spool head is at that time (§4.3.5).
    async fn despool(&mut self) {
        while !self.spool.is_empty() && self.alive && !self.shutting_down {
            let n = self.spool.len().min(self.config.max_batch_size);
            self.flush(n).await;
        }
    }

    /// Submit up to `n` messages from the spool head as one batch.
    /// Codec failures drop the offending message and continue with the
    /// remainder (§4.1); a full-batch write failure returns the
    /// surviving messages to the spool head, preserving order, and
    /// transitions to DOWN (§4.3.3's "critical ordering rule").
    async fn flush(&mut self, n: usize) {
        let batch = self.spool.take_front(n);
        if batch.is_empty() {
            return;
        }

        let mut records = Vec::with_capacity(batch.len());
        let mut survivors = Vec::with_capacity(batch.len());
        for message in batch {
            match envelope::encode(&message) {
                Ok(record) => {
                    records.push(record);
                    survivors.push(message);
                }
                Err(err) => {
                    error!(error = %err, topic = %message.topic, "dropping un-serializable message");
                    notify(&self.obs_tx, ObservabilityEvent::KafkaError);
                }
            }
        }

        if records.is_empty() {
            return;
        }

        match self.write_guarded(&records).await {
            WriteOutcome::Ok => {
                self.writes += 1;
                self.msgs += survivors.len() as u64;
                for _ in &survivors {
                    notify(&self.obs_tx, ObservabilityEvent::KafkaSent);
                }
                if !self.alive {
                    info!("kafka write succeeded, leaving DOWN state");
                }
                self.alive = true;
            }
            WriteOutcome::Failed => {
                let spool_depth_after = survivors.len() + self.spool.len();
                self.spool.prepend(survivors);
                notify(&self.obs_tx, ObservabilityEvent::KafkaError);
                self.failures += 1;
                self.last_probe_at = Instant::now();
                if self.alive {
                    warn!(spool_depth = spool_depth_after, "kafka write failed, entering DOWN state");
                }
                self.alive = false;
            }
            WriteOutcome::Cancelled => {
                // Batch is abandoned in flight; not re-prepended. At-least-once
                // for these specific messages is the MQTT broker's job on
                // reconnect (§4.3.7).
                self.shutting_down = true;
            }
        }
    }
}

/// Bootstraps an ingress channel alongside an [`EgressBuffer`]. The
/// ingress channel is unbuffered (capacity 1, the closest `mpsc` gets to
/// a true rendezvous channel) so that a slow or DOWN buffer applies
/// backpressure straight through to the MQTT collaborator, per §5.
pub fn ingress_channel() -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    mpsc::channel(1)
}
