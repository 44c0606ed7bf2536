//! Timer-driven fetch → aggregate → push cycle.
//!
//! ```text
//!   ┌────────────┐  join!(cricket, football, h2h)  ┌───────────┐
//!   │  Fetching  │ ──────────────────────────────▶ │  Pushing  │
//!   └────────────┘                                 └───────────┘
//!         ▲        sleep(interval) after every cycle      │
//!         └───────────────────────────────────────────────┘
//! ```
//!
//! The sleep is a fixed delay after each cycle, not a fixed-rate schedule:
//! the period is `cycle duration + interval`.

use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::PushError;
use crate::feeds::Feeds;
use crate::registry::{Subscriber, SubscriberRegistry};
use crate::snapshot::Snapshot;

/// Tunables for the broadcast loop.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Idle delay between the end of one cycle and the start of the next
    pub interval: Duration,
    /// Upper bound on a single subscriber push
    pub push_timeout: Duration,
    /// Value of the snapshot's `server` field
    pub server_tag: String,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Subscribers that received the snapshot
    pub reached: usize,
    /// Subscribers removed because their push failed
    pub dropped: usize,
    pub cricket: usize,
    pub football: usize,
    pub headtohead: usize,
}

pub struct Broadcaster {
    feeds: Feeds,
    registry: SubscriberRegistry,
    settings: BroadcastSettings,
}

impl Broadcaster {
    pub fn new(feeds: Feeds, registry: SubscriberRegistry, settings: BroadcastSettings) -> Self {
        Broadcaster {
            feeds,
            registry,
            settings,
        }
    }

    /// Spawn the perpetual broadcast task. It stops when `cancel` fires,
    /// abandoning any in-flight fetch or push.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Broadcast loop started (interval={:?}, push_timeout={:?})",
                self.settings.interval, self.settings.push_timeout
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.run_cycle() => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.interval) => {}
                }
            }

            info!("Broadcast loop stopped");
        })
    }

    /// Run one fetch → aggregate → push pass and prune failed subscribers.
    pub async fn run_cycle(&self) -> CycleReport {
        let batch = self.feeds.fetch_all().await;
        let snapshot = Snapshot::assemble(batch, Utc::now(), &self.settings.server_tag);
        if snapshot.is_empty() {
            warn!("Every feed came back empty this cycle");
        }

        let mut report = CycleReport {
            cricket: snapshot.cricket.len(),
            football: snapshot.football.len(),
            headtohead: snapshot.headtohead.len(),
            ..Default::default()
        };

        let frame = match snapshot.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to serialize snapshot, skipping push: {}", e);
                return report;
            }
        };

        // Registrations after this point wait for the next cycle
        let members = self.registry.snapshot_membership().await;
        let pushes = members
            .iter()
            .map(|sub| self.push(sub, Arc::clone(&frame)));
        let delivered = join_all(pushes).await;

        let failed: Vec<&Subscriber> = members
            .iter()
            .zip(delivered)
            .filter_map(|(sub, ok)| (!ok).then_some(sub))
            .collect();
        report.reached = members.len() - failed.len();
        for sub in failed {
            // The gateway may have removed it already
            if self.registry.unregister(sub.id).await {
                report.dropped += 1;
            }
            // A timed-out send can leave a partial frame behind; end the session
            sub.evict();
        }

        let clients = self.registry.len().await;
        info!(
            reached = report.reached,
            dropped = report.dropped,
            cricket = report.cricket,
            football = report.football,
            headtohead = report.headtohead,
            clients,
            "Broadcast cycle complete"
        );
        report
    }

    /// Push the frame to one subscriber. Returns whether it was delivered.
    async fn push(&self, sub: &Subscriber, frame: Arc<str>) -> bool {
        let timeout = self.settings.push_timeout;
        let result = match tokio::time::timeout(timeout, sub.sink.send_frame(frame)).await {
            Ok(result) => result,
            Err(_) => Err(PushError::Timeout {
                ms: timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(subscriber = %sub.id, error = %e, "Push failed, dropping subscriber");
                false
            }
        }
    }
}
