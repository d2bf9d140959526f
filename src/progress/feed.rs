//! Consumer side of a hub subscription.
//!
//! A feed opens with a single [`ProgressEvent::Connected`], then yields one
//! [`ProgressEvent::Progress`] per published snapshot. When nothing arrives
//! for a full heartbeat interval it yields [`ProgressEvent::Heartbeat`] so
//! long-lived transports can keep their connection open.

use std::time::Duration;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::hub::Subscription;
use super::types::Progress;

/// Idle time after which a feed emits a heartbeat.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// One item of a progress feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProgressEvent {
    /// First event of every feed.
    Connected,
    /// Keep-alive after an idle interval.
    Heartbeat,
    /// A progress snapshot.
    Progress(Progress),
}

/// Live stream of [`ProgressEvent`]s backed by one hub subscription.
///
/// Dropping the feed unsubscribes.
#[derive(Debug)]
pub struct ProgressFeed {
    subscription: Subscription,
    heartbeat: Interval,
    connected_sent: bool,
}

impl ProgressFeed {
    /// Wraps `subscription`, emitting heartbeats every `heartbeat` of
    /// silence.
    #[must_use]
    pub fn new(subscription: Subscription, heartbeat: Duration) -> Self {
        let period = heartbeat.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            subscription,
            heartbeat: interval,
            connected_sent: false,
        }
    }

    /// Next event, or `None` once the hub has gone away.
    pub async fn next(&mut self) -> Option<ProgressEvent> {
        if !self.connected_sent {
            self.connected_sent = true;
            self.heartbeat.reset();
            return Some(ProgressEvent::Connected);
        }

        tokio::select! {
            progress = self.subscription.recv() => {
                self.heartbeat.reset();
                progress.map(ProgressEvent::Progress)
            }
            _ = self.heartbeat.tick() => Some(ProgressEvent::Heartbeat),
        }
    }

    /// Takes an already queued snapshot without waiting. Never yields
    /// `Connected` or `Heartbeat`.
    pub fn try_next(&mut self) -> Option<ProgressEvent> {
        self.subscription.try_recv().map(ProgressEvent::Progress)
    }

    /// Converts the feed into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send {
        futures_util::stream::unfold(self, |mut feed| async move {
            let event = feed.next().await?;
            Some((event, feed))
        })
    }
}
