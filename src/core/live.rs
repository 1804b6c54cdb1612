//! Live referral feed - periodic re-fetch of a filtered lead list.
//!
//! A [`LiveFeed`] owns a background task that reloads the listing on a fixed
//! interval and publishes each result on a `watch` channel, so subscribers
//! always see the latest fetch and never a backlog. Stopping or dropping the
//! feed aborts the task.

use crate::core::referral::{self, LeadRow, ReferralFilter};
use chrono::Utc;
use sea_orm::{DatabaseConnection, prelude::DateTimeUtc};
use std::time::Duration;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

/// Shortest refresh interval accepted
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// The most recent fetch.
#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot {
    pub rows: Vec<LeadRow>,
    /// When `rows` was last fetched successfully
    pub refreshed_at: Option<DateTimeUtc>,
    /// Number of refreshes attempted so far
    pub generation: u64,
    /// Failure of the latest attempt; `rows` then holds the previous result
    pub error: Option<String>,
}

/// Handle to a running feed.
#[derive(Debug)]
pub struct LiveFeed {
    receiver: watch::Receiver<LiveSnapshot>,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Starts refreshing leads matching `filter` every `every`, beginning
    /// immediately.
    #[must_use]
    pub fn spawn(db: DatabaseConnection, filter: ReferralFilter, every: Duration) -> Self {
        let every = every.max(MIN_REFRESH_INTERVAL);
        let (sender, receiver) = watch::channel(LiveSnapshot::default());

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut generation = 0;

            loop {
                ticker.tick().await;
                generation += 1;

                let snapshot = match referral::list_all_leads(&db, &filter).await {
                    Ok(rows) => LiveSnapshot {
                        rows,
                        refreshed_at: Some(Utc::now()),
                        generation,
                        error: None,
                    },
                    Err(e) => {
                        warn!("Live refresh {generation} failed: {e}");
                        let previous = sender.borrow().clone();
                        LiveSnapshot {
                            generation,
                            error: Some(e.to_string()),
                            ..previous
                        }
                    }
                };

                if sender.send(snapshot).is_err() {
                    debug!("Live feed has no subscribers left, stopping");
                    break;
                }
            }
        });

        info!("Live feed started (every {}s)", every.as_secs_f64());
        Self { receiver, task }
    }

    /// A new receiver for snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LiveSnapshot> {
        self.receiver.clone()
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn latest(&self) -> LiveSnapshot {
        self.receiver.borrow().clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops refreshing. Subscribers see the channel close.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Live feed stopped");
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{errors::Result, test_utils::*};

    const WAIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_feed_publishes_fresh_rows() -> Result<()> {
        let (db, amb, campus) = setup_with_ambassador().await?;
        create_test_lead(&db, &amb, &campus).await?;

        let feed = LiveFeed::spawn(db.clone(), ReferralFilter::default(), MIN_REFRESH_INTERVAL);
        let mut updates = feed.subscribe();

        time::timeout(WAIT, updates.changed()).await.unwrap().unwrap();
        assert_eq!(updates.borrow_and_update().rows.len(), 1);

        create_test_lead(&db, &amb, &campus).await?;
        time::timeout(WAIT, async {
            loop {
                updates.changed().await.unwrap();
                if updates.borrow_and_update().rows.len() == 2 {
                    break;
                }
            }
        })
        .await
        .unwrap();

        let latest = feed.latest();
        assert!(latest.generation >= 2);
        assert!(latest.error.is_none());
        assert!(latest.refreshed_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_closes_channel() -> Result<()> {
        let db = setup_test_db().await?;
        let feed = LiveFeed::spawn(db, ReferralFilter::default(), Duration::ZERO);
        let mut updates = feed.subscribe();
        assert!(feed.is_running());

        feed.stop();
        let closed = time::timeout(WAIT, async {
            while updates.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
        Ok(())
    }
}
