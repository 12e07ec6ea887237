//! # Live user counter
//!
//! Keeps `public_stats.total_users` current for the landing page: one fetch
//! at start, then push updates when the backend offers a subscription, else
//! a fixed-interval poll. A closed subscription falls back to polling.

use std::sync::Arc;
use std::time::Duration;

use domains::{StatsRepository, StatsSubscriber};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub total_users: Option<i64>,
    /// Set when the initial fetch failed and nothing has arrived since.
    pub error:       bool,
}

/// Background task plus the latest value it has seen. Dropping it stops the task.
pub struct LiveCounter {
    rx:   watch::Receiver<CounterSnapshot>,
    task: JoinHandle<()>,
}

impl LiveCounter {
    pub fn spawn(
        stats: Arc<dyn StatsRepository>,
        subscriber: Option<Arc<dyn StatsSubscriber>>,
        poll_interval: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(CounterSnapshot::default());
        let task = tokio::spawn(run(stats, subscriber, poll_interval, tx));
        Self { rx, task }
    }

    pub fn current(&self) -> CounterSnapshot {
        *self.rx.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<CounterSnapshot> {
        self.rx.clone()
    }
}

impl Drop for LiveCounter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn publish(tx: &watch::Sender<CounterSnapshot>, total: i64) {
    tx.send_replace(CounterSnapshot { total_users: Some(total), error: false });
}

async fn run(
    stats: Arc<dyn StatsRepository>,
    subscriber: Option<Arc<dyn StatsSubscriber>>,
    poll_interval: Duration,
    tx: watch::Sender<CounterSnapshot>,
) {
    // Subscribe before the first fetch so no change falls between the two.
    let updates = match subscriber {
        Some(subscriber) => match subscriber.subscribe().await {
            Ok(updates) => Some(updates),
            Err(e) => {
                tracing::warn!(error = %e, "user count subscription failed, polling instead");
                None
            }
        },
        None => None,
    };

    match stats.total_users().await {
        Ok(total) => publish(&tx, total),
        Err(e) => {
            tracing::warn!(error = %e, "initial user count fetch failed");
            tx.send_replace(CounterSnapshot { total_users: None, error: true });
        }
    }

    if let Some(mut updates) = updates {
        while let Some(total) = updates.recv().await {
            publish(&tx, total);
        }
        tracing::info!("user count subscription closed, polling instead");
    }

    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match stats.total_users().await {
            Ok(total) => publish(&tx, total),
            Err(e) => tracing::debug!(error = %e, "user count poll failed, keeping last value"),
        }
    }
}
