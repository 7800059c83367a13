//! Background removal of expired sessions.

use std::{sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{Clock, SessionStore};

/// How often the sweeper runs by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Shortest interval the sweeper accepts.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Run `sweep_expired` every `every`, starting one interval from now.
///
/// Intervals below `MIN_SWEEP_INTERVAL` are raised to it. The task runs
/// until aborted.
pub fn spawn_sweeper<C: Clock>(store: Arc<SessionStore<C>>, every: Duration) -> JoinHandle<()> {
    let every = if every < MIN_SWEEP_INTERVAL {
        tracing::warn!(
            requested_ms = u64::try_from(every.as_millis()).unwrap_or(u64::MAX),
            "Sweep interval too short; using one second"
        );
        MIN_SWEEP_INTERVAL
    } else {
        every
    };

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match store.sweep_expired() {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Swept expired sessions"),
                Err(e) => tracing::warn!("Session sweep failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::{ClientContext, ManualClock};

    #[tokio::test]
    async fn test_sweeper_removes_expired_sessions() {
        let clock = ManualClock::default();
        let store = Arc::new(SessionStore::new(clock.clone()));
        store.create("admin", &ClientContext::default()).unwrap();
        store.create("admin", &ClientContext::default()).unwrap();

        let handle = spawn_sweeper(Arc::clone(&store), MIN_SWEEP_INTERVAL);
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert_eq!(store.len(), 2);

        clock.advance(TimeDelta::minutes(16));
        let mut emptied = false;
        for _ in 0..100 {
            if store.is_empty() {
                emptied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert!(emptied);
    }

    #[tokio::test]
    async fn test_zero_interval_is_raised_not_fatal() {
        let clock = ManualClock::default();
        let store = Arc::new(SessionStore::new(clock.clone()));
        store.create("admin", &ClientContext::default()).unwrap();

        let handle = spawn_sweeper(Arc::clone(&store), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        clock.advance(TimeDelta::minutes(16));
        let mut emptied = false;
        for _ in 0..100 {
            if store.is_empty() {
                emptied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!handle.is_finished());
        handle.abort();
        assert!(emptied);
    }
}
