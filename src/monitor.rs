use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};

use crate::{coordinator::StartCoordinator, counters::RunCounters};

/// One progress line emitted by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub elapsed: Duration,
    pub qps: f64,
}

/// Successes per second since the timed phase started; no smoothing.
pub fn live_qps(successes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        successes as f64 / secs
    } else {
        0.0
    }
}

/// Monitor task: logs live throughput every `tick` and owns duration enforcement.
///
/// When `duration` has elapsed since `started` it makes the single
/// [`StartCoordinator::stop`] call of the run and returns the progress it logged.
/// Workers never stop themselves on a timer.
pub async fn monitor_task(
    coordinator: Arc<StartCoordinator>,
    counters: Arc<RunCounters>,
    started: Instant,
    duration: Duration,
    tick: Duration,
) -> Vec<Progress> {
    let deadline = started + duration;
    let mut ticker = tokio::time::interval_at(started + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut progress = Vec::new();

    loop {
        tokio::select! {
            biased;
            _ = tokio::time::sleep_until(deadline) => break,
            _ = ticker.tick() => {
                let elapsed = started.elapsed();
                let qps = live_qps(counters.successes(), elapsed);
                tracing::info!("[{:3.0}s] QPS: {qps:.0}", elapsed.as_secs_f64());
                progress.push(Progress { elapsed, qps });
            }
        }
    }

    tracing::info!("Run duration reached, signaling stop...");
    coordinator.stop();
    progress
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qps_handles_zero_elapsed() {
        assert_eq!(live_qps(100, Duration::ZERO), 0.0);
        assert_eq!(live_qps(100, Duration::from_secs(4)), 25.0);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_duration_and_ticks_in_between() {
        let coord = Arc::new(StartCoordinator::new(1));
        let counters = Arc::new(RunCounters::new());
        for _ in 0..120 {
            counters.record_success();
        }

        let started = Instant::now();
        let progress = monitor_task(
            coord.clone(),
            counters,
            started,
            Duration::from_secs(12),
            Duration::from_secs(5),
        )
        .await;

        assert!(coord.is_stopped());
        assert_eq!(started.elapsed(), Duration::from_secs(12));
        assert_eq!(
            progress.iter().map(|p| p.elapsed).collect::<Vec<_>>(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
        assert_eq!(progress[0].qps, 24.0);
        assert_eq!(progress[1].qps, 12.0);
    }

    #[tokio::test(start_paused = true)]
    async fn duration_shorter_than_tick_still_stops() {
        let coord = Arc::new(StartCoordinator::new(1));
        let started = Instant::now();
        let progress = monitor_task(
            coord.clone(),
            Arc::new(RunCounters::new()),
            started,
            Duration::from_secs(2),
            Duration::from_secs(5),
        )
        .await;

        assert!(progress.is_empty());
        assert!(coord.is_stopped());
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
