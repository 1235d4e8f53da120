//! Polling helpers for the session state machine.
//!
//! Nothing in the pipeline gets notified of anything. Every external fact
//! (driver up, run over, file landed, size settled) is discovered by
//! sleeping and looking again.

use std::time::Duration;

use tokio::time::sleep;

/// Sleep `interval`, then check, up to `max_attempts` times.
///
/// Returns true as soon as `probe` does. A full miss costs
/// `interval * max_attempts` of wall clock.
pub async fn poll_until<F>(interval: Duration, max_attempts: u32, mut probe: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..max_attempts {
        sleep(interval).await;
        if probe() {
            return true;
        }
    }
    false
}

/// Check `probe` every `interval` for as long as `gate` holds.
///
/// Returns true when the probe is satisfied, false when the gate closed
/// first. The probe is consulted before the gate, so a probe that comes
/// true in the same tick the gate closes still wins.
pub async fn poll_while<G, F>(interval: Duration, mut gate: G, mut probe: F) -> bool
where
    G: FnMut() -> bool,
    F: FnMut() -> bool,
{
    loop {
        if probe() {
            return true;
        }
        if !gate() {
            return false;
        }
        sleep(interval).await;
    }
}

/// Sleep-poll until `open` reports the gate has dropped.
pub async fn wait_for_close<G>(interval: Duration, mut open: G)
where
    G: FnMut() -> bool,
{
    while open() {
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn poll_until_stops_at_first_success() {
        let mut calls = 0;
        let hit = poll_until(Duration::from_millis(500), 10, || {
            calls += 1;
            calls == 3
        })
        .await;
        assert!(hit);
        assert_eq!(calls, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_spends_its_whole_budget_on_a_miss() {
        let start = tokio::time::Instant::now();
        let hit = poll_until(Duration::from_millis(500), 10, || false).await;
        assert!(!hit);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_while_gives_up_when_the_gate_closes() {
        let mut ticks = 0;
        let satisfied = poll_while(
            Duration::from_millis(500),
            || {
                ticks += 1;
                ticks < 4
            },
            || false,
        )
        .await;
        assert!(!satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_wins_over_a_closing_gate() {
        let satisfied = poll_while(Duration::from_millis(500), || false, || true).await;
        assert!(satisfied);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_close_returns_once_the_gate_drops() {
        let start = tokio::time::Instant::now();
        let mut ticks = 0;
        wait_for_close(Duration::from_secs(1), || {
            ticks += 1;
            ticks <= 3
        })
        .await;
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }
}
