use std::time::Duration;
use tracing::debug;

use crate::error::FleetError;

/// How long to keep re-reading a status attribute before giving up.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_millis(500), max_attempts: Some(60) }
    }
}

/// Re-checks `probe` against `target` every `policy.interval` until it
/// holds. Yields to the runtime between checks; fails with
/// [`FleetError::Timeout`] once `max_attempts` sleeps have passed.
pub async fn poll_until<S, F>(policy: &PollPolicy, op: &str, target: &mut S, mut probe: F) -> Result<(), FleetError>
where
    S: ?Sized,
    F: FnMut(&S) -> bool,
{
    let mut attempts = 0u32;
    loop {
        if probe(&*target) {
            debug!("{}: converged after {} polls", op, attempts);
            return Ok(());
        }
        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(FleetError::Timeout { op: op.to_string(), attempts });
            }
        }
        attempts += 1;
        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max: Option<u32>) -> PollPolicy {
        PollPolicy { interval: Duration::from_millis(1), max_attempts: max }
    }

    #[tokio::test]
    async fn test_immediate_success_does_not_sleep() {
        let mut n = 0u32;
        poll_until(&fast(Some(0)), "noop", &mut n, |_| true).await.unwrap();
    }

    #[tokio::test]
    async fn test_converges_after_some_polls() {
        let mut reads = std::cell::Cell::new(0u32);
        poll_until(&fast(Some(10)), "count", &mut reads, |c| {
            c.set(c.get() + 1);
            c.get() >= 4
        })
        .await
        .unwrap();
        assert_eq!(reads.get(), 4);
    }

    #[tokio::test]
    async fn test_gives_up_with_timeout() {
        let mut unit = ();
        let err = poll_until(&fast(Some(3)), "stuck", &mut unit, |_| false).await.unwrap_err();
        assert!(matches!(err, FleetError::Timeout { attempts: 3, .. }));
        assert_eq!(err.kind(), "timeout");
    }
}
