use tokio::time::{Duration, Instant};

/// Single-shot cancellable deadline bound to one in-flight think.
///
/// Expiry is consumed as a `select!` arm in the session actor, so it is
/// serialized with engine events and caller commands rather than firing from
/// a detached timer task. The actor copies [`Self::deadline`] out before
/// building the `select!` to keep the arm free of borrows on the state.
#[derive(Debug, Default)]
pub(crate) struct WatchdogTimer {
    deadline: Option<Instant>,
}

impl WatchdogTimer {
    /// Start (or re-start) the timer. At most one deadline is pending.
    pub fn arm(&mut self, budget: Duration) {
        self.deadline = Some(Instant::now() + budget);
    }

    /// Cancel a pending deadline. Idempotent.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_armed_deadline_matches_budget() {
        let mut watchdog = WatchdogTimer::default();
        watchdog.arm(Duration::from_secs(30));
        let deadline = watchdog.deadline().unwrap();
        assert_eq!(deadline - Instant::now(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_is_disarmed() {
        let watchdog = WatchdogTimer::default();
        assert!(watchdog.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let mut watchdog = WatchdogTimer::default();
        watchdog.arm(Duration::from_secs(5));
        watchdog.arm(Duration::from_secs(30));
        let deadline = watchdog.deadline().unwrap();
        assert_eq!(deadline - Instant::now(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarm_is_idempotent() {
        let mut watchdog = WatchdogTimer::default();
        watchdog.disarm();
        watchdog.arm(Duration::from_secs(1));
        assert!(watchdog.deadline().is_some());
        watchdog.disarm();
        watchdog.disarm();
        assert!(watchdog.deadline().is_none());
    }
}
