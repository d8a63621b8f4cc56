//! Retransmit timer.
//!
//! A stop-and-wait sender has exactly one wait outstanding: after each
//! transmission it listens for a matching acknowledgment until the timer
//! expires.  Input that does not match is discarded, and the wait continues
//! against the *same* deadline, so junk traffic can never postpone a
//! retransmission.  [`RetransmitTimer`] tracks that deadline.

use std::time::Duration;

use tokio::time::Instant;

/// One armed deadline.
#[derive(Debug, Clone, Copy)]
pub struct RetransmitTimer {
    started: Instant,
    deadline: Instant,
}

impl RetransmitTimer {
    /// Arm a timer that expires `timeout` from now.
    pub fn start(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: started + timeout,
        }
    }

    /// Time left before expiry, or `None` once the deadline has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        (!left.is_zero()).then_some(left)
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    /// Time since the timer was armed.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep until the deadline.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn remaining_shrinks_then_expires() {
        let timer = RetransmitTimer::start(Duration::from_millis(50));
        assert_eq!(timer.remaining(), Some(Duration::from_millis(50)));

        tokio::time::advance(Duration::from_millis(20)).await;
        assert_eq!(timer.remaining(), Some(Duration::from_millis(30)));
        assert!(!timer.is_expired());

        tokio::time::advance(Duration::from_millis(30)).await;
        assert_eq!(timer.remaining(), None);
        assert!(timer.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_sleeps_until_deadline() {
        let timer = RetransmitTimer::start(Duration::from_millis(40));
        timer.expired().await;
        assert!(timer.is_expired());
        assert!(timer.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn zero_timeout_is_already_expired() {
        assert!(RetransmitTimer::start(Duration::ZERO).is_expired());
    }
}
