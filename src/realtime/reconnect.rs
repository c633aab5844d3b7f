//! Reconnection policy for the notification channel.
//!
//! Watches connectivity transitions and decides whether and when the
//! connection should be retried. It never touches the transport: it only
//! reports due attempts through [`ReconnectController::poll`], and the owner
//! calls `connect` on the manager.

use std::time::{Duration, Instant};

use crate::realtime::connection::{CloseReason, ConnectionState, StateChange};

/// Maximum automatic reconnection attempts before giving up
pub const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Delay unit; attempt `n` waits `n` times this long
pub const BASE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_retries: u32,
    /// Whether a close with rejected credentials is retried like any other failure.
    pub retry_auth_rejected: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: BASE_RETRY_DELAY,
            max_retries: MAX_RECONNECT_ATTEMPTS,
            retry_auth_rejected: true,
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt` (1-based).
    ///
    /// Attempt 1: 5 seconds
    /// Attempt 2: 10 seconds
    /// Attempt 3: 15 seconds
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.max(1))
    }

    fn retries(&self, reason: CloseReason) -> bool {
        match reason {
            CloseReason::Normal => false,
            CloseReason::AuthRejected => self.retry_auth_rejected,
            CloseReason::ServerUnavailable | CloseReason::Other(_) => true,
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    /// No token, or the user closed the connection; nothing scheduled.
    Inert,
    /// The connection reached `Open`.
    Connected,
    /// Attempt `attempt` is scheduled at `due`, or in flight when `due` is None.
    AwaitingRetry {
        attempt: u32,
        due: Option<Instant>,
    },
    /// Retries exhausted; needs a manual connect.
    GivenUp,
}

impl ReconnectState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ReconnectState::Connected)
    }

    pub fn is_reconnecting(&self) -> bool {
        matches!(self, ReconnectState::AwaitingRetry { .. })
    }

    /// Current attempt number (0 if not reconnecting)
    pub fn reconnect_attempt(&self) -> u32 {
        match self {
            ReconnectState::AwaitingRetry { attempt, .. } => *attempt,
            _ => 0,
        }
    }
}

/// What an observed transition meant for the retry schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectEvent {
    /// Nothing changed.
    Unchanged,
    /// The connection is open; `recovered` when it followed a retry.
    Connected { recovered: bool },
    /// Attempt `attempt` scheduled after `delay`.
    Scheduled { attempt: u32, delay: Duration },
    /// No more automatic attempts.
    GaveUp { reason: CloseReason, attempts: u32 },
    /// A pending retry was cancelled.
    Cancelled,
}

#[derive(Debug)]
pub struct ReconnectController {
    policy: RetryPolicy,
    state: ReconnectState,
    token_present: bool,
    retry_count: u32,
}

impl ReconnectController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: ReconnectState::Inert,
            token_present: false,
            retry_count: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Number of the attempt most recently fired; 0 once connected.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            ReconnectState::AwaitingRetry { due, .. } => due,
            _ => None,
        }
    }

    /// Track whether a token exists. Clearing it cancels any pending retry.
    pub fn set_token_present(&mut self, present: bool) -> ReconnectEvent {
        self.token_present = present;
        if present {
            return ReconnectEvent::Unchanged;
        }
        let was_waiting = self.state.is_reconnecting();
        self.state = ReconnectState::Inert;
        self.retry_count = 0;
        if was_waiting {
            tracing::info!("token cleared, pending reconnect cancelled");
            ReconnectEvent::Cancelled
        } else {
            ReconnectEvent::Unchanged
        }
    }

    /// Start over before a user-requested connect.
    pub fn manual_retry(&mut self) {
        self.state = ReconnectState::Inert;
        self.retry_count = 0;
    }

    /// Feed one connectivity transition.
    pub fn observe(&mut self, change: &StateChange, now: Instant) -> ReconnectEvent {
        match change.current {
            ConnectionState::Open => {
                let recovered = self.state.is_reconnecting();
                self.state = ReconnectState::Connected;
                self.retry_count = 0;
                ReconnectEvent::Connected { recovered }
            }
            ConnectionState::Closed => self.on_closed(change.reason, now),
            ConnectionState::Idle | ConnectionState::Connecting | ConnectionState::Closing => {
                ReconnectEvent::Unchanged
            }
        }
    }

    /// Fire a due retry, returning its attempt number.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let ReconnectState::AwaitingRetry {
            attempt,
            due: Some(due),
        } = self.state
        else {
            return None;
        };
        if now < due || !self.token_present {
            return None;
        }
        self.state = ReconnectState::AwaitingRetry { attempt, due: None };
        self.retry_count = attempt;
        tracing::info!(
            attempt,
            max = self.policy.max_retries,
            "attempting to reconnect"
        );
        Some(attempt)
    }

    fn on_closed(&mut self, reason: Option<CloseReason>, now: Instant) -> ReconnectEvent {
        let reason = match reason {
            Some(reason) if reason.is_failure() => reason,
            _ => {
                // User-initiated close, or a server 1000.
                let was_waiting = self.state.is_reconnecting();
                self.state = ReconnectState::Inert;
                return if was_waiting {
                    ReconnectEvent::Cancelled
                } else {
                    ReconnectEvent::Unchanged
                };
            }
        };

        if !self.token_present {
            self.state = ReconnectState::Inert;
            return ReconnectEvent::Unchanged;
        }

        if !self.policy.retries(reason) {
            tracing::warn!(reason = %reason, "not retrying");
            return self.give_up(reason);
        }

        let next_attempt = match self.state {
            ReconnectState::Inert | ReconnectState::Connected => 1,
            ReconnectState::AwaitingRetry { attempt, .. } => attempt + 1,
            ReconnectState::GivenUp => return ReconnectEvent::Unchanged,
        };
        if next_attempt > self.policy.max_retries {
            return self.give_up(reason);
        }

        let delay = self.policy.delay_for(next_attempt);
        self.state = ReconnectState::AwaitingRetry {
            attempt: next_attempt,
            due: Some(now + delay),
        };
        tracing::info!(
            attempt = next_attempt,
            delay_secs = delay.as_secs_f64(),
            reason = %reason,
            "reconnect scheduled"
        );
        ReconnectEvent::Scheduled {
            attempt: next_attempt,
            delay,
        }
    }

    fn give_up(&mut self, reason: CloseReason) -> ReconnectEvent {
        let attempts = self.retry_count;
        self.state = ReconnectState::GivenUp;
        tracing::warn!(attempts, reason = %reason, "giving up on reconnection");
        ReconnectEvent::GaveUp { reason, attempts }
    }
}

impl Default for ReconnectController {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(reason: CloseReason) -> StateChange {
        StateChange {
            previous: ConnectionState::Connecting,
            current: ConnectionState::Closed,
            reason: Some(reason),
            detail: None,
        }
    }

    fn opened() -> StateChange {
        StateChange {
            previous: ConnectionState::Connecting,
            current: ConnectionState::Open,
            reason: None,
            detail: None,
        }
    }

    fn controller() -> ReconnectController {
        let mut c = ReconnectController::default();
        c.set_token_present(true);
        c
    }

    #[test]
    fn test_backoff_attempt_1_five_seconds() {
        assert_eq!(RetryPolicy::default().delay_for(1), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_attempt_2_ten_seconds() {
        assert_eq!(RetryPolicy::default().delay_for(2), Duration::from_secs(10));
    }

    #[test]
    fn test_backoff_attempt_3_fifteen_seconds() {
        assert_eq!(RetryPolicy::default().delay_for(3), Duration::from_secs(15));
    }

    #[test]
    fn test_backoff_strictly_increasing() {
        let policy = RetryPolicy::default();
        for attempt in 1..policy.max_retries {
            assert!(policy.delay_for(attempt) < policy.delay_for(attempt + 1));
        }
    }

    #[test]
    fn test_reconnect_state_helpers() {
        assert!(ReconnectState::Connected.is_connected());
        assert!(!ReconnectState::GivenUp.is_connected());
        let waiting = ReconnectState::AwaitingRetry {
            attempt: 2,
            due: None,
        };
        assert!(waiting.is_reconnecting());
        assert_eq!(waiting.reconnect_attempt(), 2);
        assert_eq!(ReconnectState::Inert.reconnect_attempt(), 0);
    }

    #[test]
    fn test_full_backoff_then_give_up() {
        let mut c = controller();
        let t0 = Instant::now();
        c.observe(&opened(), t0);

        let event = c.observe(&closed(CloseReason::ServerUnavailable), t0);
        assert_eq!(
            event,
            ReconnectEvent::Scheduled {
                attempt: 1,
                delay: Duration::from_secs(5)
            }
        );

        assert_eq!(c.poll(t0 + Duration::from_secs(4)), None);
        let t1 = t0 + Duration::from_secs(5);
        assert_eq!(c.poll(t1), Some(1));
        assert_eq!(c.retry_count(), 1);
        assert_eq!(c.poll(t1), None, "in-flight attempt must not refire");

        let event = c.observe(&closed(CloseReason::ServerUnavailable), t1);
        assert_eq!(
            event,
            ReconnectEvent::Scheduled {
                attempt: 2,
                delay: Duration::from_secs(10)
            }
        );
        let t2 = t1 + Duration::from_secs(10);
        assert_eq!(c.poll(t2), Some(2));

        c.observe(&closed(CloseReason::ServerUnavailable), t2);
        assert_eq!(c.next_deadline(), Some(t2 + Duration::from_secs(15)));
        let t3 = t2 + Duration::from_secs(15);
        assert_eq!(c.poll(t3), Some(3));

        let event = c.observe(&closed(CloseReason::ServerUnavailable), t3);
        assert_eq!(
            event,
            ReconnectEvent::GaveUp {
                reason: CloseReason::ServerUnavailable,
                attempts: 3
            }
        );
        assert_eq!(c.state(), ReconnectState::GivenUp);
        assert_eq!(c.poll(t3 + Duration::from_secs(3600)), None);
        assert_eq!(c.next_deadline(), None);
    }

    #[test]
    fn test_success_resets_attempts() {
        let mut c = controller();
        let t0 = Instant::now();
        c.observe(&closed(CloseReason::Other(1011)), t0);
        c.poll(t0 + Duration::from_secs(5));
        c.observe(&closed(CloseReason::Other(1011)), t0);
        c.poll(t0 + Duration::from_secs(60));
        assert_eq!(c.retry_count(), 2);

        let event = c.observe(&opened(), t0);
        assert_eq!(event, ReconnectEvent::Connected { recovered: true });
        assert_eq!(c.retry_count(), 0);

        let event = c.observe(&closed(CloseReason::ServerUnavailable), t0);
        assert_eq!(
            event,
            ReconnectEvent::Scheduled {
                attempt: 1,
                delay: Duration::from_secs(5)
            }
        );
    }

    #[test]
    fn test_normal_close_does_not_retry() {
        let mut c = controller();
        let t0 = Instant::now();
        c.observe(&opened(), t0);
        assert_eq!(
            c.observe(&closed(CloseReason::Normal), t0),
            ReconnectEvent::Unchanged
        );
        assert_eq!(c.state(), ReconnectState::Inert);
    }

    #[test]
    fn test_user_disconnect_cancels_pending_retry() {
        let mut c = controller();
        let t0 = Instant::now();
        c.observe(&closed(CloseReason::ServerUnavailable), t0);
        let change = StateChange {
            previous: ConnectionState::Closed,
            current: ConnectionState::Closed,
            reason: None,
            detail: None,
        };
        assert_eq!(c.observe(&change, t0), ReconnectEvent::Cancelled);
        assert_eq!(c.poll(t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_token_cleared_cancels_retry() {
        let mut c = controller();
        let t0 = Instant::now();
        c.observe(&closed(CloseReason::ServerUnavailable), t0);
        c.poll(t0 + Duration::from_secs(5));
        c.observe(&closed(CloseReason::ServerUnavailable), t0);
        assert_eq!(c.state().reconnect_attempt(), 2);

        assert_eq!(c.set_token_present(false), ReconnectEvent::Cancelled);
        assert_eq!(c.state(), ReconnectState::Inert);
        assert_eq!(c.retry_count(), 0);
        assert_eq!(c.poll(t0 + Duration::from_secs(3600)), None);
    }

    #[test]
    fn test_no_retry_without_token() {
        let mut c = ReconnectController::default();
        let event = c.observe(&closed(CloseReason::ServerUnavailable), Instant::now());
        assert_eq!(event, ReconnectEvent::Unchanged);
        assert_eq!(c.state(), ReconnectState::Inert);
    }

    #[test]
    fn test_auth_rejected_retried_by_default() {
        let mut c = controller();
        let event = c.observe(&closed(CloseReason::AuthRejected), Instant::now());
        assert!(matches!(event, ReconnectEvent::Scheduled { attempt: 1, .. }));
    }

    #[test]
    fn test_auth_rejected_gives_up_when_disabled() {
        let mut c = ReconnectController::new(RetryPolicy {
            retry_auth_rejected: false,
            ..RetryPolicy::default()
        });
        c.set_token_present(true);
        let event = c.observe(&closed(CloseReason::AuthRejected), Instant::now());
        assert_eq!(
            event,
            ReconnectEvent::GaveUp {
                reason: CloseReason::AuthRejected,
                attempts: 0
            }
        );
    }

    #[test]
    fn test_manual_retry_restarts_cycle() {
        let mut c = ReconnectController::new(RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        });
        c.set_token_present(true);
        let t0 = Instant::now();
        c.observe(&closed(CloseReason::ServerUnavailable), t0);
        c.poll(t0 + Duration::from_secs(5));
        c.observe(&closed(CloseReason::ServerUnavailable), t0);
        assert_eq!(c.state(), ReconnectState::GivenUp);

        c.manual_retry();
        let event = c.observe(&closed(CloseReason::ServerUnavailable), t0);
        assert!(matches!(event, ReconnectEvent::Scheduled { attempt: 1, .. }));
    }

    #[test]
    fn test_zero_retries_gives_up_immediately() {
        let mut c = ReconnectController::new(RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        });
        c.set_token_present(true);
        let event = c.observe(&closed(CloseReason::ServerUnavailable), Instant::now());
        assert!(matches!(event, ReconnectEvent::GaveUp { attempts: 0, .. }));
        assert_eq!(c.next_deadline(), None);
    }
}
