//! Wireless connectivity state machine.
//!
//! Association with the network is modeled as a bounded, timed attempt that
//! is advanced by polling; nothing here blocks. A stalled attempt fails after
//! [`CONNECT_TIMEOUT`], a failed attempt retries after [`RETRY_INTERVAL`],
//! and a lost association restarts the attempt on the very next pass, so the
//! machine has no terminal state.

use core::ops::Add;
use core::time::Duration;

/// How long a single association attempt may run before it is failed.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// How long a failed attempt waits before the next retry.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Minimal contract required from the wireless association primitive.
///
/// The implementation owns the network identity and credential; `begin`
/// (re)starts association with the configured network and must not block.
pub trait Association {
    /// Begins or restarts association with the configured network.
    fn begin(&mut self);

    /// Reports whether the interface is currently associated.
    fn is_associated(&self) -> bool;
}

/// Association state as seen by the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Notable transitions surfaced by [`ConnectivityMonitor::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    /// Association succeeded.
    Connected,
    /// The attempt exceeded the connection timeout.
    ConnectTimedOut,
    /// An established association was lost; a new attempt has already begun.
    ConnectionLost,
}

/// Poll-driven driver for the connectivity lifecycle.
///
/// Owns the only mutable [`LinkState`] in the process; other components may
/// read the state but never enter it directly.
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor<Instant> {
    state: LinkState,
    connect_timeout: Duration,
    retry_interval: Duration,
    attempt_started_at: Option<Instant>,
    failed_at: Option<Instant>,
    attempts: u32,
}

impl<Instant> ConnectivityMonitor<Instant>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
{
    /// Creates a monitor with the default timeout and retry interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timing(CONNECT_TIMEOUT, RETRY_INTERVAL)
    }

    /// Creates a monitor with explicit timing, mainly for tests.
    #[must_use]
    pub fn with_timing(connect_timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            state: LinkState::Disconnected,
            connect_timeout,
            retry_interval,
            attempt_started_at: None,
            failed_at: None,
            attempts: 0,
        }
    }

    /// Current association state.
    #[must_use]
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Number of association attempts begun so far.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Begins a new association attempt.
    ///
    /// Re-entry while already `Connecting` is a no-op, so callers may invoke
    /// this without first inspecting the state.
    pub fn start_connection<A: Association>(&mut self, link: &mut A, now: Instant) {
        if self.state == LinkState::Connecting {
            return;
        }

        link.begin();
        self.state = LinkState::Connecting;
        self.attempt_started_at = Some(now);
        self.failed_at = None;
        self.attempts += 1;
    }

    /// Advances the state machine by one non-blocking poll.
    pub fn poll<A: Association>(&mut self, link: &mut A, now: Instant) -> Option<LinkEvent> {
        match self.state {
            LinkState::Disconnected => None,
            LinkState::Connecting => {
                if link.is_associated() {
                    self.state = LinkState::Connected;
                    Some(LinkEvent::Connected)
                } else if let Some(started_at) = self.attempt_started_at
                    && now >= started_at + self.connect_timeout
                {
                    self.state = LinkState::Failed;
                    self.failed_at = Some(now);
                    Some(LinkEvent::ConnectTimedOut)
                } else {
                    None
                }
            }
            LinkState::Failed => {
                if let Some(failed_at) = self.failed_at
                    && now >= failed_at + self.retry_interval
                {
                    self.start_connection(link, now);
                }
                None
            }
            LinkState::Connected => {
                if link.is_associated() {
                    None
                } else {
                    self.state = LinkState::Disconnected;
                    self.start_connection(link, now);
                    Some(LinkEvent::ConnectionLost)
                }
            }
        }
    }
}

impl<Instant> Default for ConnectivityMonitor<Instant>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct MockInstant(u64);

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
        }
    }

    fn at(millis: u64) -> MockInstant {
        MockInstant(millis)
    }

    #[derive(Debug, Default)]
    struct FakeLink {
        associated: bool,
        begins: u32,
    }

    impl Association for FakeLink {
        fn begin(&mut self) {
            self.begins += 1;
        }

        fn is_associated(&self) -> bool {
            self.associated
        }
    }

    #[test]
    fn initial_state_is_disconnected() {
        let monitor = ConnectivityMonitor::<MockInstant>::new();
        assert_eq!(monitor.state(), LinkState::Disconnected);
        assert_eq!(monitor.attempts(), 0);
    }

    #[test]
    fn start_connection_is_idempotent_while_connecting() {
        let mut monitor = ConnectivityMonitor::new();
        let mut link = FakeLink::default();
        monitor.start_connection(&mut link, at(0));
        monitor.start_connection(&mut link, at(5));
        assert_eq!(monitor.state(), LinkState::Connecting);
        assert_eq!(monitor.attempts(), 1);
        assert_eq!(link.begins, 1);
    }

    #[test]
    fn association_success_reports_connected() {
        let mut monitor = ConnectivityMonitor::new();
        let mut link = FakeLink::default();
        monitor.start_connection(&mut link, at(0));
        assert_eq!(monitor.poll(&mut link, at(100)), None);
        link.associated = true;
        assert_eq!(monitor.poll(&mut link, at(200)), Some(LinkEvent::Connected));
        assert_eq!(monitor.state(), LinkState::Connected);
    }

    #[test]
    fn attempt_fails_exactly_at_timeout() {
        let mut monitor = ConnectivityMonitor::new();
        let mut link = FakeLink::default();
        monitor.start_connection(&mut link, at(0));
        assert_eq!(monitor.poll(&mut link, at(19_999)), None);
        assert_eq!(
            monitor.poll(&mut link, at(20_000)),
            Some(LinkEvent::ConnectTimedOut)
        );
        assert_eq!(monitor.state(), LinkState::Failed);
    }

    #[test]
    fn failed_attempt_retries_exactly_at_interval() {
        let mut monitor = ConnectivityMonitor::new();
        let mut link = FakeLink::default();
        monitor.start_connection(&mut link, at(0));
        monitor.poll(&mut link, at(20_000));
        assert_eq!(monitor.poll(&mut link, at(49_999)), None);
        assert_eq!(monitor.state(), LinkState::Failed);
        assert_eq!(monitor.poll(&mut link, at(50_000)), None);
        assert_eq!(monitor.state(), LinkState::Connecting);
        assert_eq!(monitor.attempts(), 2);
        assert_eq!(link.begins, 2);
    }

    #[test]
    fn lost_association_restarts_immediately() {
        let mut monitor = ConnectivityMonitor::new();
        let mut link = FakeLink::default();
        monitor.start_connection(&mut link, at(0));
        link.associated = true;
        monitor.poll(&mut link, at(100));
        link.associated = false;
        assert_eq!(
            monitor.poll(&mut link, at(5_000)),
            Some(LinkEvent::ConnectionLost)
        );
        assert_eq!(monitor.state(), LinkState::Connecting);
        assert_eq!(monitor.attempts(), 2);
    }
}
