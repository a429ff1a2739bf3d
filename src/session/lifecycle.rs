//! Session state machine and the single teardown guard.
//!
//! ```text
//! Connecting → Active → Closed
//!      └───────────────→ Closed   (backend connect failed)
//! ```
//!
//! Both relay directions call [`Lifecycle::close`] when their source ends.
//! Only the first call flips the state and fires the detach signal.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use tokio::sync::watch;

/// Session state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting = 0,
    Active = 1,
    Closed = 2,
}

impl From<u8> for SessionState {
    fn from(val: u8) -> Self {
        match val {
            0 => SessionState::Connecting,
            1 => SessionState::Active,
            _ => SessionState::Closed,
        }
    }
}

/// Which endpoint ended the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    Client,
    Backend,
    ConnectFailed,
}

/// Shared state word plus the detach signal for one session.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
    detach_tx: watch::Sender<bool>,
    teardowns: AtomicUsize,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (detach_tx, _) = watch::channel(false);
        Self {
            state: AtomicU8::new(SessionState::Connecting as u8),
            detach_tx,
            teardowns: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Move from `Connecting` to `Active`. Fails if the session already closed.
    pub fn activate(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Connecting as u8,
                SessionState::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Transition to `Closed`. Returns true for the one caller that performed
    /// the transition; that caller owns terminating the other endpoint.
    pub fn close(&self, cause: CloseCause) -> bool {
        let previous = self
            .state
            .swap(SessionState::Closed as u8, Ordering::AcqRel);
        if previous == SessionState::Closed as u8 {
            return false;
        }

        self.teardowns.fetch_add(1, Ordering::Relaxed);
        self.detach_tx.send_replace(true);
        tracing::trace!(?cause, "Session detached");
        true
    }

    /// Receiver that turns `true` once the session is torn down.
    pub fn detached(&self) -> watch::Receiver<bool> {
        self.detach_tx.subscribe()
    }

    /// Number of teardowns performed. Never more than one.
    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::Relaxed)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn connecting_then_active() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), SessionState::Connecting);
        assert!(lifecycle.activate());
        assert_eq!(lifecycle.state(), SessionState::Active);
        assert!(!lifecycle.activate());
    }

    #[test]
    fn second_close_is_a_noop() {
        let lifecycle = Lifecycle::new();
        let mut detached = lifecycle.detached();
        lifecycle.activate();

        assert!(lifecycle.close(CloseCause::Client));
        assert!(detached.has_changed().unwrap());
        assert!(*detached.borrow_and_update());

        assert!(!lifecycle.close(CloseCause::Backend));
        assert!(!detached.has_changed().unwrap());
        assert_eq!(lifecycle.teardowns(), 1);
        assert_eq!(lifecycle.state(), SessionState::Closed);
    }

    #[test]
    fn closed_session_cannot_activate() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.close(CloseCause::ConnectFailed));
        assert!(!lifecycle.activate());
    }

    #[test]
    fn racing_closes_have_one_winner() {
        for _ in 0..50 {
            let lifecycle = Arc::new(Lifecycle::new());
            let handles: Vec<_> = (0..4)
                .map(|i| {
                    let lifecycle = Arc::clone(&lifecycle);
                    std::thread::spawn(move || {
                        let cause = if i % 2 == 0 { CloseCause::Client } else { CloseCause::Backend };
                        lifecycle.close(cause)
                    })
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|won| *won)
                .count();
            assert_eq!(winners, 1);
            assert_eq!(lifecycle.teardowns(), 1);
        }
    }
}
