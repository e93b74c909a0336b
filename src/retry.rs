//! Fixed-delay retry of operations whose failures may be transient.

use std::{io, thread, time::Duration};

use tracing::warn;

/// Classifies an error as worth retrying or not.
pub trait Transient {
    /// `true` if the same operation may succeed when attempted again later.
    fn is_transient(&self) -> bool;
}

impl Transient for io::Error {
    fn is_transient(&self) -> bool {
        // a file held by another reader shows up as one of these depending on the platform
        matches!(
            self.kind(),
            io::ErrorKind::PermissionDenied
                | io::ErrorKind::WouldBlock
                | io::ErrorKind::Interrupted
                | io::ErrorKind::TimedOut
        )
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Number of attempts made, the failing one included.
    pub attempts: usize,
    /// Error returned by the last attempt.
    pub last_error: E,
}

/// Retry up to `max_attempts` times, sleeping `delay` between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one attempt.
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or attempts run out.
    ///
    /// `op` receives the attempt number, starting at 1.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, RetryFailure<E>>
    where
        E: Transient + std::fmt::Display,
        F: FnMut(usize) -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        "attempt {attempt}/{} failed ({e}), retrying in {:?}",
                        self.max_attempts, self.delay
                    );
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(RetryFailure {
                        attempts: attempt,
                        last_error: e,
                    })
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(3))
    }
}
