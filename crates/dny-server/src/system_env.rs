//! Production Environment implementation using system time and RNG.
//!
//! Real monotonic instants, tokio sleeps, OS cryptographic randomness and
//! the system wall clock. Non-deterministic by nature - the deterministic
//! counterpart lives in the core test suites.

use std::time::Duration;

use dny_core::Environment;

/// Production environment.
///
/// # Panics
///
/// Panics if the OS RNG fails. Session ids come from this RNG; a gateway
/// that cannot draw entropy must not hand out ids.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable for session id assignment");
    }

    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}
