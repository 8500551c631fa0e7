//! Environment abstraction for deterministic testing.
//!
//! Decouples gateway logic from system resources (time, randomness, the
//! wall clock). Production uses real resources; tests drive the same code
//! with a simulated clock and seeded randomness.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async primitives.
///
/// Implementations MUST guarantee that `now()` never goes backwards within
/// a single execution context and that `random_bytes()` draws from
/// OS-grade entropy in production.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; test environments
    /// use virtual time they can step manually.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + std::fmt::Debug
        + std::ops::Sub<Output = Duration>
        + std::ops::Add<Duration, Output = Self::Instant>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleep for the given duration.
    ///
    /// The only async method in the trait; only runtime driver code uses
    /// it, never the state machines.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Current wall-clock time as Unix epoch seconds.
    ///
    /// Server-time responses to the devices carry this value; it is the
    /// only place civil time enters the gateway.
    fn wall_clock_secs(&self) -> u64;

    /// Random `u64`, for session id assignment.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
