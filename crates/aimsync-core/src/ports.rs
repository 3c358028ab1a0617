//! Collaborator traits consumed by the pure session logic
//!
//! The session state machine never touches hardware directly; it draws
//! randomness and reads/sets clocks through these traits so that tests can
//! substitute deterministic doubles and the device firmware can substitute
//! its own adapters.

use crate::error::Result;

/// Random source abstraction.
///
/// Non-crypto randomness is acceptable for this use case: the token only has
/// to bind one phone's pairing attempt to one 60-second window.
pub trait RandomSource {
    /// Returns a 64-bit random value
    fn random_u64(&mut self) -> u64;
}

/// Unified time service.
///
/// Wall-clock seconds for reads/writes, monotonic milliseconds for the
/// pairing window. The window deliberately uses the monotonic clock: the
/// protocol is about to change the wall clock out from under itself.
pub trait TimeService {
    /// Wall clock, seconds since the Unix epoch. May jump on corrections.
    fn now(&self) -> i64;

    /// Monotonic milliseconds since an arbitrary origin; wraps at u32::MAX.
    fn monotonic_millis(&self) -> u32;

    /// Set the system wall clock to `epoch_secs`.
    fn set_system_time(&self, epoch_secs: i64) -> Result<()>;

    /// Install a POSIX TZ string so subsequent local-time reads use it.
    fn apply_posix_tz(&self, tz: &str);
}
