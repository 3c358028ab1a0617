//! System adapters for the collaborator traits
//!
//! Host-side implementations of `RandomSource` and `TimeService`. On the
//! device these are replaced by the firmware's RNG and RTC drivers.

use aimsync_core::{Error, RandomSource, Result, TimeService};
use rand::Rng;
use std::time::Instant;
use tracing::{debug, warn};

/// Random source backed by the OS RNG
#[derive(Debug, Default)]
pub struct OsRandom;

impl OsRandom {
    pub fn new() -> Self {
        Self
    }
}

impl RandomSource for OsRandom {
    fn random_u64(&mut self) -> u64 {
        rand::thread_rng().gen()
    }
}

/// Time service backed by the host clocks.
///
/// Monotonic milliseconds count from construction and wrap at u32::MAX,
/// matching the device's tick counter width. Setting the wall clock requires
/// CAP_SYS_TIME; without it `set_system_time` fails and the session reports
/// `apply_failed`.
#[derive(Debug)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeService for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn monotonic_millis(&self) -> u32 {
        self.boot.elapsed().as_millis() as u32
    }

    fn set_system_time(&self, epoch_secs: i64) -> Result<()> {
        let ts = libc::timespec {
            tv_sec: epoch_secs as libc::time_t,
            tv_nsec: 0,
        };
        let rc = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &ts) };
        if rc == 0 {
            debug!(epoch_secs, "system clock set");
            Ok(())
        } else {
            let err = std::io::Error::last_os_error();
            warn!(%err, "clock_settime failed");
            Err(Error::Clock(err.to_string()))
        }
    }

    fn apply_posix_tz(&self, tz: &str) {
        // libc does not expose tzset on Linux targets
        extern "C" {
            fn tzset();
        }
        std::env::set_var("TZ", tz);
        unsafe { tzset() };
        debug!(%tz, "TZ environment applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_random_draws_differ() {
        let mut rnd = OsRandom::new();
        assert_ne!(rnd.random_u64(), rnd.random_u64());
    }

    #[test]
    fn apply_posix_tz_installs_the_environment() {
        let clock = SystemClock::new();
        clock.apply_posix_tz("GMT-9");
        assert_eq!(std::env::var("TZ").as_deref(), Ok("GMT-9"));
    }
}
