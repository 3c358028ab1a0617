//! Pairing-session state machine
//!
//! Owns credential issuance, the pairing window, the one-shot rate allowance,
//! and the time-application decision. Pure: all effects go through the
//! `RandomSource`/`TimeService` collaborator traits.

use aimsync_core::ports::{RandomSource, TimeService};
use aimsync_core::protocol::{
    Credentials, ErrorCode, SessionStatus, DEFAULT_WINDOW_MS, EPOCH_MS_MAX, EPOCH_MS_MIN,
    TZ_OFFSET_MIN_MAX, TZ_OFFSET_MIN_MIN,
};
use tracing::{debug, info, warn};

use crate::codec;

fn make_ssid(r: u64) -> String {
    // Low 32 bits; the full 64 would not fit the display's QR budget
    format!("AIM-TS-{:08x}", r as u32)
}

fn make_psk(r: u64) -> String {
    format!("{:016x}", r)
}

fn make_token(r: u64) -> String {
    format!("{:016x}", r)
}

/// Pure session state machine for the SoftAP time-sync protocol.
///
/// State diagram:
/// `Idle —begin→ Step1 —station connected→ Step2 —time set ok→ AppliedOk`,
/// with `Error` reachable from any state on a failed check and terminal until
/// the next `begin()`.
#[derive(Debug)]
pub struct SessionLogic {
    creds: Credentials,
    status: SessionStatus,
    start_ms: u32,
    window_ms: u32,
    rate_consumed: bool,
    last_error: Option<ErrorCode>,
}

impl Default for SessionLogic {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLogic {
    pub fn new() -> Self {
        Self {
            creds: Credentials::default(),
            status: SessionStatus::Idle,
            start_ms: 0,
            window_ms: DEFAULT_WINDOW_MS,
            rate_consumed: false,
            last_error: None,
        }
    }

    /// Start a fresh session: draw credentials, open the window, clear the
    /// rate allowance, advance to `Step1`.
    ///
    /// A missing collaborator sets `Error(bad_ports)` and performs no other
    /// mutation.
    pub fn begin(
        &mut self,
        random: Option<&mut dyn RandomSource>,
        time: Option<&dyn TimeService>,
        window_ms: u32,
    ) {
        let (Some(random), Some(time)) = (random, time) else {
            warn!("session begin with missing collaborators");
            self.fail(ErrorCode::BadPorts);
            return;
        };
        self.creds = Credentials {
            ssid: make_ssid(random.random_u64()),
            psk: make_psk(random.random_u64()),
            token: make_token(random.random_u64()),
        };
        self.start_ms = time.monotonic_millis();
        self.window_ms = window_ms;
        self.rate_consumed = false;
        self.status = SessionStatus::Step1;
        self.last_error = None;
        info!(ssid = %self.creds.ssid, window_ms, "pairing session started");
    }

    /// Redraw all three credentials mid-window. The window start, rate
    /// allowance, and status are untouched: the operator gets a fresh QR
    /// without restarting the timer.
    pub fn reissue(&mut self, random: Option<&mut dyn RandomSource>) {
        let Some(random) = random else {
            warn!("session reissue with missing random source");
            self.fail(ErrorCode::BadPorts);
            return;
        };
        self.creds = Credentials {
            ssid: make_ssid(random.random_u64()),
            psk: make_psk(random.random_u64()),
            token: make_token(random.random_u64()),
        };
        info!(ssid = %self.creds.ssid, "credentials reissued");
    }

    /// Advance `Step1 → Step2` when the phone joins the AP. Idempotent: any
    /// repeat call, or a call in a later state, is a no-op.
    pub fn on_station_connected(&mut self) {
        if self.status == SessionStatus::Step1 {
            debug!("station connected, advancing to Step2");
            self.status = SessionStatus::Step2;
        }
    }

    /// Validate and apply one `/time/set` request.
    ///
    /// Checks run in fixed order and the first failure wins: window → token →
    /// rate → epoch range → tz range → apply. The rate allowance is consumed
    /// by the first attempt that reaches the rate check, before any range
    /// validation, regardless of that attempt's final outcome.
    pub fn handle_time_set_request(
        &mut self,
        epoch_ms: i64,
        tz_offset_min: i32,
        token: &str,
        time: Option<&dyn TimeService>,
    ) -> bool {
        let Some(time) = time else {
            self.fail(ErrorCode::BadPorts);
            return false;
        };
        let now_ms = time.monotonic_millis();
        if !codec::is_within_window(self.start_ms, now_ms, self.window_ms) {
            return self.fail(ErrorCode::WindowExpired);
        }
        if !codec::verify_token(&self.creds.token, token) {
            return self.fail(ErrorCode::InvalidToken);
        }
        if self.rate_consumed {
            return self.fail(ErrorCode::RateLimited);
        }
        self.rate_consumed = true;
        if !(EPOCH_MS_MIN..EPOCH_MS_MAX).contains(&epoch_ms) {
            return self.fail(ErrorCode::TimeOutOfRange);
        }
        if !(TZ_OFFSET_MIN_MIN..=TZ_OFFSET_MIN_MAX).contains(&tz_offset_min) {
            return self.fail(ErrorCode::TzOffsetOutOfRange);
        }
        if time.set_system_time(epoch_ms / 1000).is_err() {
            return self.fail(ErrorCode::ApplyFailed);
        }
        self.status = SessionStatus::AppliedOk;
        self.last_error = None;
        info!(epoch_ms, tz_offset_min, "system time applied");
        true
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error
    }

    /// Wire string of the last error, empty when none. UI-facing.
    pub fn error_message(&self) -> &'static str {
        self.last_error.map(|c| c.as_str()).unwrap_or("")
    }

    pub fn credentials(&self) -> &Credentials {
        &self.creds
    }

    /// Milliseconds left in the pairing window at `now_ms`, saturating at 0.
    /// Used by the UI layer for the countdown display.
    pub fn window_remaining_ms(&self, now_ms: u32) -> u32 {
        let elapsed = now_ms.wrapping_sub(self.start_ms);
        self.window_ms.saturating_sub(elapsed)
    }

    fn fail(&mut self, code: ErrorCode) -> bool {
        warn!(code = code.as_str(), "session error");
        self.status = SessionStatus::Error;
        self.last_error = Some(code);
        false
    }
}
