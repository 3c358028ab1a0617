//! Pairing-session protocol types
//!
//! Wire-level vocabulary shared by the session state machine, the transport
//! controller, and the UI layer: session states, error codes (whose `Display`
//! output is the exact HTTP response body), credentials, and the accepted
//! value ranges for a time-set request.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default pairing window length in milliseconds
pub const DEFAULT_WINDOW_MS: u32 = 60_000;

/// Earliest accepted epoch: 2025-01-01T00:00:00Z in milliseconds
pub const EPOCH_MS_MIN: i64 = 1_735_689_600_000;

/// Upper bound (exclusive): 2100-01-01T00:00:00Z in milliseconds
pub const EPOCH_MS_MAX: i64 = 4_102_444_800_000;

/// Westernmost accepted timezone offset (UTC-14:00), minutes east of UTC
pub const TZ_OFFSET_MIN_MIN: i32 = -840;

/// Easternmost accepted timezone offset (UTC+14:00), minutes east of UTC
pub const TZ_OFFSET_MIN_MAX: i32 = 840;

/// Lifecycle state of one pairing session.
///
/// Progression is monotonic: `Idle → Step1 → Step2 → AppliedOk`. `Error` is
/// reachable from any state and terminal until the next `begin()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session has been started
    Idle,
    /// Credentials issued, AP up, waiting for the phone to join
    Step1,
    /// A station joined the AP, waiting for the time-set request
    Step2,
    /// System time applied; the session is spent
    AppliedOk,
    /// A validation or apply step failed; see the error code
    Error,
}

/// Protocol error codes.
///
/// The `Display` form of each variant is the exact string sent as the
/// `/time/set` failure body and surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorCode {
    #[error("bad_ports")]
    BadPorts,
    #[error("window_expired")]
    WindowExpired,
    #[error("invalid_token")]
    InvalidToken,
    #[error("rate_limited")]
    RateLimited,
    #[error("time_out_of_range")]
    TimeOutOfRange,
    #[error("tz_offset_out_of_range")]
    TzOffsetOutOfRange,
    #[error("apply_failed")]
    ApplyFailed,
}

/// Coarse error classification, used by the UI layer to pick a recovery hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A required collaborator was missing at wiring time
    Configuration,
    /// Timing or client fault; recoverable via `reissue()` + a fresh attempt
    Protocol,
    /// Malformed payload; unrecoverable once the rate allowance is spent
    Validation,
    /// The underlying OS clock call failed; not retryable in this session
    Apply,
}

impl ErrorCode {
    /// Wire string for this code (same text as `Display`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadPorts => "bad_ports",
            ErrorCode::WindowExpired => "window_expired",
            ErrorCode::InvalidToken => "invalid_token",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::TimeOutOfRange => "time_out_of_range",
            ErrorCode::TzOffsetOutOfRange => "tz_offset_out_of_range",
            ErrorCode::ApplyFailed => "apply_failed",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorCode::BadPorts => ErrorClass::Configuration,
            ErrorCode::WindowExpired | ErrorCode::InvalidToken | ErrorCode::RateLimited => {
                ErrorClass::Protocol
            }
            ErrorCode::TimeOutOfRange | ErrorCode::TzOffsetOutOfRange => ErrorClass::Validation,
            ErrorCode::ApplyFailed => ErrorClass::Apply,
        }
    }
}

/// One session's SoftAP credentials and time-set token.
///
/// All three fields are redrawn wholesale by `begin()`/`reissue()`; they are
/// never mutated individually.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// SoftAP SSID: `AIM-TS-` + 8 lowercase hex chars
    pub ssid: String,
    /// SoftAP passphrase: 16 lowercase hex chars
    pub psk: String,
    /// One-shot time-set token: 16 lowercase hex chars
    pub token: String,
}

/// A parsed `/time/set` request. Transient; never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSetRequest {
    /// Phone wall clock, milliseconds since the Unix epoch
    pub epoch_ms: i64,
    /// Phone timezone, minutes east of UTC
    pub tz_offset_min: i32,
    /// The session token echoed back by the sync page
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_render_wire_strings() {
        assert_eq!(ErrorCode::WindowExpired.to_string(), "window_expired");
        assert_eq!(ErrorCode::InvalidToken.as_str(), "invalid_token");
        assert_eq!(ErrorCode::RateLimited.as_str(), "rate_limited");
        assert_eq!(ErrorCode::TimeOutOfRange.as_str(), "time_out_of_range");
        assert_eq!(
            ErrorCode::TzOffsetOutOfRange.as_str(),
            "tz_offset_out_of_range"
        );
        assert_eq!(ErrorCode::ApplyFailed.as_str(), "apply_failed");
        assert_eq!(ErrorCode::BadPorts.as_str(), "bad_ports");
    }

    #[test]
    fn error_classes_group_recovery_paths() {
        assert_eq!(ErrorCode::BadPorts.class(), ErrorClass::Configuration);
        assert_eq!(ErrorCode::WindowExpired.class(), ErrorClass::Protocol);
        assert_eq!(ErrorCode::RateLimited.class(), ErrorClass::Protocol);
        assert_eq!(ErrorCode::TimeOutOfRange.class(), ErrorClass::Validation);
        assert_eq!(ErrorCode::ApplyFailed.class(), ErrorClass::Apply);
    }
}
