//! aimsync Session - Pairing-session state machine and credential codecs
//!
//! This crate is deliberately pure: no I/O, no clocks, no locks. All outside
//! effects flow through the collaborator traits in `aimsync-core::ports`,
//! which keeps every protocol invariant (check ordering, one-shot rate
//! allowance, window expiry) testable without a radio or a real clock.
//!
//! # Session flow
//!
//! 1. `SessionLogic::begin()` draws fresh ssid/psk/token credentials and
//!    opens the pairing window (`Step1`)
//! 2. The phone joins the SoftAP; `on_station_connected()` advances to `Step2`
//! 3. The phone POSTs `{epochMs, tzOffsetMin, token}`;
//!    `handle_time_set_request()` validates in fixed order and applies the
//!    clock (`AppliedOk`) or records a terminal error code

pub mod codec;
pub mod session;

pub use session::SessionLogic;
