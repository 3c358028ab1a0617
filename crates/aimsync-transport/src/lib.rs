//! aimsync Transport - SoftAP radio ownership and HTTP endpoint wiring
//!
//! Bridges network I/O to the pure session logic: raises the temporary
//! SoftAP, installs the `/sync` and `/time/set` routes, and drains radio and
//! request events into the session state machine from a single cooperative
//! `loop_tick()`.

pub mod adapters;
pub mod controller;
pub mod http;
pub mod radio;

pub use adapters::{OsRandom, SystemClock};
pub use controller::{SyncStatus, TransportController};
pub use http::{create_router, AppState, TransportEvent};
pub use radio::{HostRadio, SoftApRadio};
