//! SoftAP radio abstraction
//!
//! The controller owns the radio through this trait so that the device
//! firmware can plug in its Wi-Fi driver while tests and the host binary use
//! stand-ins. Driver callbacks never reach the session logic directly: the
//! station-connected signal is a drained flag, decoupling driver timing from
//! protocol-state mutation.

use aimsync_core::{Error, Result};
use std::net::{IpAddr, Ipv4Addr};
use tracing::{info, warn};

/// Minimum passphrase length accepted by WPA2 SoftAP drivers
pub const MIN_PSK_LEN: usize = 8;

/// A radio capable of raising a temporary SoftAP.
pub trait SoftApRadio: Send {
    /// Raise the AP with the given credentials. Fails if the psk is shorter
    /// than the driver minimum.
    fn start_ap(&mut self, ssid: &str, psk: &str) -> Result<()>;

    /// Swap the broadcast ssid/psk without a full radio stop/start.
    fn update_ap(&mut self, ssid: &str, psk: &str) -> Result<()>;

    /// Tear down the AP and return the radio to an off state.
    fn shutdown(&mut self);

    /// Number of stations currently associated with the AP.
    fn station_count(&self) -> usize;

    /// The AP's own address, embedded in the sync URL.
    fn ap_ip(&self) -> IpAddr;

    /// Drain the driver's station-connected flag. Returns true at most once
    /// per connect event.
    fn poll_station_connected(&mut self) -> bool;
}

/// Development stand-in for the device radio.
///
/// Logs the transitions a real driver would perform and reports a configured
/// LAN address, so the whole protocol can be exercised on a workstation with
/// the phone on the same network. No stations are ever observed here; the
/// `/sync` page fetch serves as the join signal instead.
pub struct HostRadio {
    ip: IpAddr,
    up: bool,
    ssid: String,
}

impl HostRadio {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            up: false,
            ssid: String::new(),
        }
    }

    /// Convenience constructor using the canonical ESP SoftAP address
    pub fn with_default_ip() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 1)))
    }
}

impl SoftApRadio for HostRadio {
    fn start_ap(&mut self, ssid: &str, psk: &str) -> Result<()> {
        if psk.len() < MIN_PSK_LEN {
            return Err(Error::PskTooShort(psk.len()));
        }
        self.ssid = ssid.to_string();
        self.up = true;
        info!(%ssid, ip = %self.ip, "host radio: SoftAP up (simulated)");
        Ok(())
    }

    fn update_ap(&mut self, ssid: &str, psk: &str) -> Result<()> {
        if !self.up {
            return Err(Error::Radio("AP is not running".to_string()));
        }
        if psk.len() < MIN_PSK_LEN {
            return Err(Error::PskTooShort(psk.len()));
        }
        self.ssid = ssid.to_string();
        info!(%ssid, "host radio: broadcast credentials updated");
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.up {
            info!(ssid = %self.ssid, "host radio: SoftAP down");
        }
        self.up = false;
    }

    fn station_count(&self) -> usize {
        0
    }

    fn ap_ip(&self) -> IpAddr {
        self.ip
    }

    fn poll_station_connected(&mut self) -> bool {
        false
    }
}

impl Drop for HostRadio {
    fn drop(&mut self) {
        if self.up {
            warn!("host radio dropped while AP still up");
        }
    }
}
