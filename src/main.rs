//! aimsync - Phone-assisted time sync for the AIM headless alarm clock
//!
//! Raises a temporary SoftAP and a one-shot token-authenticated HTTP
//! endpoint, then waits for a paired phone to push wall-clock time and
//! timezone. On a workstation this runs against the host radio stand-in
//! so the full protocol can be exercised with a phone on the same LAN.

use aimsync_core::Config;
use aimsync_session::codec;
use aimsync_transport::{HostRadio, OsRandom, SyncStatus, SystemClock, TransportController};
use anyhow::Result;
use clap::Parser;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

/// aimsync - receive time and timezone from a paired phone
#[derive(Parser, Debug)]
#[command(name = "aimsync")]
#[command(version, about, long_about = None)]
struct Args {
    /// HTTP port for the sync endpoint
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Pairing window length in seconds
    #[arg(short, long, default_value = "60")]
    window: u32,

    /// Address the sync endpoint binds to
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// Advertised IP for the sync URL (defaults to the detected LAN address)
    #[arg(long)]
    ip: Option<IpAddr>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    info!("aimsync v{}", env!("CARGO_PKG_VERSION"));

    let ip = args
        .ip
        .or_else(get_local_ip)
        .unwrap_or_else(|| IpAddr::from([127, 0, 0, 1]));

    let config = Config::new()
        .with_port(args.port)
        .with_window_ms(args.window.saturating_mul(1000))
        .with_bind_addr(args.bind.clone());

    let mut controller = TransportController::new(
        config,
        Box::new(HostRadio::new(ip)),
        Box::new(OsRandom::new()),
        Some(Arc::new(SystemClock::new())),
    );

    controller.begin().await?;

    let creds = controller.credentials().await;
    info!("");
    info!("  Step 1: join the device network");
    info!("    SSID: {}", creds.ssid);
    info!("    PSK:  {}", creds.psk);
    display_qr_code(&controller.wifi_qr_payload().await);
    info!("");
    info!("  Window: {} seconds. Press Ctrl+C to cancel.", args.window);
    info!("");

    let mut last_status = controller.status().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Cancelled.");
                controller.cancel();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                controller.loop_tick().await;
            }
        }

        let status = controller.status().await;
        if status != last_status {
            match status {
                SyncStatus::Step2 => {
                    // Port 80 is implied by the wire format; anything else
                    // rides along in the URL
                    let url = if args.port == 80 {
                        controller.url_payload().await
                    } else {
                        let token = controller.credentials().await.token;
                        codec::build_url(&format!("{}:{}", ip, args.port), &token)
                    };
                    info!("");
                    info!("  Step 2: phone joined. Open the sync page:");
                    info!("    {}", url);
                    display_qr_code(&url);
                    info!("");
                }
                SyncStatus::AppliedOk => {
                    info!(
                        "Time applied. Local time is now {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z")
                    );
                    break;
                }
                SyncStatus::Error => {
                    warn!("Pairing failed: {}", controller.error_message().await);
                    controller.cancel();
                    std::process::exit(1);
                }
                _ => {}
            }
            last_status = status;
        }
    }

    info!("Goodbye!");
    Ok(())
}

/// Get the local IP address by opening a UDP socket toward a public resolver
/// (no packets are sent)
fn get_local_ip() -> Option<IpAddr> {
    use std::net::UdpSocket;

    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}

/// Display a QR code in the terminal
fn display_qr_code(data: &str) {
    use qrcode::QrCode;

    let code = match QrCode::new(data.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to generate QR code: {}", e);
            return;
        }
    };

    let string = code
        .render::<char>()
        .quiet_zone(true)
        .module_dimensions(2, 1)
        .build();

    for line in string.lines() {
        println!("  {}", line);
    }
}
