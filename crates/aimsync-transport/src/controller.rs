//! Transport controller
//!
//! Owns the radio and the HTTP server, bridges both to the session state
//! machine. All protocol-state mutation funnels through `loop_tick()`, which
//! drains the transport event channel; HTTP handlers and the radio driver
//! only ever push events.

use aimsync_core::{Config, Credentials, Error, RandomSource, Result, SessionStatus, TimeService};
use aimsync_session::codec;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use crate::http::{create_router, AppState, TransportEvent};
use crate::radio::SoftApRadio;

/// Controller-facing session status, polled by the UI layer once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Step1,
    Step2,
    AppliedOk,
    Error,
}

impl From<SessionStatus> for SyncStatus {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Idle => SyncStatus::Idle,
            SessionStatus::Step1 => SyncStatus::Step1,
            SessionStatus::Step2 => SyncStatus::Step2,
            SessionStatus::AppliedOk => SyncStatus::AppliedOk,
            SessionStatus::Error => SyncStatus::Error,
        }
    }
}

/// Owns the SoftAP radio and HTTP endpoint wiring for one pairing session.
pub struct TransportController {
    config: Config,
    state: Arc<AppState>,
    radio: Box<dyn SoftApRadio>,
    random: Box<dyn RandomSource + Send>,
    time: Option<Arc<dyn TimeService + Send + Sync>>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    /// Signalled to gracefully stop the serve task; in-flight responses
    /// (the success response included) still flush
    server_shutdown: Option<Arc<Notify>>,
    /// Awaited by the next `begin()` so the listener is closed before rebind
    server_task: Option<tokio::task::JoinHandle<()>>,
    running: bool,
}

impl TransportController {
    pub fn new(
        config: Config,
        radio: Box<dyn SoftApRadio>,
        random: Box<dyn RandomSource + Send>,
        time: Option<Arc<dyn TimeService + Send + Sync>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AppState::new(time.clone(), events_tx));
        Self {
            config,
            state,
            radio,
            random,
            time,
            events_rx,
            server_shutdown: None,
            server_task: None,
            running: false,
        }
    }

    /// Start a pairing session: reset the radio, issue credentials, raise the
    /// AP, and install the HTTP routes.
    pub async fn begin(&mut self) -> Result<()> {
        // Stop any previous server and radio before reconfiguring, so a
        // re-begin after a terminal error can rebind the port
        self.teardown();
        if let Some(task) = self.server_task.take() {
            let _ = task.await;
        }

        let creds = {
            let time_port: Option<&dyn TimeService> = match &self.time {
                Some(t) => Some(t.as_ref()),
                None => None,
            };
            let mut session = self.state.session.lock().await;
            session.begin(Some(self.random.as_mut()), time_port, self.config.window_ms);
            if session.status() == SessionStatus::Error {
                return Err(Error::Config("session collaborators missing".to_string()));
            }
            session.credentials().clone()
        };
        *self.state.token.write().await = creds.token.clone();

        self.radio.start_ap(&creds.ssid, &creds.psk)?;
        self.start_server().await?;
        self.running = true;
        info!(ssid = %creds.ssid, "pairing transport up");
        Ok(())
    }

    async fn start_server(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Server(format!("bind {}: {}", addr, e)))?;
        info!(%addr, "sync endpoint listening");

        let shutdown = Arc::new(Notify::new());
        let notified = shutdown.clone();
        let router = create_router(self.state.clone());
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { notified.notified().await })
                .await;
            if let Err(e) = result {
                warn!("sync endpoint terminated: {}", e);
            }
        });
        self.server_shutdown = Some(shutdown);
        self.server_task = Some(task);
        Ok(())
    }

    /// One cooperative scheduler tick: drain transport events, then fall back
    /// to polling the AP's station count in case a connect event was missed.
    /// Never blocks.
    pub async fn loop_tick(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                TransportEvent::StationConnected => {
                    self.state.session.lock().await.on_station_connected();
                }
                TransportEvent::Applied { tz_offset_min } => {
                    // Apply TZ before teardown so local-time reads reflect the
                    // phone's locale immediately
                    if let Some(time) = &self.time {
                        let tz = codec::build_posix_tz_from_offset_minutes(tz_offset_min);
                        time.apply_posix_tz(&tz);
                        info!(%tz, "timezone installed");
                    }
                    // One-shot protocol: nothing is serviced after success
                    self.teardown();
                }
            }
        }

        if self.running {
            let joined = self.radio.poll_station_connected() || self.radio.station_count() > 0;
            if joined {
                let mut session = self.state.session.lock().await;
                if session.status() == SessionStatus::Step1 {
                    debug!("station observed via fallback poll");
                    session.on_station_connected();
                }
            }
        }
    }

    /// Issue fresh credentials mid-window. The AP keeps running and the
    /// window timer is not restarted.
    pub async fn reissue(&mut self) -> Result<()> {
        let creds = {
            let mut session = self.state.session.lock().await;
            session.reissue(Some(self.random.as_mut()));
            if session.status() == SessionStatus::Error {
                return Err(Error::Config("session collaborators missing".to_string()));
            }
            session.credentials().clone()
        };
        *self.state.token.write().await = creds.token.clone();
        if self.running {
            self.radio.update_ap(&creds.ssid, &creds.psk)?;
        }
        info!(ssid = %creds.ssid, "credentials reissued");
        Ok(())
    }

    /// Abandon the session: stop the HTTP server and switch the radio off.
    /// Safe to call from any status.
    pub fn cancel(&mut self) {
        info!("pairing transport cancelled");
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(shutdown) = self.server_shutdown.take() {
            shutdown.notify_one();
        }
        self.radio.shutdown();
        self.running = false;
    }

    pub async fn credentials(&self) -> Credentials {
        self.state.session.lock().await.credentials().clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.state.session.lock().await.status().into()
    }

    /// The URL payload for QR #2: `http://<ap-ip>/sync?t=<token>`
    pub async fn url_payload(&self) -> String {
        let token = self.state.session.lock().await.credentials().token.clone();
        codec::build_url(&self.radio.ap_ip().to_string(), &token)
    }

    /// The Wi-Fi join payload for QR #1
    pub async fn wifi_qr_payload(&self) -> String {
        let creds = self.credentials().await;
        codec::build_wifi_qr_payload(&creds.ssid, &creds.psk)
    }

    pub async fn error_message(&self) -> &'static str {
        self.state.session.lock().await.error_message()
    }

    /// Milliseconds left in the pairing window, for the UI countdown
    pub async fn window_remaining_ms(&self) -> u32 {
        let now_ms = self
            .time
            .as_ref()
            .map(|t| t.monotonic_millis())
            .unwrap_or_default();
        self.state.session.lock().await.window_remaining_ms(now_ms)
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::handle_time_set;
    use aimsync_core::error::Result as CoreResult;
    use aimsync_core::protocol::EPOCH_MS_MIN;
    use axum::http::StatusCode;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RadioLog {
        up: AtomicBool,
        stations: AtomicUsize,
        pending_connect: AtomicBool,
        starts: StdMutex<Vec<(String, String)>>,
        updates: StdMutex<Vec<(String, String)>>,
    }

    struct FakeRadio {
        log: Arc<RadioLog>,
    }

    impl FakeRadio {
        fn new() -> (Self, Arc<RadioLog>) {
            let log = Arc::new(RadioLog::default());
            (Self { log: log.clone() }, log)
        }
    }

    impl SoftApRadio for FakeRadio {
        fn start_ap(&mut self, ssid: &str, psk: &str) -> CoreResult<()> {
            self.log
                .starts
                .lock()
                .unwrap()
                .push((ssid.to_string(), psk.to_string()));
            self.log.up.store(true, Ordering::Relaxed);
            Ok(())
        }

        fn update_ap(&mut self, ssid: &str, psk: &str) -> CoreResult<()> {
            self.log
                .updates
                .lock()
                .unwrap()
                .push((ssid.to_string(), psk.to_string()));
            Ok(())
        }

        fn shutdown(&mut self) {
            self.log.up.store(false, Ordering::Relaxed);
        }

        fn station_count(&self) -> usize {
            self.log.stations.load(Ordering::Relaxed)
        }

        fn ap_ip(&self) -> IpAddr {
            IpAddr::V4(Ipv4Addr::new(192, 168, 4, 1))
        }

        fn poll_station_connected(&mut self) -> bool {
            self.log.pending_connect.swap(false, Ordering::Relaxed)
        }
    }

    #[derive(Default)]
    struct SharedClock {
        millis: AtomicU32,
        applied_tz: StdMutex<Vec<String>>,
    }

    impl TimeService for SharedClock {
        fn now(&self) -> i64 {
            0
        }

        fn monotonic_millis(&self) -> u32 {
            self.millis.load(Ordering::Relaxed)
        }

        fn set_system_time(&self, _epoch_secs: i64) -> CoreResult<()> {
            Ok(())
        }

        fn apply_posix_tz(&self, tz: &str) {
            self.applied_tz.lock().unwrap().push(tz.to_string());
        }
    }

    struct SeqRandom(u64);

    impl RandomSource for SeqRandom {
        fn random_u64(&mut self) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
            self.0
        }
    }

    fn test_controller() -> (TransportController, Arc<RadioLog>, Arc<SharedClock>) {
        let (radio, log) = FakeRadio::new();
        let clock = Arc::new(SharedClock::default());
        let config = Config::new().with_bind_addr("127.0.0.1").with_port(0);
        let controller = TransportController::new(
            config,
            Box::new(radio),
            Box::new(SeqRandom(99)),
            Some(clock.clone()),
        );
        (controller, log, clock)
    }

    #[tokio::test]
    async fn begin_raises_ap_and_reaches_step1() {
        let (mut controller, log, _clock) = test_controller();
        controller.begin().await.unwrap();

        assert_eq!(controller.status().await, SyncStatus::Step1);
        assert!(log.up.load(Ordering::Relaxed));

        let starts = log.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 1);
        let creds = controller.credentials().await;
        assert_eq!(starts[0], (creds.ssid.clone(), creds.psk.clone()));

        assert_eq!(
            controller.url_payload().await,
            format!("http://192.168.4.1/sync?t={}", creds.token)
        );
        assert!(controller
            .wifi_qr_payload()
            .await
            .starts_with("WIFI:T:WPA;S:AIM-TS-"));
    }

    #[tokio::test]
    async fn fallback_station_poll_promotes_to_step2() {
        let (mut controller, log, _clock) = test_controller();
        controller.begin().await.unwrap();

        controller.loop_tick().await;
        assert_eq!(controller.status().await, SyncStatus::Step1);

        log.stations.store(1, Ordering::Relaxed);
        controller.loop_tick().await;
        assert_eq!(controller.status().await, SyncStatus::Step2);
    }

    #[tokio::test]
    async fn drained_connect_event_promotes_to_step2() {
        let (mut controller, log, _clock) = test_controller();
        controller.begin().await.unwrap();

        log.pending_connect.store(true, Ordering::Relaxed);
        controller.loop_tick().await;
        assert_eq!(controller.status().await, SyncStatus::Step2);
        // the flag was drained, not left set
        assert!(!log.pending_connect.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn successful_time_set_installs_tz_and_tears_down() {
        let (mut controller, log, clock) = test_controller();
        controller.begin().await.unwrap();
        let token = controller.credentials().await.token;

        let body = format!(
            r#"{{"epochMs":{},"tzOffsetMin":540,"token":"{}"}}"#,
            EPOCH_MS_MIN + 1000,
            token
        );
        let (status, text) = handle_time_set(&controller.state, &body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "Time applied");

        controller.loop_tick().await;
        assert_eq!(controller.status().await, SyncStatus::AppliedOk);
        assert_eq!(clock.applied_tz.lock().unwrap().as_slice(), ["GMT-9"]);
        assert!(!log.up.load(Ordering::Relaxed));
        assert!(!controller.running);
    }

    #[tokio::test]
    async fn reissue_swaps_credentials_in_place() {
        let (mut controller, log, _clock) = test_controller();
        controller.begin().await.unwrap();
        let before = controller.credentials().await;

        controller.reissue().await.unwrap();
        let after = controller.credentials().await;
        assert_ne!(before.token, after.token);
        assert_eq!(controller.status().await, SyncStatus::Step1);

        let updates = log.updates.lock().unwrap().clone();
        assert_eq!(updates, vec![(after.ssid.clone(), after.psk.clone())]);
        assert_eq!(*controller.state.token.read().await, after.token);
        // no radio restart
        assert_eq!(log.starts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn begin_after_terminal_error_rebinds_the_port() {
        let (radio, log) = FakeRadio::new();
        let clock = Arc::new(SharedClock::default());
        // fixed port: the second begin must reclaim it from the first server
        let config = Config::new().with_bind_addr("127.0.0.1").with_port(18_473);
        let mut controller = TransportController::new(
            config,
            Box::new(radio),
            Box::new(SeqRandom(5)),
            Some(clock.clone()),
        );
        controller.begin().await.unwrap();
        let token = controller.credentials().await.token;

        // let the window lapse and drive the session into a terminal error
        clock.millis.store(aimsync_core::DEFAULT_WINDOW_MS + 1, Ordering::Relaxed);
        let body = format!(
            r#"{{"epochMs":{},"tzOffsetMin":0,"token":"{}"}}"#,
            EPOCH_MS_MIN + 1000,
            token
        );
        let (status, text) = handle_time_set(&controller.state, &body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, "window_expired");
        assert_eq!(controller.status().await, SyncStatus::Error);

        controller.begin().await.unwrap();
        assert_eq!(controller.status().await, SyncStatus::Step1);
        assert!(log.up.load(Ordering::Relaxed));
        assert_eq!(log.starts.lock().unwrap().len(), 2);
        let fresh = controller.credentials().await;
        assert_ne!(fresh.token, token);
    }

    #[tokio::test]
    async fn cancel_is_safe_from_any_status() {
        let (mut controller, log, _clock) = test_controller();
        controller.cancel();
        assert!(!log.up.load(Ordering::Relaxed));

        controller.begin().await.unwrap();
        controller.cancel();
        assert!(!log.up.load(Ordering::Relaxed));
        assert!(!controller.running);
    }

    #[tokio::test]
    async fn window_countdown_tracks_the_clock() {
        let (mut controller, _log, clock) = test_controller();
        clock.millis.store(1_000, Ordering::Relaxed);
        controller.begin().await.unwrap();

        clock.millis.store(21_000, Ordering::Relaxed);
        assert_eq!(controller.window_remaining_ms().await, 40_000);

        clock.millis.store(90_000, Ordering::Relaxed);
        assert_eq!(controller.window_remaining_ms().await, 0);
    }
}
