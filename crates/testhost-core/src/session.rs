//! Discoverable and discovery sessions with optional auto-expiry.
//!
//! Each session's state, including its pending timer, lives behind one
//! tokio mutex. Manual stops cancel the timer under that lock; timer fires
//! claim their id under the same lock, so at most one of them acts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::device::DeviceRecord;
use crate::error::{CoordinatorError, Result};
use crate::events::{CoordinatorEvent, EventHandler};
use crate::timer::{SessionTimer, TimerId};
use crate::traits::AdapterGateway;

#[derive(Debug, Default)]
struct DiscoverableSession {
    enabled: bool,
    timeout_secs: u64,
    timer: SessionTimer,
}

#[derive(Debug, Default)]
struct DiscoverySession {
    running: bool,
    inquiry_timeout_secs: u64,
    timer: SessionTimer,
    snapshot: Vec<DeviceRecord>,
}

/// Owns discoverable mode and device discovery.
#[derive(Clone)]
pub struct SessionTimerManager {
    gateway: Arc<dyn AdapterGateway>,
    events: Arc<dyn EventHandler>,
    discoverable: Arc<Mutex<DiscoverableSession>>,
    discovery: Arc<Mutex<DiscoverySession>>,
}

impl SessionTimerManager {
    pub fn new(gateway: Arc<dyn AdapterGateway>, events: Arc<dyn EventHandler>) -> Self {
        Self {
            gateway,
            events,
            discoverable: Arc::new(Mutex::new(DiscoverableSession::default())),
            discovery: Arc::new(Mutex::new(DiscoverySession::default())),
        }
    }

    /// Turn discoverable mode on or off.
    ///
    /// Enabling arms a one-shot timer when `timeout_secs > 0` that turns the
    /// mode off again; enabling while enabled re-arms with the new timeout.
    /// Disabling cancels any pending timer before touching the adapter.
    pub async fn set_discoverable(&self, enable: bool, timeout_secs: u64) -> Result<()> {
        let mut session = self.discoverable.lock().await;
        if !enable {
            return self.disable_discoverable(&mut session, false).await;
        }

        self.gateway.set_discoverable_mode(true).await?;
        session.enabled = true;
        session.timeout_secs = timeout_secs;

        if timeout_secs > 0 {
            let manager = self.clone();
            session
                .timer
                .schedule(Duration::from_secs(timeout_secs), move |id| async move {
                    manager.discoverable_expired(id).await
                });
            info!("Discoverable mode is set to ON for {} seconds", timeout_secs);
        } else {
            session.timer.cancel();
            info!("Discoverable mode is set to ON");
        }
        drop(session);

        self.events
            .on_event(CoordinatorEvent::DiscoverableChanged {
                enabled: true,
                expired: false,
            })
            .await;
        Ok(())
    }

    async fn discoverable_expired(&self, id: TimerId) {
        let mut session = self.discoverable.lock().await;
        if !session.timer.claim(id) {
            return;
        }
        info!("Discoverable timeout expired");
        if let Err(e) = self.disable_discoverable(&mut session, true).await {
            warn!("Failed to turn off discoverable mode after timeout: {}", e);
        }
    }

    async fn disable_discoverable(&self, session: &mut DiscoverableSession, expired: bool) -> Result<()> {
        session.timer.cancel();
        self.gateway.set_discoverable_mode(false).await?;
        session.enabled = false;
        info!("Discoverable mode is set to OFF");

        self.events
            .on_event(CoordinatorEvent::DiscoverableChanged {
                enabled: false,
                expired,
            })
            .await;
        Ok(())
    }

    /// Forget the remembered discoverable timeout.
    pub async fn reset_discoverable_timeout(&self) {
        self.discoverable.lock().await.timeout_secs = 0;
    }

    pub async fn is_discoverable(&self) -> bool {
        self.discoverable.lock().await.enabled
    }

    /// Timeout of the current (or last) discoverable session.
    pub async fn discoverable_timeout(&self) -> u64 {
        self.discoverable.lock().await.timeout_secs
    }

    /// Time left before discoverable mode turns itself off.
    pub async fn discoverable_remaining(&self) -> Option<Duration> {
        self.discoverable.lock().await.timer.remaining()
    }

    /// Start device discovery; 0 runs until [`stop_discovery`](Self::stop_discovery).
    pub async fn start_discovery(&self, inquiry_timeout_secs: u64) -> Result<()> {
        let mut session = self.discovery.lock().await;
        if session.running {
            return Err(CoordinatorError::DiscoveryInProgress);
        }

        self.gateway.start_discovery().await?;
        session.running = true;
        session.inquiry_timeout_secs = inquiry_timeout_secs;

        if inquiry_timeout_secs > 0 {
            let manager = self.clone();
            session
                .timer
                .schedule(Duration::from_secs(inquiry_timeout_secs), move |id| async move {
                    manager.discovery_expired(id).await
                });
        }
        drop(session);

        info!("Device discovery has started");
        self.events
            .on_event(CoordinatorEvent::DiscoveryStarted {
                inquiry_timeout_secs,
            })
            .await;
        Ok(())
    }

    async fn discovery_expired(&self, id: TimerId) {
        let mut session = self.discovery.lock().await;
        if !session.timer.claim(id) {
            return;
        }
        info!("Discovery stopped due to timeout.");
        self.finish_discovery(&mut session, true).await;
    }

    /// Stop discovery and publish a final snapshot of discovered devices.
    pub async fn stop_discovery(&self) -> Vec<DeviceRecord> {
        let mut session = self.discovery.lock().await;
        self.finish_discovery(&mut session, false).await
    }

    async fn finish_discovery(&self, session: &mut DiscoverySession, timed_out: bool) -> Vec<DeviceRecord> {
        session.timer.cancel();
        if let Err(e) = self.gateway.stop_discovery().await {
            warn!("Stopping discovery: {}", e);
        }
        session.running = false;

        let devices: Vec<DeviceRecord> = match self.gateway.get_discovered_devices().await {
            Ok(found) => found.into_iter().map(DeviceRecord::from).collect(),
            Err(e) => {
                warn!("Failed to read discovered devices: {}", e);
                Vec::new()
            }
        };
        info!("Device discovery stopped ({} devices found)", devices.len());
        session.snapshot = devices.clone();

        self.events
            .on_event(CoordinatorEvent::DiscoverySnapshot {
                devices: devices.clone(),
                timed_out,
            })
            .await;
        devices
    }

    /// Drop the stored discovery snapshot.
    pub async fn clear_discovery_results(&self) {
        self.discovery.lock().await.snapshot.clear();
    }

    pub async fn is_discovering(&self) -> bool {
        self.discovery.lock().await.running
    }

    pub async fn inquiry_timeout(&self) -> u64 {
        self.discovery.lock().await.inquiry_timeout_secs
    }

    /// Most recent discovery snapshot.
    pub async fn discovered(&self) -> Vec<DeviceRecord> {
        self.discovery.lock().await.snapshot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Address, DiscoveredDevice};
    use crate::error::GatewayError;
    use crate::events::CallbackHandler;
    use crate::traits::MockAdapterGateway;
    use std::sync::Mutex as StdMutex;

    type Recorded = Arc<StdMutex<Vec<CoordinatorEvent>>>;

    fn manager(gateway: MockAdapterGateway) -> (SessionTimerManager, Recorded) {
        let recorded = Recorded::default();
        let sink = recorded.clone();
        let events = Arc::new(CallbackHandler::new(move |e| sink.lock().unwrap().push(e)));
        (SessionTimerManager::new(Arc::new(gateway), events), recorded)
    }

    fn discoverable_changes(recorded: &Recorded) -> Vec<(bool, bool)> {
        recorded
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                CoordinatorEvent::DiscoverableChanged { enabled, expired } => {
                    Some((*enabled, *expired))
                }
                _ => None,
            })
            .collect()
    }

    fn speaker() -> DiscoveredDevice {
        DiscoveredDevice {
            address: Address::new("00:11:22:33:44:55"),
            alias: "Speaker".to_string(),
            path: "/org/bluez/hci0/dev_00_11_22_33_44_55".to_string(),
        }
    }

    mod discoverable {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn expires_after_timeout() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| *on)
                .times(1)
                .returning(|_| Ok(()));
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| !*on)
                .times(1)
                .returning(|_| Ok(()));
            let (manager, recorded) = manager(gateway);

            manager.set_discoverable(true, 5).await.unwrap();
            assert!(manager.is_discoverable().await);

            tokio::time::sleep(Duration::from_secs(6)).await;
            assert!(!manager.is_discoverable().await);
            assert_eq!(discoverable_changes(&recorded), vec![(true, false), (false, true)]);
        }

        #[tokio::test(start_paused = true)]
        async fn manual_disable_cancels_timer() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| *on)
                .times(1)
                .returning(|_| Ok(()));
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| !*on)
                .times(1)
                .returning(|_| Ok(()));
            let (manager, recorded) = manager(gateway);

            manager.set_discoverable(true, 5).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            manager.set_discoverable(false, 0).await.unwrap();

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert_eq!(discoverable_changes(&recorded), vec![(true, false), (false, false)]);
            assert_eq!(manager.discoverable_remaining().await, None);
        }

        #[tokio::test(start_paused = true)]
        async fn re_enable_rearms() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| *on)
                .times(2)
                .returning(|_| Ok(()));
            gateway
                .expect_set_discoverable_mode()
                .withf(|on| !*on)
                .times(1)
                .returning(|_| Ok(()));
            let (manager, _) = manager(gateway);

            manager.set_discoverable(true, 5).await.unwrap();
            tokio::time::sleep(Duration::from_secs(4)).await;
            manager.set_discoverable(true, 10).await.unwrap();
            assert_eq!(manager.discoverable_timeout().await, 10);

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(manager.is_discoverable().await);

            tokio::time::sleep(Duration::from_secs(6)).await;
            assert!(!manager.is_discoverable().await);
        }

        #[tokio::test(start_paused = true)]
        async fn zero_timeout_is_unbounded() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_set_discoverable_mode()
                .times(1)
                .returning(|_| Ok(()));
            let (manager, _) = manager(gateway);

            manager.set_discoverable(true, 0).await.unwrap();
            tokio::time::sleep(Duration::from_secs(3600)).await;
            assert!(manager.is_discoverable().await);

            manager.reset_discoverable_timeout().await;
            assert_eq!(manager.discoverable_timeout().await, 0);
        }

        #[tokio::test]
        async fn gateway_failure_keeps_state() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_set_discoverable_mode()
                .returning(|_| Err(GatewayError::AdapterNotFound));
            let (manager, recorded) = manager(gateway);

            assert!(manager.set_discoverable(true, 5).await.is_err());
            assert!(!manager.is_discoverable().await);
            assert!(recorded.lock().unwrap().is_empty());
        }
    }

    mod discovery {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn unbounded_until_stopped() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_start_discovery().times(1).returning(|| Ok(()));
            gateway.expect_stop_discovery().times(1).returning(|| Ok(()));
            gateway
                .expect_get_discovered_devices()
                .times(1)
                .returning(|| Ok(vec![speaker()]));
            let (manager, recorded) = manager(gateway);

            manager.start_discovery(0).await.unwrap();
            tokio::time::sleep(Duration::from_secs(600)).await;
            assert!(manager.is_discovering().await);

            let devices = manager.stop_discovery().await;
            assert_eq!(devices.len(), 1);
            assert!(devices[0].discovered);
            assert!(!manager.is_discovering().await);
            assert_eq!(manager.discovered().await, devices);

            let recorded = recorded.lock().unwrap();
            assert!(matches!(
                recorded.last(),
                Some(CoordinatorEvent::DiscoverySnapshot { timed_out: false, .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn inquiry_timeout_stops_and_publishes() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_start_discovery().returning(|| Ok(()));
            gateway.expect_stop_discovery().times(1).returning(|| Ok(()));
            gateway
                .expect_get_discovered_devices()
                .returning(|| Ok(vec![speaker()]));
            let (manager, recorded) = manager(gateway);

            manager.start_discovery(8).await.unwrap();
            tokio::time::sleep(Duration::from_secs(9)).await;

            assert!(!manager.is_discovering().await);
            assert_eq!(manager.discovered().await.len(), 1);
            assert!(matches!(
                recorded.lock().unwrap().last(),
                Some(CoordinatorEvent::DiscoverySnapshot { timed_out: true, .. })
            ));
        }

        #[tokio::test(start_paused = true)]
        async fn manual_stop_beats_timer() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_start_discovery().returning(|| Ok(()));
            gateway.expect_stop_discovery().times(1).returning(|| Ok(()));
            gateway
                .expect_get_discovered_devices()
                .times(1)
                .returning(|| Ok(Vec::new()));
            let (manager, recorded) = manager(gateway);

            manager.start_discovery(5).await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            manager.stop_discovery().await;
            tokio::time::sleep(Duration::from_secs(10)).await;

            let snapshots = recorded
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, CoordinatorEvent::DiscoverySnapshot { .. }))
                .count();
            assert_eq!(snapshots, 1);
        }

        #[tokio::test]
        async fn start_while_running_is_rejected() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_start_discovery().times(1).returning(|| Ok(()));
            let (manager, _) = manager(gateway);

            manager.start_discovery(0).await.unwrap();
            assert!(matches!(
                manager.start_discovery(0).await,
                Err(CoordinatorError::DiscoveryInProgress)
            ));
        }

        #[tokio::test]
        async fn stop_complaint_is_not_fatal() {
            let mut gateway = MockAdapterGateway::new();
            gateway
                .expect_stop_discovery()
                .returning(|| Err(GatewayError::BlueZ("No discovery started".to_string())));
            gateway
                .expect_get_discovered_devices()
                .returning(|| Err(GatewayError::AdapterNotFound));
            let (manager, _) = manager(gateway);

            assert!(manager.stop_discovery().await.is_empty());
            assert!(!manager.is_discovering().await);
        }

        #[tokio::test]
        async fn clear_drops_snapshot() {
            let mut gateway = MockAdapterGateway::new();
            gateway.expect_stop_discovery().returning(|| Ok(()));
            gateway
                .expect_get_discovered_devices()
                .returning(|| Ok(vec![speaker()]));
            let (manager, _) = manager(gateway);

            manager.stop_discovery().await;
            assert_eq!(manager.discovered().await.len(), 1);
            manager.clear_discovery_results().await;
            assert!(manager.discovered().await.is_empty());
        }
    }
}
