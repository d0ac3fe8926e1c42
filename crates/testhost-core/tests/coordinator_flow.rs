//! End-to-end flows through the coordinator facade with an in-memory gateway.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use testhost_core::{
    A2dpRole, AdapterGateway, Address, AgentResponse, Capability, ChannelHandler, Coordinator,
    CoordinatorConfig, CoordinatorError, CoordinatorEvent, DeviceRecord, DiscoveredDevice,
    GatewayError, GatewayResult, InteractionPort, MediaCommand, PairingRequest,
    PairingRequestHandler, PostAction, PreconditionError, RequestKind,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Gateway that models a tiny daemon: a set of paired and connected devices.
/// Devices are audio sinks unless listed in `sources`.
#[derive(Default)]
struct FakeGateway {
    paired: Mutex<HashSet<Address>>,
    connected: Mutex<HashSet<Address>>,
    sources: Mutex<HashSet<Address>>,
    nearby: Vec<DiscoveredDevice>,
    calls: Mutex<Vec<String>>,
    handler: Mutex<Option<Arc<dyn PairingRequestHandler>>>,
}

impl FakeGateway {
    fn with_nearby(nearby: Vec<DiscoveredDevice>) -> Self {
        Self {
            nearby,
            ..Self::default()
        }
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn handler(&self) -> Option<Arc<dyn PairingRequestHandler>> {
        self.handler.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdapterGateway for FakeGateway {
    async fn pair(&self, address: &Address) -> GatewayResult<bool> {
        self.record(format!("pair {}", address));
        // A pairing attempt triggers a confirmation callback to the agent.
        if let Some(handler) = self.handler() {
            let request = PairingRequest::new(RequestKind::Confirm, address.to_device_path("hci0"))
                .with_passkey(123456);
            if handler.handle_pairing_request(request).await != AgentResponse::Accepted {
                return Ok(false);
            }
        }
        self.paired.lock().unwrap().insert(address.clone());
        Ok(true)
    }

    async fn connect(&self, address: &Address) -> GatewayResult<bool> {
        self.record(format!("connect {}", address));
        let paired = self.paired.lock().unwrap().contains(address);
        if paired {
            self.connected.lock().unwrap().insert(address.clone());
        }
        Ok(paired)
    }

    async fn disconnect(&self, address: &Address) -> GatewayResult<bool> {
        self.record(format!("disconnect {}", address));
        Ok(self.connected.lock().unwrap().remove(address))
    }

    async fn unpair_device(&self, address: &Address) -> GatewayResult<bool> {
        self.record(format!("unpair_device {}", address));
        self.connected.lock().unwrap().remove(address);
        Ok(self.paired.lock().unwrap().remove(address))
    }

    async fn is_device_connected(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.connected.lock().unwrap().contains(address))
    }

    async fn is_device_paired(&self, address: &Address) -> GatewayResult<bool> {
        Ok(self.paired.lock().unwrap().contains(address))
    }

    async fn get_paired_devices(&self) -> GatewayResult<HashMap<Address, DeviceRecord>> {
        let connected = self.connected.lock().unwrap().clone();
        Ok(self
            .paired
            .lock()
            .unwrap()
            .iter()
            .map(|address| {
                let record = DeviceRecord {
                    paired: true,
                    connected: connected.contains(address),
                    ..DeviceRecord::new(address.clone())
                };
                (address.clone(), record)
            })
            .collect())
    }

    async fn start_discovery(&self) -> GatewayResult<()> {
        self.record("start_discovery");
        Ok(())
    }

    async fn stop_discovery(&self) -> GatewayResult<()> {
        self.record("stop_discovery");
        Ok(())
    }

    async fn get_discovered_devices(&self) -> GatewayResult<Vec<DiscoveredDevice>> {
        Ok(self.nearby.clone())
    }

    async fn set_discoverable_mode(&self, enabled: bool) -> GatewayResult<()> {
        self.record(format!("discoverable {}", enabled));
        Ok(())
    }

    async fn get_a2dp_role_for_device(&self, address: &Address) -> GatewayResult<A2dpRole> {
        if self.sources.lock().unwrap().contains(address) {
            Ok(A2dpRole::Source)
        } else {
            Ok(A2dpRole::Sink)
        }
    }

    async fn start_a2dp_stream(&self, address: &Address, _file: &Path) -> GatewayResult<bool> {
        self.record(format!("start_a2dp_stream {}", address));
        Ok(true)
    }

    async fn stop_a2dp_stream(&self) -> GatewayResult<()> {
        self.record("stop_a2dp_stream");
        Ok(())
    }

    async fn media_control(&self, command: MediaCommand, address: &Address) -> GatewayResult<()> {
        self.record(format!("media {} {}", command, address));
        Ok(())
    }

    async fn send_file(&self, address: &Address, _file: &Path) -> GatewayResult<String> {
        self.record(format!("send_file {}", address));
        Ok("complete".to_string())
    }

    async fn receive_file(&self, port: Arc<dyn InteractionPort>) -> GatewayResult<Option<PathBuf>> {
        let incoming = PathBuf::from("/tmp/obex/notes.txt");
        if port.confirm_incoming_file(&incoming).await {
            Ok(Some(incoming))
        } else {
            Ok(None)
        }
    }

    async fn register_agent(
        &self,
        capability: Capability,
        handler: Arc<dyn PairingRequestHandler>,
    ) -> GatewayResult<()> {
        self.record(format!("register_agent {}", capability));
        let mut slot = self.handler.lock().unwrap();
        if slot.is_some() {
            return Err(GatewayError::BlueZ("org.bluez.Error.AlreadyExists".to_string()));
        }
        *slot = Some(handler);
        Ok(())
    }

    async fn unregister_agent(&self) -> GatewayResult<()> {
        self.record("unregister_agent");
        self.handler.lock().unwrap().take();
        Ok(())
    }
}

/// Port answering from scripted queues and recording notifications.
#[derive(Default)]
struct ScriptedPort {
    yes_no: Mutex<VecDeque<bool>>,
    accept_files: bool,
    notifications: Mutex<Vec<(String, String)>>,
}

impl ScriptedPort {
    fn answering(yes_no: impl IntoIterator<Item = bool>) -> Self {
        Self {
            yes_no: Mutex::new(yes_no.into_iter().collect()),
            ..Self::default()
        }
    }

    fn titles(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap()
            .iter()
            .map(|(title, _)| title.clone())
            .collect()
    }

    fn push(&self, title: &str, message: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}

#[async_trait]
impl InteractionPort for ScriptedPort {
    async fn prompt_text(&self, _title: &str, _prompt: &str) -> Option<String> {
        Some("0000".to_string())
    }

    async fn prompt_int(&self, _title: &str, _prompt: &str) -> Option<u32> {
        None
    }

    async fn prompt_yes_no(&self, _title: &str, _prompt: &str) -> bool {
        self.yes_no.lock().unwrap().pop_front().unwrap_or(false)
    }

    async fn notify_info(&self, title: &str, message: &str) {
        self.push(title, message);
    }

    async fn notify_warning(&self, title: &str, message: &str) {
        self.push(title, message);
    }

    async fn notify_error(&self, title: &str, message: &str) {
        self.push(title, message);
    }

    async fn confirm_incoming_file(&self, _path: &Path) -> bool {
        self.accept_files
    }
}

fn speaker() -> Address {
    Address::new("00:1A:7D:DA:71:13")
}

fn phone() -> Address {
    Address::new("F4:5C:89:A0:12:7E")
}

fn build(
    gateway: Arc<FakeGateway>,
    port: Arc<ScriptedPort>,
) -> (Coordinator, UnboundedReceiver<CoordinatorEvent>) {
    let (events, rx) = ChannelHandler::new();
    let coordinator = Coordinator::new(
        gateway,
        port,
        Arc::new(events),
        CoordinatorConfig {
            capability: Capability::DisplayYesNo,
            ..CoordinatorConfig::default()
        },
    );
    (coordinator, rx)
}

fn drain(rx: &mut UnboundedReceiver<CoordinatorEvent>) -> Vec<CoordinatorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn pair_connect_disconnect_unpair_lifecycle() {
    let gateway = Arc::new(FakeGateway::default());
    let port = Arc::new(ScriptedPort::answering([true]));
    let (coordinator, mut rx) = build(gateway.clone(), port.clone());

    let handle = coordinator.register_agent().await.unwrap();
    assert_eq!(handle.capability(), Capability::DisplayYesNo);

    let outcome = coordinator
        .dispatcher()
        .perform("pair", &speaker(), false)
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(coordinator.cache().contains(&speaker()).await);

    let outcome = coordinator
        .dispatcher()
        .perform("connect", &speaker(), true)
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(coordinator.cache().get(&speaker()).await.unwrap().connected);

    let outcome = coordinator
        .dispatcher()
        .perform("disconnect", &speaker(), true)
        .await
        .unwrap();
    assert!(outcome.success);

    let outcome = coordinator
        .dispatcher()
        .perform("unpair", &speaker(), true)
        .await
        .unwrap();
    assert!(outcome.success);
    assert!(!coordinator.cache().contains(&speaker()).await);

    let post_actions: Vec<PostAction> = drain(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            CoordinatorEvent::PostAction { action, .. } => Some(action),
            _ => None,
        })
        .collect();
    assert_eq!(
        post_actions,
        vec![
            // Confirmation callback, then the pair action itself.
            PostAction::AddToPairedList,
            PostAction::AddToPairedList,
            PostAction::ReloadProfileTabs,
            PostAction::ReloadProfileTabs,
            PostAction::RemoveFromList,
        ]
    );

    let titles = port.titles();
    assert!(titles.contains(&"Pairing Successful".to_string()));
    assert!(titles.contains(&"Unpair".to_string()));

    coordinator.agent().unregister(&handle).await.unwrap();
    assert_eq!(gateway.calls().last().map(String::as_str), Some("unregister_agent"));
}

#[tokio::test]
async fn rejected_confirmation_fails_pair() {
    let gateway = Arc::new(FakeGateway::default());
    let port = Arc::new(ScriptedPort::answering([false]));
    let (coordinator, _rx) = build(gateway.clone(), port.clone());
    coordinator.register_agent().await.unwrap();

    let outcome = coordinator
        .dispatcher()
        .perform("pair", &speaker(), false)
        .await
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.message, "Failed to pair device.");
    assert!(port.titles().contains(&"Pairing Failed".to_string()));
    assert!(!coordinator.agent().sessions().is_in_progress(&speaker()).await);
}

#[tokio::test]
async fn second_registration_is_refused() {
    let gateway = Arc::new(FakeGateway::default());
    let (coordinator, _rx) = build(gateway, Arc::new(ScriptedPort::default()));

    coordinator.register_agent().await.unwrap();
    assert!(coordinator
        .agent()
        .register(Capability::KeyboardOnly)
        .await
        .is_err());
}

#[tokio::test(start_paused = true)]
async fn discovery_with_timeout_publishes_snapshot() {
    let gateway = Arc::new(FakeGateway::with_nearby(vec![DiscoveredDevice {
        address: speaker(),
        alias: "Kitchen Speaker".to_string(),
        path: speaker().to_device_path("hci0"),
    }]));
    let (coordinator, mut rx) = build(gateway.clone(), Arc::new(ScriptedPort::default()));

    coordinator.sessions().start_discovery(10).await.unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(!coordinator.sessions().is_discovering().await);
    assert_eq!(gateway.calls(), vec!["start_discovery", "stop_discovery"]);

    let events = drain(&mut rx);
    let snapshot = events.iter().find_map(|event| match event {
        CoordinatorEvent::DiscoverySnapshot { devices, timed_out } => Some((devices, *timed_out)),
        _ => None,
    });
    let (devices, timed_out) = snapshot.expect("snapshot published");
    assert!(timed_out);
    assert_eq!(devices[0].display_name(), "Kitchen Speaker");
}

#[tokio::test(start_paused = true)]
async fn discoverable_disable_before_timeout_never_fires() {
    let gateway = Arc::new(FakeGateway::default());
    let (coordinator, _rx) = build(gateway.clone(), Arc::new(ScriptedPort::default()));

    coordinator.sessions().set_discoverable(true, 5).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    coordinator.sessions().set_discoverable(false, 0).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(gateway.calls(), vec!["discoverable true", "discoverable false"]);
}

#[tokio::test]
async fn transfers_go_through_gateway() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("tone.wav");
    std::fs::write(&file, b"RIFF").unwrap();

    let gateway = Arc::new(FakeGateway::default());
    for device in [speaker(), phone()] {
        gateway.paired.lock().unwrap().insert(device.clone());
        gateway.connected.lock().unwrap().insert(device);
    }
    gateway.sources.lock().unwrap().insert(phone());
    let port = Arc::new(ScriptedPort {
        accept_files: true,
        ..ScriptedPort::default()
    });
    let (coordinator, _rx) = build(gateway.clone(), port.clone());

    let transfers = coordinator.transfers();
    assert_eq!(transfers.resolve_role(&speaker()).await.unwrap(), A2dpRole::Sink);
    transfers.start_stream(&speaker(), &file).await.unwrap();
    transfers.stop_stream().await.unwrap();
    assert_eq!(transfers.resolve_role(&phone()).await.unwrap(), A2dpRole::Source);
    transfers
        .send_media_command(MediaCommand::Pause, &phone())
        .await
        .unwrap();

    let status = transfers
        .send_file(Some(&speaker()), Some(&file))
        .await
        .unwrap();
    assert_eq!(status.as_str(), "complete");

    let received = transfers.receive_file().await.unwrap();
    assert_eq!(received, Some(PathBuf::from("/tmp/obex/notes.txt")));

    assert!(port.titles().contains(&"File Received".to_string()));
    assert_eq!(
        gateway.calls(),
        vec![
            "start_a2dp_stream 00:1A:7D:DA:71:13",
            "stop_a2dp_stream",
            "media pause F4:5C:89:A0:12:7E",
            "send_file 00:1A:7D:DA:71:13",
        ]
    );
}

#[tokio::test]
async fn roles_gate_streaming_and_media_control() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("tone.wav");
    std::fs::write(&file, b"RIFF").unwrap();

    let gateway = Arc::new(FakeGateway::default());
    for device in [speaker(), phone()] {
        gateway.paired.lock().unwrap().insert(device.clone());
        gateway.connected.lock().unwrap().insert(device);
    }
    gateway.sources.lock().unwrap().insert(phone());
    let (coordinator, _rx) = build(gateway.clone(), Arc::new(ScriptedPort::default()));

    let transfers = coordinator.transfers();
    assert!(matches!(
        transfers.start_stream(&phone(), &file).await,
        Err(CoordinatorError::Precondition(PreconditionError::WrongRole(_, A2dpRole::Source)))
    ));
    assert!(matches!(
        transfers.send_media_command(MediaCommand::Play, &speaker()).await,
        Err(CoordinatorError::Precondition(PreconditionError::WrongRole(_, A2dpRole::Sink)))
    ));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn load_paired_devices_fills_cache() {
    let gateway = Arc::new(FakeGateway::default());
    gateway.paired.lock().unwrap().insert(speaker());
    let (coordinator, _rx) = build(gateway, Arc::new(ScriptedPort::default()));

    let devices = coordinator.load_paired_devices().await.unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(coordinator.cache().snapshot().await, devices);
}
