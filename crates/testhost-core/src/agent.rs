//! Pairing agent.
//!
//! The agent owns the registered capability profile and answers pairing
//! callbacks from the daemon. Each callback is first turned into a
//! [`RequestPlan`] by the pure [`plan_request`] function, then executed:
//! prompts go through the [`InteractionPort`] bounded by the pairing session
//! deadline, display requests schedule a deferred paired-state check, and the
//! `NoInputNoOutput` capability resolves everything from the daemon's paired
//! state without asking anyone.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::device::{Address, DeviceCache};
use crate::error::{CoordinatorError, Result};
use crate::events::{CoordinatorEvent, EventHandler, PostAction};
use crate::timer::SessionTimer;
use crate::traits::{AdapterGateway, InteractionPort, PairingRequestHandler};

/// I/O capability advertised to the daemon when registering the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Capability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    #[default]
    KeyboardDisplay,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::DisplayOnly,
        Capability::DisplayYesNo,
        Capability::KeyboardOnly,
        Capability::NoInputNoOutput,
        Capability::KeyboardDisplay,
    ];

    /// Name as understood by `org.bluez.AgentManager1`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::DisplayOnly => "DisplayOnly",
            Capability::DisplayYesNo => "DisplayYesNo",
            Capability::KeyboardOnly => "KeyboardOnly",
            Capability::NoInputNoOutput => "NoInputNoOutput",
            Capability::KeyboardDisplay => "KeyboardDisplay",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoordinatorError::UnknownCapability(s.to_string()))
    }
}

/// Kinds of pairing callbacks the daemon delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Pin,
    Passkey,
    Confirm,
    Authorize,
    DisplayPin,
    DisplayPasskey,
    Cancel,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Pin => "pin",
            RequestKind::Passkey => "passkey",
            RequestKind::Confirm => "confirm",
            RequestKind::Authorize => "authorize",
            RequestKind::DisplayPin => "display_pin",
            RequestKind::DisplayPasskey => "display_passkey",
            RequestKind::Cancel => "cancel",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = CoordinatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pin" => Ok(RequestKind::Pin),
            "passkey" => Ok(RequestKind::Passkey),
            "confirm" => Ok(RequestKind::Confirm),
            "authorize" => Ok(RequestKind::Authorize),
            "display_pin" => Ok(RequestKind::DisplayPin),
            "display_passkey" => Ok(RequestKind::DisplayPasskey),
            "cancel" => Ok(RequestKind::Cancel),
            other => Err(CoordinatorError::UnknownRequestType(other.to_string())),
        }
    }
}

/// A pairing callback as delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    /// Request type name, see [`RequestKind`].
    pub kind: String,
    /// Daemon device reference (object path).
    pub device: String,
    /// Service UUID for `authorize`; the PIN to show for `display_pin`.
    pub uuid: Option<String>,
    pub passkey: Option<u32>,
}

impl PairingRequest {
    pub fn new(kind: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            device: device.into(),
            uuid: None,
            passkey: None,
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_passkey(mut self, passkey: u32) -> Self {
        self.passkey = Some(passkey);
        self
    }
}

impl From<RequestKind> for String {
    fn from(kind: RequestKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Answer returned to the daemon for a pairing callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentResponse {
    /// No value; the daemon treats the request as unanswered.
    NoAnswer,
    Pin(String),
    Passkey(u32),
    Accepted,
    Rejected,
}

impl AgentResponse {
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            AgentResponse::Pin(_) | AgentResponse::Passkey(_) | AgentResponse::Accepted
        )
    }
}

/// A user decision needed to answer a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Pin { title: String, prompt: String },
    Passkey { title: String, prompt: String },
    Confirm { title: String, prompt: String },
    Authorize { title: String, prompt: String },
}

impl Prompt {
    /// Response used when the user declines, cancels or runs out of time.
    pub fn decline(&self) -> AgentResponse {
        match self {
            Prompt::Pin { .. } => AgentResponse::NoAnswer,
            Prompt::Passkey { .. } | Prompt::Confirm { .. } | Prompt::Authorize { .. } => {
                AgentResponse::Rejected
            }
        }
    }
}

/// What to do for one pairing callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPlan {
    /// Answer from the daemon's paired state; nobody is asked.
    ResolveFromPairedState,
    Prompt(Prompt),
    /// Show a PIN or passkey, then re-check paired state later.
    Display {
        label: &'static str,
        value: Option<String>,
    },
    Cancelled,
}

/// Decide how to handle a request. Pure; touches neither gateway nor port.
pub fn plan_request(
    capability: Capability,
    kind: &str,
    address: &Address,
    uuid: Option<&str>,
    passkey: Option<u32>,
) -> Result<RequestPlan> {
    if capability == Capability::NoInputNoOutput {
        return Ok(RequestPlan::ResolveFromPairedState);
    }

    let plan = match kind.parse::<RequestKind>()? {
        RequestKind::Pin => RequestPlan::Prompt(Prompt::Pin {
            title: "Pairing Request".to_string(),
            prompt: format!("Enter PIN for device {}:", address),
        }),
        RequestKind::Passkey => RequestPlan::Prompt(Prompt::Passkey {
            title: "Pairing Request".to_string(),
            prompt: format!("Enter passkey for device {}:", address),
        }),
        RequestKind::Confirm => {
            let shown = passkey
                .map(|p| format!("{:06}", p))
                .or_else(|| uuid.map(str::to_string))
                .unwrap_or_default();
            RequestPlan::Prompt(Prompt::Confirm {
                title: "Confirm Pairing".to_string(),
                prompt: format!(
                    "Device {} requests to pair with passkey: {}\nAccept?",
                    address, shown
                ),
            })
        }
        RequestKind::Authorize => RequestPlan::Prompt(Prompt::Authorize {
            title: "Authorize Service".to_string(),
            prompt: format!(
                "Device {} wants to use service {}\nAllow?",
                address,
                uuid.unwrap_or("unknown")
            ),
        }),
        RequestKind::DisplayPin => RequestPlan::Display {
            label: "PIN",
            value: uuid.map(str::to_string),
        },
        RequestKind::DisplayPasskey => RequestPlan::Display {
            label: "Passkey",
            value: passkey.map(|p| format!("{:06}", p)),
        },
        RequestKind::Cancel => RequestPlan::Cancelled,
    };
    Ok(plan)
}

struct PairingSession {
    id: u64,
    capability: Option<Capability>,
    started: Instant,
    deadline: Instant,
    prompt_outstanding: bool,
    cancel: Arc<Notify>,
    expiry: SessionTimer,
}

/// Proof of participation in a pairing session.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub address: Address,
    pub id: u64,
    /// Opened by this holder (rather than attached to an existing session).
    pub owned: bool,
    pub deadline: Instant,
    cancel: Arc<Notify>,
}

impl SessionTicket {
    /// Resolves when the session is cancelled or expires.
    pub async fn cancelled(&self) {
        self.cancel.notified().await
    }
}

/// Pairing sessions keyed by address; at most one per address.
#[derive(Clone)]
pub struct PairingSessions {
    inner: Arc<Mutex<HashMap<Address, PairingSession>>>,
    next_id: Arc<AtomicU64>,
    timeout: Duration,
    events: Arc<dyn EventHandler>,
}

impl PairingSessions {
    pub fn new(timeout: Duration, events: Arc<dyn EventHandler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            timeout,
            events,
        }
    }

    /// Open a session for an outgoing pair.
    pub async fn begin(&self, address: &Address, capability: Option<Capability>) -> Result<SessionTicket> {
        let mut sessions = self.inner.lock().await;
        if sessions.contains_key(address) {
            return Err(CoordinatorError::PairingInProgress(address.clone()));
        }
        Ok(self.open(&mut sessions, address, capability, false))
    }

    /// Attach a prompt to the session for `address`, opening one if the
    /// remote side initiated pairing. Only one prompt may be outstanding.
    pub async fn begin_prompt(
        &self,
        address: &Address,
        capability: Option<Capability>,
    ) -> Result<SessionTicket> {
        let mut sessions = self.inner.lock().await;
        match sessions.get_mut(address) {
            Some(session) if session.prompt_outstanding => {
                Err(CoordinatorError::PairingInProgress(address.clone()))
            }
            Some(session) => {
                session.prompt_outstanding = true;
                Ok(SessionTicket {
                    address: address.clone(),
                    id: session.id,
                    owned: false,
                    deadline: session.deadline,
                    cancel: session.cancel.clone(),
                })
            }
            None => Ok(self.open(&mut sessions, address, capability, true)),
        }
    }

    fn open(
        &self,
        sessions: &mut HashMap<Address, PairingSession>,
        address: &Address,
        capability: Option<Capability>,
        prompting: bool,
    ) -> SessionTicket {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let started = Instant::now();
        let deadline = started + self.timeout;
        let cancel = Arc::new(Notify::new());

        let mut expiry = SessionTimer::new();
        let inner = self.inner.clone();
        let events = self.events.clone();
        let expired = address.clone();
        expiry.schedule(self.timeout, move |timer_id| async move {
            let session = {
                let mut sessions = inner.lock().await;
                let claimed = sessions
                    .get_mut(&expired)
                    .map(|s| s.id == id && s.expiry.claim(timer_id))
                    .unwrap_or(false);
                if !claimed {
                    return;
                }
                sessions.remove(&expired)
            };
            if let Some(session) = session {
                session.cancel.notify_one();
                info!(
                    "Pairing with {} timed out after {:?}",
                    expired,
                    session.started.elapsed()
                );
            }
            events.on_event(CoordinatorEvent::PairingExpired(expired)).await;
        });

        debug!("Pairing session {} opened for {}", id, address);
        sessions.insert(
            address.clone(),
            PairingSession {
                id,
                capability,
                started,
                deadline,
                prompt_outstanding: prompting,
                cancel: cancel.clone(),
                expiry,
            },
        );

        SessionTicket {
            address: address.clone(),
            id,
            owned: true,
            deadline,
            cancel,
        }
    }

    /// Mark the ticket's prompt as answered.
    pub async fn end_prompt(&self, ticket: &SessionTicket) {
        let mut sessions = self.inner.lock().await;
        if let Some(session) = sessions.get_mut(&ticket.address) {
            if session.id == ticket.id {
                session.prompt_outstanding = false;
            }
        }
    }

    /// Close the ticket's session. Stale tickets are ignored.
    pub async fn finish(&self, ticket: &SessionTicket) -> bool {
        let mut sessions = self.inner.lock().await;
        let current = sessions
            .get(&ticket.address)
            .map(|s| s.id == ticket.id)
            .unwrap_or(false);
        if current {
            sessions.remove(&ticket.address);
            debug!("Pairing session {} closed for {}", ticket.id, ticket.address);
        }
        current
    }

    /// Finish owned tickets, end the prompt for attached ones.
    pub async fn release(&self, ticket: &SessionTicket) {
        if ticket.owned {
            self.finish(ticket).await;
        } else {
            self.end_prompt(ticket).await;
        }
    }

    /// Abort the session for `address`, waking any outstanding prompt.
    pub async fn cancel(&self, address: &Address) -> bool {
        match self.inner.lock().await.remove(address) {
            Some(session) => {
                session.cancel.notify_one();
                true
            }
            None => false,
        }
    }

    pub async fn is_in_progress(&self, address: &Address) -> bool {
        self.inner.lock().await.contains_key(address)
    }

    pub async fn capability(&self, address: &Address) -> Option<Capability> {
        self.inner
            .lock()
            .await
            .get(address)
            .and_then(|s| s.capability)
    }

    /// Addresses with a session in progress.
    pub async fn active(&self) -> Vec<Address> {
        let mut active: Vec<Address> = self.inner.lock().await.keys().cloned().collect();
        active.sort();
        active
    }
}

/// Handle of the active agent registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    id: u64,
    capability: Capability,
}

impl AgentHandle {
    pub fn capability(&self) -> Capability {
        self.capability
    }
}

/// Collaborators shared with deferred checks.
#[derive(Clone)]
struct AgentContext {
    gateway: Arc<dyn AdapterGateway>,
    port: Arc<dyn InteractionPort>,
    cache: Arc<DeviceCache>,
    events: Arc<dyn EventHandler>,
}

impl AgentContext {
    async fn record_paired(&self, address: &Address) {
        self.cache.invalidate(address).await;
        self.events
            .on_event(CoordinatorEvent::PostAction {
                action: PostAction::AddToPairedList,
                address: address.clone(),
            })
            .await;
    }

    async fn pairing_succeeded(&self, address: &Address) {
        self.port
            .notify_info("Pairing Successful", &format!("{} was paired.", address))
            .await;
        self.record_paired(address).await;
    }

    async fn settle_check(&self, address: &Address) {
        match self.gateway.is_device_paired(address).await {
            Ok(true) => {
                info!("Pairing completed with {}", address);
                self.record_paired(address).await;
            }
            result => {
                if let Err(e) = result {
                    warn!("Could not check paired state of {}: {}", address, e);
                }
                self.port
                    .notify_warning(
                        "Pairing Failed",
                        &format!("Pairing with {} did not complete.", address),
                    )
                    .await;
            }
        }
    }
}

/// The pairing agent.
pub struct PairingAgent {
    ctx: AgentContext,
    default_capability: Capability,
    registration: Mutex<Option<AgentHandle>>,
    next_handle: AtomicU64,
    sessions: PairingSessions,
    settle_checks: Arc<Mutex<HashMap<Address, SessionTimer>>>,
    settle_delay: Duration,
}

impl PairingAgent {
    pub fn new(
        gateway: Arc<dyn AdapterGateway>,
        port: Arc<dyn InteractionPort>,
        cache: Arc<DeviceCache>,
        events: Arc<dyn EventHandler>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            sessions: PairingSessions::new(config.pairing_timeout(), events.clone()),
            ctx: AgentContext {
                gateway,
                port,
                cache,
                events,
            },
            default_capability: config.capability,
            registration: Mutex::new(None),
            next_handle: AtomicU64::new(1),
            settle_checks: Arc::new(Mutex::new(HashMap::new())),
            settle_delay: config.display_settle(),
        }
    }

    pub fn sessions(&self) -> &PairingSessions {
        &self.sessions
    }

    /// Register this agent with the daemon. Only one registration may exist.
    pub async fn register(self: &Arc<Self>, capability: Capability) -> Result<AgentHandle> {
        let mut registration = self.registration.lock().await;
        if let Some(active) = registration.as_ref() {
            return Err(CoordinatorError::Registration(format!(
                "an agent is already registered with capability {}",
                active.capability
            )));
        }

        info!("Attempting to register agent with capability: {}", capability);
        let handler: Arc<dyn PairingRequestHandler> = self.clone();
        match self.ctx.gateway.register_agent(capability, handler).await {
            Ok(()) => {
                let handle = AgentHandle {
                    id: self.next_handle.fetch_add(1, Ordering::SeqCst),
                    capability,
                };
                *registration = Some(handle.clone());
                self.ctx
                    .port
                    .notify_info(
                        "Agent Registered",
                        &format!("Agent registered with capability: {}", capability),
                    )
                    .await;
                Ok(handle)
            }
            Err(e) => {
                error!("Failed to register agent: {}", e);
                self.ctx
                    .port
                    .notify_error(
                        "Registration Failed",
                        &format!("Could not register agent.\n{}", e),
                    )
                    .await;
                Err(CoordinatorError::Registration(e.to_string()))
            }
        }
    }

    /// Unregister the agent identified by `handle`.
    pub async fn unregister(&self, handle: &AgentHandle) -> Result<()> {
        let mut registration = self.registration.lock().await;
        if registration.as_ref() != Some(handle) {
            return Err(CoordinatorError::NotRegistered);
        }

        info!("Attempting to unregister the Bluetooth agent...");
        match self.ctx.gateway.unregister_agent().await {
            Ok(()) => {
                *registration = None;
                self.ctx
                    .port
                    .notify_info(
                        "Agent Unregistered",
                        "Bluetooth agent was successfully unregistered.",
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                error!("Failed to unregister agent: {}", e);
                self.ctx
                    .port
                    .notify_error("Unregistration Failed", "Could not unregister agent.")
                    .await;
                Err(e.into())
            }
        }
    }

    pub async fn registration(&self) -> Option<AgentHandle> {
        self.registration.lock().await.clone()
    }

    /// Capability in effect for incoming requests.
    pub async fn capability(&self) -> Capability {
        self.registration
            .lock()
            .await
            .as_ref()
            .map(|h| h.capability)
            .unwrap_or(self.default_capability)
    }

    /// Answer one pairing callback.
    pub async fn on_pairing_request(&self, request: PairingRequest) -> AgentResponse {
        info!("Handling pairing request: {} for {}", request.kind, request.device);

        let address = match Address::from_device_path(&request.device) {
            Ok(address) => address,
            Err(e) => {
                warn!("Declining pairing request: {}", e);
                return AgentResponse::NoAnswer;
            }
        };

        let capability = self.capability().await;
        let plan = match plan_request(
            capability,
            &request.kind,
            &address,
            request.uuid.as_deref(),
            request.passkey,
        ) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("{}", e);
                return AgentResponse::NoAnswer;
            }
        };

        match plan {
            RequestPlan::ResolveFromPairedState => {
                self.resolve_from_paired_state(&address).await;
                AgentResponse::NoAnswer
            }
            RequestPlan::Prompt(prompt) => self.prompt(&address, capability, prompt).await,
            RequestPlan::Display { label, value } => {
                self.display(address, label, value).await;
                AgentResponse::NoAnswer
            }
            RequestPlan::Cancelled => {
                self.sessions.cancel(&address).await;
                if let Some(mut check) = self.settle_checks.lock().await.remove(&address) {
                    check.cancel();
                }
                self.ctx
                    .port
                    .notify_warning(
                        "Pairing Cancelled",
                        &format!("Pairing with {} was cancelled.", address),
                    )
                    .await;
                AgentResponse::NoAnswer
            }
        }
    }

    async fn resolve_from_paired_state(&self, address: &Address) {
        match self.ctx.gateway.is_device_paired(address).await {
            Ok(true) => {
                self.ctx.pairing_succeeded(address).await;
                info!("Pairing successful with {}", address);
            }
            Ok(false) => info!("Pairing failed with {}", address),
            Err(e) => warn!("Pairing failed with {}: {}", address, e),
        }
    }

    async fn prompt(&self, address: &Address, capability: Capability, prompt: Prompt) -> AgentResponse {
        let ticket = match self.sessions.begin_prompt(address, Some(capability)).await {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Declining prompt for {}: {}", address, e);
                return prompt.decline();
            }
        };

        let port = &self.ctx.port;
        let response = match &prompt {
            Prompt::Pin { title, prompt: text } => {
                match bounded(&ticket, port.prompt_text(title, text)).await.flatten() {
                    Some(pin) if !pin.is_empty() => AgentResponse::Pin(pin),
                    _ => {
                        info!("User cancelled or provided no PIN for device {}", address);
                        AgentResponse::NoAnswer
                    }
                }
            }
            Prompt::Passkey { title, prompt: text } => {
                match bounded(&ticket, port.prompt_int(title, text)).await.flatten() {
                    Some(passkey) => {
                        self.ctx.pairing_succeeded(address).await;
                        AgentResponse::Passkey(passkey)
                    }
                    None => {
                        info!("User cancelled passkey input for device {}", address);
                        AgentResponse::Rejected
                    }
                }
            }
            Prompt::Confirm { title, prompt: text } => {
                if bounded(&ticket, port.prompt_yes_no(title, text)).await.unwrap_or(false) {
                    self.ctx.pairing_succeeded(address).await;
                    AgentResponse::Accepted
                } else {
                    info!("User rejected pairing confirmation request");
                    port.notify_warning(
                        "Pairing Failed",
                        &format!("Pairing with {} failed.", address),
                    )
                    .await;
                    AgentResponse::Rejected
                }
            }
            Prompt::Authorize { title, prompt: text } => {
                if bounded(&ticket, port.prompt_yes_no(title, text)).await.unwrap_or(false) {
                    port.notify_info(
                        "Connection Successful",
                        &format!("{} was connected.", address),
                    )
                    .await;
                    AgentResponse::Accepted
                } else {
                    warn!("User denied service authorization for device {}", address);
                    if let Err(e) = self.ctx.gateway.disconnect(address).await {
                        warn!("Failed to disconnect {} after denial: {}", address, e);
                    }
                    AgentResponse::Rejected
                }
            }
        };

        self.sessions.release(&ticket).await;
        response
    }

    async fn display(&self, address: Address, label: &'static str, value: Option<String>) {
        let Some(value) = value else {
            warn!(
                "{} requested but no value provided for device {}.",
                label, address
            );
            return;
        };

        self.ctx
            .port
            .notify_info(
                &format!("Display {}", label),
                &format!("Enter this {} on {}: {}", label.to_lowercase(), address, value),
            )
            .await;

        let ctx = self.ctx.clone();
        let checks = self.settle_checks.clone();
        let mut pending = self.settle_checks.lock().await;
        let timer = pending.entry(address.clone()).or_default();
        timer.schedule(self.settle_delay, move |timer_id| async move {
            {
                let mut pending = checks.lock().await;
                let claimed = pending
                    .get_mut(&address)
                    .map(|t| t.claim(timer_id))
                    .unwrap_or(false);
                if !claimed {
                    return;
                }
                pending.remove(&address);
            }
            ctx.settle_check(&address).await;
        });
    }

    /// Whether a deferred paired-state check is pending for `address`.
    pub async fn has_pending_check(&self, address: &Address) -> bool {
        self.settle_checks
            .lock()
            .await
            .get(address)
            .map(SessionTimer::is_pending)
            .unwrap_or(false)
    }
}

#[async_trait]
impl PairingRequestHandler for PairingAgent {
    async fn handle_pairing_request(&self, request: PairingRequest) -> AgentResponse {
        self.on_pairing_request(request).await
    }
}

/// Run a prompt until it answers, the session is cancelled, or the session
/// deadline passes.
async fn bounded<T>(ticket: &SessionTicket, prompt: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        value = prompt => Some(value),
        _ = ticket.cancelled() => {
            debug!("Prompt for {} cancelled", ticket.address);
            None
        }
        _ = tokio::time::sleep_until(ticket.deadline) => {
            warn!("Prompt for {} timed out", ticket.address);
            None
        }
    }
}
