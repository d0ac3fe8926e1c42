//! Object Push Profile transfers through obexd.
//!
//! obexd lives on the session bus under `org.bluez.obex`. Sending creates an
//! OPP session, pushes one file and follows the transfer until it reaches a
//! terminal state. Receiving registers a short-lived `org.bluez.obex.Agent1`
//! that asks the user before accepting a push.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use testhost_core::{Address, InteractionPort};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};
use zbus::{interface, proxy, Connection};

use crate::error::{BluezError, Result};

const AGENT_PATH: &str = "/org/bluez/testhost/obex_agent";

#[proxy(
    interface = "org.bluez.obex.Client1",
    default_service = "org.bluez.obex",
    default_path = "/org/bluez/obex"
)]
pub(crate) trait Client1 {
    fn create_session(
        &self,
        destination: &str,
        args: HashMap<&str, Value<'_>>,
    ) -> zbus::Result<OwnedObjectPath>;

    fn remove_session(&self, session: &ObjectPath<'_>) -> zbus::Result<()>;
}

#[proxy(interface = "org.bluez.obex.ObjectPush1", default_service = "org.bluez.obex")]
pub(crate) trait ObjectPush1 {
    fn send_file(
        &self,
        sourcefile: &str,
    ) -> zbus::Result<(OwnedObjectPath, HashMap<String, OwnedValue>)>;
}

#[proxy(interface = "org.bluez.obex.Transfer1", default_service = "org.bluez.obex")]
pub(crate) trait Transfer1 {
    /// One of "queued", "active", "suspended", "complete" or "error".
    #[zbus(property)]
    fn status(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn name(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.bluez.obex.AgentManager1",
    default_service = "org.bluez.obex",
    default_path = "/org/bluez/obex"
)]
pub(crate) trait AgentManager1 {
    fn register_agent(&self, agent: &ObjectPath<'_>) -> zbus::Result<()>;

    fn unregister_agent(&self, agent: &ObjectPath<'_>) -> zbus::Result<()>;
}

fn is_terminal(status: &str) -> bool {
    matches!(status, "complete" | "error")
}

/// Where an accepted push is stored.
pub fn incoming_path(dir: &Path, name: &str) -> PathBuf {
    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "received".into());
    dir.join(file_name)
}

/// Decision taken on one incoming push.
#[derive(Debug)]
struct PushDecision {
    transfer: OwnedObjectPath,
    destination: Option<PathBuf>,
}

/// `org.bluez.obex.Agent1` served while waiting for a push.
struct PushAgent {
    connection: Connection,
    port: Arc<dyn InteractionPort>,
    receive_dir: PathBuf,
    decisions: mpsc::UnboundedSender<PushDecision>,
}

#[interface(name = "org.bluez.obex.Agent1")]
impl PushAgent {
    async fn authorize_push(&self, transfer: OwnedObjectPath) -> zbus::fdo::Result<String> {
        let name = match Transfer1Proxy::builder(&self.connection)
            .path(transfer.clone())
        {
            Ok(builder) => match builder.build().await {
                Ok(proxy) => proxy.name().await.unwrap_or_default(),
                Err(_) => String::new(),
            },
            Err(_) => String::new(),
        };

        let destination = incoming_path(&self.receive_dir, &name);
        debug!("Incoming push {} -> {}", transfer.as_str(), destination.display());

        let accepted = self.port.confirm_incoming_file(&destination).await;
        let _ = self.decisions.send(PushDecision {
            transfer,
            destination: accepted.then(|| destination.clone()),
        });

        if accepted {
            Ok(destination.display().to_string())
        } else {
            Err(zbus::fdo::Error::AccessDenied("Rejected".to_string()))
        }
    }

    async fn cancel(&self) {
        debug!("obexd cancelled the push authorization");
    }

    async fn release(&self) {
        debug!("obexd released the push agent");
    }
}

/// Client for obexd on the session bus.
pub struct ObexClient {
    connection: Connection,
    transfer_timeout: Duration,
}

impl ObexClient {
    pub async fn new(transfer_timeout: Duration) -> Result<Self> {
        let connection = Connection::session()
            .await
            .map_err(|e| BluezError::Obex(format!("Failed to connect to session bus: {}", e)))?;
        Ok(Self {
            connection,
            transfer_timeout,
        })
    }

    /// Push `file` to `address`, returning the last transfer state seen.
    pub async fn send_file(&self, address: &Address, file: &Path) -> Result<String> {
        let client = Client1Proxy::new(&self.connection).await?;
        let mut args = HashMap::new();
        args.insert("Target", Value::from("opp"));
        let session = client.create_session(&address.0, args).await?;
        debug!("OPP session {} created", session.as_str());

        let result = self.push(&session, file).await;

        if let Err(e) = client.remove_session(&session).await {
            warn!("Failed to remove OPP session: {}", e);
        }
        result
    }

    async fn push(&self, session: &OwnedObjectPath, file: &Path) -> Result<String> {
        let push = ObjectPush1Proxy::builder(&self.connection)
            .path(session.clone())?
            .build()
            .await?;
        let (transfer, _) = push.send_file(&file.display().to_string()).await?;
        info!("OPP transfer {} started", transfer.as_str());

        self.follow_transfer(transfer).await
    }

    async fn follow_transfer(&self, transfer: OwnedObjectPath) -> Result<String> {
        let proxy = Transfer1Proxy::builder(&self.connection)
            .path(transfer)?
            .build()
            .await?;

        let mut status = proxy.status().await?;
        if is_terminal(&status) {
            return Ok(status);
        }

        let mut changes = proxy.receive_status_changed().await;
        let waited = timeout(self.transfer_timeout, async {
            while let Some(change) = changes.next().await {
                if let Ok(value) = change.get().await {
                    debug!("Transfer status: {}", value);
                    status = value;
                    if is_terminal(&status) {
                        break;
                    }
                }
            }
        })
        .await;

        if waited.is_err() {
            warn!("Transfer still {} after {:?}", status, self.transfer_timeout);
        }
        Ok(status)
    }

    /// Wait for one incoming push and ask `port` whether to accept it.
    ///
    /// Returns the stored file, or `None` when the user declined or nothing
    /// arrived within the transfer timeout.
    pub async fn receive_file(
        &self,
        port: Arc<dyn InteractionPort>,
        receive_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let agent = PushAgent {
            connection: self.connection.clone(),
            port,
            receive_dir: receive_dir.to_path_buf(),
            decisions: tx,
        };

        let server = self.connection.object_server();
        server.at(AGENT_PATH, agent).await?;

        let manager = AgentManager1Proxy::new(&self.connection).await?;
        let agent_path = ObjectPath::try_from(AGENT_PATH)
            .map_err(|e| BluezError::Obex(e.to_string()))?;
        if let Err(e) = manager.register_agent(&agent_path).await {
            let _ = server.remove::<PushAgent, _>(AGENT_PATH).await;
            return Err(e.into());
        }
        info!("Waiting for OPP push on {}", receive_dir.display());

        let result = match timeout(self.transfer_timeout, rx.recv()).await {
            Ok(Some(PushDecision {
                transfer,
                destination: Some(destination),
            })) => match self.follow_transfer(transfer).await {
                Ok(status) if status == "complete" => Ok(Some(destination)),
                Ok(status) => Err(BluezError::Obex(format!("Incoming transfer ended as {}", status))),
                Err(e) => Err(e),
            },
            Ok(Some(_)) => {
                info!("Incoming push declined");
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(_) => {
                info!("No push received within {:?}", self.transfer_timeout);
                Ok(None)
            }
        };

        if let Err(e) = manager.unregister_agent(&agent_path).await {
            debug!("Failed to unregister obex agent: {}", e);
        }
        let _ = server.remove::<PushAgent, _>(AGENT_PATH).await;
        result
    }
}
