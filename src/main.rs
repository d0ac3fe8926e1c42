//! bt-testhost - headless Bluetooth test host.
//!
//! Drives the pairing agent, device actions, discoverable and discovery
//! sessions, A2DP streaming and OPP transfers from the command line.

mod config;
mod console;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use testhost_bluez::{BluezGateway, ComponentStatus, SystemSetup};
use testhost_core::{
    Address, Capability, ChannelHandler, Coordinator, CoordinatorEvent, DeviceAction,
    MediaCommand,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use console::ConsolePort;

#[derive(Parser)]
#[command(name = "bt-testhost")]
#[command(about = "Headless Bluetooth test host")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "testhost.toml")]
    config: PathBuf,

    /// Bluetooth adapter (e.g. hci0)
    #[arg(short, long)]
    adapter: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify BlueZ, obexd and BlueALSA are installed and running
    Check,
    /// Show adapter details
    Info,
    /// List paired devices
    Devices,
    /// Serve pairing requests until Ctrl-C
    Agent {
        /// I/O capability (defaults to the configured one)
        #[arg(long)]
        capability: Option<String>,
    },
    /// Discover nearby devices
    Discover {
        /// Seconds before discovery stops on its own (0 = until Ctrl-C)
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Make the adapter discoverable
    Discoverable {
        /// Seconds before discoverable mode turns off (0 = until Ctrl-C)
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Pair with a device
    Pair { address: String },
    /// Connect to a device
    Connect { address: String },
    /// Disconnect a device
    Disconnect { address: String },
    /// Unpair and forget a device
    Unpair { address: String },
    /// Show the A2DP role of a connected device
    Role { address: String },
    /// Stream an audio file to an A2DP sink until Ctrl-C
    Stream { address: String, file: PathBuf },
    /// Send an AVRCP command (play, pause, next, previous, rewind)
    Media { command: String, address: String },
    /// Push a file over OPP
    Send { address: String, file: PathBuf },
    /// Wait for one incoming OPP push
    Receive,
}

fn setup_logging(cli: &Cli) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = if cli.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "bt_testhost={0},testhost_core={0},testhost_bluez={0}",
            level
        ))
    });

    let Some(path) = &cli.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    // A file writer keeps log lines out of the console prompts
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Logging to {:?}", path);
    Ok(Some(guard))
}

fn parse_address(s: &str) -> Result<Address> {
    Address::parse(s).with_context(|| format!("Invalid Bluetooth address: {}", s))
}

fn print_event(event: &CoordinatorEvent) {
    match event {
        CoordinatorEvent::PostAction { action, address } => {
            info!("Post-action {:?} for {}", action, address)
        }
        CoordinatorEvent::DiscoverableChanged { enabled, expired } => {
            let state = if *enabled { "ON" } else { "OFF" };
            let reason = if *expired { " (timeout)" } else { "" };
            println!("Discoverable: {}{}", state, reason);
        }
        CoordinatorEvent::DiscoveryStarted {
            inquiry_timeout_secs,
        } => {
            if *inquiry_timeout_secs > 0 {
                println!("Discovering for {} seconds...", inquiry_timeout_secs);
            } else {
                println!("Discovering until Ctrl-C...");
            }
        }
        CoordinatorEvent::DiscoverySnapshot { devices, timed_out } => {
            let reason = if *timed_out { " (timeout)" } else { "" };
            println!("Discovery finished{}: {} device(s)", reason, devices.len());
            for device in devices {
                println!("  {}  {}", device.address, device.display_name());
            }
        }
        CoordinatorEvent::PairingExpired(address) => {
            println!("Pairing session with {} expired", address)
        }
    }
}

struct App {
    config: AppConfig,
    gateway: Arc<BluezGateway>,
    coordinator: Coordinator,
    events: UnboundedReceiver<CoordinatorEvent>,
}

impl App {
    async fn new(cli: &Cli, mut config: AppConfig) -> Result<Self> {
        let options = config.gateway_options(cli.adapter.clone())?;
        config.receive_dir = options.receive_dir.clone();
        let gateway = Arc::new(
            BluezGateway::new(options)
                .await
                .context("Failed to open the Bluetooth adapter")?,
        );
        let (handler, events) = ChannelHandler::new();
        let coordinator = Coordinator::new(
            gateway.clone(),
            Arc::new(ConsolePort::stdin()),
            Arc::new(handler),
            config.coordinator.clone(),
        );

        Ok(Self {
            config,
            gateway,
            coordinator,
            events,
        })
    }

    async fn info(&self) -> Result<()> {
        let info = self.gateway.adapter().info().await?;
        println!("Interface:    {}", info.name);
        println!("Address:      {}", info.address);
        println!("Alias:        {}", info.alias);
        println!("Powered:      {}", info.powered);
        println!("Discoverable: {}", info.discoverable);
        println!("Pairable:     {}", info.pairable);
        Ok(())
    }

    async fn devices(&self) -> Result<()> {
        let devices = self.coordinator.load_paired_devices().await?;
        if devices.is_empty() {
            println!("No paired devices");
        }
        for device in devices {
            println!(
                "{}  {:<24} connected={} role={}",
                device.address,
                device.display_name(),
                device.connected,
                device.a2dp_role
            );
        }
        Ok(())
    }

    async fn agent(&mut self) -> Result<()> {
        let handle = self.coordinator.register_agent().await?;
        println!("Agent running with capability {}; Ctrl-C to stop", handle.capability());

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                Some(event) = self.events.recv() => print_event(&event),
            }
        }

        self.coordinator.agent().unregister(&handle).await?;
        Ok(())
    }

    async fn discover(&mut self, timeout: Option<u64>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.config.coordinator.inquiry_timeout_secs);
        let sessions = self.coordinator.sessions().clone();
        sessions.start_discovery(timeout).await?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    sessions.stop_discovery().await;
                }
                Some(event) = self.events.recv() => {
                    print_event(&event);
                    if matches!(event, CoordinatorEvent::DiscoverySnapshot { .. }) {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn discoverable(&mut self, timeout: Option<u64>) -> Result<()> {
        let timeout = timeout.unwrap_or(self.config.coordinator.discoverable_timeout_secs);
        let sessions = self.coordinator.sessions().clone();
        sessions.set_discoverable(true, timeout).await?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    sessions.set_discoverable(false, 0).await?;
                }
                Some(event) = self.events.recv() => {
                    print_event(&event);
                    if matches!(event, CoordinatorEvent::DiscoverableChanged { enabled: false, .. }) {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn device_action(&self, action: DeviceAction, address: &str) -> Result<()> {
        let address = parse_address(address)?;

        // Keep an agent registered so prompts raised by the action are answerable
        let handle = match self.coordinator.register_agent().await {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Continuing without a pairing agent: {}", e);
                None
            }
        };

        let outcome = self
            .coordinator
            .dispatcher()
            .perform(action.as_str(), &address, true)
            .await;

        if let Some(handle) = handle {
            if let Err(e) = self.coordinator.agent().unregister(&handle).await {
                warn!("Failed to unregister agent: {}", e);
            }
        }

        let outcome = outcome?;
        if !outcome.success {
            bail!("{} {}: {}", outcome.action.title(), address, outcome.message);
        }
        Ok(())
    }

    async fn role(&self, address: &str) -> Result<()> {
        let address = parse_address(address)?;
        let role = self
            .coordinator
            .transfers()
            .resolve_role_if_connected(&address)
            .await?;
        println!("{}: {}", address, role);
        Ok(())
    }

    async fn stream(&self, address: &str, file: PathBuf) -> Result<()> {
        let address = parse_address(address)?;
        let transfers = self.coordinator.transfers();
        transfers.start_stream(&address, &file).await?;
        println!("Streaming {} to {}; Ctrl-C to stop", file.display(), address);

        tokio::signal::ctrl_c().await?;
        transfers.stop_stream().await?;
        Ok(())
    }

    async fn media(&self, command: &str, address: &str) -> Result<()> {
        let command = MediaCommand::from_str(command)?;
        let address = parse_address(address)?;
        self.coordinator
            .transfers()
            .send_media_command(command, &address)
            .await?;
        Ok(())
    }

    async fn send(&self, address: &str, file: PathBuf) -> Result<()> {
        let address = parse_address(address)?;
        let status = self
            .coordinator
            .transfers()
            .send_file(Some(&address), Some(&file))
            .await?;
        println!("Transfer status: {}", status);
        Ok(())
    }

    async fn receive(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.receive_dir).with_context(|| {
            format!("Failed to create {}", self.config.receive_dir.display())
        })?;
        if let Some(path) = self.coordinator.transfers().receive_file().await? {
            println!("{}", path.display());
        }
        Ok(())
    }
}

fn check(config: &AppConfig) -> Result<()> {
    let status = SystemSetup::check(&config.player);
    for (component, state) in &status.components {
        let label = match state {
            ComponentStatus::Ok => "ok",
            ComponentStatus::NotRunning => "not running",
            ComponentStatus::NotInstalled => "not installed",
        };
        println!("{:<12} {}", component.name, label);
    }
    for issue in &status.issues {
        println!("  - {}", issue.description);
        if let Some(cmd) = &issue.fix_command {
            println!("    Fix: {}", cmd);
        }
    }
    println!("{}", status.summary());

    if !status.ready {
        bail!("Host is not ready");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(&cli)?;

    let mut config = AppConfig::load(&cli.config)?;
    if let Commands::Agent {
        capability: Some(capability),
    } = &cli.command
    {
        config.coordinator.capability = Capability::from_str(capability)?;
    }

    if let Commands::Check = cli.command {
        return check(&config);
    }

    let mut app = App::new(&cli, config).await?;
    match &cli.command {
        Commands::Check => Ok(()),
        Commands::Info => app.info().await,
        Commands::Devices => app.devices().await,
        Commands::Agent { .. } => app.agent().await,
        Commands::Discover { timeout } => app.discover(*timeout).await,
        Commands::Discoverable { timeout } => app.discoverable(*timeout).await,
        Commands::Pair { address } => app.device_action(DeviceAction::Pair, address).await,
        Commands::Connect { address } => app.device_action(DeviceAction::Connect, address).await,
        Commands::Disconnect { address } => {
            app.device_action(DeviceAction::Disconnect, address).await
        }
        Commands::Unpair { address } => app.device_action(DeviceAction::Unpair, address).await,
        Commands::Role { address } => app.role(address).await,
        Commands::Stream { address, file } => app.stream(address, file.clone()).await,
        Commands::Media { command, address } => app.media(command, address).await,
        Commands::Send { address, file } => app.send(address, file.clone()).await,
        Commands::Receive => app.receive().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["bt-testhost", "--debug", "pair", "00:11:22:33:44:55"])
            .unwrap();
        assert!(cli.debug);
        assert_eq!(cli.config, PathBuf::from("testhost.toml"));
        assert!(matches!(cli.command, Commands::Pair { ref address } if address == "00:11:22:33:44:55"));

        let cli = Cli::try_parse_from([
            "bt-testhost",
            "--adapter",
            "hci1",
            "agent",
            "--capability",
            "DisplayYesNo",
        ])
        .unwrap();
        assert_eq!(cli.adapter.as_deref(), Some("hci1"));
        assert!(matches!(cli.command, Commands::Agent { capability: Some(ref c) } if c == "DisplayYesNo"));

        let cli = Cli::try_parse_from(["bt-testhost", "discover", "--timeout", "30"]).unwrap();
        assert!(matches!(cli.command, Commands::Discover { timeout: Some(30) }));
    }

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["bt-testhost"]).is_err());
    }

    #[test]
    fn address_validation() {
        assert_eq!(
            parse_address("aa:bb:cc:dd:ee:ff").unwrap(),
            Address::new("AA:BB:CC:DD:EE:FF")
        );
        assert!(parse_address("not-an-address").is_err());
    }
}
