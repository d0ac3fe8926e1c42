//! Host readiness checks.
//!
//! Verifies that the daemons the gateway talks to are installed and running:
//! bluetoothd for pairing and device control, obexd for OPP and BlueALSA plus
//! an ALSA player for A2DP streaming.

use std::process::Command;

/// Status of a system component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentStatus {
    /// Component is installed and running.
    Ok,
    /// Component is installed but not running.
    NotRunning,
    /// Component is not installed.
    NotInstalled,
}

/// A host component the test host depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component<'a> {
    pub name: &'a str,
    /// Executable whose presence means the component is installed.
    pub binary: &'a str,
    /// systemd unit, if the component runs as a service.
    pub unit: Option<&'a str>,
    /// Whether `unit` is a user unit.
    pub user_unit: bool,
    pub package: &'a str,
    /// Needed for every command rather than only some.
    pub required: bool,
}

pub const BLUETOOTHD: Component<'static> = Component {
    name: "BlueZ",
    binary: "bluetoothctl",
    unit: Some("bluetooth"),
    user_unit: false,
    package: "bluez",
    required: true,
};

pub const OBEXD: Component<'static> = Component {
    name: "obexd",
    binary: "obexctl",
    unit: Some("obex"),
    user_unit: true,
    package: "bluez-obexd",
    required: false,
};

pub const BLUEALSA: Component<'static> = Component {
    name: "BlueALSA",
    binary: "bluealsactl",
    unit: Some("bluealsa"),
    user_unit: false,
    package: "bluez-alsa-utils",
    required: false,
};

pub fn player(binary: &str) -> Component<'_> {
    Component {
        name: "ALSA player",
        binary,
        unit: None,
        user_unit: false,
        package: "alsa-utils",
        required: false,
    }
}

/// A single setup issue with suggested fix.
#[derive(Debug, Clone)]
pub struct SetupIssue<'a> {
    pub component: &'a str,
    pub description: String,
    pub fix_command: Option<String>,
    pub required: bool,
}

impl<'a> SetupIssue<'a> {
    fn for_component(component: &Component<'a>, status: &ComponentStatus) -> Option<Self> {
        let (description, fix_command) = match status {
            ComponentStatus::Ok => return None,
            ComponentStatus::NotInstalled => (
                format!("{} is not installed", component.name),
                format!("sudo apt install {}", component.package),
            ),
            ComponentStatus::NotRunning => {
                let unit = component.unit.unwrap_or(component.binary);
                let fix = if component.user_unit {
                    format!("systemctl --user start {}", unit)
                } else {
                    format!("sudo systemctl start {}", unit)
                };
                (format!("{} service is not running", component.name), fix)
            }
        };
        Some(Self {
            component: component.name,
            description,
            fix_command: Some(fix_command),
            required: component.required,
        })
    }
}

/// Overall host status.
#[derive(Debug, Clone)]
pub struct SetupStatus<'a> {
    pub components: Vec<(Component<'a>, ComponentStatus)>,
    pub issues: Vec<SetupIssue<'a>>,
    /// No required component has an issue.
    pub ready: bool,
}

impl<'a> SetupStatus<'a> {
    fn from_components(components: Vec<(Component<'a>, ComponentStatus)>) -> Self {
        let issues: Vec<SetupIssue<'a>> = components
            .iter()
            .filter_map(|(component, status)| SetupIssue::for_component(component, status))
            .collect();
        let ready = !issues.iter().any(|i| i.required);
        Self {
            components,
            issues,
            ready,
        }
    }

    pub fn summary(&self) -> String {
        if self.issues.is_empty() {
            "Host is ready for Bluetooth testing".to_string()
        } else if self.ready {
            format!("Ready, with {} optional issue(s)", self.issues.len())
        } else {
            format!("{} issue(s) found", self.issues.len())
        }
    }
}

pub struct SystemSetup;

impl SystemSetup {
    /// Check every component, using `player_binary` for A2DP playback.
    pub fn check(player_binary: &str) -> SetupStatus<'_> {
        let components = [BLUETOOTHD, OBEXD, BLUEALSA, player(player_binary)]
            .into_iter()
            .map(|c| {
                let status = Self::check_component(&c);
                (c, status)
            })
            .collect();
        SetupStatus::from_components(components)
    }

    fn check_component(component: &Component) -> ComponentStatus {
        let installed = Command::new("which")
            .arg(component.binary)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);

        if !installed {
            return ComponentStatus::NotInstalled;
        }

        let Some(unit) = component.unit else {
            return ComponentStatus::Ok;
        };

        let mut cmd = Command::new("systemctl");
        if component.user_unit {
            cmd.arg("--user");
        }
        let running = cmd
            .args(["is-active", "--quiet", unit])
            .status()
            .map(|s| s.success())
            .unwrap_or(false);

        if running {
            ComponentStatus::Ok
        } else {
            ComponentStatus::NotRunning
        }
    }
}
