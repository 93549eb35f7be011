use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command_line;

/// The autostart mechanism an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutostartType {
    /// A value under a `Run` registry key.
    Registry,
    /// A Task Scheduler task with a logon or boot trigger.
    ScheduledTask,
    /// A non-Microsoft Windows service set to start automatically.
    ThirdPartyService,
}

impl AutostartType {
    /// Every mechanism, in the order providers are registered by default.
    pub const ALL: [Self; 3] = [Self::Registry, Self::ScheduledTask, Self::ThirdPartyService];

    /// Short lowercase name used on the command line.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::ScheduledTask => "task",
            Self::ThirdPartyService => "service",
        }
    }
}

impl fmt::Display for AutostartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registry => "Registry",
            Self::ScheduledTask => "ScheduledTask",
            Self::ThirdPartyService => "ThirdPartyService",
        };
        f.write_str(name)
    }
}

impl FromStr for AutostartType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registry" | "reg" => Ok(Self::Registry),
            "task" | "scheduledtask" | "scheduled-task" => Ok(Self::ScheduledTask),
            "service" | "thirdpartyservice" | "third-party-service" => {
                Ok(Self::ThirdPartyService)
            }
            other => Err(format!(
                "unknown autostart type '{other}' (expected registry, task or service)"
            )),
        }
    }
}

/// A program configured to launch automatically, whatever the mechanism.
///
/// Entries are read-through projections of OS state: they are rebuilt on
/// every listing and never cached. Identity is `(kind, location)`, plus
/// `name` for registry entries where the value name is the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutostartEntry {
    /// Display label (registry value name, task name, service display name).
    pub name: String,
    /// Program that will run.
    pub executable_path: String,
    /// Trailing command-line text passed to the program.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Backing mechanism. Never changes for an existing entry.
    #[serde(rename = "type")]
    pub kind: AutostartType,
    /// Type-specific address, see [`crate::location`].
    pub location: String,
    /// Whether the OS will actually launch the entry.
    pub is_enabled: bool,
}

impl AutostartEntry {
    /// Creates an enabled entry with no arguments.
    pub fn new(
        name: impl Into<String>,
        executable_path: impl Into<String>,
        kind: AutostartType,
        location: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            executable_path: executable_path.into(),
            arguments: None,
            kind,
            location: location.into(),
            is_enabled: true,
        }
    }

    /// Sets the argument string. Blank strings clear it.
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        let arguments = arguments.into();
        self.arguments = (!arguments.trim().is_empty()).then_some(arguments);
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.is_enabled = enabled;
        self
    }

    /// Returns the command line stored by the OS: `"path" arguments`.
    pub fn command_line(&self) -> String {
        command_line::compose(&self.executable_path, self.arguments.as_deref())
    }
}

impl fmt::Display for AutostartEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({} at {})", self.name, self.kind, self.location)
    }
}
