//! Location strings: the per-mechanism identity of an entry.
//!
//! - Registry: `<Scope>\<KeyPath>`, e.g.
//!   `CurrentUser\Software\Microsoft\Windows\CurrentVersion\Run`.
//! - Scheduled task: the full task path, e.g. `\Vendor\Updater`.
//! - Service: the service's system (key) name, e.g. `VendorSvc`.
//!
//! Every mutating provider call parses the location first so an entry
//! whose location does not fit its type never reaches the OS.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AutostartType, Error, Result};

/// Per-scope key holding the commands run at logon.
pub const RUN_KEY_PATH: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

/// Explorer's side table of enabled/disabled flags for [`RUN_KEY_PATH`].
pub const APPROVED_RUN_KEY_PATH: &str =
    r"Software\Microsoft\Windows\CurrentVersion\Explorer\StartupApproved\Run";

/// Parent key of every service's configuration.
pub const SERVICES_KEY_PATH: &str = r"SYSTEM\CurrentControlSet\Services";

/// Task Scheduler folder that holds the OS's own tasks.
pub const MICROSOFT_TASK_FOLDER: &str = r"\Microsoft\";

/// Registry root an entry is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hive {
    CurrentUser,
    LocalMachine,
}

impl Hive {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentUser => "CurrentUser",
            Self::LocalMachine => "LocalMachine",
        }
    }
}

impl fmt::Display for Hive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed registry location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryLocation {
    pub hive: Hive,
    pub key_path: String,
}

impl RegistryLocation {
    /// The `Run` key of the given scope.
    pub fn run_key(hive: Hive) -> Self {
        Self {
            hive,
            key_path: RUN_KEY_PATH.to_string(),
        }
    }

    pub fn parse(location: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidLocation {
            kind: AutostartType::Registry,
            location: location.to_string(),
            reason,
        };

        let (scope, key_path) = location
            .split_once('\\')
            .ok_or_else(|| invalid("expected <Scope>\\<KeyPath>"))?;
        let hive = match scope {
            "CurrentUser" => Hive::CurrentUser,
            "LocalMachine" => Hive::LocalMachine,
            _ => return Err(invalid("scope must be CurrentUser or LocalMachine")),
        };
        let key_path = key_path.trim_matches('\\');
        if key_path.is_empty() {
            return Err(invalid("missing key path"));
        }

        Ok(Self {
            hive,
            key_path: key_path.to_string(),
        })
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\\{}", self.hive, self.key_path)
    }
}

/// A location parsed according to its entry type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Registry(RegistryLocation),
    Task(String),
    Service(String),
}

impl Location {
    /// Parses `location` with the scheme of `kind`.
    pub fn parse(kind: AutostartType, location: &str) -> Result<Self> {
        match kind {
            AutostartType::Registry => RegistryLocation::parse(location).map(Self::Registry),
            AutostartType::ScheduledTask => parse_task_path(location).map(Self::Task),
            AutostartType::ThirdPartyService => parse_service_name(location).map(Self::Service),
        }
    }
}

/// Builds the path a task registered under `name` in the root folder gets.
pub fn root_task_path(name: &str) -> String {
    format!("\\{}", name.trim_start_matches('\\'))
}

/// Returns the folder part of a task path (`\A\B\task` -> `\A\B`).
pub fn task_folder(path: &str) -> &str {
    match path.rfind('\\') {
        Some(0) | None => "\\",
        Some(i) => &path[..i],
    }
}

/// Validates a full task path such as `\Vendor\Updater`.
pub fn parse_task_path(location: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidLocation {
        kind: AutostartType::ScheduledTask,
        location: location.to_string(),
        reason,
    };
    if !location.starts_with('\\') {
        return Err(invalid("task paths start with '\\'"));
    }
    if location.ends_with('\\') {
        return Err(invalid("task path names a folder"));
    }
    Ok(location.to_string())
}

/// Validates a service system name and returns it trimmed.
pub fn parse_service_name(location: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidLocation {
        kind: AutostartType::ThirdPartyService,
        location: location.to_string(),
        reason,
    };
    let name = location.trim();
    if name.is_empty() {
        return Err(invalid("service system name is empty"));
    }
    if name.contains(['\\', '/']) {
        return Err(invalid("service names cannot contain slashes"));
    }
    Ok(name.to_string())
}
