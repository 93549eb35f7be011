//! Third-party Windows services that start automatically.
//!
//! Services are enumerated through the Service Control Manager, but their
//! start type and image path are read straight from
//! `HKLM\SYSTEM\CurrentControlSet\Services\<name>`, which is much cheaper
//! than querying each service's configuration. Toggling likewise writes
//! the `Start` value directly; the SCM picks the change up on its next
//! read. Creation, reconfiguration and deletion go through the SCM.

use crate::error::require;
use crate::location::{Hive, SERVICES_KEY_PATH, parse_service_name};
use crate::provider::recreate;
use crate::registry::{RegValue, RegistryStore};
use crate::{AutostartEntry, AutostartProvider, AutostartType, Error, Result, command_line};

/// Service start types as stored in the `Start` registry value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartType {
    Boot,
    System,
    Automatic,
    Manual,
    Disabled,
}

impl StartType {
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Boot),
            1 => Some(Self::System),
            2 => Some(Self::Automatic),
            3 => Some(Self::Manual),
            4 => Some(Self::Disabled),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::Boot => 0,
            Self::System => 1,
            Self::Automatic => 2,
            Self::Manual => 3,
            Self::Disabled => 4,
        }
    }

    fn for_enabled(enabled: bool) -> Self {
        if enabled {
            Self::Automatic
        } else {
            Self::Disabled
        }
    }
}

/// A service as reported by the SCM enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledService {
    /// System (key) name.
    pub name: String,
    pub display_name: String,
}

/// Service Control Manager operations.
pub trait ServiceControl: Send + Sync {
    /// All installed Win32 services.
    fn installed_services(&self) -> Result<Vec<InstalledService>>;

    /// Registers a new own-process service.
    fn create_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
        start_type: StartType,
    ) -> Result<()>;

    /// Changes binary path and display name, leaving everything else as is.
    fn reconfigure_service(&self, name: &str, display_name: &str, command_line: &str)
    -> Result<()>;

    /// Marks the service for deletion.
    fn delete_service(&self, name: &str) -> Result<()>;
}

impl<T: ServiceControl + ?Sized> ServiceControl for &T {
    fn installed_services(&self) -> Result<Vec<InstalledService>> {
        (**self).installed_services()
    }
    fn create_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
        start_type: StartType,
    ) -> Result<()> {
        (**self).create_service(name, display_name, command_line, start_type)
    }
    fn reconfigure_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
    ) -> Result<()> {
        (**self).reconfigure_service(name, display_name, command_line)
    }
    fn delete_service(&self, name: &str) -> Result<()> {
        (**self).delete_service(name)
    }
}

/// Decides whether an executable comes from a trusted (Microsoft) publisher.
pub trait PublisherFilter: Send + Sync {
    /// Never fails: anything unreadable is simply not trusted.
    fn is_trusted_publisher(&self, path: &str) -> bool;
}

/// Provider for [`AutostartType::ThirdPartyService`] entries.
pub struct ServiceProvider<R, C, F> {
    registry: R,
    control: C,
    filter: F,
    hide_trusted: bool,
}

impl<R, C, F> ServiceProvider<R, C, F>
where
    R: RegistryStore,
    C: ServiceControl,
    F: PublisherFilter,
{
    pub fn new(registry: R, control: C, filter: F) -> Self {
        Self {
            registry,
            control,
            filter,
            hide_trusted: true,
        }
    }

    /// Whether services whose binary passes the publisher filter are hidden.
    pub fn hide_trusted(mut self, hide: bool) -> Self {
        self.hide_trusted = hide;
        self
    }

    /// Builds the entry for one service, or `None` if it is not a
    /// third-party autostart service.
    fn read_service(&self, service: &InstalledService) -> Result<Option<AutostartEntry>> {
        let key = service_key(&service.name);
        let start = self
            .registry
            .read_value(Hive::LocalMachine, &key, "Start")?
            .and_then(|v| v.as_dword())
            .and_then(StartType::from_raw)
            .unwrap_or(StartType::Manual);
        if !matches!(start, StartType::Automatic | StartType::Disabled) {
            return Ok(None);
        }

        let image_path = self
            .registry
            .read_value(Hive::LocalMachine, &key, "ImagePath")?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let (executable_path, arguments) = command_line::split(&image_path);
        if self.hide_trusted && self.filter.is_trusted_publisher(&executable_path) {
            return Ok(None);
        }

        Ok(Some(AutostartEntry {
            name: service.display_name.clone(),
            executable_path,
            arguments,
            kind: AutostartType::ThirdPartyService,
            location: service.name.clone(),
            is_enabled: start == StartType::Automatic,
        }))
    }

    fn set_start(&self, name: &str, enabled: bool) -> Result<()> {
        let start = StartType::for_enabled(enabled);
        self.registry
            .write_value(
                Hive::LocalMachine,
                &service_key(name),
                "Start",
                &RegValue::Dword(start.raw()),
            )
            .map_err(|e| match e {
                Error::NotFound { .. } => Error::not_found("service registry key", name),
                other => other,
            })
    }
}

impl<R, C, F> AutostartProvider for ServiceProvider<R, C, F>
where
    R: RegistryStore,
    C: ServiceControl,
    F: PublisherFilter,
{
    fn kind(&self) -> AutostartType {
        AutostartType::ThirdPartyService
    }

    fn list(&self) -> Result<Vec<AutostartEntry>> {
        let services = self.control.installed_services()?;
        let mut entries = Vec::new();
        for service in &services {
            match self.read_service(service) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => crate::log_debug!("skipping service '{}': {e}", service.name),
            }
        }
        Ok(entries)
    }

    fn create(&self, entry: &AutostartEntry) -> Result<()> {
        let name = validate(entry)?;
        let display_name = if entry.name.trim().is_empty() {
            &name
        } else {
            &entry.name
        };

        self.control.create_service(
            &name,
            display_name,
            &entry.command_line(),
            StartType::for_enabled(entry.is_enabled),
        )?;
        if !entry.is_enabled {
            self.set_start(&name, false)?;
        }
        Ok(())
    }

    fn enable(&self, entry: &AutostartEntry) -> Result<()> {
        self.set_start(&parse(entry)?, true)
    }

    fn disable(&self, entry: &AutostartEntry) -> Result<()> {
        self.set_start(&parse(entry)?, false)
    }

    fn modify(&self, original: &AutostartEntry, updated: &AutostartEntry) -> Result<()> {
        let new_name = validate(updated)?;
        let old_name = parse(original)?;

        if old_name != new_name {
            self.delete(original)?;
            return recreate(original, updated, || self.create(updated));
        }

        let display_name = if updated.name.trim().is_empty() {
            &new_name
        } else {
            &updated.name
        };
        self.control
            .reconfigure_service(&new_name, display_name, &updated.command_line())
    }

    fn delete(&self, entry: &AutostartEntry) -> Result<()> {
        self.control.delete_service(&parse(entry)?)
    }
}

fn service_key(name: &str) -> String {
    format!("{SERVICES_KEY_PATH}\\{name}")
}

/// Checks the required fields and returns the service's system name.
fn validate(entry: &AutostartEntry) -> Result<String> {
    require("service name", &entry.location)?;
    require("executable path", &entry.executable_path)?;
    parse(entry)
}

fn parse(entry: &AutostartEntry) -> Result<String> {
    parse_service_name(&entry.location)
}
