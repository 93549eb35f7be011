//! Registry `Run` key autostart entries.
//!
//! Each value under `<hive>\Software\Microsoft\Windows\CurrentVersion\Run`
//! is one entry: the value name is its name and identity, the string data
//! its command line. Explorer keeps enabled/disabled state out of band in
//! `...\Explorer\StartupApproved\Run`, one 12-byte binary value per entry
//! name whose first byte is even when the entry may run.

use crate::error::require;
use crate::location::{APPROVED_RUN_KEY_PATH, Hive, RegistryLocation};
use crate::provider::recreate;
use crate::{AutostartEntry, AutostartProvider, AutostartType, Error, Result, command_line};

/// Approval blob Explorer writes for an enabled entry.
pub const ENABLED_BLOB: [u8; 12] = [0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Approval blob Explorer writes for a disabled entry.
pub const DISABLED_BLOB: [u8; 12] = [0x03, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Hives scanned by [`RegistryProvider::list`], in listing order.
const LISTED_HIVES: [Hive; 2] = [Hive::LocalMachine, Hive::CurrentUser];

/// Typed registry value data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    /// `REG_SZ`, or `REG_EXPAND_SZ` after environment expansion.
    String(String),
    Binary(Vec<u8>),
    Dword(u32),
}

impl RegValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_dword(&self) -> Option<u32> {
        match self {
            Self::Dword(v) => Some(*v),
            _ => None,
        }
    }
}

/// Access to the registry, one call per native operation.
///
/// Keys are opened and closed inside each call.
pub trait RegistryStore: Send + Sync {
    /// Names of the values under a key, or `None` if the key is missing.
    fn value_names(&self, hive: Hive, key_path: &str) -> Result<Option<Vec<String>>>;

    /// Reads a value. `None` if the key or the value is missing.
    fn read_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<Option<RegValue>>;

    /// Writes a value into an existing key.
    ///
    /// Fails with [`Error::NotFound`] when the key does not exist.
    fn write_value(&self, hive: Hive, key_path: &str, name: &str, value: &RegValue)
    -> Result<()>;

    /// Deletes a value. Returns `false` if the key or value was missing.
    fn delete_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<bool>;

    /// Opens a key, creating it (and missing parents) if needed.
    fn create_key(&self, hive: Hive, key_path: &str) -> Result<()>;
}

impl<T: RegistryStore + ?Sized> RegistryStore for &T {
    fn value_names(&self, hive: Hive, key_path: &str) -> Result<Option<Vec<String>>> {
        (**self).value_names(hive, key_path)
    }
    fn read_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<Option<RegValue>> {
        (**self).read_value(hive, key_path, name)
    }
    fn write_value(
        &self,
        hive: Hive,
        key_path: &str,
        name: &str,
        value: &RegValue,
    ) -> Result<()> {
        (**self).write_value(hive, key_path, name, value)
    }
    fn delete_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<bool> {
        (**self).delete_value(hive, key_path, name)
    }
    fn create_key(&self, hive: Hive, key_path: &str) -> Result<()> {
        (**self).create_key(hive, key_path)
    }
}

/// Decodes an approval blob: absent, empty, or even first byte means enabled.
pub fn is_approved(blob: Option<&[u8]>) -> bool {
    match blob {
        None | Some([]) => true,
        Some([first, ..]) => first % 2 == 0,
    }
}

/// Provider for [`AutostartType::Registry`] entries.
pub struct RegistryProvider<S> {
    store: S,
}

impl<S: RegistryStore> RegistryProvider<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn list_hive(&self, hive: Hive) -> Result<Vec<AutostartEntry>> {
        let run = RegistryLocation::run_key(hive);
        let Some(names) = self.store.value_names(hive, &run.key_path)? else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            match self.read_entry(&run, &name) {
                Ok(entry) => entries.push(entry),
                Err(e) => crate::log_debug!("skipping run value '{name}' in {run}: {e}"),
            }
        }
        Ok(entries)
    }

    fn read_entry(&self, run: &RegistryLocation, name: &str) -> Result<AutostartEntry> {
        let command = self
            .store
            .read_value(run.hive, &run.key_path, name)?
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        let approval = self
            .store
            .read_value(run.hive, APPROVED_RUN_KEY_PATH, name)?;
        let (executable_path, arguments) = command_line::split(&command);

        Ok(AutostartEntry {
            name: name.to_string(),
            executable_path,
            arguments,
            kind: AutostartType::Registry,
            location: run.to_string(),
            is_enabled: is_approved(approval.as_ref().and_then(RegValue::as_bytes)),
        })
    }

    fn write_command(&self, location: &RegistryLocation, entry: &AutostartEntry) -> Result<()> {
        self.store.write_value(
            location.hive,
            &location.key_path,
            &entry.name,
            &RegValue::String(entry.command_line()),
        )
    }

    fn remove(&self, location: &RegistryLocation, name: &str) -> Result<()> {
        self.store
            .delete_value(location.hive, &location.key_path, name)?;
        self.store
            .delete_value(location.hive, APPROVED_RUN_KEY_PATH, name)?;
        Ok(())
    }

    fn set_state(&self, entry: &AutostartEntry, enabled: bool) -> Result<()> {
        let write = || -> Result<()> {
            let location = parse(entry)?;
            let blob = if enabled { ENABLED_BLOB } else { DISABLED_BLOB };
            self.store.create_key(location.hive, APPROVED_RUN_KEY_PATH)?;
            self.store.write_value(
                location.hive,
                APPROVED_RUN_KEY_PATH,
                &entry.name,
                &RegValue::Binary(blob.to_vec()),
            )
        };

        write().map_err(|e| Error::StateChange {
            name: entry.name.clone(),
            location: entry.location.clone(),
            enabled,
            source: Box::new(e),
        })
    }
}

impl<S: RegistryStore> AutostartProvider for RegistryProvider<S> {
    fn kind(&self) -> AutostartType {
        AutostartType::Registry
    }

    fn list(&self) -> Result<Vec<AutostartEntry>> {
        let mut entries = Vec::new();
        for hive in LISTED_HIVES {
            match self.list_hive(hive) {
                Ok(found) => entries.extend(found),
                Err(e) => crate::log_warn!("skipping {hive} run key: {e}"),
            }
        }
        Ok(entries)
    }

    fn create(&self, entry: &AutostartEntry) -> Result<()> {
        validate(entry)?;
        let location = parse(entry)?;
        self.write_command(&location, entry)
    }

    fn enable(&self, entry: &AutostartEntry) -> Result<()> {
        self.set_state(entry, true)
    }

    fn disable(&self, entry: &AutostartEntry) -> Result<()> {
        self.set_state(entry, false)
    }

    fn modify(&self, original: &AutostartEntry, updated: &AutostartEntry) -> Result<()> {
        validate(updated)?;
        let old = parse(original)?;
        let new = parse(updated)?;

        if old == new && original.name == updated.name {
            return self.write_command(&new, updated);
        }

        // The value name is the identity: drop the old value, then write
        // the new one. Nothing restores the old value if the write fails.
        self.remove(&old, &original.name)?;
        recreate(original, updated, || {
            self.write_command(&new, updated)?;
            if !original.is_enabled {
                self.disable(updated)?;
            }
            Ok(())
        })
    }

    fn delete(&self, entry: &AutostartEntry) -> Result<()> {
        let location = parse(entry)?;
        self.remove(&location, &entry.name)
    }
}

fn validate(entry: &AutostartEntry) -> Result<()> {
    require("name", &entry.name)?;
    require("executable path", &entry.executable_path)
}

fn parse(entry: &AutostartEntry) -> Result<RegistryLocation> {
    RegistryLocation::parse(&entry.location)
}
