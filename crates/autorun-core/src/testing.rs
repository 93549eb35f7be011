//! In-memory stand-ins for the native stores, used by the provider tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::location::{Hive, SERVICES_KEY_PATH};
use crate::registry::{RegValue, RegistryStore};
use crate::service::{InstalledService, PublisherFilter, ServiceControl, StartType};
use crate::task::{ExecAction, NewTask, RegisteredTask, TaskScheduler, TriggerKind};
use crate::{Error, Result};

const ACCESS_DENIED: i32 = 5;

fn key_id(hive: Hive, key_path: &str) -> (Hive, String) {
    (hive, key_path.trim_matches('\\').to_ascii_lowercase())
}

/// Registry keys with ordered, case-insensitive value names.
#[derive(Default)]
pub struct MemoryRegistry {
    keys: Mutex<HashMap<(Hive, String), Vec<(String, RegValue)>>>,
    denied: Mutex<HashSet<(Hive, String)>>,
}

impl MemoryRegistry {
    pub fn add_key(&self, hive: Hive, key_path: &str) {
        self.keys
            .lock()
            .unwrap()
            .entry(key_id(hive, key_path))
            .or_default();
    }

    pub fn remove_key(&self, hive: Hive, key_path: &str) {
        self.keys.lock().unwrap().remove(&key_id(hive, key_path));
    }

    /// Sets a value, creating the key if needed.
    pub fn set(&self, hive: Hive, key_path: &str, name: &str, value: RegValue) {
        let mut keys = self.keys.lock().unwrap();
        let values = keys.entry(key_id(hive, key_path)).or_default();
        match values.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, existing)) => *existing = value,
            None => values.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, hive: Hive, key_path: &str, name: &str) -> Option<RegValue> {
        self.keys
            .lock()
            .unwrap()
            .get(&key_id(hive, key_path))?
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    /// Makes every access to the key fail with access denied.
    pub fn deny(&self, hive: Hive, key_path: &str) {
        self.denied.lock().unwrap().insert(key_id(hive, key_path));
    }

    fn check(&self, hive: Hive, key_path: &str) -> Result<()> {
        if self.denied.lock().unwrap().contains(&key_id(hive, key_path)) {
            return Err(Error::native(
                "open registry key",
                format!("{hive}\\{key_path}"),
                ACCESS_DENIED,
                "Access is denied.",
            ));
        }
        Ok(())
    }
}

impl RegistryStore for MemoryRegistry {
    fn value_names(&self, hive: Hive, key_path: &str) -> Result<Option<Vec<String>>> {
        self.check(hive, key_path)?;
        Ok(self
            .keys
            .lock()
            .unwrap()
            .get(&key_id(hive, key_path))
            .map(|values| values.iter().map(|(n, _)| n.clone()).collect()))
    }

    fn read_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<Option<RegValue>> {
        self.check(hive, key_path)?;
        Ok(self.get(hive, key_path, name))
    }

    fn write_value(
        &self,
        hive: Hive,
        key_path: &str,
        name: &str,
        value: &RegValue,
    ) -> Result<()> {
        self.check(hive, key_path)?;
        if !self.keys.lock().unwrap().contains_key(&key_id(hive, key_path)) {
            return Err(Error::not_found("registry key", format!("{hive}\\{key_path}")));
        }
        self.set(hive, key_path, name, value.clone());
        Ok(())
    }

    fn delete_value(&self, hive: Hive, key_path: &str, name: &str) -> Result<bool> {
        self.check(hive, key_path)?;
        let mut keys = self.keys.lock().unwrap();
        let Some(values) = keys.get_mut(&key_id(hive, key_path)) else {
            return Ok(false);
        };
        let before = values.len();
        values.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        Ok(values.len() != before)
    }

    fn create_key(&self, hive: Hive, key_path: &str) -> Result<()> {
        self.check(hive, key_path)?;
        self.add_key(hive, key_path);
        Ok(())
    }
}

/// Fails the next call of the named operation once.
#[derive(Default)]
struct FailNext(Mutex<Option<&'static str>>);

impl FailNext {
    fn arm(&self, operation: &'static str) {
        *self.0.lock().unwrap() = Some(operation);
    }

    fn check(&self, operation: &'static str, target: &str) -> Result<()> {
        let mut armed = self.0.lock().unwrap();
        if *armed == Some(operation) {
            *armed = None;
            return Err(Error::native(operation, target, ACCESS_DENIED, "injected failure"));
        }
        Ok(())
    }
}

/// A service as the fake SCM knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeService {
    pub name: String,
    pub display_name: String,
    pub command_line: String,
    pub start_type: StartType,
}

/// Service Control Manager fake.
///
/// When backed by a [`MemoryRegistry`] it mirrors created services into
/// the services key the way the real SCM does.
#[derive(Default)]
pub struct FakeScm<'a> {
    services: Mutex<Vec<FakeService>>,
    writes: Mutex<HashMap<String, usize>>,
    registry: Option<&'a MemoryRegistry>,
    fail: FailNext,
}

impl<'a> FakeScm<'a> {
    pub fn backed_by(mut self, registry: &'a MemoryRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a service to the enumeration without touching the registry.
    pub fn install(&self, name: &str, display_name: &str) {
        self.services.lock().unwrap().push(FakeService {
            name: name.to_string(),
            display_name: display_name.to_string(),
            command_line: String::new(),
            start_type: StartType::Manual,
        });
    }

    pub fn service(&self, name: &str) -> Option<FakeService> {
        self.services
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Number of create/reconfigure calls that reached the service.
    pub fn writes_of(&self, name: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .get(&name.to_ascii_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn fail_next(&self, operation: &'static str) {
        self.fail.arm(operation);
    }

    fn count_write(&self, name: &str) {
        *self
            .writes
            .lock()
            .unwrap()
            .entry(name.to_ascii_lowercase())
            .or_default() += 1;
    }

    fn mirror(&self, service: &FakeService) {
        if let Some(registry) = self.registry {
            let key = format!("{SERVICES_KEY_PATH}\\{}", service.name);
            registry.set(
                Hive::LocalMachine,
                &key,
                "Start",
                RegValue::Dword(service.start_type.raw()),
            );
            registry.set(
                Hive::LocalMachine,
                &key,
                "ImagePath",
                RegValue::String(service.command_line.clone()),
            );
        }
    }
}

impl ServiceControl for FakeScm<'_> {
    fn installed_services(&self) -> Result<Vec<InstalledService>> {
        self.fail.check("enumerate services", "ServicesActive")?;
        Ok(self
            .services
            .lock()
            .unwrap()
            .iter()
            .map(|s| InstalledService {
                name: s.name.clone(),
                display_name: s.display_name.clone(),
            })
            .collect())
    }

    fn create_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
        start_type: StartType,
    ) -> Result<()> {
        self.fail.check("create service", name)?;
        if self.service(name).is_some() {
            return Err(Error::native("create service", name, 1073, "The specified service already exists."));
        }
        let service = FakeService {
            name: name.to_string(),
            display_name: display_name.to_string(),
            command_line: command_line.to_string(),
            start_type,
        };
        self.mirror(&service);
        self.services.lock().unwrap().push(service);
        self.count_write(name);
        Ok(())
    }

    fn reconfigure_service(
        &self,
        name: &str,
        display_name: &str,
        command_line: &str,
    ) -> Result<()> {
        self.fail.check("change service config", name)?;
        let updated = {
            let mut services = self.services.lock().unwrap();
            let service = services
                .iter_mut()
                .find(|s| s.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| Error::not_found("service", name))?;
            service.display_name = display_name.to_string();
            service.command_line = command_line.to_string();
            service.clone()
        };
        self.mirror(&updated);
        self.count_write(name);
        Ok(())
    }

    fn delete_service(&self, name: &str) -> Result<()> {
        self.fail.check("delete service", name)?;
        let mut services = self.services.lock().unwrap();
        let before = services.len();
        services.retain(|s| !s.name.eq_ignore_ascii_case(name));
        if services.len() == before {
            return Err(Error::not_found("service", name));
        }
        if let Some(registry) = self.registry {
            registry.remove_key(Hive::LocalMachine, &format!("{SERVICES_KEY_PATH}\\{name}"));
        }
        Ok(())
    }
}

/// Publisher filter that trusts a fixed set of paths.
#[derive(Default)]
pub struct StaticFilter {
    trusted: Vec<String>,
}

impl StaticFilter {
    pub fn trusting<const N: usize>(paths: [&str; N]) -> Self {
        Self {
            trusted: paths.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PublisherFilter for StaticFilter {
    fn is_trusted_publisher(&self, path: &str) -> bool {
        self.trusted.iter().any(|t| t.eq_ignore_ascii_case(path))
    }
}

/// Task Scheduler fake holding a flat list of tasks.
#[derive(Default)]
pub struct FakeScheduler {
    tasks: Mutex<Vec<(RegisteredTask, Option<String>)>>,
    fail: FailNext,
}

impl FakeScheduler {
    pub fn insert(&self, task: RegisteredTask) {
        self.tasks.lock().unwrap().push((task, None));
    }

    pub fn task(&self, path: &str) -> Option<RegisteredTask> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t.path.eq_ignore_ascii_case(path))
            .map(|(t, _)| t.clone())
    }

    pub fn description(&self, path: &str) -> Option<String> {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t.path.eq_ignore_ascii_case(path))
            .and_then(|(_, d)| d.clone())
    }

    pub fn fail_next(&self, operation: &'static str) {
        self.fail.arm(operation);
    }

    fn with_task<T>(&self, path: &str, f: impl FnOnce(&mut RegisteredTask) -> Result<T>) -> Result<T> {
        let mut tasks = self.tasks.lock().unwrap();
        let (task, _) = tasks
            .iter_mut()
            .find(|(t, _)| t.path.eq_ignore_ascii_case(path))
            .ok_or_else(|| Error::not_found("scheduled task", path))?;
        f(task)
    }
}

impl TaskScheduler for FakeScheduler {
    fn tasks(&self) -> Result<Vec<RegisteredTask>> {
        self.fail.check("enumerate tasks", "\\")?;
        Ok(self.tasks.lock().unwrap().iter().map(|(t, _)| t.clone()).collect())
    }

    fn register(&self, new: &NewTask) -> Result<()> {
        self.fail.check("register task", &new.name)?;
        let path = format!("\\{}", new.name);
        let mut tasks = self.tasks.lock().unwrap();
        tasks.retain(|(t, _)| !t.path.eq_ignore_ascii_case(&path));
        tasks.push((
            RegisteredTask {
                name: new.name.clone(),
                path,
                enabled: new.enabled,
                triggers: vec![TriggerKind::Logon],
                exec_action: Some(new.action.clone()),
            },
            Some(new.description.clone()),
        ));
        Ok(())
    }

    fn update_action(&self, path: &str, action: &ExecAction) -> Result<()> {
        self.fail.check("update task", path)?;
        self.with_task(path, |task| {
            let current = task
                .exec_action
                .as_mut()
                .ok_or_else(|| Error::not_found("exec action", path))?;
            *current = action.clone();
            Ok(())
        })
    }

    fn set_enabled(&self, path: &str, enabled: bool) -> Result<()> {
        self.fail.check("set task state", path)?;
        self.with_task(path, |task| {
            task.enabled = enabled;
            Ok(())
        })
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.fail.check("delete task", path)?;
        let mut tasks = self.tasks.lock().unwrap();
        let before = tasks.len();
        tasks.retain(|(t, _)| !t.path.eq_ignore_ascii_case(path));
        if tasks.len() == before {
            return Err(Error::not_found("scheduled task", path));
        }
        Ok(())
    }
}
