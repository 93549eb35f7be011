//! Routes autostart operations to the provider that owns each entry type.

use std::thread;

use crate::{AutostartEntry, AutostartProvider, AutostartType, Error, Result};

/// Front door to every autostart mechanism.
///
/// Holds one provider per [`AutostartType`]. Listing fans out across all
/// providers in parallel; every mutation goes to exactly one provider,
/// picked by the entry's type.
pub struct AutostartManager {
    providers: Vec<Box<dyn AutostartProvider>>,
}

impl AutostartManager {
    pub fn new(providers: Vec<Box<dyn AutostartProvider>>) -> Self {
        Self { providers }
    }

    /// Lists the entries of every provider.
    ///
    /// Providers run concurrently on scoped threads; results are
    /// concatenated in registration order. The first provider error
    /// fails the whole listing.
    pub fn list_all(&self) -> Result<Vec<AutostartEntry>> {
        let results: Vec<Result<Vec<AutostartEntry>>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .providers
                .iter()
                .map(|provider| scope.spawn(move || provider.list()))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        });

        let mut entries = Vec::new();
        for result in results {
            entries.extend(result?);
        }
        crate::log_debug!("listed {} autostart entries", entries.len());
        Ok(entries)
    }

    /// Flips the entry's enabled state and returns the new state.
    pub fn toggle(&self, entry: &AutostartEntry) -> Result<bool> {
        let provider = self.provider(entry.kind)?;
        if entry.is_enabled {
            provider.disable(entry)?;
        } else {
            provider.enable(entry)?;
        }
        crate::log_info!(
            "{} {entry}",
            if entry.is_enabled { "disabled" } else { "enabled" }
        );
        Ok(!entry.is_enabled)
    }

    pub fn create(&self, entry: &AutostartEntry) -> Result<()> {
        self.provider(entry.kind)?.create(entry)?;
        crate::log_info!("created {entry}");
        Ok(())
    }

    /// Rewrites `original` as `updated`. Both must have the same type.
    pub fn modify(&self, original: &AutostartEntry, updated: &AutostartEntry) -> Result<()> {
        if original.kind != updated.kind {
            return Err(Error::TypeChange {
                from: original.kind,
                to: updated.kind,
            });
        }
        self.provider(original.kind)?.modify(original, updated)?;
        crate::log_info!("modified {original} -> {updated}");
        Ok(())
    }

    pub fn delete(&self, entry: &AutostartEntry) -> Result<()> {
        self.provider(entry.kind)?.delete(entry)?;
        crate::log_info!("deleted {entry}");
        Ok(())
    }

    /// Looks up a live entry by identity.
    ///
    /// Registry entries match on location and value name (case-insensitive,
    /// like the registry itself); other types on location alone, with
    /// `name` ignored.
    pub fn find(
        &self,
        kind: AutostartType,
        location: &str,
        name: Option<&str>,
    ) -> Result<Option<AutostartEntry>> {
        let entries = self.provider(kind)?.list()?;
        Ok(entries.into_iter().find(|entry| {
            let same_location = entry.location.eq_ignore_ascii_case(location);
            match (kind, name) {
                (AutostartType::Registry, Some(name)) => {
                    same_location && entry.name.eq_ignore_ascii_case(name)
                }
                (AutostartType::Registry, None) => false,
                _ => same_location,
            }
        }))
    }

    /// Returns the provider registered for `kind`.
    pub fn provider(&self, kind: AutostartType) -> Result<&dyn AutostartProvider> {
        self.providers
            .iter()
            .find(|p| p.kind() == kind)
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                crate::log_error!("no provider registered for {kind}");
                Error::ProviderNotFound(kind)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::location::{Hive, RUN_KEY_PATH, RegistryLocation};
    use crate::registry::RegistryProvider;
    use crate::testing::MemoryRegistry;

    /// Provider that records every call it receives.
    struct Recorder {
        kind: AutostartType,
        calls: Arc<Mutex<Vec<String>>>,
        entries: Vec<AutostartEntry>,
        fail_list: bool,
    }

    impl Recorder {
        fn new(kind: AutostartType, calls: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                kind,
                calls: calls.clone(),
                entries: vec![AutostartEntry::new(
                    format!("{kind}-item"),
                    r"C:\x.exe",
                    kind,
                    format!("{kind}-location"),
                )],
                fail_list: false,
            }
        }

        fn record(&self, op: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{op}", self.kind));
            Ok(())
        }
    }

    impl AutostartProvider for Recorder {
        fn kind(&self) -> AutostartType {
            self.kind
        }
        fn list(&self) -> Result<Vec<AutostartEntry>> {
            if self.fail_list {
                return Err(Error::native("list", self.kind.to_string(), 5, "denied"));
            }
            Ok(self.entries.clone())
        }
        fn create(&self, _: &AutostartEntry) -> Result<()> {
            self.record("create")
        }
        fn enable(&self, _: &AutostartEntry) -> Result<()> {
            self.record("enable")
        }
        fn disable(&self, _: &AutostartEntry) -> Result<()> {
            self.record("disable")
        }
        fn modify(&self, _: &AutostartEntry, _: &AutostartEntry) -> Result<()> {
            self.record("modify")
        }
        fn delete(&self, _: &AutostartEntry) -> Result<()> {
            self.record("delete")
        }
    }

    fn manager(calls: &Arc<Mutex<Vec<String>>>) -> AutostartManager {
        AutostartManager::new(
            AutostartType::ALL
                .into_iter()
                .map(|kind| Box::new(Recorder::new(kind, calls)) as Box<dyn AutostartProvider>)
                .collect(),
        )
    }

    fn entry(kind: AutostartType) -> AutostartEntry {
        AutostartEntry::new("x", r"C:\x.exe", kind, "loc")
    }

    #[test]
    fn list_all_concatenates_in_registration_order() {
        // Arrange
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = manager(&calls);

        // Act
        let entries = manager.list_all().unwrap();

        // Assert
        let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, AutostartType::ALL);
    }

    #[test]
    fn list_all_fails_when_one_provider_fails() {
        // Arrange
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut failing = Recorder::new(AutostartType::ScheduledTask, &calls);
        failing.fail_list = true;
        let manager = AutostartManager::new(vec![
            Box::new(Recorder::new(AutostartType::Registry, &calls)),
            Box::new(failing),
        ]);

        // Act
        let result = manager.list_all();

        // Assert
        assert!(matches!(result, Err(Error::Native { .. })));
    }

    #[test]
    fn mutations_reach_only_the_matching_provider() {
        for kind in AutostartType::ALL {
            // Arrange
            let calls = Arc::new(Mutex::new(Vec::new()));
            let manager = manager(&calls);
            let e = entry(kind);

            // Act
            manager.create(&e).unwrap();
            manager.modify(&e, &e).unwrap();
            manager.delete(&e).unwrap();

            // Assert
            let expected: Vec<String> = ["create", "modify", "delete"]
                .iter()
                .map(|op| format!("{kind}:{op}"))
                .collect();
            assert_eq!(*calls.lock().unwrap(), expected);
        }
    }

    #[test]
    fn toggle_disables_enabled_and_enables_disabled() {
        // Arrange
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = manager(&calls);
        let enabled = entry(AutostartType::ThirdPartyService);
        let disabled = entry(AutostartType::ThirdPartyService).with_enabled(false);

        // Act
        let after_enabled = manager.toggle(&enabled).unwrap();
        let after_disabled = manager.toggle(&disabled).unwrap();

        // Assert
        assert!(!after_enabled);
        assert!(after_disabled);
        assert_eq!(
            *calls.lock().unwrap(),
            ["ThirdPartyService:disable", "ThirdPartyService:enable"]
        );
    }

    #[test]
    fn unregistered_type_is_a_routing_error() {
        // Arrange
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager =
            AutostartManager::new(vec![Box::new(Recorder::new(AutostartType::Registry, &calls))]);

        // Act
        let result = manager.toggle(&entry(AutostartType::ScheduledTask));

        // Assert
        assert!(matches!(
            result,
            Err(Error::ProviderNotFound(AutostartType::ScheduledTask))
        ));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn modify_refuses_type_change() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = manager(&calls);

        let result = manager.modify(
            &entry(AutostartType::Registry),
            &entry(AutostartType::ScheduledTask),
        );

        assert!(matches!(result, Err(Error::TypeChange { .. })));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn find_matches_registry_by_location_and_name() {
        // Arrange
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = manager(&calls);

        // Act
        let hit = manager
            .find(
                AutostartType::Registry,
                "registry-location",
                Some("REGISTRY-ITEM"),
            )
            .unwrap();
        let miss = manager
            .find(AutostartType::Registry, "registry-location", Some("other"))
            .unwrap();
        let task = manager
            .find(AutostartType::ScheduledTask, "ScheduledTask-location", None)
            .unwrap();

        // Assert
        assert_eq!(hit.map(|e| e.name), Some("Registry-item".to_string()));
        assert!(miss.is_none());
        assert!(task.is_some());
    }

    #[test]
    fn registry_entry_lifecycle_through_list_all() {
        // Arrange
        let registry: &'static MemoryRegistry = Box::leak(Box::default());
        registry.add_key(Hive::CurrentUser, RUN_KEY_PATH);
        let manager = AutostartManager::new(vec![Box::new(RegistryProvider::new(registry))]);
        let location = RegistryLocation::run_key(Hive::CurrentUser).to_string();
        let foo = AutostartEntry::new("Foo", r"C:\Foo.exe", AutostartType::Registry, &location);
        let named = |name: &str| {
            manager
                .list_all()
                .unwrap()
                .into_iter()
                .find(|e| e.name == name)
        };

        // Act / Assert
        manager.create(&foo).unwrap();
        let created = named("Foo").unwrap();
        assert!(created.is_enabled);
        assert_eq!(created.command_line(), r#""C:\Foo.exe""#);

        assert!(!manager.toggle(&created).unwrap());
        let disabled = named("Foo").unwrap();
        assert!(!disabled.is_enabled);

        let mut bar = disabled.clone();
        bar.name = "Bar".into();
        manager.modify(&disabled, &bar).unwrap();
        assert!(named("Foo").is_none());
        let renamed = named("Bar").unwrap();
        assert!(!renamed.is_enabled);
        assert_eq!(renamed.executable_path, r"C:\Foo.exe");
        assert_eq!(renamed.location, location);
        assert_eq!(
            manager
                .find(AutostartType::Registry, &location, Some("bar"))
                .unwrap(),
            Some(renamed)
        );
    }
}
