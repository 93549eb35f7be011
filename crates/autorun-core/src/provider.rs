use crate::{AutostartEntry, AutostartType, Result};

/// One autostart mechanism (registry, scheduled tasks, services).
///
/// Every method is a blocking call into the OS. Implementations hold no
/// state between calls: handles are opened and closed per operation and
/// listings always re-read the backing store.
pub trait AutostartProvider: Send + Sync {
    /// The entry type this provider owns.
    fn kind(&self) -> AutostartType;

    /// Lists the provider's entries.
    ///
    /// Best-effort per item: an entry that cannot be read is skipped and
    /// logged. An `Err` means the mechanism as a whole was unreachable.
    fn list(&self) -> Result<Vec<AutostartEntry>>;

    /// Makes a new entry appear in the backing store.
    fn create(&self, entry: &AutostartEntry) -> Result<()>;

    /// Marks the entry as enabled without touching its identity.
    fn enable(&self, entry: &AutostartEntry) -> Result<()>;

    /// Marks the entry as disabled without touching its identity.
    fn disable(&self, entry: &AutostartEntry) -> Result<()>;

    /// Rewrites `original` to look like `updated`.
    ///
    /// When the identity changes this deletes and re-creates, which is
    /// not atomic: see [`crate::Error::PartiallyApplied`].
    fn modify(&self, original: &AutostartEntry, updated: &AutostartEntry) -> Result<()>;

    /// Removes the entry from the backing store.
    fn delete(&self, entry: &AutostartEntry) -> Result<()>;
}

/// Runs the second half of a delete-then-create modify.
///
/// A failure here is reported as [`crate::Error::PartiallyApplied`] since
/// the original is already gone.
pub(crate) fn recreate(
    original: &AutostartEntry,
    updated: &AutostartEntry,
    create: impl FnOnce() -> Result<()>,
) -> Result<()> {
    create().map_err(|e| {
        crate::log_error!("modify lost {original}: re-create as {updated} failed: {e}");
        crate::Error::PartiallyApplied {
            removed: format!("{} ({})", original.name, original.location),
            target: format!("{} ({})", updated.name, updated.location),
            source: Box::new(e),
        }
    })
}
