pub mod create;
pub mod delete;
pub mod list;
pub mod modify;
pub mod toggle;

use autorun_core::{AutostartEntry, AutostartManager};

use crate::EntryArgs;

/// Prints the error and exits with status 1.
pub fn fail(error: impl std::fmt::Display) -> ! {
    eprintln!("Error: {error}");
    std::process::exit(1);
}

/// Looks up the live entry the arguments point at, or exits.
pub fn resolve(manager: &AutostartManager, args: &EntryArgs) -> AutostartEntry {
    match manager.find(args.kind, &args.location, args.name.as_deref()) {
        Ok(Some(entry)) => entry,
        Ok(None) => {
            let name = args
                .name
                .as_deref()
                .map(|n| format!(" named '{n}'"))
                .unwrap_or_default();
            fail(format_args!(
                "no {} entry{name} at '{}'",
                args.kind, args.location
            ))
        }
        Err(e) => fail(e),
    }
}
