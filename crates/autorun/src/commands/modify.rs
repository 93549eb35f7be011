use autorun_core::{AutostartEntry, AutostartManager};

use super::{fail, resolve};
use crate::ModifyArgs;

pub fn execute(manager: &AutostartManager, args: &ModifyArgs) {
    let original = resolve(manager, &args.entry);
    let updated = apply(&original, args);
    if updated == original {
        println!("Nothing to change for {original}.");
        return;
    }

    match manager.modify(&original, &updated) {
        Ok(()) => println!("Modified {original} -> {updated}."),
        Err(e) if e.is_partial() => {
            eprintln!("Error: {e}");
            eprintln!("The original entry was removed; re-create it with `autorun create`.");
            std::process::exit(1);
        }
        Err(e) => fail(e),
    }
}

/// Copies `original` with the requested changes applied.
fn apply(original: &AutostartEntry, args: &ModifyArgs) -> AutostartEntry {
    let mut updated = original.clone();
    if let Some(name) = &args.new_name {
        updated.name = name.clone();
    }
    if let Some(location) = &args.new_location {
        updated.location = location.clone();
    }
    if let Some(path) = &args.path {
        updated.executable_path = path.clone();
    }
    if args.clear_args {
        updated.arguments = None;
    } else if let Some(arguments) = &args.args {
        updated = updated.with_arguments(arguments);
    }
    updated
}
