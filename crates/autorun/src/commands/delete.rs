use autorun_core::AutostartManager;

use super::{fail, resolve};
use crate::EntryArgs;

pub fn execute(manager: &AutostartManager, args: &EntryArgs) {
    let entry = resolve(manager, args);
    match manager.delete(&entry) {
        Ok(()) => println!("Deleted {entry}."),
        Err(e) => fail(e),
    }
}
