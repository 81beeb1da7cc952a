//! Handler for the `positions` command.

use std::path::Path;

use crate::error::Result;
use crate::infrastructure::snapshot::SnapshotStore;

/// Print the positions stored in a snapshot file.
pub fn execute<P: AsRef<Path>>(snapshot: P, json: bool) -> Result<()> {
    let store = SnapshotStore::new(snapshot.as_ref());
    let positions = store.load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&positions)?);
        return Ok(());
    }
    if positions.is_empty() {
        println!("No open positions in {}", store.path().display());
        return Ok(());
    }

    println!("{} position(s) in {}", positions.len(), store.path().display());
    for position in &positions {
        println!();
        println!("{}", position.entry_info());
        if position.is_either_exit_order_placed() {
            println!("{}", position.exit_info());
        }
    }
    Ok(())
}
