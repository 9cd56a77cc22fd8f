// Shared across the integration test binaries; not every binary uses
// every helper.
#![allow(dead_code)]

pub mod fixtures;
pub mod memory_store;
