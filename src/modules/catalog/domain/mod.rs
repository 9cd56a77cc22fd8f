pub mod entities;
pub mod store;

pub use entities::{Country, Location, Province};
pub use store::{ChunkBatch, ChunkReceipt, DimRef, GazetteerStore, TableCounts, WritePhase};
